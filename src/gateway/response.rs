//! Response construction helpers.
//!
//! All responses share one boxed body type so that streamed files and
//! in-memory pages can come out of the same router.

use crate::listing::escape_html;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full, combinators::BoxBody};
use hyper::header::{
    ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue, LOCATION,
};
use hyper::{Response, StatusCode};

/// Body type of every gateway response.
pub type ResponseBody = BoxBody<Bytes, std::io::Error>;

/// Content type of HTML pages.
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Content type of JSON API responses.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Wrap in-memory bytes as a response body.
pub fn full(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into()).map_err(|never| match never {}).boxed()
}

/// An empty response body.
pub fn empty() -> ResponseBody {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

/// Build a response with an in-memory body and explicit length.
fn with_body(status: StatusCode, content_type: &str, body: Vec<u8>) -> Response<ResponseBody> {
    let len = body.len();
    let mut resp = Response::new(full(body));
    *resp.status_mut() = status;
    if let Ok(value) = HeaderValue::from_str(content_type) {
        resp.headers_mut().insert(CONTENT_TYPE, value);
    }
    resp.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(len));
    resp
}

/// `200 OK` HTML page.
pub fn html(page: String) -> Response<ResponseBody> {
    with_body(StatusCode::OK, HTML_CONTENT_TYPE, page.into_bytes())
}

/// JSON response with the permissive CORS header the explorer relies on.
pub fn json(status: StatusCode, body: Vec<u8>) -> Response<ResponseBody> {
    let mut resp = with_body(status, JSON_CONTENT_TYPE, body);
    resp.headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    resp
}

/// JSON error payload: `{"error": "<message>"}`.
pub fn json_error(status: StatusCode, message: &str) -> Response<ResponseBody> {
    let body = serde_json::json!({ "error": message }).to_string().into_bytes();
    json(status, body)
}

/// Small HTML error page.
///
/// The message is escaped and must never contain filesystem paths.
pub fn error_page(status: StatusCode, message: &str) -> Response<ResponseBody> {
    let reason = status.canonical_reason().unwrap_or("Error");
    let page = format!(
        "<!DOCTYPE html>\n<html><head>\n<meta charset=\"utf-8\">\n<title>{code} {reason}</title></head>\n<body>\n<h1>{code} {reason}</h1>\n<p>{message}</p>\n</body></html>\n",
        code = status.as_u16(),
        reason = reason,
        message = escape_html(message),
    );
    with_body(status, HTML_CONTENT_TYPE, page.into_bytes())
}

/// `404 Not Found`, shared by missing paths and sandbox rejections.
pub fn not_found() -> Response<ResponseBody> {
    error_page(StatusCode::NOT_FOUND, "File not found")
}

/// `403 Forbidden`.
pub fn forbidden() -> Response<ResponseBody> {
    error_page(StatusCode::FORBIDDEN, "Permission denied")
}

/// `405 Method Not Allowed` with an `Allow: GET` header.
pub fn method_not_allowed() -> Response<ResponseBody> {
    let mut resp = error_page(StatusCode::METHOD_NOT_ALLOWED, "Only GET is supported");
    resp.headers_mut().insert(ALLOW, HeaderValue::from_static("GET"));
    resp
}

/// `301 Moved Permanently` to `location`.
///
/// Falls back to a 500 page if `location` is not a valid header value.
pub fn moved_permanently(location: &str) -> Response<ResponseBody> {
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let mut resp = Response::new(empty());
            *resp.status_mut() = StatusCode::MOVED_PERMANENTLY;
            resp.headers_mut().insert(LOCATION, value);
            resp.headers_mut()
                .insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
            resp
        }
        Err(_) => internal_error("Invalid redirect target"),
    }
}

/// `500 Internal Server Error`.
pub fn internal_error(message: &str) -> Response<ResponseBody> {
    error_page(StatusCode::INTERNAL_SERVER_ERROR, message)
}
