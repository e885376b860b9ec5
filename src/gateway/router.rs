//! Request routing and dispatch.
//!
//! The router holds the three services (sandbox, listing, static files) and
//! dispatches by matching a prefix route table. It only needs the request
//! head, so it can be exercised without a socket.
//!
//! # Routes
//!
//! | Prefix      | Handler                                        |
//! |-------------|------------------------------------------------|
//! | `/api/list` | JSON listing of `?path=` (sandboxed)           |
//! | (anything)  | file, HTML listing, index, or slash redirect   |

use super::response::{self, ResponseBody};
use crate::files::{ServeError, StaticFileHandler};
use crate::listing::{ListingError, ListingService};
use crate::sandbox::{ConfinedPath, PathSandbox, ServedRoot, encode_url_path};
use hyper::{Method, Request, Response, StatusCode, Uri};
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Message used for every "not a directory" API answer, including
/// sandbox rejections.
const NOT_A_DIRECTORY: &str = "Path is not a directory";

/// Message used when enumeration fails.
const LISTING_FAILED: &str = "Error listing directory";

/// A routing target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// JSON directory listing API.
    ListApi,
    /// Directory-or-file dispatch.
    Browse,
}

/// Route table: first matching prefix wins; unmatched paths browse.
const ROUTES: &[(&str, Route)] = &[("/api/list", Route::ListApi)];

/// Outcome of the blocking part of a directory request.
enum DirectoryOutcome {
    /// Serve this `index.html` instead of a listing.
    Index(ConfinedPath),
    /// Rendered HTML listing.
    Page(String),
}

/// Dispatches requests to the listing and static file services.
#[derive(Debug, Clone)]
pub struct Router {
    sandbox: PathSandbox,
    listing: ListingService,
    files: StaticFileHandler,
}

impl Router {
    /// Create a router serving `root` with default services.
    pub fn new(root: Arc<ServedRoot>) -> Self {
        Self::with_services(
            PathSandbox::new(root.clone()),
            ListingService::new(root),
            StaticFileHandler::new(),
        )
    }

    /// Create a router from explicit services.
    pub fn with_services(
        sandbox: PathSandbox,
        listing: ListingService,
        files: StaticFileHandler,
    ) -> Self {
        Self {
            sandbox,
            listing,
            files,
        }
    }

    /// The sandbox used for every request.
    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    /// Match a request path against the route table.
    pub fn route(path: &str) -> Route {
        ROUTES
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix))
            .map(|(_, route)| *route)
            .unwrap_or(Route::Browse)
    }

    /// Handle a request. Never fails: every error becomes a status code.
    pub async fn handle<B>(&self, req: &Request<B>) -> Response<ResponseBody> {
        if req.method() != Method::GET {
            return response::method_not_allowed();
        }

        match Self::route(req.uri().path()) {
            Route::ListApi => self.list_api(req.uri().query()).await,
            Route::Browse => self.browse(req.uri()).await,
        }
    }

    /// `GET /api/list?path=<path>`.
    async fn list_api(&self, query: Option<&str>) -> Response<ResponseBody> {
        let requested = requested_api_path(query);

        // The query value is already decoded; re-encode so the sandbox's own
        // decoding step sees the literal name.
        let dir = match self.sandbox.resolve(&encode_url_path(&requested)) {
            Ok(dir) => dir,
            Err(_) => return response::json_error(StatusCode::BAD_REQUEST, NOT_A_DIRECTORY),
        };

        let listing = self.listing.clone();
        let result = tokio::task::spawn_blocking(move || {
            if !dir.fs_path().is_dir() {
                return Ok(None);
            }
            listing.list(&dir).map(Some)
        })
        .await;

        let entries = match result {
            Ok(Ok(Some(entries))) => entries,
            Ok(Ok(None)) => {
                return response::json_error(StatusCode::BAD_REQUEST, NOT_A_DIRECTORY);
            }
            Ok(Err(e)) => {
                warn!("API listing of {} failed: {}", requested, e);
                return listing_failure(&e, Route::ListApi);
            }
            Err(e) => {
                error!("API listing task failed: {}", e);
                return response::json_error(StatusCode::INTERNAL_SERVER_ERROR, LISTING_FAILED);
            }
        };

        match self.listing.render_json(&requested, &entries) {
            Ok(body) => response::json(StatusCode::OK, body),
            Err(e) => {
                error!("Failed to render listing: {}", e);
                listing_failure(&e, Route::ListApi)
            }
        }
    }

    /// Directory-or-file dispatch for every non-API path.
    async fn browse(&self, uri: &Uri) -> Response<ResponseBody> {
        // Rejections answer exactly like a missing file.
        let confined = match self.sandbox.resolve(uri.path()) {
            Ok(confined) => confined,
            Err(_) => return response::not_found(),
        };

        let metadata = match tokio::fs::metadata(confined.fs_path()).await {
            Ok(metadata) => metadata,
            Err(e) => return stat_failure(&e),
        };

        if metadata.is_dir() {
            self.directory(confined, uri.query()).await
        } else {
            self.file(&confined).await
        }
    }

    async fn directory(&self, dir: ConfinedPath, query: Option<&str>) -> Response<ResponseBody> {
        // Keep relative links in the listing correct.
        if !dir.has_trailing_slash() && !dir.is_root() {
            let mut location = format!("{}/", dir.encoded_url_path());
            if let Some(query) = query {
                location.push('?');
                location.push_str(query);
            }
            debug!("Redirecting {} to {}", dir.url_path(), location);
            return response::moved_permanently(&location);
        }

        let url_path = dir.url_path().to_string();
        let sandbox = self.sandbox.clone();
        let listing = self.listing.clone();
        let outcome = tokio::task::spawn_blocking(move || -> Result<_, ListingError> {
            if let Some(index) = listing.index_file(&sandbox, &dir) {
                return Ok(DirectoryOutcome::Index(index));
            }
            let entries = listing.list(&dir)?;
            Ok(DirectoryOutcome::Page(listing.render_html(&dir, &entries)))
        })
        .await;

        match outcome {
            Ok(Ok(DirectoryOutcome::Index(index))) => self.file(&index).await,
            Ok(Ok(DirectoryOutcome::Page(page))) => response::html(page),
            Ok(Err(e)) => {
                warn!("Directory listing of {} failed: {}", url_path, e);
                listing_failure(&e, Route::Browse)
            }
            Err(e) => {
                error!("Directory listing task failed: {}", e);
                response::internal_error(LISTING_FAILED)
            }
        }
    }

    async fn file(&self, file: &ConfinedPath) -> Response<ResponseBody> {
        match self.files.serve(file).await {
            Ok(resp) => resp,
            Err(e @ ServeError::Response(_)) => {
                error!("Failed to serve {}: {}", file.url_path(), e);
                serve_failure(&e)
            }
            Err(e) => {
                debug!("Refusing {}: {}", file.url_path(), e);
                serve_failure(&e)
            }
        }
    }
}

/// Answer for a path whose stat failed.
fn stat_failure(err: &std::io::Error) -> Response<ResponseBody> {
    match err.kind() {
        ErrorKind::PermissionDenied => response::forbidden(),
        _ => response::not_found(),
    }
}

/// Answer for a failed listing. The API never reports 403; an unreadable
/// directory on the browse path does.
fn listing_failure(err: &ListingError, route: Route) -> Response<ResponseBody> {
    match route {
        Route::ListApi => response::json_error(StatusCode::INTERNAL_SERVER_ERROR, LISTING_FAILED),
        Route::Browse if err.is_forbidden() => response::forbidden(),
        Route::Browse => response::internal_error(LISTING_FAILED),
    }
}

/// Answer for a file that could not be served.
fn serve_failure(err: &ServeError) -> Response<ResponseBody> {
    match err {
        ServeError::NotFound => response::not_found(),
        ServeError::Forbidden(_) => response::forbidden(),
        ServeError::Response(_) => response::internal_error("Failed to serve file"),
    }
}

/// Extract `path` from the API query string, defaulting to `/` and forcing
/// a leading slash.
fn requested_api_path(query: Option<&str>) -> String {
    let requested = query
        .and_then(|q| {
            form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "path")
                .map(|(_, value)| value.into_owned())
        })
        .unwrap_or_else(|| "/".to_string());

    if requested.starts_with('/') {
        requested
    } else {
        format!("/{}", requested)
    }
}
