//! Static file serving.
//!
//! Serves confined regular files with:
//! - `Content-Type` from a fixed extension table
//! - `Content-Length` from the file size
//! - `Last-Modified` in HTTP date format
//! - A chunked, streamed body

mod error;
mod mime;
mod serve;

pub use error::ServeError;
pub use mime::{OCTET_STREAM, content_type_for};
pub use serve::{CHUNK_SIZE, StaticFileHandler, http_date};
