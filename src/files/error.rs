//! Error types for static file serving.

use std::io::ErrorKind;
use thiserror::Error;

/// Errors that can occur while serving a file.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The file does not exist.
    #[error("File not found")]
    NotFound,

    /// The file exists but cannot be opened or read.
    #[error("Permission denied: {0}")]
    Forbidden(#[source] std::io::Error),

    /// Failed to assemble the response.
    #[error("Failed to build response: {0}")]
    Response(#[from] hyper::http::Error),
}

impl From<std::io::Error> for ServeError {
    /// Missing files are `NotFound`; every other open or stat failure is
    /// treated as unreadable.
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => ServeError::NotFound,
            _ => ServeError::Forbidden(err),
        }
    }
}
