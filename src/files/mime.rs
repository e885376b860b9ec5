//! Content type detection from file extensions.
//!
//! A fixed table; anything not listed is served as
//! `application/octet-stream`.

use std::path::Path;

/// Fallback content type for unknown extensions.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Guess the content type of a file from its extension (case-insensitive).
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    from_extension(&ext)
}

/// Look up a lowercase extension (without the dot).
pub fn from_extension(ext: &str) -> &'static str {
    match ext {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "txt" => "text/plain",
        "py" => "text/x-python",
        "md" => "text/markdown",
        _ => OCTET_STREAM,
    }
}
