//! Streaming file responses.
//!
//! Files are read in fixed-size chunks through a [`ReaderStream`], so large
//! files are never held in memory as a whole.

use super::error::ServeError;
use super::mime::content_type_for;
use crate::gateway::response::ResponseBody;
use crate::sandbox::ConfinedPath;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use hyper::{Response, StatusCode};
use std::time::SystemTime;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, trace};

/// Read chunk size for streamed bodies.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Serves regular files with content type, length and modification headers.
#[derive(Debug, Clone, Default)]
pub struct StaticFileHandler;

impl StaticFileHandler {
    /// Create a static file handler.
    pub fn new() -> Self {
        Self
    }

    /// Build a `200 OK` response streaming the file at `file`.
    ///
    /// # Errors
    ///
    /// - `ServeError::NotFound` if the file does not exist
    /// - `ServeError::Forbidden` if it cannot be opened, or is a directory
    pub async fn serve(&self, file: &ConfinedPath) -> Result<Response<ResponseBody>, ServeError> {
        let path = file.fs_path();
        let handle = File::open(path).await?;
        let metadata = handle.metadata().await?;

        if metadata.is_dir() {
            return Err(ServeError::Forbidden(std::io::Error::other(
                "refusing to stream a directory",
            )));
        }

        let len = metadata.len();
        let content_type = content_type_for(path);
        trace!("Serving {} ({} bytes, {})", file.url_path(), len, content_type);

        let stream = ReaderStream::with_capacity(handle, CHUNK_SIZE).map_ok(Frame::data);
        let body: ResponseBody = StreamBody::new(stream).boxed();

        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, len);

        match metadata.modified() {
            Ok(modified) => builder = builder.header(LAST_MODIFIED, http_date(modified)),
            Err(e) => debug!("No modification time for {}: {}", file.url_path(), e),
        }

        Ok(builder.body(body)?)
    }
}

/// Format a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{PathSandbox, ServedRoot};
    use std::sync::Arc;
    use std::time::{Duration, UNIX_EPOCH};

    fn sandbox_for(dir: &std::path::Path) -> PathSandbox {
        PathSandbox::new(Arc::new(ServedRoot::new(dir).unwrap()))
    }

    #[test]
    fn test_http_date_format() {
        let t = UNIX_EPOCH + Duration::from_secs(784_111_777);
        assert_eq!(http_date(t), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[tokio::test]
    async fn test_serve_file_headers_and_body() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), b"hello world").unwrap();
        let sandbox = sandbox_for(temp_dir.path());

        let file = sandbox.resolve("/notes.txt").unwrap();
        let resp = StaticFileHandler::new().serve(&file).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "text/plain");
        assert_eq!(resp.headers()[CONTENT_LENGTH], "11");
        assert!(resp.headers().contains_key(LAST_MODIFIED));

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"hello world");
    }

    #[tokio::test]
    async fn test_serve_large_file_in_chunks() {
        let temp_dir = tempfile::tempdir().unwrap();
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(temp_dir.path().join("blob.bin"), &data).unwrap();
        let sandbox = sandbox_for(temp_dir.path());

        let file = sandbox.resolve("/blob.bin").unwrap();
        let resp = StaticFileHandler::new().serve(&file).await.unwrap();
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/octet-stream");

        let mut body = resp.into_body();
        let mut frames = 0;
        let mut received = Vec::new();
        while let Some(frame) = body.frame().await {
            let frame = frame.unwrap();
            if let Ok(chunk) = frame.into_data() {
                assert!(chunk.len() <= CHUNK_SIZE);
                received.extend_from_slice(&chunk);
                frames += 1;
            }
        }
        assert!(frames >= 4);
        assert_eq!(received, data);
    }

    #[tokio::test]
    async fn test_serve_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let sandbox = sandbox_for(temp_dir.path());

        let file = sandbox.resolve("/missing.txt").unwrap();
        let err = StaticFileHandler::new().serve(&file).await.unwrap_err();
        assert!(matches!(err, ServeError::NotFound));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_serve_unreadable_file() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("secret.txt");
        std::fs::write(&path, b"secret").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores permission bits; nothing to assert in that case.
        if std::fs::File::open(&path).is_ok() {
            return;
        }

        let sandbox = sandbox_for(temp_dir.path());
        let file = sandbox.resolve("/secret.txt").unwrap();
        let err = StaticFileHandler::new().serve(&file).await.unwrap_err();
        assert!(matches!(err, ServeError::Forbidden(_)));
    }
}
