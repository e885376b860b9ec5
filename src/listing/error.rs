//! Listing error types.

use std::io::ErrorKind;
use thiserror::Error;

/// Errors that can occur while listing a directory.
///
/// Per-entry failures never surface here; they are skipped during listing.
#[derive(Debug, Error)]
pub enum ListingError {
    /// The directory itself could not be opened or read.
    #[error("Failed to read directory: {0}")]
    ReadDir(#[source] std::io::Error),

    /// Failed to serialize the JSON payload.
    #[error("Failed to serialize listing: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ListingError {
    /// Whether the OS refused access to the directory.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, ListingError::ReadDir(e) if e.kind() == ErrorKind::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_is_forbidden() {
        let err = ListingError::ReadDir(std::io::Error::new(ErrorKind::PermissionDenied, "nope"));
        assert!(err.is_forbidden());

        let err = ListingError::ReadDir(std::io::Error::new(ErrorKind::NotFound, "gone"));
        assert!(!err.is_forbidden());
        assert!(err.to_string().contains("gone"));
    }
}
