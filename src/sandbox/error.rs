//! Error types for path sandboxing.
//!
//! Two very different failure classes live here:
//! - Root validation errors, which are configuration errors and fatal at startup
//! - Escape rejections, which are per-request and map to "not found"

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for sandbox operations.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The served root does not exist or cannot be resolved.
    #[error("Failed to resolve served root '{path}': {source}")]
    RootResolution {
        /// The root path that was configured.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The served root exists but is not a directory.
    #[error("Served root '{0}' is not a directory")]
    RootNotDirectory(PathBuf),

    /// The request path resolves outside of the served root.
    ///
    /// Carries no path detail on purpose: the message may end up in a
    /// response body or a log line visible to the client.
    #[error("Request path escapes the served root")]
    Escape,
}

impl SandboxError {
    /// Whether this error is a per-request rejection rather than a
    /// configuration problem.
    pub fn is_violation(&self) -> bool {
        matches!(self, SandboxError::Escape)
    }
}
