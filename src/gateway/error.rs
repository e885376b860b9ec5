//! Error types for the HTTP gateway.
//!
//! Request-level failures never reach this type; the router turns them into
//! status codes. These errors cover the listener and connection layers.

use thiserror::Error;

/// Errors from binding, accepting or serving connections.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Failed to bind the listening socket.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// The `host:port` we tried to bind.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error on the listener.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP protocol error on a connection.
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),
}

impl GatewayError {
    /// Whether the error is a peer hanging up mid-connection.
    pub fn is_disconnect(&self) -> bool {
        match self {
            GatewayError::Http(e) => {
                e.is_incomplete_message() || e.is_canceled() || {
                    let text = e.to_string().to_lowercase();
                    text.contains("connection reset") || text.contains("broken pipe")
                }
            }
            GatewayError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
            ),
            GatewayError::Bind { .. } => false,
        }
    }
}
