//! Error types for tunnel supervision.
//!
//! None of these are fatal to the process; the orchestrator logs them and
//! keeps serving locally.

use super::state::TunnelState;
use thiserror::Error;

/// Errors from installing, starting or stopping the tunnel client.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// The tunnel binary is still missing after installation.
    #[error("Tunnel binary '{0}' not found on PATH")]
    BinaryNotFound(String),

    /// No automatic runtime install exists for this OS.
    #[error("Automatic Node.js installation is not supported on {0}; install it manually")]
    UnsupportedPlatform(String),

    /// No usable system package manager was found.
    #[error("No supported package manager found (tried: {0})")]
    NoPackageManager(String),

    /// An install step exceeded its timeout.
    #[error("'{command}' timed out after {timeout_secs}s")]
    InstallTimeout {
        /// The command line that timed out.
        command: String,
        /// The timeout that was exceeded.
        timeout_secs: u64,
    },

    /// An install step exited unsuccessfully.
    #[error("'{command}' failed ({status}): {stderr}")]
    InstallFailed {
        /// The command line that failed.
        command: String,
        /// Exit status description.
        status: String,
        /// Tail of the command's standard error.
        stderr: String,
    },

    /// A process could not be spawned.
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the child failed.
    #[error("Failed to wait for tunnel process: {0}")]
    Wait(#[source] std::io::Error),

    /// Signalling the child failed.
    #[error("Failed to signal tunnel process: {0}")]
    Signal(String),

    /// The tunnel client exited during startup.
    #[error("Tunnel process exited during startup ({0})")]
    Exited(String),

    /// The requested state change is not allowed.
    #[error("Invalid tunnel state transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: TunnelState,
        /// Requested state.
        to: TunnelState,
    },
}
