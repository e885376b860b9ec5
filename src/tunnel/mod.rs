//! Public tunnel supervision.
//!
//! Exposes the local server through an external tunneling client
//! (localtunnel's `lt` by default):
//! - Locates the client, installing it (and Node.js) if necessary
//! - Spawns it for the bound port and captures the announced public URL
//! - Probes liveness and stops it on shutdown
//!
//! Tunnel failures never affect local serving. The orchestrator logs them
//! and carries on without a public URL.
//!
//! # Example
//!
//! ```ignore
//! use dirshare::tunnel::{SystemLauncher, TunnelSettings, TunnelSupervisor};
//!
//! let mut tunnel = TunnelSupervisor::new(SystemLauncher::new(), TunnelSettings::default());
//! tunnel.ensure_available().await?;
//! if let Some(url) = tunnel.start(8083, Some("myshare")).await? {
//!     println!("public at {}", url);
//! }
//! // ...
//! tunnel.stop().await;
//! ```

mod error;
mod installer;
mod launcher;
mod state;
mod supervisor;

pub use error::TunnelError;
pub use installer::{InstallStep, Platform, client_install_step, runtime_install_plan};
pub use launcher::{ChildExit, CommandSpec, ProcessLauncher, SystemChild, SystemLauncher, TunnelChild};
pub use state::TunnelState;
pub use supervisor::{TunnelSettings, TunnelSupervisor, extract_url, tunnel_command};
