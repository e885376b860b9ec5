//! Tunnel lifecycle state machine.
//!
//! ```text
//! NotInstalled ──▶ Installing ──▶ Installed ──▶ Starting ──▶ Running
//!      │                              │            │            │
//!      └──────────────▲ (present)     └────────────┴────────────┴──▶ Terminated
//!
//! any state ──▶ Failed (absorbing)
//! ```

use super::error::TunnelError;
use std::fmt;

/// Lifecycle state of the tunnel client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TunnelState {
    /// Binary not yet located.
    #[default]
    NotInstalled,
    /// Install steps are running.
    Installing,
    /// Binary located, not started.
    Installed,
    /// Child spawned, inside the announce window.
    Starting,
    /// Child running.
    Running,
    /// Child stopped or exited.
    Terminated,
    /// Unrecoverable failure.
    Failed,
}

impl TunnelState {
    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: TunnelState) -> bool {
        use TunnelState::*;

        match (self, next) {
            (Failed, _) => false,
            (_, Failed) => true,
            (NotInstalled, Installing | Installed | Terminated) => true,
            (Installing, Installed) => true,
            (Installed, Starting | Terminated) => true,
            (Starting, Running | Terminated) => true,
            (Running, Terminated) => true,
            _ => false,
        }
    }

    /// Validate and perform a transition.
    pub fn transition(self, next: TunnelState) -> Result<TunnelState, TunnelError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TunnelError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Whether a child process may be alive in this state.
    pub fn has_child(self) -> bool {
        matches!(self, TunnelState::Starting | TunnelState::Running)
    }
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TunnelState::NotInstalled => "not-installed",
            TunnelState::Installing => "installing",
            TunnelState::Installed => "installed",
            TunnelState::Starting => "starting",
            TunnelState::Running => "running",
            TunnelState::Terminated => "terminated",
            TunnelState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}
