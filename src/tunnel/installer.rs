//! Install plans for the tunnel client and its Node.js runtime.
//!
//! Plans are plain data built from the platform and a "does this program
//! exist" predicate, so they can be tested without touching the system.

use super::error::TunnelError;
use super::launcher::CommandSpec;
use std::time::Duration;

/// Timeout for refreshing the apt package index.
pub const PACKAGE_INDEX_TIMEOUT: Duration = Duration::from_secs(300);

/// Linux package managers, in preference order.
const LINUX_PACKAGE_MANAGERS: &[&str] = &["apt-get", "yum", "dnf"];

/// Operating system family, as far as installation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// macOS (Homebrew).
    MacOs,
    /// Linux (apt-get, yum or dnf).
    Linux,
    /// Windows; no automatic install.
    Windows,
    /// Anything else; no automatic install.
    Other,
}

impl Platform {
    /// The platform this binary was built for.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => Platform::MacOs,
            "linux" => Platform::Linux,
            "windows" => Platform::Windows,
            _ => Platform::Other,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Platform::MacOs => "macOS",
            Platform::Linux => "Linux",
            Platform::Windows => "Windows",
            Platform::Other => std::env::consts::OS,
        }
    }
}

/// One command of an install plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallStep {
    /// Command to run.
    pub command: CommandSpec,
    /// Maximum run time.
    pub timeout: Duration,
    /// Whether a failure aborts the plan. Index refreshes are best effort.
    pub required: bool,
}

impl InstallStep {
    fn required(command: CommandSpec, timeout: Duration) -> Self {
        Self {
            command,
            timeout,
            required: true,
        }
    }
}

/// Steps that install Node.js and npm on `platform`.
///
/// # Errors
///
/// - `TunnelError::UnsupportedPlatform` on Windows and unknown systems
/// - `TunnelError::NoPackageManager` if no known package manager exists
pub fn runtime_install_plan(
    platform: Platform,
    has_program: impl Fn(&str) -> bool,
    timeout: Duration,
) -> Result<Vec<InstallStep>, TunnelError> {
    match platform {
        Platform::MacOs => {
            if !has_program("brew") {
                return Err(TunnelError::NoPackageManager("brew".to_string()));
            }
            Ok(vec![InstallStep::required(
                CommandSpec::new("brew", ["install", "node"]),
                timeout,
            )])
        }
        Platform::Linux => {
            let manager = LINUX_PACKAGE_MANAGERS
                .iter()
                .copied()
                .find(|manager| has_program(manager))
                .ok_or_else(|| TunnelError::NoPackageManager(LINUX_PACKAGE_MANAGERS.join(", ")))?;

            let mut steps = Vec::new();
            if manager == "apt-get" {
                steps.push(InstallStep {
                    command: CommandSpec::new("sudo", ["apt-get", "update"]),
                    timeout: PACKAGE_INDEX_TIMEOUT,
                    required: false,
                });
            }
            steps.push(InstallStep::required(
                CommandSpec::new("sudo", [manager, "install", "-y", "nodejs", "npm"]),
                timeout,
            ));
            Ok(steps)
        }
        Platform::Windows | Platform::Other => {
            Err(TunnelError::UnsupportedPlatform(platform.name().to_string()))
        }
    }
}

/// Step that installs the tunnel client package globally through npm.
pub fn client_install_step(package: &str, timeout: Duration) -> InstallStep {
    InstallStep::required(CommandSpec::new("npm", ["install", "-g", package]), timeout)
}
