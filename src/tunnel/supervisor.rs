//! Tunnel client supervision.
//!
//! The supervisor owns the tunnel child process exclusively. It is driven by
//! the orchestrator: `ensure_available` and `start` once at startup, `check`
//! once per second, `stop` once at shutdown.

use super::error::TunnelError;
use super::installer::{InstallStep, Platform, client_install_step, runtime_install_plan};
use super::launcher::{ChildExit, CommandSpec, ProcessLauncher, TunnelChild};
use super::state::TunnelState;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Package manager whose presence means the runtime is installed.
const RUNTIME_PROBE: &str = "npm";

/// Tunnel client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSettings {
    /// Tunnel client executable name.
    pub binary: String,
    /// npm package providing the binary.
    pub package: String,
    /// How long to wait for the public URL after spawning.
    pub announce_window: Duration,
    /// Timeout per runtime install step.
    pub runtime_install_timeout: Duration,
    /// Timeout for the npm install of the client.
    pub client_install_timeout: Duration,
    /// Time between SIGTERM and kill on stop.
    pub stop_grace: Duration,
}

impl Default for TunnelSettings {
    fn default() -> Self {
        Self {
            binary: "lt".to_string(),
            package: "localtunnel".to_string(),
            announce_window: Duration::from_secs(3),
            runtime_install_timeout: Duration::from_secs(600),
            client_install_timeout: Duration::from_secs(120),
            stop_grace: Duration::from_secs(2),
        }
    }
}

/// Installs, starts and supervises the tunnel client.
pub struct TunnelSupervisor<L: ProcessLauncher> {
    launcher: L,
    settings: TunnelSettings,
    platform: Platform,
    state: TunnelState,
    binary_path: Option<PathBuf>,
    child: Option<L::Child>,
    public_url: Option<String>,
}

impl<L: ProcessLauncher> TunnelSupervisor<L> {
    /// Create a supervisor for the current platform.
    pub fn new(launcher: L, settings: TunnelSettings) -> Self {
        Self {
            launcher,
            settings,
            platform: Platform::current(),
            state: TunnelState::NotInstalled,
            binary_path: None,
            child: None,
            public_url: None,
        }
    }

    /// Override the platform used for install plans.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TunnelState {
        self.state
    }

    /// Public URL announced by the client, if any.
    pub fn public_url(&self) -> Option<&str> {
        self.public_url.as_deref()
    }

    /// Process id of the running client.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|child| child.pid())
    }

    fn set_state(&mut self, next: TunnelState) -> Result<(), TunnelError> {
        self.state = self.state.transition(next)?;
        debug!("Tunnel state: {}", self.state);
        Ok(())
    }

    fn fail(&mut self) {
        self.state = TunnelState::Failed;
        debug!("Tunnel state: {}", self.state);
    }

    /// Make sure the tunnel binary is on the search path, installing the
    /// client (and the Node.js runtime if needed) when it is not.
    ///
    /// # Errors
    ///
    /// Any install failure moves the supervisor to `Failed`.
    pub async fn ensure_available(&mut self) -> Result<PathBuf, TunnelError> {
        if self.state == TunnelState::Installed
            && let Some(path) = &self.binary_path
        {
            return Ok(path.clone());
        }

        if let Some(path) = self.launcher.find_program(&self.settings.binary) {
            self.set_state(TunnelState::Installed)?;
            debug!("Tunnel client found at {:?}", path);
            self.binary_path = Some(path.clone());
            return Ok(path);
        }

        info!(
            "Tunnel client '{}' not found, installing {}",
            self.settings.binary, self.settings.package
        );
        self.set_state(TunnelState::Installing)?;

        if let Err(e) = install(&self.launcher, &self.settings, self.platform).await {
            self.fail();
            return Err(e);
        }

        match self.launcher.find_program(&self.settings.binary) {
            Some(path) => {
                self.set_state(TunnelState::Installed)?;
                info!("Installed tunnel client at {:?}", path);
                self.binary_path = Some(path.clone());
                Ok(path)
            }
            None => {
                self.fail();
                Err(TunnelError::BinaryNotFound(self.settings.binary.clone()))
            }
        }
    }

    /// Spawn the tunnel client for `port` and wait up to the announce window
    /// for its public URL.
    ///
    /// Returns the URL if one was announced. The supervisor is `Running`
    /// either way unless the child exited during the window.
    pub async fn start(
        &mut self,
        port: u16,
        subdomain: Option<&str>,
    ) -> Result<Option<String>, TunnelError> {
        let program = match &self.binary_path {
            Some(path) => path.to_string_lossy().into_owned(),
            None => self.settings.binary.clone(),
        };
        let command = tunnel_command(&program, port, subdomain);

        self.set_state(TunnelState::Starting)?;
        info!("Starting tunnel for port {}", port);
        if let Some(subdomain) = subdomain {
            info!("Requested subdomain: {}", subdomain);
        }

        let mut child = match self.launcher.spawn(&command) {
            Ok(child) => child,
            Err(e) => {
                self.fail();
                return Err(e);
            }
        };
        debug!("Tunnel process started (pid {:?})", child.pid());

        let (url, exit) = announce(&mut child, self.settings.announce_window).await;
        if let Some(exit) = exit {
            self.fail();
            return Err(TunnelError::Exited(exit.to_string()));
        }

        self.child = Some(child);
        self.public_url = url.clone();
        self.set_state(TunnelState::Running)?;

        match &url {
            Some(url) => info!("Public URL: {}", url),
            None => warn!(
                "Tunnel started but announced no URL within {:?}",
                self.settings.announce_window
            ),
        }
        Ok(url)
    }

    /// Non-blocking liveness probe. Reaps the child if it exited.
    pub fn check(&mut self) -> TunnelState {
        if !self.state.has_child() {
            return self.state;
        }
        let Some(child) = self.child.as_mut() else {
            return self.state;
        };

        match child.try_exit() {
            Ok(Some(exit)) => {
                warn!("Tunnel process exited ({})", exit);
                self.child = None;
                self.public_url = None;
                if let Err(e) = self.set_state(TunnelState::Terminated) {
                    debug!("{}", e);
                }
            }
            Ok(None) => {}
            Err(e) => debug!("Tunnel liveness check failed: {}", e),
        }
        self.state
    }

    /// Stop the tunnel client: terminate, wait up to the grace period, then
    /// kill. Safe to call repeatedly and before `start`.
    pub async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            info!("Stopping tunnel (pid {:?})", child.pid());

            if let Err(e) = child.terminate() {
                debug!("Failed to signal tunnel: {}", e);
            }

            match tokio::time::timeout(self.settings.stop_grace, child.wait()).await {
                Ok(Ok(exit)) => debug!("Tunnel process exited ({})", exit),
                Ok(Err(e)) => {
                    warn!("Failed waiting for tunnel: {}", e);
                    kill_child(&mut child).await;
                }
                Err(_) => {
                    warn!(
                        "Tunnel did not exit within {:?}, killing",
                        self.settings.stop_grace
                    );
                    kill_child(&mut child).await;
                }
            }
        }

        self.public_url = None;
        if self.state != TunnelState::Terminated
            && self.state.can_transition_to(TunnelState::Terminated)
        {
            self.state = TunnelState::Terminated;
            debug!("Tunnel state: {}", self.state);
        }
    }
}

/// Install the client, and the runtime first if its package manager is missing.
async fn install<L: ProcessLauncher>(
    launcher: &L,
    settings: &TunnelSettings,
    platform: Platform,
) -> Result<(), TunnelError> {
    if launcher.find_program(RUNTIME_PROBE).is_none() {
        info!("{} not found, installing Node.js", RUNTIME_PROBE);
        let plan = runtime_install_plan(
            platform,
            |name| launcher.find_program(name).is_some(),
            settings.runtime_install_timeout,
        )?;
        run_steps(launcher, &plan).await?;
    }

    let step = client_install_step(&settings.package, settings.client_install_timeout);
    run_steps(launcher, std::slice::from_ref(&step)).await
}

async fn run_steps<L: ProcessLauncher>(
    launcher: &L,
    steps: &[InstallStep],
) -> Result<(), TunnelError> {
    for step in steps {
        info!("Running {}", step.command.display());
        match launcher.run(&step.command, step.timeout).await {
            Ok(()) => {}
            Err(e) if !step.required => {
                warn!("{} failed, continuing: {}", step.command.display(), e);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

async fn kill_child<C: TunnelChild>(child: &mut C) {
    if let Err(e) = child.kill().await {
        warn!("Failed to kill tunnel: {}", e);
    }
}

/// Command line for the tunnel client.
pub fn tunnel_command(program: &str, port: u16, subdomain: Option<&str>) -> CommandSpec {
    let mut args = vec!["--port".to_string(), port.to_string()];
    if let Some(subdomain) = subdomain {
        args.push("--subdomain".to_string());
        args.push(subdomain.to_string());
    }
    CommandSpec::new(program, args)
}

/// Read output until a URL shows up, the output closes, or the window ends.
///
/// Returns the URL (if any) and the exit status if the child died meanwhile.
async fn announce<C: TunnelChild>(
    child: &mut C,
    window: Duration,
) -> (Option<String>, Option<ChildExit>) {
    let deadline = Instant::now() + window;
    let mut url = None;

    loop {
        match tokio::time::timeout_at(deadline, child.next_line()).await {
            Ok(Some(line)) => {
                if let Some(found) = extract_url(&line) {
                    url = Some(found);
                    break;
                }
            }
            Ok(None) => {
                // Both streams closed; the child is most likely gone.
                if let Ok(Ok(exit)) = tokio::time::timeout_at(deadline, child.wait()).await {
                    return (url, Some(exit));
                }
                break;
            }
            Err(_) => break,
        }
    }

    let exit = child.try_exit().unwrap_or_else(|e| {
        debug!("Tunnel exit check failed: {}", e);
        None
    });
    (url, exit)
}

/// First `http://` or `https://` URL in a line of output.
pub fn extract_url(line: &str) -> Option<String> {
    let start = ["https://", "http://"]
        .iter()
        .filter_map(|scheme| line.find(scheme))
        .min()?;

    let url: String = line[start..]
        .chars()
        .take_while(|c| !c.is_whitespace())
        .collect();
    let url = url.trim_end_matches(['.', ',', ')', '"', '\'']);
    Some(url.to_string())
}
