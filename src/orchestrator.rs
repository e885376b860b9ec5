//! Server orchestration and lifecycle management.
//!
//! This module wires configuration into the gateway and the tunnel
//! supervisor, waits for a termination signal, and tears everything down
//! exactly once.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::gateway::{GatewayConfig, GatewayError, GatewayServer, Router};
use crate::listing::INDEX_FILE;
use crate::sandbox::ServedRoot;
use crate::tunnel::{ProcessLauncher, SystemLauncher, TunnelSettings, TunnelState, TunnelSupervisor};

/// Interval between tunnel liveness probes.
const LIVENESS_INTERVAL: Duration = Duration::from_secs(1);

/// How long shutdown waits for the accept loop to exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Everything needed to run the server, resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeOptions {
    /// Directory to serve.
    pub root: PathBuf,
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Requested tunnel subdomain.
    pub subdomain: Option<String>,
    /// Whether to start the public tunnel.
    pub enable_tunnel: bool,
    /// Tunnel client settings.
    pub tunnel: TunnelSettings,
}

impl ServeOptions {
    /// Resolve options from merged configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: config.server.root().to_path_buf(),
            host: config.server.host().to_string(),
            port: config.server.port(),
            subdomain: config.tunnel.subdomain.clone(),
            enable_tunnel: config.tunnel.enabled(),
            tunnel: config.tunnel.settings(),
        }
    }
}

/// Run the server until interrupted, using real processes for the tunnel.
pub fn run(options: ServeOptions) -> Result<()> {
    run_with_launcher(options, SystemLauncher::new())
}

/// Run the server until interrupted with the given process launcher.
pub fn run_with_launcher<L: ProcessLauncher>(options: ServeOptions, launcher: L) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    rt.block_on(async move {
        let server = RunningServer::<L>::start(&options).await?;
        server.log_banner();

        let mut signals = ShutdownSignals::new()?;

        if options.enable_tunnel {
            // Installing can take minutes; a signal must still get through.
            tokio::select! {
                _ = server.start_tunnel(launcher, &options) => {}
                signal = signals.recv() => {
                    info!("Received {}, shutting down", signal);
                    server.shutdown().await;
                    return Ok(());
                }
            }
        }

        info!("Server is running. Press Ctrl+C to stop.");

        let mut liveness = tokio::time::interval(LIVENESS_INTERVAL);
        loop {
            tokio::select! {
                signal = signals.recv() => {
                    info!("Received {}, shutting down", signal);
                    break;
                }
                _ = liveness.tick() => {
                    server.check_tunnel().await;
                }
            }
        }

        server.shutdown().await;
        info!("Server stopped");
        Ok::<_, anyhow::Error>(())
    })
}

/// Process-wide state of a started server.
///
/// Created by [`RunningServer::start`] and torn down exactly once by
/// [`RunningServer::shutdown`], however many times or from however many
/// tasks it is called.
pub struct RunningServer<L: ProcessLauncher> {
    root: Arc<ServedRoot>,
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    gateway: Mutex<Option<JoinHandle<Result<(), GatewayError>>>>,
    tunnel: Mutex<Option<TunnelSupervisor<L>>>,
    stopped: AtomicBool,
}

impl<L: ProcessLauncher> RunningServer<L> {
    /// Validate the root, bind the gateway and start accepting connections.
    ///
    /// # Errors
    ///
    /// Fails before binding if the root is not an existing directory, and
    /// fails if the address cannot be bound.
    pub async fn start(options: &ServeOptions) -> Result<Self> {
        let root = ServedRoot::new(&options.root)
            .with_context(|| format!("Cannot serve {:?}", options.root))?;
        let root = Arc::new(root);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let router = Arc::new(Router::new(root.clone()));
        let config = GatewayConfig {
            host: options.host.clone(),
            port: options.port,
        };

        let server = GatewayServer::bind(&config, router, shutdown_rx)
            .await
            .context("Failed to start HTTP server")?;
        let local_addr = server.local_addr()?;
        let gateway = tokio::spawn(server.run());

        Ok(Self {
            root,
            local_addr,
            shutdown_tx,
            gateway: Mutex::new(Some(gateway)),
            tunnel: Mutex::new(None),
            stopped: AtomicBool::new(false),
        })
    }

    /// Address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Served root.
    pub fn root(&self) -> &ServedRoot {
        &self.root
    }

    /// Browsable local URL; wildcard binds are shown as `localhost`.
    pub fn local_url(&self) -> String {
        let ip = self.local_addr.ip();
        let host = if ip.is_unspecified() {
            "localhost".to_string()
        } else if ip.is_ipv6() {
            format!("[{}]", ip)
        } else {
            ip.to_string()
        };
        format!("http://{}:{}/", host, self.local_addr.port())
    }

    /// Landing page URL, if the root has an `index.html`.
    pub fn landing_page(&self) -> Option<String> {
        self.root
            .path()
            .join(INDEX_FILE)
            .is_file()
            .then(|| format!("{}{}", self.local_url(), INDEX_FILE))
    }

    /// Log the startup banner.
    pub fn log_banner(&self) {
        info!("Serving directory: {}", self.root.path().display());
        info!("Local URL: {}", self.local_url());
        if let Some(landing) = self.landing_page() {
            info!("Landing page: {}", landing);
        }
    }

    /// Install and start the tunnel client for the bound port.
    ///
    /// Failures are logged and absorbed; local serving is unaffected.
    /// Returns the public URL if one was announced.
    pub async fn start_tunnel(&self, launcher: L, options: &ServeOptions) -> Option<String> {
        let mut supervisor = TunnelSupervisor::new(launcher, options.tunnel.clone());
        let port = self.local_addr.port();

        let url = match supervisor.ensure_available().await {
            Ok(_) => match supervisor.start(port, options.subdomain.as_deref()).await {
                Ok(url) => url,
                Err(e) => {
                    warn!("Could not start tunnel: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("Could not install tunnel client: {}", e);
                None
            }
        };

        if supervisor.state() == TunnelState::Failed {
            warn!("Server is still running locally at {}", self.local_url());
        }

        *self.tunnel.lock().await = Some(supervisor);
        url
    }

    /// Probe tunnel liveness. `None` if no tunnel was started.
    pub async fn check_tunnel(&self) -> Option<TunnelState> {
        self.tunnel.lock().await.as_mut().map(|tunnel| tunnel.check())
    }

    /// Current tunnel state. `None` if no tunnel was started.
    pub async fn tunnel_state(&self) -> Option<TunnelState> {
        self.tunnel.lock().await.as_ref().map(|tunnel| tunnel.state())
    }

    /// Whether shutdown has run.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Stop accepting connections and stop the tunnel. Runs once.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already performed");
            return;
        }

        let _ = self.shutdown_tx.send(true);

        let gateway = self.gateway.lock().await.take();
        if let Some(handle) = gateway {
            match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
                Ok(Ok(Ok(()))) => debug!("Gateway stopped"),
                Ok(Ok(Err(e))) => warn!("Gateway stopped with error: {}", e),
                Ok(Err(e)) => warn!("Gateway task failed: {}", e),
                Err(_) => warn!("Gateway did not stop within {:?}", SHUTDOWN_GRACE),
            }
        }

        if let Some(tunnel) = self.tunnel.lock().await.as_mut() {
            tunnel.stop().await;
        }
    }
}

/// Interrupt and termination signals.
///
/// The streams are registered once, so a signal that arrives while the wait
/// loop is busy is still delivered on the next `recv`.
struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(windows)]
    interrupt: tokio::signal::windows::CtrlC,
}

impl ShutdownSignals {
    fn new() -> Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let interrupt =
                signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
            let terminate =
                signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
            Ok(Self {
                interrupt,
                terminate,
            })
        }
        #[cfg(windows)]
        {
            let interrupt =
                tokio::signal::windows::ctrl_c().context("Failed to install Ctrl+C handler")?;
            Ok(Self { interrupt })
        }
    }

    /// Wait for the next signal and name it.
    async fn recv(&mut self) -> &'static str {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.interrupt.recv() => "interrupt",
                _ = self.terminate.recv() => "SIGTERM",
            }
        }
        #[cfg(windows)]
        {
            self.interrupt.recv().await;
            "interrupt"
        }
    }
}
