//! HTTP gateway server.
//!
//! Binding is a separate step from serving so that callers can learn the
//! actual local address (port 0 in tests) and report bind failures before
//! anything else starts.
//!
//! # Example
//!
//! ```ignore
//! use dirshare::gateway::{GatewayConfig, GatewayServer, Router};
//! use dirshare::sandbox::ServedRoot;
//! use std::sync::Arc;
//!
//! let root = Arc::new(ServedRoot::new(".")?);
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let config = GatewayConfig { host: "127.0.0.1".into(), port: 0 };
//! let server = GatewayServer::bind(&config, Arc::new(Router::new(root)), shutdown_rx).await?;
//! println!("listening on {}", server.local_addr()?);
//! tokio::spawn(server.run());
//!
//! // To shutdown:
//! shutdown_tx.send(true)?;
//! ```

use super::error::GatewayError;
use super::response::ResponseBody;
use super::router::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Listening configuration for the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Interface to bind (name or address).
    pub host: String,
    /// TCP port; 0 picks a free port.
    pub port: u16,
}

impl GatewayConfig {
    /// `host:port` as used in logs and errors.
    pub fn display_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A bound, not yet serving, HTTP gateway.
pub struct GatewayServer {
    listener: TcpListener,
    router: Arc<Router>,
    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Bind` if the address is in use, not permitted,
    /// or does not resolve.
    pub async fn bind(
        config: &GatewayConfig,
        router: Arc<Router>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self, GatewayError> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|source| GatewayError::Bind {
                addr: config.display_addr(),
                source,
            })?;

        Ok(Self {
            listener,
            router,
            shutdown_rx,
        })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr, GatewayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve connections until shutdown is signalled.
    ///
    /// Connections already in flight finish on their own tasks.
    pub async fn run(self) -> Result<(), GatewayError> {
        info!("Gateway listening on {}", self.local_addr()?);

        let mut shutdown_rx = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            debug!("Accepted connection from {}", peer);
                            self.spawn_connection_handler(stream, peer);
                        }
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Gateway shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Spawn a task to handle a single connection.
    fn spawn_connection_handler(&self, stream: TcpStream, peer: SocketAddr) {
        let router = self.router.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, router).await {
                if e.is_disconnect() {
                    debug!("Connection from {} ended: {}", peer, e);
                } else {
                    warn!("Connection error from {}: {}", peer, e);
                }
            }
        });
    }
}

/// Serve HTTP/1.1 on one connection.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Arc<Router>,
) -> Result<(), GatewayError> {
    let io = TokioIo::new(stream);

    let service = service_fn(move |req: Request<Incoming>| {
        let router = router.clone();
        async move { Ok::<_, Infallible>(serve_request(req, peer, &router).await) }
    });

    http1::Builder::new()
        .serve_connection(io, service)
        .await
        .map_err(GatewayError::from)
}

/// Route one request and write the access log line.
async fn serve_request(
    req: Request<Incoming>,
    peer: SocketAddr,
    router: &Router,
) -> Response<ResponseBody> {
    let resp = router.handle(&req).await;
    info!(
        "{} \"{} {}\" {}",
        peer.ip(),
        req.method(),
        req.uri(),
        resp.status().as_u16()
    );
    resp
}
