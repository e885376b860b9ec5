//! HTTP gateway: listener, routing and response construction.
//!
//! # Architecture
//!
//! ```text
//! TcpListener ──accept──▶ per-connection task (hyper http1)
//!                              │
//!                              ▼
//!                         Router::handle
//!                        ┌─────┴──────────────┐
//!                        ▼                    ▼
//!                 /api/list?path=      everything else
//!                 PathSandbox          PathSandbox
//!                 ListingService       ├─ directory ─▶ 301 / index.html / HTML listing
//!                 (JSON + CORS)        └─ file ──────▶ StaticFileHandler
//! ```
//!
//! Only `GET` is served. Every request path goes through the sandbox before
//! touching the filesystem, and a rejected path answers exactly like a
//! missing one.

mod error;
pub mod response;
mod router;
mod server;

pub use error::GatewayError;
pub use response::ResponseBody;
pub use router::{Route, Router};
pub use server::{GatewayConfig, GatewayServer};
