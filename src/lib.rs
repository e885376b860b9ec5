//! dirshare: share a directory over HTTP
//!
//! This crate serves the contents of a single root directory to browsers:
//! static files, HTML directory listings and a JSON listing API for
//! browser-side explorers. The server can optionally be published through a
//! localtunnel client, which is installed on demand and supervised for the
//! lifetime of the process.
//!
//! # Security Model
//!
//! Request paths are untrusted. Every filesystem access goes through the
//! path sandbox, which confines requests to the served root, including
//! through symlinks. Requests that would escape are answered like a missing
//! file.
//!
//! # Architecture
//!
//! - **Sandbox**: Request path resolution and root confinement
//! - **Listing**: Directory enumeration with HTML and JSON renderings
//! - **Files**: Streaming static file responses
//! - **Gateway**: HTTP/1.1 server and routing
//! - **Tunnel**: Client installation and child process supervision
//! - **Config**: Hierarchical TOML configuration with CLI overrides

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod cli;
pub mod cli_handler;
pub mod config;
pub mod files;
pub mod gateway;
pub mod listing;
pub mod orchestrator;
pub mod sandbox;
pub mod tunnel;
