//! Configuration system for dirshare.
//!
//! This module provides TOML configuration loading with hierarchy merging.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded from multiple sources and merged in order:
//!
//! 1. System config: `/etc/dirshare/config.toml`
//! 2. User config: `~/.config/dirshare/config.toml`
//! 3. Additional config file (via `--config` flag)
//! 4. CLI flags (highest priority)
//!
//! No file is required; every setting has a built-in default.
//!
//! # Merge Behavior
//!
//! Every setting is a scalar. A value set in a later layer overrides the
//! earlier one; unset values fall through.

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::{ConfigLoader, SYSTEM_CONFIG_PATH};
pub use schema::{
    Config, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_ROOT, ServerConfig, TunnelConfig,
    validate_subdomain,
};
