//! Configuration schema definitions.
//!
//! Every field is optional in a file so that layers only override what they
//! set. Accessors apply the built-in defaults.
//!
//! ```toml
//! [server]
//! root = "/srv/share"
//! host = "127.0.0.1"
//! port = 8083
//!
//! [tunnel]
//! enabled = true
//! subdomain = "myshare"
//! ```

use super::error::ConfigError;
use crate::tunnel::TunnelSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default served directory.
pub const DEFAULT_ROOT: &str = ".";

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 8083;

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Public tunnel settings.
    #[serde(default)]
    pub tunnel: TunnelConfig,
}

impl Config {
    /// Merge another config into this one. Values set in `other` win.
    pub fn merge(&mut self, other: Config) {
        self.server.merge(other.server);
        self.tunnel.merge(other.tunnel);
    }

    /// Check values that cannot be expressed in the type.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(subdomain) = &self.tunnel.subdomain {
            validate_subdomain(subdomain)?;
        }
        if self.tunnel.binary.as_deref() == Some("") {
            return Err(ConfigError::InvalidValue {
                field: "tunnel.binary".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.tunnel.announce_window_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "tunnel.announce_window_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Directory to serve.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Interface to bind.
    #[serde(default)]
    pub host: Option<String>,

    /// Port to bind.
    #[serde(default)]
    pub port: Option<u16>,
}

impl ServerConfig {
    fn merge(&mut self, other: ServerConfig) {
        if other.root.is_some() {
            self.root = other.root;
        }
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
    }

    /// Served directory, defaulting to the working directory.
    pub fn root(&self) -> &Path {
        self.root.as_deref().unwrap_or(Path::new(DEFAULT_ROOT))
    }

    /// Bind host, defaulting to all interfaces.
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// Bind port.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Public tunnel settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TunnelConfig {
    /// Whether to start a tunnel at all.
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Requested public subdomain.
    #[serde(default)]
    pub subdomain: Option<String>,

    /// Tunnel client executable.
    #[serde(default)]
    pub binary: Option<String>,

    /// npm package that provides the client.
    #[serde(default)]
    pub package: Option<String>,

    /// Seconds to wait for the public URL.
    #[serde(default)]
    pub announce_window_secs: Option<u64>,

    /// Timeout per Node.js install step, in seconds.
    #[serde(default)]
    pub runtime_install_timeout_secs: Option<u64>,

    /// Timeout for the client npm install, in seconds.
    #[serde(default)]
    pub client_install_timeout_secs: Option<u64>,
}

impl TunnelConfig {
    fn merge(&mut self, other: TunnelConfig) {
        if other.enabled.is_some() {
            self.enabled = other.enabled;
        }
        if other.subdomain.is_some() {
            self.subdomain = other.subdomain;
        }
        if other.binary.is_some() {
            self.binary = other.binary;
        }
        if other.package.is_some() {
            self.package = other.package;
        }
        if other.announce_window_secs.is_some() {
            self.announce_window_secs = other.announce_window_secs;
        }
        if other.runtime_install_timeout_secs.is_some() {
            self.runtime_install_timeout_secs = other.runtime_install_timeout_secs;
        }
        if other.client_install_timeout_secs.is_some() {
            self.client_install_timeout_secs = other.client_install_timeout_secs;
        }
    }

    /// Whether the tunnel is enabled (default: yes).
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Supervisor settings with defaults applied.
    pub fn settings(&self) -> TunnelSettings {
        let defaults = TunnelSettings::default();
        TunnelSettings {
            binary: self.binary.clone().unwrap_or(defaults.binary),
            package: self.package.clone().unwrap_or(defaults.package),
            announce_window: self
                .announce_window_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.announce_window),
            runtime_install_timeout: self
                .runtime_install_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.runtime_install_timeout),
            client_install_timeout: self
                .client_install_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.client_install_timeout),
            stop_grace: defaults.stop_grace,
        }
    }
}

/// Check a tunnel subdomain: 4 to 63 lowercase letters, digits or hyphens,
/// not starting or ending with a hyphen.
pub fn validate_subdomain(subdomain: &str) -> Result<(), ConfigError> {
    let invalid = |message: &str| ConfigError::InvalidValue {
        field: "tunnel.subdomain".to_string(),
        message: format!("'{}' {}", subdomain, message),
    };

    if !(4..=63).contains(&subdomain.len()) {
        return Err(invalid("must be 4 to 63 characters long"));
    }
    if !subdomain
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(invalid("may only contain lowercase letters, digits and hyphens"));
    }
    if subdomain.starts_with('-') || subdomain.ends_with('-') {
        return Err(invalid("must not start or end with a hyphen"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.root(), Path::new("."));
        assert_eq!(config.server.host(), "0.0.0.0");
        assert_eq!(config.server.port(), 8083);
        assert!(config.tunnel.enabled());
        assert_eq!(config.tunnel.settings(), TunnelSettings::default());
    }

    #[test]
    fn test_merge_overrides_only_set_values() {
        let mut base: Config = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000
            "#,
        )
        .unwrap();
        let layer: Config = toml::from_str(
            r#"
            [server]
            port = 9100

            [tunnel]
            enabled = false
            "#,
        )
        .unwrap();

        base.merge(layer);
        assert_eq!(base.server.host(), "127.0.0.1");
        assert_eq!(base.server.port(), 9100);
        assert!(!base.tunnel.enabled());
    }

    #[test]
    fn test_tunnel_settings_from_config() {
        let config: Config = toml::from_str(
            r#"
            [tunnel]
            binary = "/opt/lt"
            announce_window_secs = 5
            client_install_timeout_secs = 30
            "#,
        )
        .unwrap();

        let settings = config.tunnel.settings();
        assert_eq!(settings.binary, "/opt/lt");
        assert_eq!(settings.package, "localtunnel");
        assert_eq!(settings.announce_window, Duration::from_secs(5));
        assert_eq!(settings.client_install_timeout, Duration::from_secs(30));
        assert_eq!(settings.runtime_install_timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_validate_subdomain() {
        assert!(validate_subdomain("myshare").is_ok());
        assert!(validate_subdomain("my-share-2").is_ok());

        assert!(validate_subdomain("abc").is_err());
        assert!(validate_subdomain(&"a".repeat(64)).is_err());
        assert!(validate_subdomain("MyShare").is_err());
        assert!(validate_subdomain("my_share").is_err());
        assert!(validate_subdomain("-share").is_err());
        assert!(validate_subdomain("share-").is_err());
        assert!(validate_subdomain("my.share").is_err());
    }

    #[test]
    fn test_validate_config() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.tunnel.subdomain = Some("Bad Name".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));

        config.tunnel.subdomain = None;
        config.tunnel.announce_window_secs = Some(0);
        assert!(config.validate().is_err());
    }
}
