//! Configuration loading with hierarchy merging.
//!
//! Configuration is loaded from multiple sources and merged in order:
//!
//! 1. Built-in defaults
//! 2. System config: `/etc/dirshare/config.toml`
//! 3. User config: `~/.config/dirshare/config.toml`
//! 4. Additional config file (via `--config` flag)
//! 5. CLI flags (highest priority)
//!
//! Scalars set in a later layer override earlier ones.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::ConfigError;
use super::schema::{Config, ServerConfig, TunnelConfig};
use crate::cli::Cli;

/// System-wide configuration path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/dirshare/config.toml";

/// User configuration directory name.
pub const USER_CONFIG_DIR: &str = "dirshare";

/// User configuration filename.
pub const USER_CONFIG_FILE: &str = "config.toml";

/// Configuration loader with support for hierarchy merging.
pub struct ConfigLoader {
    /// Path to system-wide configuration.
    system_path: PathBuf,
    /// Path to user configuration.
    user_path: PathBuf,
}

impl ConfigLoader {
    /// Create a new ConfigLoader with default paths.
    #[must_use]
    pub fn new() -> Self {
        let user_config_dir = dirs::config_dir()
            .map(|p| p.join(USER_CONFIG_DIR))
            .unwrap_or_else(|| PathBuf::from(".config").join(USER_CONFIG_DIR));

        Self {
            system_path: PathBuf::from(SYSTEM_CONFIG_PATH),
            user_path: user_config_dir.join(USER_CONFIG_FILE),
        }
    }

    /// Create a ConfigLoader with custom paths (for testing).
    #[must_use]
    pub fn with_paths(system_path: PathBuf, user_path: PathBuf) -> Self {
        Self {
            system_path,
            user_path,
        }
    }

    /// Load and merge configuration from all sources, then validate it.
    ///
    /// Missing system and user files are skipped. A missing `--config` file
    /// and invalid TOML are errors.
    pub fn load(&self, cli: &Cli) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        if let Some(system_config) = self.load_file(&self.system_path)? {
            config.merge(system_config);
            debug!("Loaded system config from {:?}", self.system_path);
        } else {
            debug!("No system config found at {:?}", self.system_path);
        }

        if let Some(user_config) = self.load_file(&self.user_path)? {
            config.merge(user_config);
            debug!("Loaded user config from {:?}", self.user_path);
        } else {
            debug!("No user config found at {:?}", self.user_path);
        }

        if let Some(ref cli_config_path) = cli.config {
            match self.load_file(cli_config_path)? {
                Some(cli_config) => {
                    config.merge(cli_config);
                    debug!("Loaded additional config from {:?}", cli_config_path);
                }
                None => {
                    // Unlike system/user config, a missing CLI-specified config is an error
                    return Err(ConfigError::ReadError {
                        path: cli_config_path.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "Specified config file not found",
                        ),
                    });
                }
            }
        }

        config.merge(cli_overrides(cli));
        config.validate()?;

        Ok(config)
    }

    /// Load a config file, returning None if it doesn't exist.
    fn load_file(&self, path: &Path) -> Result<Option<Config>, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: Config =
                    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                        path: path.to_path_buf(),
                        source: e,
                    })?;
                Ok(Some(config))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// The config layer expressed by CLI flags.
fn cli_overrides(cli: &Cli) -> Config {
    Config {
        server: ServerConfig {
            root: cli.directory.clone(),
            host: cli.host.clone(),
            port: cli.port,
        },
        tunnel: TunnelConfig {
            enabled: cli.no_tunnel.then_some(false),
            subdomain: cli.subdomain.clone(),
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::tempdir;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("dirshare").chain(args.iter().copied()))
    }

    fn loader_in(dir: &Path) -> ConfigLoader {
        ConfigLoader::with_paths(dir.join("system.toml"), dir.join("user.toml"))
    }

    #[test]
    fn test_missing_files_use_defaults() {
        let dir = tempdir().unwrap();
        let config = loader_in(dir.path()).load(&cli(&[])).unwrap();

        assert_eq!(config.server.port(), 8083);
        assert_eq!(config.server.host(), "0.0.0.0");
        assert!(config.tunnel.enabled());
    }

    #[test]
    fn test_user_config_overrides_system() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("system.toml"),
            "[server]\nport = 9000\nhost = \"127.0.0.1\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("user.toml"), "[server]\nport = 9100\n").unwrap();

        let config = loader_in(dir.path()).load(&cli(&[])).unwrap();
        assert_eq!(config.server.port(), 9100);
        assert_eq!(config.server.host(), "127.0.0.1");
    }

    #[test]
    fn test_cli_flags_override_files() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("user.toml"),
            "[server]\nport = 9100\n\n[tunnel]\nsubdomain = \"fromfile\"\n",
        )
        .unwrap();

        let config = loader_in(dir.path())
            .load(&cli(&["-p", "9200", "-s", "fromcli", "--no-tunnel", "-d", "/srv"]))
            .unwrap();
        assert_eq!(config.server.port(), 9200);
        assert_eq!(config.server.root(), Path::new("/srv"));
        assert_eq!(config.tunnel.subdomain.as_deref(), Some("fromcli"));
        assert!(!config.tunnel.enabled());
    }

    #[test]
    fn test_extra_config_file() {
        let dir = tempdir().unwrap();
        let extra = dir.path().join("extra.toml");
        fs::write(&extra, "[tunnel]\nbinary = \"/opt/lt\"\n").unwrap();

        let config = loader_in(dir.path())
            .load(&cli(&["-c", extra.to_str().unwrap()]))
            .unwrap();
        assert_eq!(config.tunnel.settings().binary, "/opt/lt");
    }

    #[test]
    fn test_missing_extra_config_is_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.toml");

        let err = loader_in(dir.path())
            .load(&cli(&["--config", missing.to_str().unwrap()]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("system.toml"), "this is not valid TOML [[[").unwrap();

        let err = loader_in(dir.path()).load(&cli(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_invalid_subdomain_rejected() {
        let dir = tempdir().unwrap();
        let err = loader_in(dir.path())
            .load(&cli(&["-s", "Not_Valid"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
