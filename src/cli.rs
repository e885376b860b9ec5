//! Command-line interface definitions for dirshare.
//!
//! Uses clap's derive API for type-safe argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Share a directory over HTTP, optionally through a public tunnel.
///
/// dirshare serves files and directory listings from a single root directory,
/// offers a JSON listing API for browser-side explorers, and can expose the
/// server publicly through localtunnel.
#[derive(Parser, Debug)]
#[command(name = "dirshare")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run (or omit to start the server).
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory to serve (default: current directory).
    #[arg(short = 'd', long = "directory", value_name = "DIR", global = true)]
    pub directory: Option<PathBuf>,

    /// Interface to bind (default: 0.0.0.0).
    #[arg(short = 'H', long = "host", value_name = "HOST")]
    pub host: Option<String>,

    /// Port to listen on (default: 8083).
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// Requested public tunnel subdomain.
    #[arg(short = 's', long = "subdomain", value_name = "NAME")]
    pub subdomain: Option<String>,

    /// Serve locally only; do not start a public tunnel.
    #[arg(long = "no-tunnel")]
    pub no_tunnel: bool,

    /// Path to additional config file.
    ///
    /// This config file is merged on top of system and user configs,
    /// giving it the highest priority (except for CLI flags).
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity.
    ///
    /// Can be specified multiple times:
    /// -v    = debug level
    /// -vv   = trace level
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Subcommands for dirshare.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the recursive listing of the served directory as JSON.
    Tree {
        /// Path inside the served directory (default: `/`).
        path: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_defaults() {
        let cli = Cli::parse_from(["dirshare"]);
        assert!(cli.command.is_none());
        assert!(cli.directory.is_none());
        assert!(cli.port.is_none());
        assert!(!cli.no_tunnel);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_parse_with_options() {
        let cli = Cli::parse_from([
            "dirshare",
            "-d",
            "/srv/share",
            "-H",
            "127.0.0.1",
            "-p",
            "9000",
            "-s",
            "myshare",
            "--no-tunnel",
            "-vv",
        ]);

        assert_eq!(cli.directory, Some(PathBuf::from("/srv/share")));
        assert_eq!(cli.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.subdomain.as_deref(), Some("myshare"));
        assert!(cli.no_tunnel);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(Cli::try_parse_from(["dirshare", "-p", "70000"]).is_err());
        assert!(Cli::try_parse_from(["dirshare", "-p", "http"]).is_err());
    }

    #[test]
    fn test_tree_command() {
        let cli = Cli::parse_from(["dirshare", "tree", "/docs", "-d", "/srv"]);
        assert_eq!(cli.directory, Some(PathBuf::from("/srv")));
        match cli.command {
            Some(Commands::Tree { path }) => assert_eq!(path.as_deref(), Some("/docs")),
            _ => panic!("Expected Tree command"),
        }

        let cli = Cli::parse_from(["dirshare", "tree"]);
        assert!(matches!(cli.command, Some(Commands::Tree { path: None })));
    }
}
