//! dirshare: share a directory over HTTP
//!
//! This is the main entry point for the dirshare binary. It handles CLI
//! argument parsing, configuration loading and logging initialization, then
//! either runs a one-shot subcommand or starts the server.

use anyhow::{Context, Result};
use clap::Parser;
use dirshare::{
    cli::Cli,
    cli_handler,
    config::ConfigLoader,
    orchestrator::{self, ServeOptions},
};
use tracing::debug;

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;

    debug!("Parsed CLI arguments: {:?}", cli);

    let config = ConfigLoader::new()
        .load(&cli)
        .context("Failed to load configuration")?;

    debug!("Loaded configuration: {:?}", config);

    if let Some(command) = cli.command {
        return cli_handler::handle_command(command, &config);
    }

    orchestrator::run(ServeOptions::from_config(&config))
}

/// Initialize the tracing subscriber.
///
/// Logs go to stderr; stdout is reserved for subcommand output.
///
/// # Verbosity Levels
/// - 0 (default): `RUST_LOG` if set, otherwise info
/// - 1 (-v): Debug level
/// - 2+ (-vv): Trace level
fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
