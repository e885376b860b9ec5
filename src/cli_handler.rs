//! Subcommand handling for dirshare.
//!
//! Subcommands are one-shot and run without the HTTP server.

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::cli::Commands;
use crate::config::Config;
use crate::listing::{ListingPayload, ListingService};
use crate::sandbox::{PathSandbox, ServedRoot, encode_url_path};

/// Handle a subcommand.
pub fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Tree { path } => {
            let json = tree_json(config.server.root(), path.as_deref().unwrap_or("/"))?;
            println!("{}", json);
            Ok(())
        }
    }
}

/// Recursive listing of `path` inside `root`, as pretty-printed JSON.
///
/// `path` is a plain (not percent-encoded) path relative to the root and
/// goes through the same sandbox as HTTP requests.
pub fn tree_json(root: &Path, path: &str) -> Result<String> {
    let root = ServedRoot::new(root).with_context(|| format!("Cannot list {:?}", root))?;
    let root = Arc::new(root);
    let sandbox = PathSandbox::new(root.clone());

    let requested = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    let dir = match sandbox.resolve(&encode_url_path(&requested)) {
        Ok(dir) if dir.fs_path().is_dir() => dir,
        _ => bail!("Path is not a directory: {}", requested),
    };
    debug!("Walking {:?}", dir.fs_path());

    let entries = ListingService::new(root)
        .walk(&dir)
        .with_context(|| format!("Failed to list {}", requested))?;

    let payload = ListingPayload {
        files: &entries,
        path: &requested,
    };
    serde_json::to_string_pretty(&payload).context("Failed to serialize listing")
}
