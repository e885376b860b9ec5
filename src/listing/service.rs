//! Directory enumeration.
//!
//! Listing is one level deep and skips entries that fail to stat (permission
//! errors, files deleted mid-listing). Partial results are valid. Symlinks
//! whose target lies outside the served root are skipped as well, so their
//! targets' metadata never reaches a listing.
//!
//! Recursive enumeration ([`ListingService::walk`]) is a separate, opt-in
//! operation used by the `tree` command, never by the HTTP listing path.

use super::entry::{DirectoryEntry, compare_entries};
use super::error::ListingError;
use super::html;
use crate::sandbox::{ConfinedPath, PathSandbox, ServedRoot, encode_url_path};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Name of the implicit index file.
pub const INDEX_FILE: &str = "index.html";

/// Payload of the JSON listing API.
#[derive(Debug, Serialize)]
pub struct ListingPayload<'a> {
    /// Directory entries in listing order.
    pub files: &'a [DirectoryEntry],
    /// The path the client asked for.
    pub path: &'a str,
}

/// Produces directory listings for confined directories.
#[derive(Debug, Clone)]
pub struct ListingService {
    root: Arc<ServedRoot>,
}

impl ListingService {
    /// Create a listing service for `root`.
    pub fn new(root: Arc<ServedRoot>) -> Self {
        Self { root }
    }

    /// List one level of a confined directory.
    ///
    /// # Errors
    ///
    /// Returns `ListingError::ReadDir` if the directory itself cannot be read.
    pub fn list(&self, dir: &ConfinedPath) -> Result<Vec<DirectoryEntry>, ListingError> {
        let entries = read_entries(&self.root, dir.fs_path(), &dir.url_dir())?;
        Ok(entries.into_iter().map(|(_, entry)| entry).collect())
    }

    /// Recursively list a confined directory, depth first.
    ///
    /// Each directory entry is followed by its own children. Symlinked
    /// directories are listed but not descended into, and unreadable
    /// subdirectories are skipped.
    pub fn walk(&self, dir: &ConfinedPath) -> Result<Vec<DirectoryEntry>, ListingError> {
        let mut out = Vec::new();
        walk_into(&self.root, dir.fs_path(), &dir.url_dir(), &mut out)?;
        Ok(out)
    }

    /// The directory's `index.html`, if present as a file.
    ///
    /// The index is resolved through the sandbox like any other request
    /// path, so a symlinked `index.html` cannot point outside the root.
    pub fn index_file(&self, sandbox: &PathSandbox, dir: &ConfinedPath) -> Option<ConfinedPath> {
        let index_url = encode_url_path(&format!("{}{}", dir.url_dir(), INDEX_FILE));
        sandbox
            .resolve(&index_url)
            .ok()
            .filter(|index| index.fs_path().is_file())
    }

    /// Render entries as an HTML listing page.
    pub fn render_html(&self, dir: &ConfinedPath, entries: &[DirectoryEntry]) -> String {
        html::render(dir, entries)
    }

    /// Render entries as the JSON API payload.
    pub fn render_json(
        &self,
        requested_path: &str,
        entries: &[DirectoryEntry],
    ) -> Result<Vec<u8>, ListingError> {
        let payload = ListingPayload {
            files: entries,
            path: requested_path,
        };
        Ok(serde_json::to_vec(&payload)?)
    }
}

/// Read and stat the children of `fs_dir`, sorted in listing order.
fn read_entries(
    root: &ServedRoot,
    fs_dir: &Path,
    url_dir: &str,
) -> Result<Vec<(PathBuf, DirectoryEntry)>, ListingError> {
    let read_dir = fs::read_dir(fs_dir).map_err(ListingError::ReadDir)?;
    let mut entries = Vec::new();

    for item in read_dir {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                debug!("Skipping unreadable directory entry: {}", e);
                continue;
            }
        };

        let name = item.file_name().to_string_lossy().into_owned();
        let path = item.path();

        let is_link = match item.file_type() {
            Ok(file_type) => file_type.is_symlink(),
            Err(e) => {
                debug!("Skipping entry {:?}: {}", name, e);
                continue;
            }
        };
        if is_link && !link_stays_inside(root, &path) {
            debug!("Skipping entry {:?}: link target outside the served root", name);
            continue;
        }

        // Follows symlinks, so a link to a directory lists as a directory.
        match fs::metadata(&path) {
            Ok(metadata) => {
                let entry = DirectoryEntry::from_metadata(name, url_dir, &metadata);
                entries.push((path, entry));
            }
            Err(e) => {
                debug!("Skipping entry {:?}: {}", name, e);
            }
        }
    }

    entries.sort_by(|(_, a), (_, b)| compare_entries(a, b));
    trace!("Listed {} entries under {}", entries.len(), url_dir);
    Ok(entries)
}

fn walk_into(
    root: &ServedRoot,
    fs_dir: &Path,
    url_dir: &str,
    out: &mut Vec<DirectoryEntry>,
) -> Result<(), ListingError> {
    for (path, entry) in read_entries(root, fs_dir, url_dir)? {
        let descend = entry.is_dir() && !is_symlink(&path);
        let child_url_dir = entry.relative_url_path.clone();
        out.push(entry);

        if descend && let Err(e) = walk_into(root, &path, &child_url_dir, out) {
            debug!("Skipping subtree {}: {}", child_url_dir, e);
        }
    }
    Ok(())
}

/// Whether a symlink resolves to the root or one of its descendants.
/// Dangling links do not.
fn link_stays_inside(root: &ServedRoot, link: &Path) -> bool {
    fs::canonicalize(link)
        .map(|target| root.contains(&target))
        .unwrap_or(false)
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}
