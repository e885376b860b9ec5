//! Directory entry model and ordering.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::cmp::Ordering;
use std::fs::Metadata;
use std::time::UNIX_EPOCH;

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A directory (or a symlink to one).
    Directory,
    /// Anything that is not a directory.
    File,
}

/// One child of a listed directory.
///
/// Built fresh from a live stat call for every listing request. The serialized
/// field names are the schema the browser-side explorer consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectoryEntry {
    /// File name (lossily converted to UTF-8).
    pub name: String,
    /// URL path relative to the served root, always `/`-separated.
    /// Directory paths end with `/`.
    #[serde(rename = "path")]
    pub relative_url_path: String,
    /// Entry kind.
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Size in bytes; `None` for directories.
    #[serde(rename = "size")]
    pub size_bytes: Option<u64>,
    /// Last modification time.
    #[serde(rename = "modified")]
    pub modified_at: DateTime<Local>,
}

impl DirectoryEntry {
    /// Build an entry from stat metadata.
    ///
    /// `parent_url_dir` must end with `/`.
    pub fn from_metadata(name: String, parent_url_dir: &str, metadata: &Metadata) -> Self {
        let kind = if metadata.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        let relative_url_path = match kind {
            EntryKind::Directory => format!("{}{}/", parent_url_dir, name),
            EntryKind::File => format!("{}{}", parent_url_dir, name),
        };

        let size_bytes = match kind {
            EntryKind::Directory => None,
            EntryKind::File => Some(metadata.len()),
        };

        let modified_at = metadata.modified().unwrap_or(UNIX_EPOCH).into();

        Self {
            name,
            relative_url_path,
            kind,
            size_bytes,
            modified_at,
        }
    }

    /// Whether this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Listing order: directories before files, then case-insensitive name,
/// then exact name so the order is total.
pub fn compare_entries(a: &DirectoryEntry, b: &DirectoryEntry) -> Ordering {
    (!a.is_dir())
        .cmp(&!b.is_dir())
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

/// Sort entries in listing order.
pub fn sort_entries(entries: &mut [DirectoryEntry]) {
    entries.sort_by(compare_entries);
}
