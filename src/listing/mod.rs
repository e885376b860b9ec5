//! Directory listings for the file browser.
//!
//! Listings are built from live stat calls on every request; nothing is
//! cached. Two renderings exist:
//! - HTML, for plain browsing of a directory URL
//! - JSON, for the `/api/list` endpoint used by the browser-side explorer
//!
//! # JSON Schema
//!
//! ```json
//! {"files":[{"name":"sub","path":"/a/sub/","type":"directory","size":null,"modified":"2026-01-07T14:32:01+00:00"},
//!           {"name":"f.txt","path":"/a/f.txt","type":"file","size":5,"modified":"2026-01-07T14:32:01+00:00"}],
//!  "path":"/a"}
//! ```

mod entry;
mod error;
mod html;
mod service;

pub use entry::{DirectoryEntry, EntryKind, compare_entries, sort_entries};
pub use error::ListingError;
pub use html::escape_html;
pub use service::{INDEX_FILE, ListingPayload, ListingService};
