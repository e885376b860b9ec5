//! HTML rendering of directory listings.

use super::entry::DirectoryEntry;
use crate::sandbox::{ConfinedPath, encode_segment, encode_url_path};
use std::fmt::Write;

/// Render a directory listing page.
///
/// Names are HTML-escaped, link targets percent-encoded. A parent link is
/// included unless `dir` is the served root.
pub fn render(dir: &ConfinedPath, entries: &[DirectoryEntry]) -> String {
    let title = escape_html(&dir.url_dir());
    let mut html = String::with_capacity(512 + entries.len() * 96);

    html.push_str("<!DOCTYPE html>\n<html><head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>Directory listing for {}</title></head>", title);
    html.push_str("<body>\n");
    let _ = writeln!(html, "<h1>Directory listing for {}</h1><hr><ul>", title);

    if !dir.is_root() {
        let _ = writeln!(
            html,
            "<li><a href=\"{}\">..</a></li>",
            escape_html(&encode_url_path(&parent_url(dir.url_path())))
        );
    }

    for entry in entries {
        let suffix = if entry.is_dir() { "/" } else { "" };
        let _ = writeln!(
            html,
            "<li><a href=\"{}{}\">{}{}</a></li>",
            escape_html(&encode_segment(&entry.name)),
            suffix,
            escape_html(&entry.name),
            suffix
        );
    }

    html.push_str("</ul><hr></body></html>\n");
    html
}

/// URL of the parent directory, with a trailing slash.
fn parent_url(url_path: &str) -> String {
    let trimmed = url_path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => format!("{}/", &trimmed[..idx]),
    }
}

/// Escape text for embedding in HTML content or a quoted attribute.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
