//! Request path confinement.
//!
//! Maps untrusted URL paths onto the served root. The resolution flow:
//! 1. Strip the query string and fragment
//! 2. Percent-decode
//! 3. Split into segments, ignoring empty, `.` and `..` segments instead of applying them
//! 4. Join the surviving segments onto the root
//! 5. Canonicalize the nearest existing ancestor to resolve symlinks
//! 6. Verify the canonical path is the root or a descendant of it
//!
//! Textual normalization alone is not enough: a symlink inside the root can
//! point anywhere, so step 5 is what actually enforces the boundary.
//!
//! # Example
//!
//! ```ignore
//! use dirshare::sandbox::{PathSandbox, ServedRoot};
//! use std::sync::Arc;
//!
//! let root = Arc::new(ServedRoot::new("/srv/share")?);
//! let sandbox = PathSandbox::new(root);
//!
//! let confined = sandbox.resolve("/docs/../../etc/passwd")?;
//! assert_eq!(confined.fs_path(), Path::new("/srv/share/docs/etc/passwd"));
//! ```

use super::error::SandboxError;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Characters escaped when a name is placed in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\');

/// The single directory tree the server is authorized to expose.
///
/// Always absolute and canonical. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedRoot {
    path: PathBuf,
}

impl ServedRoot {
    /// Validate and canonicalize a served root.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::RootResolution` if the path does not exist or
    /// cannot be canonicalized, and `SandboxError::RootNotDirectory` if it is
    /// not a directory.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SandboxError> {
        let path = path.as_ref();
        let canonical = fs::canonicalize(path).map_err(|e| SandboxError::RootResolution {
            path: path.to_path_buf(),
            source: e,
        })?;

        if !canonical.is_dir() {
            return Err(SandboxError::RootNotDirectory(canonical));
        }

        debug!("Served root resolved to {:?}", canonical);
        Ok(Self { path: canonical })
    }

    /// The canonical root path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check whether `candidate` is the root or one of its descendants.
    pub fn contains(&self, candidate: &Path) -> bool {
        is_within(&self.path, candidate)
    }
}

/// Byte-prefix containment check with a separator boundary.
///
/// `candidate` is inside `root` only if it starts with `root` and the next
/// byte is a path separator or the end of the path, so `/srv/root_evil`
/// does not match `/srv/root`.
pub fn is_within(root: &Path, candidate: &Path) -> bool {
    let root = root.as_os_str().as_encoded_bytes();
    let candidate = candidate.as_os_str().as_encoded_bytes();

    let Some(rest) = candidate.strip_prefix(root) else {
        return false;
    };

    rest.is_empty()
        || is_separator_byte(rest[0])
        || root.last().is_some_and(|b| is_separator_byte(*b))
}

fn is_separator_byte(b: u8) -> bool {
    b.is_ascii() && std::path::is_separator(b as char)
}

/// A filesystem path proven to lie within the served root.
///
/// Only [`PathSandbox::resolve`] constructs these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfinedPath {
    fs_path: PathBuf,
    url_path: String,
    trailing_slash: bool,
}

impl ConfinedPath {
    /// Filesystem location of the confined path.
    pub fn fs_path(&self) -> &Path {
        &self.fs_path
    }

    /// Normalized, decoded URL path (always starts with `/`).
    pub fn url_path(&self) -> &str {
        &self.url_path
    }

    /// Whether the request carried a trailing slash.
    pub fn has_trailing_slash(&self) -> bool {
        self.trailing_slash
    }

    /// Whether this is the served root itself.
    pub fn is_root(&self) -> bool {
        self.url_path == "/"
    }

    /// URL path with a guaranteed trailing slash, for building child links.
    pub fn url_dir(&self) -> String {
        if self.url_path.ends_with('/') {
            self.url_path.clone()
        } else {
            format!("{}/", self.url_path)
        }
    }

    /// Percent-encoded form of [`url_path`](Self::url_path), suitable for
    /// `Location` headers.
    pub fn encoded_url_path(&self) -> String {
        encode_url_path(&self.url_path)
    }
}

/// Percent-encode every segment of a `/`-separated URL path.
pub fn encode_url_path(path: &str) -> String {
    path.split('/')
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}

/// Percent-encode a single URL path segment.
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// Translates untrusted request paths into confined filesystem paths.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: Arc<ServedRoot>,
}

impl PathSandbox {
    /// Create a sandbox for the given served root.
    pub fn new(root: Arc<ServedRoot>) -> Self {
        Self { root }
    }

    /// The served root this sandbox confines to.
    pub fn root(&self) -> &ServedRoot {
        &self.root
    }

    /// Resolve a request path against the served root.
    ///
    /// # Returns
    ///
    /// - `Ok(ConfinedPath)` for any path that stays inside the root. The
    ///   path may not exist; callers decide what that means.
    /// - `Err(SandboxError::Escape)` if the path (after symlink resolution)
    ///   would leave the root, or contains a NUL byte.
    #[must_use = "resolution result must be checked"]
    pub fn resolve(&self, request_path: &str) -> Result<ConfinedPath, SandboxError> {
        trace!("Resolving request path: {:?}", request_path);

        let raw = strip_query_and_fragment(request_path);
        let decoded = percent_decode_str(raw).decode_utf8_lossy();

        if decoded.contains('\0') {
            debug!("Rejecting request path with NUL byte");
            return Err(SandboxError::Escape);
        }

        let trailing_slash = decoded.ends_with('/') || decoded.ends_with('\\');
        let segments: Vec<&str> = decoded
            .split(['/', '\\'])
            .filter(|s| is_plain_segment(s))
            .collect();

        let mut joined = self.root.path().to_path_buf();
        for segment in &segments {
            joined.push(segment);
        }

        let fs_path = self.confine(&joined)?;

        let url_path = if segments.is_empty() {
            "/".to_string()
        } else if trailing_slash {
            format!("/{}/", segments.join("/"))
        } else {
            format!("/{}", segments.join("/"))
        };

        trace!("Confined {:?} to {:?}", request_path, fs_path);

        Ok(ConfinedPath {
            fs_path,
            url_path,
            trailing_slash,
        })
    }

    /// Resolve symlinks through the nearest existing ancestor and verify the
    /// result is still inside the root.
    fn confine(&self, joined: &Path) -> Result<PathBuf, SandboxError> {
        let mut existing = joined;

        loop {
            match fs::canonicalize(existing) {
                Ok(canonical) => {
                    if !self.root.contains(&canonical) {
                        warn!("Rejected request path resolving outside the served root");
                        return Err(SandboxError::Escape);
                    }

                    // Re-attach the part that does not exist yet.
                    let tail = joined
                        .strip_prefix(existing)
                        .map_err(|_| SandboxError::Escape)?;
                    return Ok(if tail.as_os_str().is_empty() {
                        canonical
                    } else {
                        canonical.join(tail)
                    });
                }
                Err(_) => match existing.parent() {
                    Some(parent) => existing = parent,
                    None => return Err(SandboxError::Escape),
                },
            }
        }
    }
}

/// Drop everything after the first `?` or `#`.
fn strip_query_and_fragment(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}

/// A segment is kept only if it is exactly one normal path component.
///
/// This discards `.`, `..`, empty segments, and anything the host platform
/// would treat as a root or prefix (e.g. `C:` on Windows).
fn is_plain_segment(segment: &str) -> bool {
    if segment.is_empty() || segment == "." || segment == ".." {
        return false;
    }

    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathSandbox) {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp_dir.path().join("a/sub")).unwrap();
        fs::write(temp_dir.path().join("a/b.txt"), b"hello").unwrap();

        let root = Arc::new(ServedRoot::new(temp_dir.path()).unwrap());
        (temp_dir, PathSandbox::new(root))
    }

    #[test]
    fn test_served_root_must_exist() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("missing");
        let err = ServedRoot::new(&missing).unwrap_err();
        assert!(matches!(err, SandboxError::RootResolution { .. }));
    }

    #[test]
    fn test_served_root_must_be_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, b"x").unwrap();
        let err = ServedRoot::new(&file).unwrap_err();
        assert!(matches!(err, SandboxError::RootNotDirectory(_)));
    }

    #[test]
    fn test_empty_and_slash_resolve_to_root() {
        let (_dir, sandbox) = setup();
        for path in ["", "/", "//", "/./", "?q=1", "#frag"] {
            let confined = sandbox.resolve(path).unwrap();
            assert_eq!(confined.fs_path(), sandbox.root().path(), "path {:?}", path);
            assert!(confined.is_root());
            assert_eq!(confined.url_path(), "/");
        }
    }

    #[test]
    fn test_resolve_file() {
        let (_dir, sandbox) = setup();
        let confined = sandbox.resolve("/a/b.txt").unwrap();
        assert_eq!(confined.fs_path(), sandbox.root().path().join("a/b.txt"));
        assert_eq!(confined.url_path(), "/a/b.txt");
        assert!(!confined.has_trailing_slash());
    }

    #[test]
    fn test_trailing_slash_preserved() {
        let (_dir, sandbox) = setup();
        let confined = sandbox.resolve("/a/").unwrap();
        assert!(confined.has_trailing_slash());
        assert_eq!(confined.url_path(), "/a/");
        assert_eq!(confined.url_dir(), "/a/");

        let confined = sandbox.resolve("/a").unwrap();
        assert!(!confined.has_trailing_slash());
        assert_eq!(confined.url_dir(), "/a/");
    }

    #[test]
    fn test_query_and_fragment_stripped() {
        let (_dir, sandbox) = setup();
        let confined = sandbox.resolve("/a/b.txt?download=1#top").unwrap();
        assert_eq!(confined.fs_path(), sandbox.root().path().join("a/b.txt"));
    }

    #[test]
    fn test_percent_decoding() {
        let (dir, sandbox) = setup();
        fs::write(dir.path().join("a/with space.txt"), b"x").unwrap();
        let confined = sandbox.resolve("/a/with%20space.txt").unwrap();
        assert_eq!(
            confined.fs_path(),
            sandbox.root().path().join("a/with space.txt")
        );
        assert_eq!(confined.url_path(), "/a/with space.txt");
        assert_eq!(confined.encoded_url_path(), "/a/with%20space.txt");
    }

    #[test]
    fn test_dot_dot_segments_are_ignored_not_applied() {
        let (_dir, sandbox) = setup();
        let confined = sandbox.resolve("/a/../a/b.txt").unwrap();
        // `..` is dropped, so this is a/a/b.txt, which does not exist but is confined.
        assert_eq!(confined.fs_path(), sandbox.root().path().join("a/a/b.txt"));

        let confined = sandbox.resolve("/../../etc/passwd").unwrap();
        assert_eq!(confined.fs_path(), sandbox.root().path().join("etc/passwd"));
    }

    #[test]
    fn test_traversal_never_escapes() {
        let (_dir, sandbox) = setup();
        let attempts = [
            "/../../../../etc/passwd",
            "/a/../../..",
            "..",
            "../",
            "%2e%2e/%2e%2e/etc/passwd",
            "%2E%2E%2F%2E%2E%2Fetc%2Fpasswd",
            "..%2f..%2f..%2fetc",
            "/a/%2e%2e/%2e%2e/%2e%2e",
            "..\\..\\windows\\system32",
            "/a/..%5c..%5c..%5c",
            "/./.././../",
            "////..//..//",
            "/%252e%252e/etc",
            "/a/sub/../../../../",
        ];

        for attempt in attempts {
            match sandbox.resolve(attempt) {
                Ok(confined) => assert!(
                    sandbox.root().contains(confined.fs_path()),
                    "{:?} escaped to {:?}",
                    attempt,
                    confined.fs_path()
                ),
                Err(e) => assert!(e.is_violation()),
            }
        }
    }

    #[test]
    fn test_nul_byte_rejected() {
        let (_dir, sandbox) = setup();
        let err = sandbox.resolve("/a/b.txt%00.png").unwrap_err();
        assert!(err.is_violation());
    }

    #[test]
    fn test_is_within_separator_boundary() {
        assert!(is_within(Path::new("/srv/root"), Path::new("/srv/root")));
        assert!(is_within(Path::new("/srv/root"), Path::new("/srv/root/a")));
        assert!(!is_within(Path::new("/srv/root"), Path::new("/srv/root_evil")));
        assert!(!is_within(Path::new("/srv/root"), Path::new("/srv/roo")));
        assert!(!is_within(Path::new("/srv/root"), Path::new("/etc/passwd")));
        assert!(is_within(Path::new("/"), Path::new("/etc")));
    }

    #[test]
    fn test_plain_segment_filter() {
        assert!(is_plain_segment("file.txt"));
        assert!(is_plain_segment("..."));
        assert!(!is_plain_segment(""));
        assert!(!is_plain_segment("."));
        assert!(!is_plain_segment(".."));
    }

    #[test]
    fn test_encode_url_path() {
        assert_eq!(encode_url_path("/a b/c#d/"), "/a%20b/c%23d/");
        assert_eq!(encode_url_path("/"), "/");
        assert_eq!(encode_segment("50%"), "50%25");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let (dir, sandbox) = setup();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), b"secret").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();

        let err = sandbox.resolve("/escape/secret.txt").unwrap_err();
        assert!(err.is_violation());

        // Non-existent child under an escaping symlink is rejected as well.
        let err = sandbox.resolve("/escape/missing.txt").unwrap_err();
        assert!(err.is_violation());

        let err = sandbox.resolve("/escape").unwrap_err();
        assert!(err.is_violation());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_root_allowed() {
        let (dir, sandbox) = setup();
        std::os::unix::fs::symlink(dir.path().join("a"), dir.path().join("alias")).unwrap();

        let confined = sandbox.resolve("/alias/b.txt").unwrap();
        assert_eq!(confined.fs_path(), sandbox.root().path().join("a/b.txt"));
        assert_eq!(confined.url_path(), "/alias/b.txt");
    }

    #[test]
    fn test_missing_path_is_confined() {
        let (_dir, sandbox) = setup();
        let confined = sandbox.resolve("/nope/deeper/file.txt").unwrap();
        assert_eq!(
            confined.fs_path(),
            sandbox.root().path().join("nope/deeper/file.txt")
        );
    }
}
