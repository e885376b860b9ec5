//! Path sandboxing for the served root.
//!
//! Every filesystem access made on behalf of a request goes through
//! [`PathSandbox::resolve`], which is the only way to obtain a
//! [`ConfinedPath`].
//!
//! # Security Model
//!
//! Request paths are **untrusted**. A client can:
//! - Send `..` segments, raw or percent-encoded
//! - Use backslashes or drive letters hoping the host platform applies them
//! - Point a symlink inside the root at a directory outside of it
//!
//! We defend against all of these through:
//! - Ignoring (not applying) `.` and `..` segments
//! - Dropping any segment that is not a single plain path component
//! - Canonicalizing the nearest existing ancestor before the containment check
//! - A separator-aware prefix check, so `/srv/root_evil` never matches `/srv/root`
//!
//! Rejections never carry path detail, and callers answer them exactly like a
//! missing file.

pub mod error;
pub mod path;

pub use error::SandboxError;
pub use path::{
    ConfinedPath, PathSandbox, ServedRoot, encode_segment, encode_url_path, is_within,
};
