//! Slash-delimited path parsing, normalization, and pattern matching.
//!
//! A [`Path`] addresses a node in the value tree: `/` is the root, and
//! `/users/alice/email` addresses a leaf three segments deep. Paths are
//! validated once at the boundary (via [`normalize`]) and carried as plain
//! `String`s everywhere else in the engine, since every backing-store key is
//! exactly a normalized path's UTF-8 bytes.
//!
//! # Examples
//!
//! ```
//! use pathkv::path::{self, Path};
//!
//! let p = path::normalize("/users/alice/").unwrap();
//! assert_eq!(p.as_str(), "/users/alice");
//! assert_eq!(path::segments(&p), vec!["users", "alice"]);
//! ```

use std::fmt;

use thiserror::Error;

/// The hard ceiling on a normalized path's byte length (spec §3).
pub const MAX_PATH_LEN: usize = 1024;

/// The literal root path.
pub const ROOT: &str = "/";

/// A validated, normalized slash-delimited path.
///
/// Construction always goes through [`normalize`]; there is no public way to
/// build a `Path` that skips validation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path(String);

/// Why a candidate path string failed [`normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    /// The string did not start with `/`, or was empty.
    #[error("path must start with '/'")]
    InvalidPath,
    /// The normalized path exceeded [`MAX_PATH_LEN`] bytes.
    #[error("path exceeds {MAX_PATH_LEN} bytes")]
    PathTooLong,
    /// The path contained `//` or a trailing-then-repeated separator.
    #[error("path contains an empty segment")]
    EmptySegment,
}

impl Path {
    /// Borrow the normalized path as `&str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Borrow the normalized path as raw bytes (the exact backing-store key).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// `true` if this is the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == ROOT
    }

    /// The root path.
    #[must_use]
    pub fn root() -> Self {
        Path(ROOT.to_string())
    }

    /// The prefix under which this path's direct children live: `/` for the
    /// root, `self + "/"` otherwise. Every child key begins with this
    /// prefix, and (per the ordering invariant in spec §3) all of them form
    /// a contiguous lexical run starting here.
    #[must_use]
    pub fn child_prefix(&self) -> String {
        if self.is_root() {
            ROOT.to_string()
        } else {
            format!("{}/", self.0)
        }
    }

    /// Build the path for a direct child segment.
    #[must_use]
    pub fn child(&self, segment: &str) -> Path {
        Path(format!("{}{segment}", self.child_prefix()))
    }

    /// Build the path for array element `index`.
    #[must_use]
    pub fn index(&self, index: usize) -> Path {
        self.child(&index.to_string())
    }

    /// This path's parent, or `None` if this is the root.
    #[must_use]
    pub fn parent(&self) -> Option<Path> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Path::root()),
            Some(idx) => Some(Path(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// The ordered list of segments; the root has none.
    #[must_use]
    pub fn segments(&self) -> Vec<&str> {
        if self.is_root() {
            Vec::new()
        } else {
            self.0[1..].split('/').collect()
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Path {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parse and normalize a user-supplied path string.
///
/// Requires a leading `/`; rejects empty segments (including embedded
/// `//`); strips a single trailing `/` unless the input is exactly `/`.
///
/// # Errors
///
/// Returns [`PathError`] if the input is malformed, too long, or contains an
/// empty segment.
pub fn normalize(s: &str) -> Result<Path, PathError> {
    if !s.starts_with('/') {
        return Err(PathError::InvalidPath);
    }
    if s.len() > MAX_PATH_LEN {
        return Err(PathError::PathTooLong);
    }
    if s == ROOT {
        return Ok(Path::root());
    }
    let trimmed = s.strip_suffix('/').unwrap_or(s);
    if trimmed.is_empty() {
        // s was exactly "/" handled above, so this means nothing but
        // repeated slashes remained.
        return Err(PathError::EmptySegment);
    }
    for segment in trimmed[1..].split('/') {
        if segment.is_empty() {
            return Err(PathError::EmptySegment);
        }
    }
    if trimmed.len() > MAX_PATH_LEN {
        return Err(PathError::PathTooLong);
    }
    Ok(Path(trimmed.to_string()))
}

/// The ordered segment list of an already-normalized path; the root returns
/// an empty list.
#[must_use]
pub fn segments(p: &Path) -> Vec<&str> {
    p.segments()
}

/// `path`'s parent, or `None` if `path` is the root.
#[must_use]
pub fn parent(path: &Path) -> Option<Path> {
    path.parent()
}

/// Segment-wise match of `path` against a pattern where `*` matches exactly
/// one segment.
///
/// # Examples
///
/// ```
/// use pathkv::path::{self, matches};
///
/// let p = path::normalize("/users/alice").unwrap();
/// assert!(matches(&p, "/users/*"));
/// assert!(!matches(&p, "/users/*/email"));
/// ```
#[must_use]
pub fn matches(path: &Path, pattern: &str) -> bool {
    let Ok(pattern) = normalize(pattern) else {
        return false;
    };
    let path_segs = path.segments();
    let pattern_segs = pattern.segments();
    if path_segs.len() != pattern_segs.len() {
        return false;
    }
    path_segs
        .iter()
        .zip(pattern_segs.iter())
        .all(|(s, p)| *p == "*" || s == p)
}

/// Segment-wise match that also binds `$name` segments in `pattern` to the
/// corresponding segment of `path`.
///
/// # Errors
///
/// Returns `Err(())` if `path` and `pattern` have a different segment count
/// or a non-variable, non-wildcard segment disagrees.
///
/// # Examples
///
/// ```
/// use pathkv::path::{self, extract};
///
/// let p = path::normalize("/users/alice/email").unwrap();
/// let vars = extract(&p, "/users/$name/email").unwrap();
/// assert_eq!(vars.get("name").map(String::as_str), Some("alice"));
/// ```
pub fn extract(
    path: &Path,
    pattern: &str,
) -> Result<std::collections::HashMap<String, String>, PatternMismatch> {
    let pattern = normalize(pattern).map_err(|_| PatternMismatch)?;
    let path_segs = path.segments();
    let pattern_segs = pattern.segments();
    if path_segs.len() != pattern_segs.len() {
        return Err(PatternMismatch);
    }
    let mut vars = std::collections::HashMap::new();
    for (seg, pat) in path_segs.iter().zip(pattern_segs.iter()) {
        if let Some(name) = pat.strip_prefix('$') {
            vars.insert(name.to_string(), (*seg).to_string());
        } else if *pat != "*" && pat != seg {
            return Err(PatternMismatch);
        }
    }
    Ok(vars)
}

/// `path` and `pattern` disagreed on a non-variable, non-wildcard segment,
/// or had different lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("path does not match pattern")]
pub struct PatternMismatch;
