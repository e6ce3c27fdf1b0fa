//! Type-safe logical paths for encrypted volumes.
//!
//! A [`LogicalPath`] is the plaintext, user-visible location of a node inside
//! a volume (e.g. `/Documents/report.txt`). It never describes the encrypted
//! on-disk layout; mapping a logical path to ciphertext is the codec's job.
//!
//! Resolution is purely lexical: [`resolve`] and [`LogicalPath::resolve`]
//! combine a base directory with a path expression without touching the
//! volume, so a path to a node that does not exist resolves fine and the
//! failure surfaces later when the path is used.
//!
//! # Rules
//!
//! - `/` is the only separator, regardless of the host OS.
//! - A single leading and a single trailing separator are normalized away.
//! - An expression starting with `/` replaces the base instead of extending it.
//! - Empty segments (`a//b`), `.` and `..` are rejected with [`PathError`];
//!   relative navigation is never collapsed or handed to the codec.

use relative_path::{RelativePath, RelativePathBuf};
use std::fmt;
use thiserror::Error;

use crate::node::FileNode;

/// Errors produced while parsing or combining path expressions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Empty path expression")]
    Empty,

    #[error("Path '{expression}' contains an empty segment")]
    EmptySegment { expression: String },

    #[error("Path '{expression}' contains the relative segment '{segment}'")]
    RelativeSegment { expression: String, segment: String },

    #[error("Path '{expression}' contains a NUL byte")]
    NulByte { expression: String },

    #[error("'{name}' is not a single path segment")]
    NotASingleName { name: String },

    #[error("'{name}' is reserved by the volume and cannot be used")]
    ReservedName { name: String },

    #[error("'{path}' is not a child of '{parent}'")]
    NotAChild { path: String, parent: String },
}

/// User-facing path within an encrypted volume.
///
/// Stored root-relative and normalized, so two paths are equal iff their
/// segment sequences are equal.
///
/// # Examples
///
/// ```
/// use encvol_core::path::LogicalPath;
///
/// let path = LogicalPath::parse("/Documents/report.txt").unwrap();
/// assert_eq!(path.file_name(), Some("report.txt"));
/// assert_eq!(path.parent().unwrap().as_str(), "Documents");
///
/// // Leading and trailing separators are normalized
/// assert_eq!(path, LogicalPath::parse("Documents/report.txt/").unwrap());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalPath(RelativePathBuf);

impl LogicalPath {
    /// The volume root.
    #[inline]
    pub fn root() -> Self {
        LogicalPath(RelativePathBuf::new())
    }

    /// Parse a root-relative path expression.
    ///
    /// `"/"` parses to the root; `""` is rejected.
    pub fn parse(expression: &str) -> Result<Self, PathError> {
        if expression.is_empty() {
            return Err(PathError::Empty);
        }
        let segments = split_segments(expression, true)?;
        Ok(Self::from_segments(segments))
    }

    fn from_segments<'a>(segments: impl IntoIterator<Item = &'a str>) -> Self {
        let mut buf = RelativePathBuf::new();
        for segment in segments {
            buf.push(segment);
        }
        LogicalPath(buf)
    }

    /// Check if this is the root path.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.as_str().is_empty()
    }

    /// Root-relative string form (`""` for the root, no leading slash).
    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    #[inline]
    pub fn as_relative_path(&self) -> &RelativePath {
        &self.0
    }

    /// Combine this path with a path expression.
    ///
    /// Relative expressions are appended; absolute ones replace `self`.
    ///
    /// # Examples
    ///
    /// ```
    /// use encvol_core::path::LogicalPath;
    ///
    /// let docs = LogicalPath::parse("Documents").unwrap();
    /// assert_eq!(docs.resolve("2024/q1.txt").unwrap().as_str(), "Documents/2024/q1.txt");
    /// assert_eq!(docs.resolve("/Photos").unwrap().as_str(), "Photos");
    /// assert!(docs.resolve("../Photos").is_err());
    /// ```
    pub fn resolve(&self, expression: &str) -> Result<Self, PathError> {
        if expression.is_empty() {
            return Err(PathError::Empty);
        }
        if expression.starts_with('/') {
            return Self::parse(expression);
        }
        let segments = split_segments(expression, false)?;
        let mut buf = self.0.clone();
        for segment in segments {
            buf.push(segment);
        }
        Ok(LogicalPath(buf))
    }

    /// Append exactly one segment.
    pub fn join_name(&self, name: &str) -> Result<Self, PathError> {
        validate_name(name)?;
        Ok(LogicalPath(self.0.join(name)))
    }

    /// Get the parent path. Returns `None` for the root.
    pub fn parent(&self) -> Option<LogicalPath> {
        if self.is_root() {
            return None;
        }
        self.0.parent().map(|p| LogicalPath(p.to_relative_path_buf()))
    }

    /// Get the final segment. Returns `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name()
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.components().map(|c| c.as_str())
    }

    /// Number of segments below the root.
    pub fn depth(&self) -> usize {
        self.components().count()
    }

    /// Split into parent directory and final segment.
    pub fn split(&self) -> Option<(LogicalPath, &str)> {
        let parent = self.parent()?;
        let name = self.file_name()?;
        Some((parent, name))
    }

    /// True if `self` equals `ancestor` or lies underneath it.
    pub fn is_within(&self, ancestor: &LogicalPath) -> bool {
        if ancestor.is_root() {
            return true;
        }
        let mut mine = self.components();
        ancestor.components().all(|segment| mine.next() == Some(segment))
    }

    /// Re-root `self` from `from` onto `to`.
    ///
    /// Returns `None` when `self` is not within `from`.
    pub fn rebase(&self, from: &LogicalPath, to: &LogicalPath) -> Option<LogicalPath> {
        if !self.is_within(from) {
            return None;
        }
        let rest = self.components().skip(from.depth());
        let mut buf = to.0.clone();
        for segment in rest {
            buf.push(segment);
        }
        Some(LogicalPath(buf))
    }
}

impl AsRef<LogicalPath> for LogicalPath {
    fn as_ref(&self) -> &LogicalPath {
        self
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

/// The second argument of [`resolve`]: a textual expression, or a node
/// standing in for its own name.
#[derive(Debug, Clone, Copy)]
pub enum PathExpr<'a> {
    Text(&'a str),
    /// Only the node's name is used; its stored location is ignored, so a
    /// handle from one directory names the same entry under another base.
    Node(&'a FileNode),
}

impl<'a> From<&'a str> for PathExpr<'a> {
    fn from(s: &'a str) -> Self {
        PathExpr::Text(s)
    }
}

impl<'a> From<&'a String> for PathExpr<'a> {
    fn from(s: &'a String) -> Self {
        PathExpr::Text(s.as_str())
    }
}

impl<'a> From<&'a FileNode> for PathExpr<'a> {
    fn from(node: &'a FileNode) -> Self {
        PathExpr::Node(node)
    }
}

/// Combine a base directory (a path or a directory handle) with an
/// expression (a string or a handle whose name is appended).
///
/// A directory handle used as the base contributes its full path. A handle
/// used as the expression contributes only its final segment:
/// `resolve("/Z", node_at("/A/b.txt"))` is `/Z/b.txt`, not `/A/b.txt`.
///
/// # Examples
///
/// ```
/// use encvol_core::path::{resolve, LogicalPath};
///
/// let base = LogicalPath::parse("/A").unwrap();
/// assert_eq!(resolve(&base, "b.txt").unwrap().to_string(), "/A/b.txt");
/// assert_eq!(resolve(&base, "/Z/b.txt").unwrap().to_string(), "/Z/b.txt");
/// ```
pub fn resolve<'a>(
    base: impl AsRef<LogicalPath>,
    expression: impl Into<PathExpr<'a>>,
) -> Result<LogicalPath, PathError> {
    let base = base.as_ref();
    match expression.into() {
        PathExpr::Text(text) => base.resolve(text),
        PathExpr::Node(node) => base.join_name(node.name()),
    }
}

/// Validate a single user-supplied name (rename target, new folder, ...).
pub fn validate_name(name: &str) -> Result<(), PathError> {
    if name.is_empty() {
        return Err(PathError::Empty);
    }
    if name.contains('/') {
        return Err(PathError::NotASingleName {
            name: name.to_string(),
        });
    }
    check_segment(name, name)
}

fn check_segment(segment: &str, expression: &str) -> Result<(), PathError> {
    if segment.is_empty() {
        return Err(PathError::EmptySegment {
            expression: expression.to_string(),
        });
    }
    if segment == "." || segment == ".." {
        return Err(PathError::RelativeSegment {
            expression: expression.to_string(),
            segment: segment.to_string(),
        });
    }
    if segment.contains('\0') {
        return Err(PathError::NulByte {
            expression: expression.to_string(),
        });
    }
    Ok(())
}

/// Strip one leading (absolute only) and one trailing separator, then split.
fn split_segments(expression: &str, allow_leading: bool) -> Result<Vec<&str>, PathError> {
    let mut trimmed = expression;
    if allow_leading {
        trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);
    }
    trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

    if trimmed.is_empty() {
        // "/" is the root; a bare relative "" was rejected by the callers
        return Ok(Vec::new());
    }

    let segments: Vec<&str> = trimmed.split('/').collect();
    for segment in &segments {
        check_segment(segment, expression)?;
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecEntry, NodeId, NodeKind};
    use crate::session::SessionId;

    #[test]
    fn test_root() {
        let root = LogicalPath::root();
        assert!(root.is_root());
        assert_eq!(root.as_str(), "");
        assert_eq!(root.to_string(), "/");
        assert_eq!(LogicalPath::parse("/").unwrap(), root);
        assert!(root.parent().is_none());
        assert!(root.file_name().is_none());
    }

    #[test]
    fn test_parse_normalizes_single_separators() {
        let a = LogicalPath::parse("/Documents/file.txt").unwrap();
        let b = LogicalPath::parse("Documents/file.txt/").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "Documents/file.txt");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(LogicalPath::parse(""), Err(PathError::Empty));
        assert!(matches!(
            LogicalPath::parse("a//b"),
            Err(PathError::EmptySegment { .. })
        ));
        assert!(matches!(
            LogicalPath::parse("//a"),
            Err(PathError::EmptySegment { .. })
        ));
        assert!(matches!(
            LogicalPath::parse("a/b//"),
            Err(PathError::EmptySegment { .. })
        ));
    }

    #[test]
    fn test_dot_segments_are_rejected_not_collapsed() {
        let base = LogicalPath::parse("A/x").unwrap();
        assert!(matches!(
            base.resolve(".."),
            Err(PathError::RelativeSegment { ref segment, .. }) if segment == ".."
        ));
        assert!(matches!(
            base.resolve("./b"),
            Err(PathError::RelativeSegment { ref segment, .. }) if segment == "."
        ));
        assert!(LogicalPath::parse("/A/../B").is_err());
    }

    #[test]
    fn test_resolve_relative_appends() {
        let base = LogicalPath::parse("A").unwrap();
        assert_eq!(base.resolve("b/c.txt").unwrap().as_str(), "A/b/c.txt");
        assert_eq!(base.resolve("b/").unwrap().as_str(), "A/b");

        let root = LogicalPath::root();
        assert_eq!(root.resolve("top.txt").unwrap().as_str(), "top.txt");
    }

    #[test]
    fn test_resolve_absolute_replaces() {
        let base = LogicalPath::parse("A/B").unwrap();
        assert_eq!(base.resolve("/Z").unwrap().as_str(), "Z");
        assert!(base.resolve("/").unwrap().is_root());
    }

    #[test]
    fn test_join_name_requires_single_segment() {
        let base = LogicalPath::parse("A").unwrap();
        assert_eq!(base.join_name("x").unwrap().as_str(), "A/x");
        assert!(matches!(
            base.join_name("x/y"),
            Err(PathError::NotASingleName { .. })
        ));
        assert_eq!(base.join_name(""), Err(PathError::Empty));
    }

    #[test]
    fn test_parent_and_split() {
        let path = LogicalPath::parse("Documents/Photos/vacation.jpg").unwrap();
        let (parent, name) = path.split().unwrap();
        assert_eq!(parent.as_str(), "Documents/Photos");
        assert_eq!(name, "vacation.jpg");

        let top = LogicalPath::parse("file.txt").unwrap();
        assert!(top.parent().unwrap().is_root());
    }

    #[test]
    fn test_is_within_and_rebase() {
        let a = LogicalPath::parse("A").unwrap();
        let ab = LogicalPath::parse("A/b.txt").unwrap();
        let ab2 = LogicalPath::parse("AB").unwrap();

        assert!(ab.is_within(&a));
        assert!(a.is_within(&a));
        assert!(!ab2.is_within(&a));
        assert!(ab.is_within(&LogicalPath::root()));

        let z = LogicalPath::parse("Z/Y").unwrap();
        assert_eq!(ab.rebase(&a, &z).unwrap().as_str(), "Z/Y/b.txt");
        assert!(ab2.rebase(&a, &z).is_none());
    }

    #[test]
    fn test_display() {
        let path = LogicalPath::parse("Documents/file.txt").unwrap();
        assert_eq!(format!("{path}"), "/Documents/file.txt");
    }

    fn node_at(path: &str, kind: NodeKind) -> FileNode {
        let path = LogicalPath::parse(path).unwrap();
        let entry = CodecEntry {
            id: NodeId::from_raw(7),
            name: path.file_name().unwrap_or("").to_string(),
            kind,
            len: 0,
        };
        FileNode::from_entry(SessionId::new(), path, &entry)
    }

    #[test]
    fn test_resolve_with_handle_as_base() {
        let dir = node_at("Documents/2024", NodeKind::Directory);
        assert_eq!(resolve(&dir, "q1.txt").unwrap().as_str(), "Documents/2024/q1.txt");
        assert_eq!(resolve(&dir, "/Photos").unwrap().as_str(), "Photos");
        assert!(resolve(&dir, "../q1.txt").is_err());
    }

    #[test]
    fn test_resolve_with_handle_as_expression_appends_name_only() {
        let file = node_at("A/b.txt", NodeKind::File);
        let base = LogicalPath::parse("Z").unwrap();
        assert_eq!(resolve(&base, &file).unwrap().as_str(), "Z/b.txt");
        assert_eq!(resolve(LogicalPath::root(), &file).unwrap().as_str(), "b.txt");

        let dir = node_at("Z", NodeKind::Directory);
        assert_eq!(resolve(&dir, &file).unwrap().to_string(), "/Z/b.txt");
    }
}
