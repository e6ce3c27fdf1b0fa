//! The encryption codec boundary.
//!
//! Everything in this crate manipulates plaintext [`LogicalPath`]s; the
//! [`VolumeCodec`] trait is the only place that knows how those paths map to
//! encrypted names, how content is enciphered, and where the ciphertext lives.
//! Key derivation and unlocking sit behind [`VolumeUnlocker`].
//!
//! [`memory`] provides an in-process codec used by tests and embedders that
//! want a scratch volume.

pub mod memory;

use secrecy::SecretString;
use std::fmt;
use std::io::{self, Read, Write};
use thiserror::Error;

use crate::path::LogicalPath;

/// Name of the volume configuration file kept at the volume root.
///
/// It is owned by the codec and never shown as a user entry.
pub const ENCFS_CONFIG_FILE_NAME: &str = ".encfs6.xml";

/// Stable identity the codec assigns to a node.
///
/// Identity survives renames: a moved node keeps its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Identifier of the volume root.
    pub const ROOT: NodeId = NodeId(0);

    #[inline]
    pub fn root() -> Self {
        Self::ROOT
    }

    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        NodeId(raw)
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }

    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "<root>")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    File,
    Directory,
}

/// A node as reported by the codec: plaintext name, kind, and plaintext size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecEntry {
    pub id: NodeId,
    /// Plaintext name. Empty for the root.
    pub name: String,
    pub kind: NodeKind,
    /// Plaintext length in bytes. Always 0 for directories.
    pub len: u64,
}

impl CodecEntry {
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }
}

/// Codec operation names, used for error context and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecOp {
    List,
    MakeDir,
    CreateFile,
    Delete,
    Rename,
    OpenRead,
    OpenWrite,
    /// Committing the content written through a [`CodecWriter`].
    Write,
}

impl fmt::Display for CodecOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CodecOp::List => "list",
            CodecOp::MakeDir => "mkdir",
            CodecOp::CreateFile => "create",
            CodecOp::Delete => "delete",
            CodecOp::Rename => "rename",
            CodecOp::OpenRead => "open-read",
            CodecOp::OpenWrite => "open-write",
            CodecOp::Write => "write",
        };
        f.write_str(name)
    }
}

/// Errors reported by a codec.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("No such file or directory: '{path}'")]
    NotFound { path: LogicalPath },

    #[error("'{path}' already exists")]
    AlreadyExists { path: LogicalPath },

    #[error("'{path}' is not a directory")]
    NotADirectory { path: LogicalPath },

    #[error("'{path}' is not a file")]
    NotAFile { path: LogicalPath },

    #[error("Directory '{path}' is not empty")]
    DirectoryNotEmpty { path: LogicalPath },

    #[error("'{path}' cannot be moved into itself")]
    IntoItself { path: LogicalPath },

    #[error("Invalid password or key material")]
    InvalidKey,

    #[error("Injected {op} failure at '{path}'")]
    Injected { op: CodecOp, path: LogicalPath },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Owned plaintext reader returned by [`VolumeCodec::open_read`].
pub type CodecReader = Box<dyn Read + Send>;

/// Plaintext sink returned by [`VolumeCodec::open_write`].
///
/// Content is only durable once [`finish`](CodecWriter::finish) returns `Ok`;
/// dropping a writer without finishing it abandons the write.
pub trait CodecWriter: Write + Send {
    /// Flush and commit. Returns the number of plaintext bytes committed.
    fn finish(self: Box<Self>) -> Result<u64, CodecError>;
}

/// Plaintext view of an unlocked encrypted volume.
///
/// Implementations are shared between threads behind an `Arc` and must
/// serialize their own internal state.
pub trait VolumeCodec: Send + Sync + fmt::Debug {
    /// Name of the codec-owned config file filtered out of listings.
    fn config_file_name(&self) -> &str {
        ENCFS_CONFIG_FILE_NAME
    }

    /// Look up a node. `Ok(None)` when nothing exists at `path`.
    fn stat(&self, path: &LogicalPath) -> Result<Option<CodecEntry>, CodecError>;

    fn path_exists(&self, path: &LogicalPath) -> Result<bool, CodecError> {
        Ok(self.stat(path)?.is_some())
    }

    /// Immediate children of a directory, in the codec's own order.
    fn list_children(&self, dir: &LogicalPath) -> Result<Vec<CodecEntry>, CodecError>;

    /// Create a directory. The parent must exist; `path` must not.
    fn make_dir(&self, path: &LogicalPath) -> Result<CodecEntry, CodecError>;

    /// Create an empty file. The parent must exist; `path` must not.
    fn create_file(&self, path: &LogicalPath) -> Result<CodecEntry, CodecError>;

    /// Remove a file or an empty directory.
    fn delete(&self, path: &LogicalPath) -> Result<(), CodecError>;

    /// Move a node (and its whole subtree) to `dst`. `dst` must not exist.
    fn rename(&self, src: &LogicalPath, dst: &LogicalPath) -> Result<(), CodecError>;

    fn open_read(&self, path: &LogicalPath) -> Result<CodecReader, CodecError>;

    /// Open an existing file for replacement.
    ///
    /// `declared_len` is the number of bytes the caller intends to write;
    /// codecs that lay out ciphertext blocks up front may rely on it.
    fn open_write(
        &self,
        path: &LogicalPath,
        declared_len: u64,
    ) -> Result<Box<dyn CodecWriter>, CodecError>;
}

/// Derives key material from a password and hands back an unlocked codec.
pub trait VolumeUnlocker {
    type Codec: VolumeCodec + 'static;

    fn unlock(&self, password: &SecretString) -> Result<Self::Codec, CodecError>;
}
