//! Handles to volume nodes.

use std::io::Read;

use crate::codec::{CodecEntry, CodecError, CodecReader, CodecWriter, NodeId, NodeKind};
use crate::error::VolumeError;
use crate::path::LogicalPath;
use crate::session::{SessionId, VolumeSession};

/// Handle to a file or directory inside one volume session.
///
/// A handle is a snapshot: name, kind and size are as of the lookup that
/// produced it. It stays bound to its session and is rejected by any other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    session: SessionId,
    id: NodeId,
    path: LogicalPath,
    kind: NodeKind,
    len: u64,
}

impl FileNode {
    pub(crate) fn from_entry(session: SessionId, path: LogicalPath, entry: &CodecEntry) -> Self {
        FileNode {
            session,
            id: entry.id,
            path,
            kind: entry.kind,
            len: if entry.is_dir() { 0 } else { entry.len },
        }
    }

    #[inline]
    pub fn session_id(&self) -> SessionId {
        self.session
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn path(&self) -> &LogicalPath {
        &self.path
    }

    /// Final path segment; empty for the root.
    pub fn name(&self) -> &str {
        self.path.file_name().unwrap_or("")
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    #[inline]
    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Plaintext length in bytes (0 for directories).
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_root(&self) -> bool {
        self.id.is_root()
    }

    pub fn exists(&self, session: &VolumeSession) -> Result<bool, VolumeError> {
        session.check_handle(self)?;
        session.path_exists(&self.path)
    }

    pub fn open_read(&self, session: &VolumeSession) -> Result<CodecReader, VolumeError> {
        session.check_handle(self)?;
        session.open_read(&self.path)
    }

    pub fn open_write(
        &self,
        session: &VolumeSession,
        declared_len: u64,
    ) -> Result<Box<dyn CodecWriter>, VolumeError> {
        session.check_handle(self)?;
        session.open_write(&self.path, declared_len)
    }

    /// Read the whole plaintext content.
    pub fn read_all(&self, session: &VolumeSession) -> Result<Vec<u8>, VolumeError> {
        let mut reader = self.open_read(session)?;
        let mut content = Vec::new();
        reader.read_to_end(&mut content).map_err(|e| {
            VolumeError::failed(format!("Unable to read '{}': {e}", self.path), CodecError::Io(e))
        })?;
        Ok(content)
    }
}

impl AsRef<LogicalPath> for FileNode {
    fn as_ref(&self) -> &LogicalPath {
        &self.path
    }
}
