//! In-process codec with password gating and fault injection.
//!
//! [`MemoryVolume`] plays the role of an encrypted volume on disk: it holds the
//! expected password and the node tree, and [`unlock`](VolumeUnlocker::unlock)
//! yields a [`MemoryCodec`] sharing that tree. Content is kept as plaintext;
//! the point is to exercise the engine, not the cipher.
//!
//! Faults registered with [`MemoryVolume::inject_fault`] make the matching
//! codec call fail with [`CodecError::Injected`] until cleared, which is how
//! the partial-failure behavior of recursive operations is tested.

use parking_lot::{Mutex, RwLock};
use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeMap;
use std::io::{self, Cursor, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use subtle::ConstantTimeEq;
use tracing::{debug, trace};

use super::{
    CodecEntry, CodecError, CodecOp, CodecReader, CodecWriter, ENCFS_CONFIG_FILE_NAME, NodeId,
    NodeKind, VolumeCodec, VolumeUnlocker,
};
use crate::path::LogicalPath;

#[derive(Debug, Clone)]
struct MemNode {
    id: NodeId,
    kind: NodeKind,
    content: Vec<u8>,
}

#[derive(Debug)]
struct MemState {
    /// Keyed by root-relative path string; the root is `""`.
    nodes: RwLock<BTreeMap<String, MemNode>>,
    faults: Mutex<Vec<(CodecOp, String)>>,
    next_id: AtomicU64,
}

impl MemState {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            String::new(),
            MemNode {
                id: NodeId::root(),
                kind: NodeKind::Directory,
                content: Vec::new(),
            },
        );
        MemState {
            nodes: RwLock::new(nodes),
            faults: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn allocate_id(&self) -> NodeId {
        NodeId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn check_fault(&self, op: CodecOp, path: &LogicalPath) -> Result<(), CodecError> {
        let faults = self.faults.lock();
        if faults
            .iter()
            .any(|(fault_op, fault_path)| *fault_op == op && fault_path == path.as_str())
        {
            debug!(%op, %path, "Injected codec fault triggered");
            return Err(CodecError::Injected {
                op,
                path: path.clone(),
            });
        }
        Ok(())
    }
}

fn parent_key(key: &str) -> Option<&str> {
    if key.is_empty() {
        return None;
    }
    Some(key.rsplit_once('/').map_or("", |(parent, _)| parent))
}

fn entry_for(key: &str, node: &MemNode) -> CodecEntry {
    let name = key.rsplit_once('/').map_or(key, |(_, name)| name);
    CodecEntry {
        id: node.id,
        name: name.to_string(),
        kind: node.kind,
        len: node.content.len() as u64,
    }
}

/// Parent must exist and be a directory; `path` must be free.
fn check_insert(
    nodes: &BTreeMap<String, MemNode>,
    path: &LogicalPath,
) -> Result<(), CodecError> {
    let Some(parent) = path.parent() else {
        return Err(CodecError::AlreadyExists { path: path.clone() });
    };
    match nodes.get(parent.as_str()) {
        None => return Err(CodecError::NotFound { path: parent }),
        Some(node) if node.kind != NodeKind::Directory => {
            return Err(CodecError::NotADirectory { path: parent });
        }
        Some(_) => {}
    }
    if nodes.contains_key(path.as_str()) {
        return Err(CodecError::AlreadyExists { path: path.clone() });
    }
    Ok(())
}

/// A password-protected in-memory volume.
#[derive(Clone)]
pub struct MemoryVolume {
    password: SecretString,
    state: Arc<MemState>,
}

impl std::fmt::Debug for MemoryVolume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryVolume")
            .field("nodes", &self.state.nodes.read().len())
            .finish_non_exhaustive()
    }
}

impl MemoryVolume {
    /// Create an empty volume whose root holds only the config file.
    pub fn new(password: impl Into<String>) -> Self {
        let volume = MemoryVolume {
            password: SecretString::from(password.into()),
            state: Arc::new(MemState::new()),
        };
        volume.insert_raw(ENCFS_CONFIG_FILE_NAME, NodeKind::File, b"<encfs/>".to_vec());
        volume
    }

    fn insert_raw(&self, key: &str, kind: NodeKind, content: Vec<u8>) {
        let id = self.state.allocate_id();
        self.state
            .nodes
            .write()
            .insert(key.to_string(), MemNode { id, kind, content });
    }

    /// Seed a directory, creating missing ancestors.
    pub fn seed_dir(&self, path: &str) -> Result<(), CodecError> {
        let path = LogicalPath::parse(path).map_err(|e| io::Error::other(e.to_string()))?;
        let mut current = LogicalPath::root();
        for segment in path.components() {
            current = current
                .join_name(segment)
                .map_err(|e| io::Error::other(e.to_string()))?;
            let existing = self.state.nodes.read().get(current.as_str()).map(|n| n.kind);
            match existing {
                Some(NodeKind::Directory) => {}
                Some(NodeKind::File) => {
                    return Err(CodecError::NotADirectory { path: current });
                }
                None => self.insert_raw(current.as_str(), NodeKind::Directory, Vec::new()),
            }
        }
        Ok(())
    }

    /// Seed a file (replacing any existing content), creating missing ancestors.
    pub fn seed_file(&self, path: &str, content: &[u8]) -> Result<(), CodecError> {
        let path = LogicalPath::parse(path).map_err(|e| io::Error::other(e.to_string()))?;
        if let Some(parent) = path.parent() {
            if !parent.is_root() {
                self.seed_dir(parent.as_str())?;
            }
        }
        let mut nodes = self.state.nodes.write();
        if let Some(existing) = nodes.get_mut(path.as_str()) {
            if existing.kind != NodeKind::File {
                return Err(CodecError::NotAFile { path });
            }
            existing.content = content.to_vec();
            return Ok(());
        }
        let id = self.state.allocate_id();
        nodes.insert(
            path.as_str().to_string(),
            MemNode {
                id,
                kind: NodeKind::File,
                content: content.to_vec(),
            },
        );
        Ok(())
    }

    /// Make every `op` on `path` fail until [`clear_faults`](Self::clear_faults).
    pub fn inject_fault(&self, op: CodecOp, path: &str) {
        let key = LogicalPath::parse(path)
            .map_or_else(|_| path.to_string(), |p| p.as_str().to_string());
        self.state.faults.lock().push((op, key));
    }

    pub fn clear_faults(&self) {
        self.state.faults.lock().clear();
    }

    /// Number of nodes stored, including the root and the config file.
    pub fn node_count(&self) -> usize {
        self.state.nodes.read().len()
    }
}

impl VolumeUnlocker for MemoryVolume {
    type Codec = MemoryCodec;

    fn unlock(&self, password: &SecretString) -> Result<MemoryCodec, CodecError> {
        let expected = self.password.expose_secret().as_bytes();
        let given = password.expose_secret().as_bytes();
        if !bool::from(expected.ct_eq(given)) {
            debug!("Memory volume rejected password");
            return Err(CodecError::InvalidKey);
        }
        Ok(MemoryCodec {
            state: Arc::clone(&self.state),
        })
    }
}

/// Unlocked view of a [`MemoryVolume`].
#[derive(Debug, Clone)]
pub struct MemoryCodec {
    state: Arc<MemState>,
}

impl VolumeCodec for MemoryCodec {
    fn stat(&self, path: &LogicalPath) -> Result<Option<CodecEntry>, CodecError> {
        let nodes = self.state.nodes.read();
        Ok(nodes.get(path.as_str()).map(|node| entry_for(path.as_str(), node)))
    }

    fn list_children(&self, dir: &LogicalPath) -> Result<Vec<CodecEntry>, CodecError> {
        self.state.check_fault(CodecOp::List, dir)?;
        let nodes = self.state.nodes.read();
        match nodes.get(dir.as_str()) {
            None => return Err(CodecError::NotFound { path: dir.clone() }),
            Some(node) if node.kind != NodeKind::Directory => {
                return Err(CodecError::NotADirectory { path: dir.clone() });
            }
            Some(_) => {}
        }
        let children: Vec<CodecEntry> = nodes
            .iter()
            .filter(|(key, _)| parent_key(key) == Some(dir.as_str()))
            .map(|(key, node)| entry_for(key, node))
            .collect();
        trace!(%dir, count = children.len(), "Listed memory directory");
        Ok(children)
    }

    fn make_dir(&self, path: &LogicalPath) -> Result<CodecEntry, CodecError> {
        self.state.check_fault(CodecOp::MakeDir, path)?;
        let mut nodes = self.state.nodes.write();
        check_insert(&nodes, path)?;
        let node = MemNode {
            id: self.state.allocate_id(),
            kind: NodeKind::Directory,
            content: Vec::new(),
        };
        let entry = entry_for(path.as_str(), &node);
        nodes.insert(path.as_str().to_string(), node);
        Ok(entry)
    }

    fn create_file(&self, path: &LogicalPath) -> Result<CodecEntry, CodecError> {
        self.state.check_fault(CodecOp::CreateFile, path)?;
        let mut nodes = self.state.nodes.write();
        check_insert(&nodes, path)?;
        let node = MemNode {
            id: self.state.allocate_id(),
            kind: NodeKind::File,
            content: Vec::new(),
        };
        let entry = entry_for(path.as_str(), &node);
        nodes.insert(path.as_str().to_string(), node);
        Ok(entry)
    }

    fn delete(&self, path: &LogicalPath) -> Result<(), CodecError> {
        self.state.check_fault(CodecOp::Delete, path)?;
        if path.is_root() {
            return Err(CodecError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "the volume root cannot be deleted",
            )));
        }
        let mut nodes = self.state.nodes.write();
        let Some(node) = nodes.get(path.as_str()) else {
            return Err(CodecError::NotFound { path: path.clone() });
        };
        if node.kind == NodeKind::Directory
            && nodes.keys().any(|key| parent_key(key) == Some(path.as_str()))
        {
            return Err(CodecError::DirectoryNotEmpty { path: path.clone() });
        }
        nodes.remove(path.as_str());
        Ok(())
    }

    fn rename(&self, src: &LogicalPath, dst: &LogicalPath) -> Result<(), CodecError> {
        self.state.check_fault(CodecOp::Rename, src)?;
        if src.is_root() {
            return Err(CodecError::IntoItself { path: src.clone() });
        }
        if dst.is_within(src) {
            return Err(CodecError::IntoItself { path: src.clone() });
        }
        let mut nodes = self.state.nodes.write();
        if !nodes.contains_key(src.as_str()) {
            return Err(CodecError::NotFound { path: src.clone() });
        }
        check_insert(&nodes, dst)?;

        let moved: Vec<String> = nodes
            .keys()
            .filter(|key| LogicalPath::parse(key).is_ok_and(|p| p.is_within(src)))
            .cloned()
            .collect();
        for key in moved {
            let Some(node) = nodes.remove(&key) else {
                continue;
            };
            let old = LogicalPath::parse(&key).map_err(|e| io::Error::other(e.to_string()))?;
            let Some(new) = old.rebase(src, dst) else {
                continue;
            };
            nodes.insert(new.as_str().to_string(), node);
        }
        debug!(%src, %dst, "Renamed memory node");
        Ok(())
    }

    fn open_read(&self, path: &LogicalPath) -> Result<CodecReader, CodecError> {
        self.state.check_fault(CodecOp::OpenRead, path)?;
        let nodes = self.state.nodes.read();
        match nodes.get(path.as_str()) {
            None => Err(CodecError::NotFound { path: path.clone() }),
            Some(node) if node.kind != NodeKind::File => {
                Err(CodecError::NotAFile { path: path.clone() })
            }
            Some(node) => Ok(Box::new(Cursor::new(node.content.clone()))),
        }
    }

    fn open_write(
        &self,
        path: &LogicalPath,
        declared_len: u64,
    ) -> Result<Box<dyn CodecWriter>, CodecError> {
        self.state.check_fault(CodecOp::OpenWrite, path)?;
        let nodes = self.state.nodes.read();
        match nodes.get(path.as_str()) {
            None => Err(CodecError::NotFound { path: path.clone() }),
            Some(node) if node.kind != NodeKind::File => {
                Err(CodecError::NotAFile { path: path.clone() })
            }
            Some(_) => Ok(Box::new(MemoryWriter {
                state: Arc::clone(&self.state),
                path: path.clone(),
                buffer: Vec::with_capacity(usize::try_from(declared_len.min(1 << 20)).unwrap_or(0)),
            })),
        }
    }
}

/// Buffers plaintext and swaps it in on `finish`.
struct MemoryWriter {
    state: Arc<MemState>,
    path: LogicalPath,
    buffer: Vec<u8>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CodecWriter for MemoryWriter {
    fn finish(self: Box<Self>) -> Result<u64, CodecError> {
        self.state.check_fault(CodecOp::Write, &self.path)?;
        let mut nodes = self.state.nodes.write();
        let Some(node) = nodes.get_mut(self.path.as_str()) else {
            return Err(CodecError::NotFound { path: self.path });
        };
        let written = self.buffer.len() as u64;
        node.content = self.buffer;
        Ok(written)
    }
}
