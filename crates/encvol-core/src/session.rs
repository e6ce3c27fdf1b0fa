//! The volume session: single entry point for one unlocked volume.
//!
//! A [`VolumeSession`] binds an unlocked [`VolumeCodec`] to a root handle and
//! an [`EngineConfig`]. Every query and operation goes through it, which is
//! where the cross-cutting checks live:
//!
//! - once [`close`](VolumeSession::close)d, every call fails with
//!   [`VolumeError::SessionClosed`];
//! - handles minted by another session fail with
//!   [`VolumeError::ForeignHandle`];
//! - the codec's config file name is never accepted as a destination.
//!
//! All of these checks happen before any codec I/O.
//!
//! The session holds no operation lock. Callers run one mutating operation
//! at a time per session; [`AsyncVolumeSession`](crate::async_session::AsyncVolumeSession)
//! enforces that with an exclusive slot.
//!
//! # Example
//!
//! ```
//! use encvol_core::codec::memory::MemoryVolume;
//! use encvol_core::progress::NoProgress;
//! use encvol_core::session::VolumeSession;
//! use secrecy::SecretString;
//!
//! let volume = MemoryVolume::new("correct horse");
//! let session = VolumeSession::unlock(&volume, &SecretString::from("correct horse".to_string()))?;
//!
//! let docs = session.resolve(session.root(), "Documents")?;
//! session.make_dir(&docs)?;
//! session.create_file(&session.resolve(&docs, "notes.txt")?)?;
//!
//! let listing = session.list(&session.lookup(&docs)?)?;
//! assert_eq!(listing.names(), vec!["notes.txt"]);
//!
//! session.delete(&docs, true, &NoProgress)?;
//! assert!(!session.path_exists(&docs)?);
//! # Ok::<(), encvol_core::error::VolumeError>(())
//! ```

use secrecy::SecretString;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::clipboard::{Clipboard, PasteMode, PasteOutcome, PendingEntry, copy_name};
use crate::codec::{CodecReader, CodecWriter, VolumeCodec, VolumeUnlocker};
use crate::config::EngineConfig;
use crate::cursor::{DirectoryCursor, Listing};
use crate::engine::{DeleteStats, Engine, TransferStats};
use crate::error::VolumeError;
use crate::node::FileNode;
use crate::path::{self, LogicalPath, PathError, PathExpr};
use crate::progress::ProgressReporter;

/// Identity of one session; handles carry it to detect cross-session use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub(crate) fn new() -> Self {
        SessionId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub struct VolumeSession {
    id: SessionId,
    codec: Arc<dyn VolumeCodec>,
    config: EngineConfig,
    root: FileNode,
    open: AtomicBool,
}

impl VolumeSession {
    /// Open a session over an already unlocked codec with default settings.
    pub fn new(codec: impl VolumeCodec + 'static) -> Result<Self, VolumeError> {
        Self::with_config(codec, EngineConfig::default())
    }

    pub fn with_config(
        codec: impl VolumeCodec + 'static,
        config: EngineConfig,
    ) -> Result<Self, VolumeError> {
        Self::from_shared(Arc::new(codec), config)
    }

    pub fn from_shared(
        codec: Arc<dyn VolumeCodec>,
        config: EngineConfig,
    ) -> Result<Self, VolumeError> {
        config.validate()?;
        let id = SessionId::new();
        let root_path = LogicalPath::root();
        let entry = codec
            .stat(&root_path)
            .map_err(|source| VolumeError::Open {
                path: root_path.clone(),
                source,
            })?
            .ok_or_else(|| VolumeError::NotFound {
                path: root_path.clone(),
            })?;
        if !entry.is_dir() {
            return Err(VolumeError::NotADirectory { path: root_path });
        }
        let root = FileNode::from_entry(id, root_path, &entry);
        info!(session = %id, "Volume session opened");
        Ok(VolumeSession {
            id,
            codec,
            config,
            root,
            open: AtomicBool::new(true),
        })
    }

    /// Derive the key from `password` and open a session on the result.
    #[instrument(level = "info", skip(unlocker, password))]
    pub fn unlock<U: VolumeUnlocker>(
        unlocker: &U,
        password: &SecretString,
    ) -> Result<Self, VolumeError> {
        Self::unlock_with_config(unlocker, password, EngineConfig::default())
    }

    #[instrument(level = "info", skip(unlocker, password, config))]
    pub fn unlock_with_config<U: VolumeUnlocker>(
        unlocker: &U,
        password: &SecretString,
        config: EngineConfig,
    ) -> Result<Self, VolumeError> {
        let codec = unlocker.unlock(password).map_err(VolumeError::Unlock)?;
        Self::with_config(codec, config)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handle to the volume root.
    pub fn root(&self) -> &FileNode {
        &self.root
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Close the session. Idempotent; every later call fails.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            info!(session = %self.id, "Volume session closed");
        }
    }

    fn ensure_open(&self) -> Result<(), VolumeError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(VolumeError::SessionClosed)
        }
    }

    pub(crate) fn check_handle(&self, node: &FileNode) -> Result<(), VolumeError> {
        self.ensure_open()?;
        if node.session_id() != self.id {
            return Err(VolumeError::ForeignHandle);
        }
        Ok(())
    }

    /// The codec's config file name may never be created, moved or copied to.
    fn check_target(&self, path: &LogicalPath) -> Result<(), VolumeError> {
        if path.file_name() == Some(self.codec.config_file_name()) {
            return Err(PathError::ReservedName {
                name: self.codec.config_file_name().to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn engine(&self) -> Engine<'_> {
        Engine::new(self.codec.as_ref(), &self.config, self.id)
    }

    /// Cursor positioned at the root.
    pub fn cursor(&self) -> Result<DirectoryCursor, VolumeError> {
        self.ensure_open()?;
        Ok(DirectoryCursor::at_root(self.root.clone()))
    }

    /// Lexically combine `base` and `expression`; see [`path::resolve`].
    pub fn resolve<'e>(
        &self,
        base: impl AsRef<LogicalPath>,
        expression: impl Into<PathExpr<'e>>,
    ) -> Result<LogicalPath, VolumeError> {
        self.ensure_open()?;
        Ok(path::resolve(base, expression)?)
    }

    #[instrument(level = "debug", skip(self), fields(path = %path))]
    pub fn lookup(&self, path: &LogicalPath) -> Result<FileNode, VolumeError> {
        self.ensure_open()?;
        self.engine().lookup(path)
    }

    pub fn path_exists(&self, path: &LogicalPath) -> Result<bool, VolumeError> {
        self.ensure_open()?;
        Ok(self.engine().stat(path)?.is_some())
    }

    /// Plaintext length of the file at `path`; 0 for directories.
    pub fn length(&self, path: &LogicalPath) -> Result<u64, VolumeError> {
        self.ensure_open()?;
        let entry = self.engine().require(path)?;
        Ok(if entry.is_dir() { 0 } else { entry.len })
    }

    /// Nodes in the tree at `path`, the node itself included.
    pub fn count_nodes(&self, path: &LogicalPath) -> Result<u64, VolumeError> {
        self.ensure_open()?;
        self.engine()
            .count_nodes(path)
            .map_err(|e| VolumeError::failed(format!("Unable to count entries under '{path}': {e}"), e))
    }

    pub fn list(&self, dir: &FileNode) -> Result<Listing, VolumeError> {
        self.check_handle(dir)?;
        if !dir.is_directory() {
            return Err(VolumeError::NotADirectory {
                path: dir.path().clone(),
            });
        }
        self.engine().list(dir)
    }

    pub fn list_path(&self, path: &LogicalPath) -> Result<Listing, VolumeError> {
        let dir = self.lookup(path)?;
        self.list(&dir)
    }

    pub fn create_file(&self, path: &LogicalPath) -> Result<FileNode, VolumeError> {
        self.ensure_open()?;
        self.check_target(path)?;
        self.engine().create_file(path)
    }

    pub fn make_dir(&self, path: &LogicalPath) -> Result<FileNode, VolumeError> {
        self.ensure_open()?;
        self.check_target(path)?;
        self.engine().make_dir(path)
    }

    /// Delete a file or directory. Without `recursive`, a directory must be
    /// empty. A failed recursive delete leaves already deleted entries gone.
    pub fn delete(
        &self,
        path: &LogicalPath,
        recursive: bool,
        progress: &dyn ProgressReporter,
    ) -> Result<DeleteStats, VolumeError> {
        self.ensure_open()?;
        self.engine().delete(path, recursive, progress)
    }

    /// Move `src` (with its subtree) to `dst`. Fails if `dst` exists.
    pub fn move_path(
        &self,
        src: &LogicalPath,
        dst: &LogicalPath,
        progress: &dyn ProgressReporter,
    ) -> Result<FileNode, VolumeError> {
        self.ensure_open()?;
        self.check_target(dst)?;
        self.engine().move_path(src, dst, progress)
    }

    /// Copy `src` to `dst`. Fails if `dst` exists; a failed tree copy leaves
    /// the partial destination in place.
    pub fn copy_path(
        &self,
        src: &LogicalPath,
        dst: &LogicalPath,
        progress: &dyn ProgressReporter,
    ) -> Result<TransferStats, VolumeError> {
        self.ensure_open()?;
        self.check_target(dst)?;
        self.engine().copy_path(src, dst, progress)
    }

    /// Give `node` a new name within its current directory.
    #[instrument(level = "info", skip(self, node, progress), fields(path = %node.path()))]
    pub fn rename(
        &self,
        node: &FileNode,
        new_name: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<FileNode, VolumeError> {
        self.check_handle(node)?;
        path::validate_name(new_name)?;
        let Some(parent) = node.path().parent() else {
            return Err(VolumeError::failed_plain(
                "Failed to rename '/': the volume root cannot be renamed",
            ));
        };
        let dst = parent.join_name(new_name)?;
        self.check_target(&dst)?;
        if self.engine().stat(&dst)?.is_some() {
            return Err(VolumeError::AlreadyExists { path: dst });
        }
        self.engine().move_path(node.path(), &dst, progress)
    }

    /// Complete the clipboard's pending cut or copy into `target_dir`.
    ///
    /// The clipboard is emptied before anything else happens, so it is clear
    /// afterwards whatever the outcome.
    pub fn paste(
        &self,
        clipboard: &mut Clipboard,
        target_dir: &FileNode,
        progress: &dyn ProgressReporter,
    ) -> Result<PasteOutcome, VolumeError> {
        let entry = clipboard.take().ok_or(VolumeError::ClipboardEmpty)?;
        self.paste_entry(entry, target_dir, progress)
    }

    /// Paste an entry already taken off a clipboard.
    ///
    /// A cut moves the source under its own name and fails on collision.
    /// A copy picks the first free name among `name`, `(Copy 1) name`,
    /// `(Copy 2) name`, ..., checking the volume before every guess.
    #[instrument(level = "info", skip(self, entry, target_dir, progress), fields(src = %entry.source.path(), dir = %target_dir.path(), mode = ?entry.mode))]
    pub fn paste_entry(
        &self,
        entry: PendingEntry,
        target_dir: &FileNode,
        progress: &dyn ProgressReporter,
    ) -> Result<PasteOutcome, VolumeError> {
        self.check_handle(&entry.source)?;
        self.check_handle(target_dir)?;
        if !target_dir.is_directory() {
            return Err(VolumeError::NotADirectory {
                path: target_dir.path().clone(),
            });
        }
        let name = entry.source.name();
        let mut dst = target_dir.path().join_name(name)?;
        self.check_target(&dst)?;
        let engine = self.engine();

        let node = match entry.mode {
            PasteMode::Cut => engine.move_path(entry.source.path(), &dst, progress)?,
            PasteMode::Copy => {
                let mut attempt = 0u32;
                while engine.stat(&dst)?.is_some() {
                    attempt += 1;
                    dst = target_dir.path().join_name(&copy_name(name, attempt))?;
                }
                if attempt > 0 {
                    debug!(%dst, attempt, "Resolved copy name collision");
                }
                engine.copy_path(entry.source.path(), &dst, progress)?;
                engine.lookup(&dst)?
            }
        };
        Ok(PasteOutcome {
            mode: entry.mode,
            node,
        })
    }

    /// Copy a host file or directory into the volume at `dst`.
    pub fn import(
        &self,
        local: &Path,
        dst: &LogicalPath,
        progress: &dyn ProgressReporter,
    ) -> Result<TransferStats, VolumeError> {
        self.ensure_open()?;
        self.check_target(dst)?;
        self.engine().import(local, dst, progress)
    }

    /// Copy a volume file or directory out to `local`, which must not exist.
    pub fn export(
        &self,
        src: &LogicalPath,
        local: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<TransferStats, VolumeError> {
        self.ensure_open()?;
        self.engine().export(src, local, progress)
    }

    /// Write an edited host copy back over the existing volume file `dst`.
    pub fn sync_file(
        &self,
        local: &Path,
        dst: &LogicalPath,
        progress: &dyn ProgressReporter,
    ) -> Result<u64, VolumeError> {
        self.ensure_open()?;
        self.engine().sync_file(local, dst, progress)
    }

    pub fn open_read(&self, path: &LogicalPath) -> Result<CodecReader, VolumeError> {
        self.ensure_open()?;
        self.codec
            .open_read(path)
            .map_err(|source| VolumeError::Open {
                path: path.clone(),
                source,
            })
    }

    pub fn open_write(
        &self,
        path: &LogicalPath,
        declared_len: u64,
    ) -> Result<Box<dyn CodecWriter>, VolumeError> {
        self.ensure_open()?;
        self.codec
            .open_write(path, declared_len)
            .map_err(|source| VolumeError::Open {
                path: path.clone(),
                source,
            })
    }
}
