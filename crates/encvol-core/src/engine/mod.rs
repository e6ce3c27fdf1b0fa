//! Volume operations on validated logical paths.
//!
//! The engine sits between [`VolumeSession`](crate::session::VolumeSession)
//! (which validates handles, names and session state) and the
//! [`VolumeCodec`]. Recursive operations:
//!
//! - pre-count the tree (root included) and announce it as the progress bound,
//! - visit children in the order the codec lists them,
//! - stop at the first failure and leave already-completed work in place.
//!
//! The codec's config file is skipped everywhere: it is neither counted,
//! copied nor exported. Recursive delete removes it along with its directory
//! so the directory itself can go.

mod host;
pub(crate) mod stream;

use std::io;
use tracing::{debug, info, instrument, warn};

use crate::codec::{CodecEntry, CodecError, VolumeCodec};
use crate::config::EngineConfig;
use crate::cursor::Listing;
use crate::error::{FailureCause, VolumeError};
use crate::node::FileNode;
use crate::path::LogicalPath;
use crate::progress::ProgressReporter;
use crate::session::SessionId;

use stream::{PumpError, pump};

/// Statistics returned from delete operations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeleteStats {
    pub files_deleted: usize,
    pub directories_deleted: usize,
}

impl DeleteStats {
    pub fn total(&self) -> usize {
        self.files_deleted + self.directories_deleted
    }
}

/// Statistics returned from copy, import and export.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransferStats {
    pub files: u64,
    pub directories: u64,
    /// Plaintext bytes streamed.
    pub bytes: u64,
}

/// Name used in user-facing messages: the final segment, or `/` for the root.
pub(crate) fn display_name(path: &LogicalPath) -> &str {
    path.file_name().unwrap_or("/")
}

fn child_path(parent: &LogicalPath, name: &str) -> Result<LogicalPath, CodecError> {
    parent
        .join_name(name)
        .map_err(|e| CodecError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

fn codec_pump_error(e: PumpError) -> CodecError {
    match e {
        PumpError::Read(e) | PumpError::Write(e) => CodecError::Io(e),
    }
}

pub(crate) struct Engine<'a> {
    codec: &'a dyn VolumeCodec,
    config: &'a EngineConfig,
    session: SessionId,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(codec: &'a dyn VolumeCodec, config: &'a EngineConfig, session: SessionId) -> Self {
        Engine {
            codec,
            config,
            session,
        }
    }

    fn is_reserved(&self, name: &str) -> bool {
        name == self.codec.config_file_name()
    }

    fn node(&self, path: LogicalPath, entry: &CodecEntry) -> FileNode {
        FileNode::from_entry(self.session, path, entry)
    }

    pub(crate) fn stat(&self, path: &LogicalPath) -> Result<Option<CodecEntry>, VolumeError> {
        self.codec
            .stat(path)
            .map_err(|e| VolumeError::lookup(path, e))
    }

    pub(crate) fn require(&self, path: &LogicalPath) -> Result<CodecEntry, VolumeError> {
        self.stat(path)?
            .ok_or_else(|| VolumeError::NotFound { path: path.clone() })
    }

    pub(crate) fn lookup(&self, path: &LogicalPath) -> Result<FileNode, VolumeError> {
        let entry = self.require(path)?;
        Ok(self.node(path.clone(), &entry))
    }

    #[instrument(level = "debug", skip(self, dir), fields(dir = %dir.path()))]
    pub(crate) fn list(&self, dir: &FileNode) -> Result<Listing, VolumeError> {
        let entries = self
            .codec
            .list_children(dir.path())
            .map_err(|source| VolumeError::List {
                path: dir.path().clone(),
                source,
            })?;

        let mut children = Vec::with_capacity(entries.len());
        for entry in &entries {
            let path = child_path(dir.path(), &entry.name).map_err(|source| VolumeError::List {
                path: dir.path().clone(),
                source,
            })?;
            children.push(self.node(path, entry));
        }

        let listing = Listing::build(
            dir.clone(),
            children,
            self.codec.config_file_name(),
            self.config.listing_order,
        );
        debug!(entry_count = listing.len(), "Listed directory");
        Ok(listing)
    }

    /// Number of nodes in the tree at `path`, the node itself included.
    pub(crate) fn count_nodes(&self, path: &LogicalPath) -> Result<u64, CodecError> {
        let Some(entry) = self.codec.stat(path)? else {
            return Err(CodecError::NotFound { path: path.clone() });
        };
        if entry.is_file() {
            return Ok(1);
        }
        self.count_subtree(path)
    }

    fn count_subtree(&self, dir: &LogicalPath) -> Result<u64, CodecError> {
        let mut total = 1;
        for child in self.codec.list_children(dir)? {
            if self.is_reserved(&child.name) {
                continue;
            }
            total += if child.is_dir() {
                self.count_subtree(&child_path(dir, &child.name)?)?
            } else {
                1
            };
        }
        Ok(total)
    }

    #[instrument(level = "info", skip(self), fields(path = %path))]
    pub(crate) fn create_file(&self, path: &LogicalPath) -> Result<FileNode, VolumeError> {
        let Some(parent) = path.parent() else {
            return Err(VolumeError::AlreadyExists { path: path.clone() });
        };
        match self.stat(&parent)? {
            Some(entry) if entry.is_dir() => {}
            _ => return Err(VolumeError::ParentNotFound { path: path.clone() }),
        }
        if self.stat(path)?.is_some() {
            return Err(VolumeError::AlreadyExists { path: path.clone() });
        }

        let entry = self.codec.create_file(path).map_err(|e| {
            VolumeError::failed(
                format!("Unable to create file '{}': {e}", display_name(path)),
                e,
            )
        })?;
        info!("File created");
        Ok(self.node(path.clone(), &entry))
    }

    #[instrument(level = "info", skip(self), fields(path = %path))]
    pub(crate) fn make_dir(&self, path: &LogicalPath) -> Result<FileNode, VolumeError> {
        let entry = self.codec.make_dir(path).map_err(|e| {
            VolumeError::failed(
                format!("Unable to create folder '{}': {e}", display_name(path)),
                e,
            )
        })?;
        info!("Folder created");
        Ok(self.node(path.clone(), &entry))
    }

    /// Delete a file, an empty directory, or (with `recursive`) a whole tree.
    ///
    /// A failing recursive delete aborts at the first error. Partial
    /// deletions may occur; nothing is restored.
    #[instrument(level = "info", skip(self, progress), fields(path = %path))]
    pub(crate) fn delete(
        &self,
        path: &LogicalPath,
        recursive: bool,
        progress: &dyn ProgressReporter,
    ) -> Result<DeleteStats, VolumeError> {
        let name = display_name(path);
        if path.is_root() {
            return Err(VolumeError::failed_plain(
                "Failed to delete '/': the volume root cannot be deleted",
            ));
        }
        let entry = self.require(path)?;
        let fail = |cause: FailureCause| {
            VolumeError::failed(format!("Failed to delete '{name}': {cause}"), cause)
        };
        let mut stats = DeleteStats::default();

        if entry.is_file() || !recursive {
            progress.set_bound(1);
            self.codec.delete(path).map_err(|e| fail(e.into()))?;
            if entry.is_file() {
                stats.files_deleted = 1;
            } else {
                stats.directories_deleted = 1;
            }
            progress.advance(1);
            info!("Deleted");
            return Ok(stats);
        }

        let total = self.count_nodes(path).map_err(|e| fail(e.into()))?;
        progress.set_bound(total);
        debug!(total, "Counted nodes for recursive delete");

        if let Err(cause) = self.delete_tree(path, progress, &mut stats) {
            warn!(
                files_deleted = stats.files_deleted,
                directories_deleted = stats.directories_deleted,
                error = %cause,
                "Recursive delete aborted, already deleted entries stay deleted"
            );
            return Err(fail(cause));
        }

        info!(
            files_deleted = stats.files_deleted,
            directories_deleted = stats.directories_deleted,
            "Recursive delete complete"
        );
        Ok(stats)
    }

    /// Post-order: children first, then the directory itself.
    fn delete_tree(
        &self,
        dir: &LogicalPath,
        progress: &dyn ProgressReporter,
        stats: &mut DeleteStats,
    ) -> Result<(), FailureCause> {
        for child in self.codec.list_children(dir)? {
            let path = child_path(dir, &child.name)?;
            if child.is_dir() {
                self.delete_tree(&path, progress, stats)?;
            } else {
                self.codec.delete(&path)?;
                // Removed with its directory but not counted
                if !self.is_reserved(&child.name) {
                    stats.files_deleted += 1;
                    progress.advance(1);
                }
            }
        }
        self.codec.delete(dir)?;
        stats.directories_deleted += 1;
        progress.advance(1);
        Ok(())
    }

    /// Reject moves/copies onto themselves or into their own subtree.
    fn check_relocation(
        verb: &str,
        src: &LogicalPath,
        dst: &LogicalPath,
    ) -> Result<(), VolumeError> {
        let name = display_name(src);
        let target_dir = dst.parent().unwrap_or_else(LogicalPath::root);
        if src.is_root() {
            return Err(VolumeError::failed_plain(format!(
                "Failed to {verb} '/': the volume root cannot be relocated"
            )));
        }
        if src == dst {
            return Err(VolumeError::failed_plain(format!(
                "Failed to {verb} '{name}' to '{target_dir}': source and destination are the same"
            )));
        }
        if dst.is_within(src) {
            return Err(VolumeError::failed_plain(format!(
                "Failed to {verb} '{name}' to '{target_dir}': a folder cannot be placed inside itself"
            )));
        }
        Ok(())
    }

    #[instrument(level = "info", skip(self, progress), fields(src = %src, dst = %dst))]
    pub(crate) fn move_path(
        &self,
        src: &LogicalPath,
        dst: &LogicalPath,
        progress: &dyn ProgressReporter,
    ) -> Result<FileNode, VolumeError> {
        Self::check_relocation("move", src, dst)?;
        let name = display_name(src);
        let target_dir = dst.parent().unwrap_or_else(LogicalPath::root);

        self.require(src)?;
        if self.stat(dst)?.is_some() {
            return Err(VolumeError::failed_plain(format!(
                "Failed to move '{name}' to '{target_dir}': '{dst}' already exists"
            )));
        }

        progress.set_bound(1);
        self.codec.rename(src, dst).map_err(|e| {
            VolumeError::failed(
                format!("Failed to move '{name}' to '{target_dir}': {e}"),
                e,
            )
        })?;
        progress.advance(1);
        info!("Moved");
        self.lookup(dst)
    }

    /// Copy a file or directory tree to `dst`, which must not exist.
    ///
    /// Directory copies report nodes; file copies report bytes.
    #[instrument(level = "info", skip(self, progress), fields(src = %src, dst = %dst))]
    pub(crate) fn copy_path(
        &self,
        src: &LogicalPath,
        dst: &LogicalPath,
        progress: &dyn ProgressReporter,
    ) -> Result<TransferStats, VolumeError> {
        Self::check_relocation("copy", src, dst)?;
        let name = display_name(src);
        let target_dir = dst.parent().unwrap_or_else(LogicalPath::root);

        let entry = self.require(src)?;
        if self.stat(dst)?.is_some() {
            return Err(VolumeError::failed_plain(format!(
                "Failed to copy '{name}' to '{target_dir}': '{dst}' already exists"
            )));
        }

        let fail = |cause: FailureCause| {
            VolumeError::failed(
                format!("Failed to copy '{name}' to '{target_dir}': {cause}"),
                cause,
            )
        };
        let mut stats = TransferStats::default();

        if entry.is_dir() {
            let total = self.count_nodes(src).map_err(|e| fail(e.into()))?;
            progress.set_bound(total);
            self.codec.make_dir(dst).map_err(|e| fail(e.into()))?;
            stats.directories += 1;
            progress.advance(1);
            if let Err(cause) = self.copy_children(src, dst, progress, &mut stats) {
                warn!(
                    files = stats.files,
                    directories = stats.directories,
                    error = %cause,
                    "Recursive copy aborted, partial copy left in place"
                );
                return Err(fail(cause));
            }
        } else {
            progress.set_bound(entry.len);
            stats.bytes = self
                .copy_file(src, dst, entry.len, Some(progress))
                .map_err(|e| fail(e.into()))?;
            stats.files = 1;
        }

        info!(files = stats.files, directories = stats.directories, bytes = stats.bytes, "Copied");
        Ok(stats)
    }

    fn copy_children(
        &self,
        src_dir: &LogicalPath,
        dst_dir: &LogicalPath,
        progress: &dyn ProgressReporter,
        stats: &mut TransferStats,
    ) -> Result<(), FailureCause> {
        for child in self.codec.list_children(src_dir)? {
            if self.is_reserved(&child.name) {
                continue;
            }
            let from = child_path(src_dir, &child.name)?;
            let to = child_path(dst_dir, &child.name)?;
            if child.is_dir() {
                self.codec.make_dir(&to)?;
                stats.directories += 1;
                progress.advance(1);
                self.copy_children(&from, &to, progress, stats)?;
            } else {
                stats.bytes += self.copy_file(&from, &to, child.len, None)?;
                stats.files += 1;
                progress.advance(1);
            }
        }
        Ok(())
    }

    /// Stream one file's plaintext into a newly created `dst`.
    fn copy_file(
        &self,
        src: &LogicalPath,
        dst: &LogicalPath,
        len: u64,
        progress: Option<&dyn ProgressReporter>,
    ) -> Result<u64, CodecError> {
        let mut reader = self.codec.open_read(src)?;
        self.codec.create_file(dst)?;
        let mut writer = self.codec.open_write(dst, len)?;
        let copied = pump(
            &mut reader,
            &mut writer,
            self.config.copy_buffer_size,
            progress,
        )
        .map_err(codec_pump_error)?;
        writer.finish()?;
        Ok(copied)
    }
}
