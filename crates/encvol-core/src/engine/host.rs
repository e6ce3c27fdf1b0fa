//! Transfers between the volume and the host filesystem.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use super::stream::{PumpError, pump};
use super::{Engine, TransferStats, child_path, display_name};
use crate::codec::CodecError;
use crate::error::{FailureCause, VolumeError};
use crate::path::LogicalPath;
use crate::progress::ProgressReporter;

fn host_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

fn walk_cause(root: &Path, e: walkdir::Error) -> FailureCause {
    let path = e.path().unwrap_or(root).to_path_buf();
    FailureCause::host(path, io::Error::from(e))
}

/// Map a host path relative to the import root onto the volume.
fn logical_target(
    dst: &LogicalPath,
    relative: &Path,
    full: &Path,
) -> Result<LogicalPath, FailureCause> {
    let mut target = dst.clone();
    for component in relative.components() {
        let Component::Normal(segment) = component else {
            continue;
        };
        let Some(segment) = segment.to_str() else {
            return Err(FailureCause::host(
                full,
                io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
            ));
        };
        target = child_path(&target, segment)?;
    }
    Ok(target)
}

impl Engine<'_> {
    /// Host entries under `root` (root first), sorted by name, without
    /// following links or entering entries named like the config file.
    fn walk(&self, root: &Path) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> {
        let reserved = self.codec.config_file_name().to_string();
        WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                entry.depth() == 0 || entry.file_name() != reserved.as_str()
            })
    }

    /// Copy a host file or directory tree into the volume at `dst`.
    ///
    /// Directory imports report nodes; single files report bytes. Symlinks
    /// and other special files are skipped, as are host entries carrying the
    /// codec's config file name.
    #[instrument(level = "info", skip(self, progress), fields(local = %local.display(), dst = %dst))]
    pub(crate) fn import(
        &self,
        local: &Path,
        dst: &LogicalPath,
        progress: &dyn ProgressReporter,
    ) -> Result<TransferStats, VolumeError> {
        let name = host_name(local);
        let fail = |cause: FailureCause| {
            VolumeError::failed(format!("Failed to import '{name}': {cause}"), cause)
        };
        let metadata = fs::metadata(local).map_err(|e| fail(FailureCause::host(local, e)))?;
        let mut stats = TransferStats::default();

        if !metadata.is_dir() {
            progress.set_bound(metadata.len());
            self.codec.create_file(dst).map_err(|e| fail(e.into()))?;
            stats.bytes = self
                .import_file(local, dst, metadata.len(), Some(progress))
                .map_err(fail)?;
            stats.files = 1;
            info!(bytes = stats.bytes, "Imported file");
            return Ok(stats);
        }

        let mut total = 0u64;
        for entry in self.walk(local) {
            entry.map_err(|e| fail(walk_cause(local, e)))?;
            total += 1;
        }
        progress.set_bound(total);
        debug!(total, "Counted host nodes for import");

        self.codec.make_dir(dst).map_err(|e| fail(e.into()))?;
        stats.directories += 1;
        progress.advance(1);

        if let Err(cause) = self.import_tree(local, dst, progress, &mut stats) {
            warn!(
                files = stats.files,
                directories = stats.directories,
                error = %cause,
                "Import aborted, partial import left in place"
            );
            return Err(fail(cause));
        }
        info!(files = stats.files, directories = stats.directories, bytes = stats.bytes, "Imported tree");
        Ok(stats)
    }

    fn import_tree(
        &self,
        local: &Path,
        dst: &LogicalPath,
        progress: &dyn ProgressReporter,
        stats: &mut TransferStats,
    ) -> Result<(), FailureCause> {
        for entry in self.walk(local).skip(1) {
            let entry = entry.map_err(|e| walk_cause(local, e))?;
            let relative = entry
                .path()
                .strip_prefix(local)
                .map_err(|e| FailureCause::host(entry.path(), io::Error::other(e)))?;
            let target = logical_target(dst, relative, entry.path())?;
            let file_type = entry.file_type();

            if file_type.is_dir() {
                self.codec.make_dir(&target)?;
                stats.directories += 1;
            } else if file_type.is_file() {
                let len = entry
                    .metadata()
                    .map_err(|e| walk_cause(local, e))?
                    .len();
                self.codec.create_file(&target)?;
                stats.bytes += self.import_file(entry.path(), &target, len, None)?;
                stats.files += 1;
            } else {
                warn!(path = %entry.path().display(), "Skipping special file during import");
            }
            progress.advance(1);
        }
        Ok(())
    }

    /// Replace the content of existing volume file `dst` with host file `local`.
    fn import_file(
        &self,
        local: &Path,
        dst: &LogicalPath,
        len: u64,
        progress: Option<&dyn ProgressReporter>,
    ) -> Result<u64, FailureCause> {
        let mut file = File::open(local).map_err(|e| FailureCause::host(local, e))?;
        let mut writer = self.codec.open_write(dst, len)?;
        let copied = pump(&mut file, &mut writer, self.config.copy_buffer_size, progress)
            .map_err(|e| match e {
                PumpError::Read(e) => FailureCause::host(local, e),
                PumpError::Write(e) => CodecError::Io(e).into(),
            })?;
        writer.finish()?;
        Ok(copied)
    }

    /// Copy a volume file or tree out to the host path `local`.
    ///
    /// Never overwrites: an existing `local` fails the operation before any
    /// I/O.
    #[instrument(level = "info", skip(self, progress), fields(src = %src, local = %local.display()))]
    pub(crate) fn export(
        &self,
        src: &LogicalPath,
        local: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<TransferStats, VolumeError> {
        let name = display_name(src);
        let entry = self.require(src)?;
        if fs::symlink_metadata(local).is_ok() {
            return Err(VolumeError::failed_plain(format!(
                "File '{}' already exists",
                local.display()
            )));
        }

        let fail = |cause: FailureCause| {
            VolumeError::failed(format!("Failed to export '{name}': {cause}"), cause)
        };
        let mut stats = TransferStats::default();

        if entry.is_file() {
            progress.set_bound(entry.len);
            stats.bytes = self
                .export_file(src, local, Some(progress))
                .map_err(fail)?;
            stats.files = 1;
            info!(bytes = stats.bytes, "Exported file");
            return Ok(stats);
        }

        let total = self.count_nodes(src).map_err(|e| fail(e.into()))?;
        progress.set_bound(total);
        fs::create_dir(local).map_err(|e| fail(FailureCause::host(local, e)))?;
        stats.directories += 1;
        progress.advance(1);

        if let Err(cause) = self.export_tree(src, local, progress, &mut stats) {
            warn!(
                files = stats.files,
                directories = stats.directories,
                error = %cause,
                "Export aborted, partial export left in place"
            );
            return Err(fail(cause));
        }
        info!(files = stats.files, directories = stats.directories, bytes = stats.bytes, "Exported tree");
        Ok(stats)
    }

    fn export_tree(
        &self,
        src: &LogicalPath,
        local: &Path,
        progress: &dyn ProgressReporter,
        stats: &mut TransferStats,
    ) -> Result<(), FailureCause> {
        for child in self.codec.list_children(src)? {
            if self.is_reserved(&child.name) {
                continue;
            }
            let from = child_path(src, &child.name)?;
            let to = local.join(&child.name);
            if child.is_dir() {
                fs::create_dir(&to).map_err(|e| FailureCause::host(&to, e))?;
                stats.directories += 1;
                progress.advance(1);
                self.export_tree(&from, &to, progress, stats)?;
            } else {
                stats.bytes += self.export_file(&from, &to, None)?;
                stats.files += 1;
                progress.advance(1);
            }
        }
        Ok(())
    }

    fn export_file(
        &self,
        src: &LogicalPath,
        local: &Path,
        progress: Option<&dyn ProgressReporter>,
    ) -> Result<u64, FailureCause> {
        let mut reader = self.codec.open_read(src)?;
        let mut file = File::create_new(local).map_err(|e| FailureCause::host(local, e))?;
        let copied = pump(&mut reader, &mut file, self.config.copy_buffer_size, progress)
            .map_err(|e| match e {
                PumpError::Read(e) => CodecError::Io(e).into(),
                PumpError::Write(e) => FailureCause::host(local, e),
            })?;
        Ok(copied)
    }

    /// Write an edited host copy back over the existing volume file `dst`.
    #[instrument(level = "info", skip(self, progress), fields(local = %local.display(), dst = %dst))]
    pub(crate) fn sync_file(
        &self,
        local: &Path,
        dst: &LogicalPath,
        progress: &dyn ProgressReporter,
    ) -> Result<u64, VolumeError> {
        let name = display_name(dst);
        let entry = self.require(dst)?;
        if entry.is_dir() {
            return Err(VolumeError::failed_plain(format!(
                "Failed to sync '{name}': '{dst}' is a folder"
            )));
        }
        let fail = |cause: FailureCause| {
            VolumeError::failed(format!("Failed to sync '{name}': {cause}"), cause)
        };
        let len = fs::metadata(local)
            .map_err(|e| fail(FailureCause::host(local, e)))?
            .len();
        progress.set_bound(len);
        let written = self
            .import_file(local, dst, len, Some(progress))
            .map_err(fail)?;
        info!(bytes = written, "Synced host copy back into volume");
        Ok(written)
    }
}
