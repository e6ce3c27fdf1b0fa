//! Cut/copy/paste state.
//!
//! The clipboard holds at most one pending entry. Marking a new entry
//! replaces the previous one, and pasting consumes the entry whether or not
//! the paste succeeds (see [`VolumeSession::paste`](crate::session::VolumeSession::paste)).

use crate::node::FileNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteMode {
    /// Paste moves the entry.
    Cut,
    /// Paste duplicates the entry, renaming on collision.
    Copy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub source: FileNode,
    pub mode: PasteMode,
}

#[derive(Debug, Default, Clone)]
pub struct Clipboard {
    pending: Option<PendingEntry>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cut(&mut self, node: FileNode) {
        self.pending = Some(PendingEntry {
            source: node,
            mode: PasteMode::Cut,
        });
    }

    pub fn copy(&mut self, node: FileNode) {
        self.pending = Some(PendingEntry {
            source: node,
            mode: PasteMode::Copy,
        });
    }

    pub fn pending(&self) -> Option<&PendingEntry> {
        self.pending.as_ref()
    }

    /// `None` when nothing is marked.
    pub fn mode(&self) -> Option<PasteMode> {
        self.pending.as_ref().map(|entry| entry.mode)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }

    pub fn take(&mut self) -> Option<PendingEntry> {
        self.pending.take()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}

/// What a successful paste produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteOutcome {
    pub mode: PasteMode,
    /// The moved node, or the newly created copy.
    pub node: FileNode,
}

/// Candidate name for the `attempt`-th copy of `name` in the same directory.
pub fn copy_name(name: &str, attempt: u32) -> String {
    format!("(Copy {attempt}) {name}")
}
