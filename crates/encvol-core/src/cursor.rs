//! Directory navigation and listings.
//!
//! [`DirectoryCursor`] is a value: descending or ascending returns a new
//! cursor and leaves the old one untouched, so callers can keep history
//! without sharing mutable state. The ancestor stack always reconstructs the
//! path from the root down to the current directory.

use crate::config::ListingOrder;
use crate::error::VolumeError;
use crate::node::FileNode;
use crate::path::PathError;

/// Result of [`DirectoryCursor::ascend`].
#[derive(Debug, Clone)]
pub enum Ascent {
    /// Moved to the parent directory.
    Parent(DirectoryCursor),
    /// Already at the volume root; the caller should leave the volume view.
    AtRootBoundary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryCursor {
    current: FileNode,
    ancestors: Vec<FileNode>,
}

impl DirectoryCursor {
    pub(crate) fn at_root(root: FileNode) -> Self {
        DirectoryCursor {
            current: root,
            ancestors: Vec::new(),
        }
    }

    pub fn current(&self) -> &FileNode {
        &self.current
    }

    /// Ancestors from the root down to the parent of the current directory.
    pub fn ancestors(&self) -> &[FileNode] {
        &self.ancestors
    }

    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    pub fn is_at_root(&self) -> bool {
        self.current.is_root()
    }

    /// Enter `dir`, which must be a directory directly inside the current one.
    pub fn descend(&self, dir: &FileNode) -> Result<Self, VolumeError> {
        if !dir.is_directory() {
            return Err(VolumeError::NotADirectory {
                path: dir.path().clone(),
            });
        }
        if dir.session_id() != self.current.session_id() {
            return Err(VolumeError::ForeignHandle);
        }
        if dir.path().parent().as_ref() != Some(self.current.path()) {
            return Err(PathError::NotAChild {
                path: dir.path().to_string(),
                parent: self.current.path().to_string(),
            }
            .into());
        }

        let mut ancestors = self.ancestors.clone();
        ancestors.push(self.current.clone());
        Ok(DirectoryCursor {
            current: dir.clone(),
            ancestors,
        })
    }

    pub fn ascend(&self) -> Ascent {
        if self.is_at_root() {
            return Ascent::AtRootBoundary;
        }
        let mut ancestors = self.ancestors.clone();
        match ancestors.pop() {
            Some(parent) => Ascent::Parent(DirectoryCursor {
                current: parent,
                ancestors,
            }),
            None => Ascent::AtRootBoundary,
        }
    }
}

/// One row of a [`Listing`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    node: FileNode,
}

impl ListingItem {
    pub fn name(&self) -> &str {
        self.node.name()
    }

    pub fn is_directory(&self) -> bool {
        self.node.is_directory()
    }

    /// File size in bytes; 0 for directories.
    pub fn size(&self) -> u64 {
        self.node.len()
    }

    pub fn node(&self) -> &FileNode {
        &self.node
    }

    pub fn into_node(self) -> FileNode {
        self.node
    }
}

/// Contents of one directory: subdirectories first, then files, each group
/// sorted by name. The codec's config file never appears.
#[derive(Debug, Clone)]
pub struct Listing {
    directory: FileNode,
    items: Vec<ListingItem>,
    directory_count: usize,
}

impl Listing {
    pub(crate) fn build(
        directory: FileNode,
        children: Vec<FileNode>,
        reserved_name: &str,
        order: ListingOrder,
    ) -> Self {
        let (mut dirs, mut files): (Vec<FileNode>, Vec<FileNode>) = children
            .into_iter()
            .filter(|node| node.name() != reserved_name)
            .partition(FileNode::is_directory);

        dirs.sort_by(|a, b| order.compare(a.name(), b.name()));
        files.sort_by(|a, b| order.compare(a.name(), b.name()));

        let directory_count = dirs.len();
        let items = dirs
            .into_iter()
            .chain(files)
            .map(|node| ListingItem { node })
            .collect();
        Listing {
            directory,
            items,
            directory_count,
        }
    }

    /// The directory that was listed.
    pub fn directory(&self) -> &FileNode {
        &self.directory
    }

    pub fn items(&self) -> &[ListingItem] {
        &self.items
    }

    pub fn directories(&self) -> &[ListingItem] {
        &self.items[..self.directory_count]
    }

    pub fn files(&self) -> &[ListingItem] {
        &self.items[self.directory_count..]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(ListingItem::name).collect()
    }

    pub fn find(&self, name: &str) -> Option<&ListingItem> {
        self.items.iter().find(|item| item.name() == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ListingItem> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a Listing {
    type Item = &'a ListingItem;
    type IntoIter = std::slice::Iter<'a, ListingItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl IntoIterator for Listing {
    type Item = ListingItem;
    type IntoIter = std::vec::IntoIter<ListingItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
