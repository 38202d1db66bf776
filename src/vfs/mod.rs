//! Read-only filesystem operations over the published snapshot.
//!
//! Every call loads the current [`MailboxIndex`] once and answers entirely
//! from it. A refresh that publishes in the middle of a call (or of a
//! directory listing) does not affect that call.

pub mod fuse;

use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{MailFsError, Result};
use crate::index::snapshot::{MailboxIndex, SnapshotHolder};
use crate::index::tree::{InodeKind, InodeNode};

/// Permission bits for directories: listable and traversable.
pub const DIR_PERM: u16 = 0o555;

/// Permission bits for files: readable only.
pub const FILE_PERM: u16 = 0o444;

/// Kind of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Directory,
    File,
}

/// Attributes of one inode, independent of any host wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes {
    pub ino: u64,
    pub kind: NodeType,
    pub perm: u16,
    /// Content length for files, 0 for directories.
    pub size: u64,
    /// Message timestamp (seconds) for files, 0 for directories; used for
    /// atime, mtime, and ctime alike.
    pub mtime: i64,
    /// Generation of the snapshot the attributes were taken from.
    pub generation: u64,
}

impl Attributes {
    fn of(node: &InodeNode, generation: u64) -> Self {
        match &node.kind {
            InodeKind::Directory { .. } => Self {
                ino: node.id,
                kind: NodeType::Directory,
                perm: DIR_PERM,
                size: 0,
                mtime: 0,
                generation,
            },
            InodeKind::File { meta } => Self {
                ino: node.id,
                kind: NodeType::File,
                perm: FILE_PERM,
                size: meta.size(),
                mtime: meta.timestamp,
                generation,
            },
        }
    }
}

/// One item of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub attr: Attributes,
    /// Offset to pass to [`VfsOperations::read_directory`] to continue after
    /// this entry.
    pub next_offset: u64,
}

/// Lazy listing of one directory of one snapshot.
///
/// Holds the snapshot alive, so offsets stay meaningful for as long as the
/// iterator exists even if a newer snapshot is published meanwhile.
#[derive(Debug)]
pub struct DirEntries {
    snapshot: Arc<MailboxIndex>,
    dir: u64,
    pos: usize,
}

impl DirEntries {
    /// Id of the listed directory's parent; the root is its own parent.
    pub fn parent(&self) -> u64 {
        self.snapshot.tree.get(self.dir).map_or(self.dir, |node| node.parent)
    }

    /// Generation of the snapshot being listed.
    pub fn generation(&self) -> u64 {
        self.snapshot.generation
    }
}

impl Iterator for DirEntries {
    type Item = DirEntry;

    fn next(&mut self) -> Option<DirEntry> {
        let tree = &self.snapshot.tree;
        let child_id = *tree.get(self.dir)?.children()?.get(self.pos)?;
        let child = tree.get(child_id)?;
        self.pos += 1;
        Some(DirEntry {
            name: child.name.clone(),
            attr: Attributes::of(child, self.snapshot.generation),
            next_offset: self.pos as u64,
        })
    }
}

/// The read-only operation surface consumed by the host filesystem framework.
#[derive(Debug, Clone)]
pub struct VfsOperations {
    holder: Arc<SnapshotHolder>,
}

impl VfsOperations {
    pub fn new(holder: Arc<SnapshotHolder>) -> Self {
        Self { holder }
    }

    /// The snapshot a new operation would run against.
    pub fn snapshot(&self) -> Arc<MailboxIndex> {
        self.holder.load()
    }

    /// Attributes of inode `id`.
    pub fn get_attributes(&self, id: u64) -> Result<Attributes> {
        let snapshot = self.snapshot();
        let node = snapshot.tree.get(id).ok_or(MailFsError::NotFound(id))?;
        Ok(Attributes::of(node, snapshot.generation))
    }

    /// Attributes of the child `name` of directory `parent`.
    pub fn lookup(&self, parent: u64, name: &str) -> Result<Attributes> {
        trace!(parent, name, "Lookup");
        let snapshot = self.snapshot();
        let child = snapshot
            .tree
            .child(parent, name)
            .ok_or(MailFsError::NotFound(parent))?;
        Ok(Attributes::of(child, snapshot.generation))
    }

    /// Check that `id` is a directory and hand back a listing handle.
    ///
    /// Directories are stateless to open: the handle is the inode id.
    pub fn open_directory(&self, id: u64) -> Result<u64> {
        let snapshot = self.snapshot();
        let node = snapshot.tree.get(id).ok_or(MailFsError::NotFound(id))?;
        if !node.is_dir() {
            return Err(MailFsError::NotADirectory(id));
        }
        debug!(inode = id, name = %node.name, "Opened directory");
        Ok(id)
    }

    /// List directory `id` starting at child position `offset`.
    ///
    /// Offsets past the end yield an empty listing.
    pub fn read_directory(&self, id: u64, offset: u64) -> Result<DirEntries> {
        let snapshot = self.snapshot();
        let node = snapshot.tree.get(id).ok_or(MailFsError::NotFound(id))?;
        if !node.is_dir() {
            return Err(MailFsError::NotADirectory(id));
        }
        Ok(DirEntries {
            snapshot,
            dir: id,
            pos: usize::try_from(offset).unwrap_or(usize::MAX),
        })
    }

    /// Open file `id` with the given `open(2)` flags.
    ///
    /// Any write access mode is refused. The returned handle is the inode id.
    pub fn open_file(&self, id: u64, flags: i32) -> Result<u64> {
        let snapshot = self.snapshot();
        let node = snapshot
            .tree
            .get(id)
            .filter(|node| !node.is_dir())
            .ok_or(MailFsError::NotFound(id))?;
        if flags & libc::O_ACCMODE != libc::O_RDONLY {
            return Err(MailFsError::WriteNotPermitted(id));
        }
        debug!(inode = id, name = %node.name, "Opened file");
        Ok(id)
    }

    /// Up to `max_len` bytes of file `id` starting at `offset`.
    ///
    /// Reading at or past the end returns an empty buffer.
    pub fn read(&self, id: u64, offset: u64, max_len: u32) -> Result<Vec<u8>> {
        let snapshot = self.snapshot();
        let meta = snapshot
            .tree
            .get(id)
            .and_then(InodeNode::meta)
            .ok_or(MailFsError::NotFound(id))?;

        let content = &meta.content;
        let start = usize::try_from(offset).map_or(content.len(), |o| o.min(content.len()));
        let end = start.saturating_add(max_len as usize).min(content.len());
        trace!(inode = id, offset, len = end - start, "Read file");
        Ok(content[start..end].to_vec())
    }
}
