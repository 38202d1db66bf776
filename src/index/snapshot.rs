//! Immutable mailbox snapshots and the holder that publishes them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::index::object::ObjectIndex;
use crate::index::tree::InodeTree;
use crate::model::mail::MailMetadata;

/// Everything one refresh produced: the grouped metadata and its inode tree.
///
/// Never mutated after construction. Readers hold an `Arc` to it for the
/// whole of an operation, so a concurrent publish cannot change what they see.
#[derive(Debug)]
pub struct MailboxIndex {
    /// Incremented on every publish; reported as the FUSE entry generation.
    pub generation: u64,
    pub objects: ObjectIndex,
    pub tree: InodeTree,
}

impl MailboxIndex {
    /// Index `messages` and number the resulting tree.
    pub fn build(messages: Vec<MailMetadata>, generation: u64) -> Self {
        let objects = ObjectIndex::build(messages);
        let tree = InodeTree::build(&objects);
        Self {
            generation,
            objects,
            tree,
        }
    }

    /// A snapshot with no messages: the root and two empty directories.
    pub fn empty() -> Self {
        Self::build(Vec::new(), 0)
    }

    pub fn message_count(&self) -> usize {
        self.objects.len()
    }
}

/// Owner of the currently published [`MailboxIndex`].
///
/// The lock only guards the pointer: readers clone the `Arc` and release it
/// immediately, and [`publish`](Self::publish) swaps in a fully built
/// snapshot in one store.
#[derive(Debug)]
pub struct SnapshotHolder {
    current: RwLock<Arc<MailboxIndex>>,
    generation: AtomicU64,
}

impl SnapshotHolder {
    /// Start with the empty snapshot (generation 0).
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(MailboxIndex::empty())),
            generation: AtomicU64::new(0),
        }
    }

    /// The snapshot to answer a query with.
    pub fn load(&self) -> Arc<MailboxIndex> {
        Arc::clone(&*self.current.read())
    }

    /// Generation number for the next snapshot to be built.
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Replace the current snapshot. Returns the one it superseded, which
    /// stays alive until its last in-flight reader drops it.
    pub fn publish(&self, index: MailboxIndex) -> Arc<MailboxIndex> {
        let next = Arc::new(index);
        info!(
            generation = next.generation,
            messages = next.message_count(),
            inodes = next.tree.len(),
            "Publishing mailbox snapshot"
        );
        std::mem::replace(&mut *self.current.write(), next)
    }
}

impl Default for SnapshotHolder {
    fn default() -> Self {
        Self::new()
    }
}
