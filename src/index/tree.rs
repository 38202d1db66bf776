//! The inode arena: a numbered directory/file tree built from an [`ObjectIndex`].
//!
//! ```text
//! /                       (ROOT_INODE)
//! ├── sender/
//! │   └── <sender>/
//! │       └── <sender>-<subject slug>[-N]
//! └── timeline/
//!     └── <year>/<month>/<day>/
//!         └── <sender>-<subject slug>[-N]
//! ```
//!
//! Ids are handed out in post-order starting right after the root, so every
//! directory's id is larger than any id in its subtree and the same index
//! always produces the same numbering.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::index::names::resolve_names;
use crate::index::object::{GroupNode, ObjectIndex};
use crate::model::mail::MailMetadata;

/// Inode number of the filesystem root (the FUSE root id).
pub const ROOT_INODE: u64 = 1;

/// Name of the by-sender subtree under the root.
pub const SENDER_DIR: &str = "sender";

/// Name of the by-date subtree under the root.
pub const TIMELINE_DIR: &str = "timeline";

/// What an inode is.
#[derive(Debug, Clone)]
pub enum InodeKind {
    /// Child ids in listing order.
    Directory { children: Vec<u64> },
    /// The message whose content the file serves.
    File { meta: Arc<MailMetadata> },
}

/// One entry of the tree.
#[derive(Debug, Clone)]
pub struct InodeNode {
    pub id: u64,
    /// Containing directory; the root is its own parent.
    pub parent: u64,
    /// Unique among siblings; empty for the root.
    pub name: String,
    pub kind: InodeKind,
}

impl InodeNode {
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, InodeKind::Directory { .. })
    }

    pub fn children(&self) -> Option<&[u64]> {
        match &self.kind {
            InodeKind::Directory { children } => Some(children),
            InodeKind::File { .. } => None,
        }
    }

    pub fn meta(&self) -> Option<&Arc<MailMetadata>> {
        match &self.kind {
            InodeKind::File { meta } => Some(meta),
            InodeKind::Directory { .. } => None,
        }
    }
}

/// Dense arena of inodes; `nodes[id - ROOT_INODE]` holds inode `id`.
#[derive(Debug, Clone)]
pub struct InodeTree {
    nodes: Vec<InodeNode>,
}

impl InodeTree {
    /// Build the complete tree for `index`.
    pub fn build(index: &ObjectIndex) -> Self {
        let mut builder = TreeBuilder {
            index,
            nodes: vec![InodeNode {
                id: ROOT_INODE,
                parent: ROOT_INODE,
                name: String::new(),
                kind: InodeKind::Directory {
                    children: Vec::new(),
                },
            }],
        };

        let children = vec![
            builder.add_directory(SENDER_DIR, &index.by_sender),
            builder.add_directory(TIMELINE_DIR, &index.by_date),
        ];
        builder.adopt(ROOT_INODE, &children);
        builder.nodes[0].kind = InodeKind::Directory { children };

        debug!(inodes = builder.nodes.len(), "Generated inodes");
        Self {
            nodes: builder.nodes,
        }
    }

    /// Look up an inode by id.
    pub fn get(&self, id: u64) -> Option<&InodeNode> {
        let idx = usize::try_from(id.checked_sub(ROOT_INODE)?).ok()?;
        self.nodes.get(idx)
    }

    pub fn root(&self) -> &InodeNode {
        &self.nodes[0]
    }

    /// Find the child of directory `parent` called `name`.
    pub fn child(&self, parent: u64, name: &str) -> Option<&InodeNode> {
        self.get(parent)?
            .children()?
            .iter()
            .filter_map(|id| self.get(*id))
            .find(|child| child.name == name)
    }

    /// Resolve a `/`-separated path from the root.
    pub fn resolve_path(&self, path: &str) -> Option<&InodeNode> {
        path.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(self.root(), |node, part| self.child(node.id, part))
    }

    /// Total number of inodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Never true: the root always exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All inodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = &InodeNode> {
        self.nodes.iter()
    }
}

struct TreeBuilder<'a> {
    index: &'a ObjectIndex,
    nodes: Vec<InodeNode>,
}

impl TreeBuilder<'_> {
    fn next_id(&self) -> u64 {
        ROOT_INODE + self.nodes.len() as u64
    }

    /// Build `group` under a directory called `name`; children first.
    fn add_directory(&mut self, name: &str, group: &GroupNode) -> u64 {
        let children = match group {
            GroupNode::Directory(entries) => entries
                .iter()
                .map(|(key, child)| self.add_directory(key, child))
                .collect(),
            GroupNode::Leaf(uids) => self.add_files(uids),
        };

        let id = self.next_id();
        self.adopt(id, &children);
        self.nodes.push(InodeNode {
            id,
            parent: ROOT_INODE,
            name: name.to_string(),
            kind: InodeKind::Directory { children },
        });
        trace!(dir = name, inode = id, "Created directory");
        id
    }

    fn add_files(&mut self, uids: &[u32]) -> Vec<u64> {
        resolve_names(uids, self.index)
            .into_iter()
            .map(|(name, meta)| {
                let id = self.next_id();
                trace!(file = %name, inode = id, uid = meta.uid, "Created file");
                self.nodes.push(InodeNode {
                    id,
                    parent: ROOT_INODE,
                    name,
                    kind: InodeKind::File { meta },
                });
                id
            })
            .collect()
    }

    /// Point each child's parent link at `parent`.
    fn adopt(&mut self, parent: u64, children: &[u64]) {
        for child in children {
            if let Some(node) = usize::try_from(child - ROOT_INODE)
                .ok()
                .and_then(|idx| self.nodes.get_mut(idx))
            {
                node.parent = parent;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn meta(uid: u32, sender: &str, slug: &str, ymd: (i32, u32, u32), ts: i64) -> MailMetadata {
        MailMetadata {
            uid,
            sender: sender.to_string(),
            subject_slug: slug.to_string(),
            year: ymd.0,
            month: ymd.1,
            day: ymd.2,
            timestamp: ts,
            content: format!("message {uid}").into_bytes(),
        }
    }

    fn sample() -> ObjectIndex {
        ObjectIndex::build(vec![
            meta(1, "alice@example.com", "hello", (2023, 5, 10), 100),
            meta(2, "alice@example.com", "hello", (2023, 5, 10), 200),
            meta(3, "bob@example.com", "report", (2023, 5, 11), 150),
        ])
    }

    #[test]
    fn test_root_has_two_children() {
        let tree = InodeTree::build(&sample());
        let names: Vec<&str> = tree
            .root()
            .children()
            .unwrap()
            .iter()
            .map(|id| tree.get(*id).unwrap().name.as_str())
            .collect();
        assert_eq!(names, [SENDER_DIR, TIMELINE_DIR]);
    }

    #[test]
    fn test_post_order_ids() {
        let tree = InodeTree::build(&sample());
        for node in tree.iter() {
            if node.id == ROOT_INODE {
                continue;
            }
            for child in node.children().unwrap_or_default() {
                assert!(*child < node.id, "child {child} must precede {}", node.id);
                assert_eq!(tree.get(*child).unwrap().parent, node.id);
            }
        }
        // The first id after the root is a file, the last is "timeline".
        assert!(!tree.get(ROOT_INODE + 1).unwrap().is_dir());
        let last = tree.get(tree.len() as u64).unwrap();
        assert_eq!(last.name, TIMELINE_DIR);
        assert_eq!(last.parent, ROOT_INODE);
    }

    #[test]
    fn test_same_message_reachable_twice() {
        let tree = InodeTree::build(&sample());
        let by_sender = tree
            .resolve_path("sender/bob@example.com/bob@example.com-report")
            .unwrap();
        let by_date = tree
            .resolve_path("/timeline/2023/5/11/bob@example.com-report")
            .unwrap();
        assert_ne!(by_sender.id, by_date.id);
        assert_eq!(by_sender.meta().unwrap().content, by_date.meta().unwrap().content);
    }

    #[test]
    fn test_sibling_names_unique() {
        let tree = InodeTree::build(&sample());
        for node in tree.iter() {
            if let Some(children) = node.children() {
                let names: HashSet<&str> =
                    children.iter().map(|id| tree.get(*id).unwrap().name.as_str()).collect();
                assert_eq!(names.len(), children.len());
            }
        }
        assert!(tree
            .resolve_path("sender/alice@example.com/alice@example.com-hello-1")
            .is_some());
    }

    #[test]
    fn test_empty_index() {
        let tree = InodeTree::build(&ObjectIndex::empty());
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.resolve_path("sender").unwrap().children(), Some(&[][..]));
        assert_eq!(tree.resolve_path("timeline").unwrap().children(), Some(&[][..]));
    }

    #[test]
    fn test_lookup_out_of_range() {
        let tree = InodeTree::build(&sample());
        assert!(tree.get(0).is_none());
        assert!(tree.get(tree.len() as u64 + 1).is_none());
        assert!(tree.child(ROOT_INODE, "nope").is_none());
    }

    #[test]
    fn test_deterministic_numbering() {
        let a = InodeTree::build(&sample());
        let b = InodeTree::build(&sample());
        let shape = |t: &InodeTree| {
            t.iter()
                .map(|n| (n.id, n.parent, n.name.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&a), shape(&b));
    }
}
