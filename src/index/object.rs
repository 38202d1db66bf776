//! Grouping of message metadata by sender and by calendar date.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::model::mail::MailMetadata;

/// One level of a grouping structure.
///
/// The shape is fixed when the index is built: a `Directory` maps names to
/// nested groups, a `Leaf` holds the uids of the messages placed there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupNode {
    Directory(IndexMap<String, GroupNode>),
    Leaf(Vec<u32>),
}

impl GroupNode {
    /// Number of direct entries (child groups or uids).
    pub fn len(&self) -> usize {
        match self {
            Self::Directory(children) => children.len(),
            Self::Leaf(uids) => uids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Follow a path of keys down the structure.
    pub fn get(&self, path: &[&str]) -> Option<&GroupNode> {
        match path.split_first() {
            None => Some(self),
            Some((key, rest)) => match self {
                Self::Directory(children) => children.get(*key)?.get(rest),
                Self::Leaf(_) => None,
            },
        }
    }
}

type DayMap = IndexMap<u32, Vec<u32>>;
type MonthMap = IndexMap<u32, DayMap>;

/// The derived view of one mailbox fetch: `sender → uids`,
/// `year → month → day → uids`, and `uid → metadata`.
///
/// Keys appear in first-seen order and uids keep input order inside each
/// bucket. Always rebuilt from scratch.
#[derive(Debug, Clone)]
pub struct ObjectIndex {
    pub by_sender: GroupNode,
    pub by_date: GroupNode,
    pub by_uid: HashMap<u32, Arc<MailMetadata>>,
}

impl ObjectIndex {
    /// Build all three mappings in one pass over `messages`.
    ///
    /// A uid seen twice keeps its first record; later duplicates are dropped
    /// with a warning so every uid maps to exactly one file per directory.
    pub fn build(messages: impl IntoIterator<Item = MailMetadata>) -> Self {
        let mut by_sender: IndexMap<String, Vec<u32>> = IndexMap::new();
        let mut by_date: IndexMap<i32, MonthMap> = IndexMap::new();
        let mut by_uid = HashMap::new();

        for meta in messages {
            if by_uid.contains_key(&meta.uid) {
                warn!(uid = meta.uid, "Duplicate uid in fetch, keeping the first");
                continue;
            }

            by_sender
                .entry(meta.sender.clone())
                .or_default()
                .push(meta.uid);
            by_date
                .entry(meta.year)
                .or_default()
                .entry(meta.month)
                .or_default()
                .entry(meta.day)
                .or_default()
                .push(meta.uid);
            by_uid.insert(meta.uid, Arc::new(meta));
        }

        debug!(
            messages = by_uid.len(),
            senders = by_sender.len(),
            years = by_date.len(),
            "Rebuilt object index"
        );

        Self {
            by_sender: GroupNode::Directory(
                by_sender
                    .into_iter()
                    .map(|(sender, uids)| (sender, GroupNode::Leaf(uids)))
                    .collect(),
            ),
            by_date: GroupNode::Directory(
                by_date
                    .into_iter()
                    .map(|(year, months)| (year.to_string(), months_to_group(months)))
                    .collect(),
            ),
            by_uid,
        }
    }

    /// An index over no messages.
    pub fn empty() -> Self {
        Self::build(std::iter::empty())
    }

    pub fn get(&self, uid: u32) -> Option<&Arc<MailMetadata>> {
        self.by_uid.get(&uid)
    }

    pub fn len(&self) -> usize {
        self.by_uid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uid.is_empty()
    }
}

fn months_to_group(months: MonthMap) -> GroupNode {
    GroupNode::Directory(
        months
            .into_iter()
            .map(|(month, days)| {
                let days = days
                    .into_iter()
                    .map(|(day, uids)| (day.to_string(), GroupNode::Leaf(uids)))
                    .collect();
                (month.to_string(), GroupNode::Directory(days))
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(uid: u32, sender: &str, ymd: (i32, u32, u32)) -> MailMetadata {
        MailMetadata {
            uid,
            sender: sender.to_string(),
            subject_slug: "s".to_string(),
            year: ymd.0,
            month: ymd.1,
            day: ymd.2,
            timestamp: i64::from(uid),
            content: Vec::new(),
        }
    }

    #[test]
    fn test_groups_by_sender_in_order() {
        let index = ObjectIndex::build(vec![
            meta(3, "b@x", (2023, 5, 10)),
            meta(1, "a@x", (2023, 5, 10)),
            meta(2, "b@x", (2022, 1, 1)),
        ]);
        let GroupNode::Directory(senders) = &index.by_sender else {
            panic!("by_sender must be a directory");
        };
        let keys: Vec<&str> = senders.keys().map(String::as_str).collect();
        assert_eq!(keys, ["b@x", "a@x"]);
        assert_eq!(senders["b@x"], GroupNode::Leaf(vec![3, 2]));
    }

    #[test]
    fn test_groups_by_date() {
        let index = ObjectIndex::build(vec![
            meta(1, "a@x", (2023, 5, 10)),
            meta(2, "b@x", (2023, 5, 10)),
            meta(3, "b@x", (2023, 6, 1)),
        ]);
        assert_eq!(
            index.by_date.get(&["2023", "5", "10"]),
            Some(&GroupNode::Leaf(vec![1, 2]))
        );
        assert_eq!(index.by_date.get(&["2023"]).map(GroupNode::len), Some(2));
        assert_eq!(index.by_date.get(&["2024"]), None);
    }

    #[test]
    fn test_duplicate_uid_dropped() {
        let index = ObjectIndex::build(vec![meta(1, "a@x", (2023, 1, 1)), meta(1, "z@x", (2023, 1, 1))]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(1).map(|m| m.sender.as_str()), Some("a@x"));
        assert!(index.by_sender.get(&["z@x"]).is_none());
    }

    #[test]
    fn test_empty() {
        let index = ObjectIndex::empty();
        assert!(index.is_empty());
        assert!(index.by_sender.is_empty());
        assert!(index.by_date.is_empty());
    }
}
