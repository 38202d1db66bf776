//! The synthetic inode tree: grouping, naming, numbering, and snapshot publication.
//!
//! A refresh turns a batch of [`MailMetadata`](crate::model::mail::MailMetadata)
//! into an [`ObjectIndex`](object::ObjectIndex), numbers it into an
//! [`InodeTree`](tree::InodeTree), wraps both in a
//! [`MailboxIndex`](snapshot::MailboxIndex), and publishes that through the
//! [`SnapshotHolder`](snapshot::SnapshotHolder).

pub mod names;
pub mod object;
pub mod snapshot;
pub mod tree;
