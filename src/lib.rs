//! `mailfs`: an IMAP mailbox projected onto a read-only filesystem.
//!
//! Messages are fetched, normalized into metadata records, grouped by sender
//! and by date, and numbered into an immutable inode tree. Each refresh
//! publishes a new snapshot atomically; filesystem requests are answered from
//! whichever snapshot was current when they started.

pub mod config;
pub mod error;
pub mod fetch;
pub mod index;
pub mod model;
pub mod parser;
pub mod refresh;
pub mod vfs;
