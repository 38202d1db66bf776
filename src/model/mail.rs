//! Message records on both sides of the parser.

use chrono::{DateTime, FixedOffset};

/// One message as delivered by the mailbox fetch service.
///
/// Header names keep their original case and order; a name may repeat.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Mailbox UID, unique within one fetch.
    pub uid: u32,
    /// Unfolded `(name, value)` header pairs in wire order.
    pub headers: Vec<(String, String)>,
    /// Message date in the sender's own offset (from `Date:`; Unix epoch
    /// when absent or unparseable).
    pub date: DateTime<FixedOffset>,
    /// Plain-text body, empty when the message has none.
    pub text: String,
    /// HTML body, empty when the message has none.
    pub html: String,
}

impl RawMessage {
    /// First value of a header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Normalized metadata for one message, shared read-only by every inode
/// that points at it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MailMetadata {
    /// Mailbox UID, unique within a snapshot.
    pub uid: u32,
    /// Sender address from the `From:` header.
    pub sender: String,
    /// Slugified, decoded subject (`__no-subject__` when empty).
    pub subject_slug: String,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// Unix timestamp in seconds; file mtime and sort key.
    pub timestamp: i64,
    /// Headers, blank line, then body; this is what a reader of the file sees.
    #[serde(skip)]
    pub content: Vec<u8>,
}

impl MailMetadata {
    /// Size of the file contents in bytes.
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}
