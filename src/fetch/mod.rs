//! The mailbox fetch collaborator: where raw messages come from.

pub mod imap;

use crate::error::Result;
use crate::model::mail::RawMessage;

pub use self::imap::ImapSource;

/// A source of the complete current contents of one mailbox.
///
/// Every call returns a fresh, full listing; the refresh driver never asks
/// for deltas.
pub trait MailSource: Send + Sync {
    /// Fetch all messages (up to any configured limit), oldest sequence
    /// number first. An empty mailbox yields an empty list.
    fn fetch(&self) -> Result<Vec<RawMessage>>;
}

/// A fixed set of messages, served on every fetch.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    messages: Vec<RawMessage>,
}

impl StaticSource {
    pub fn new(messages: Vec<RawMessage>) -> Self {
        Self { messages }
    }
}

impl MailSource for StaticSource {
    fn fetch(&self) -> Result<Vec<RawMessage>> {
        Ok(self.messages.clone())
    }
}
