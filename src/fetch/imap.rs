//! IMAP-over-TLS mailbox source.

use std::net::TcpStream;

use native_tls::{TlsConnector, TlsStream};
use tracing::{debug, info, warn};

use crate::config::ImapConfig;
use crate::error::{MailFsError, Result};
use crate::fetch::MailSource;
use crate::model::mail::RawMessage;
use crate::parser::mime::parse_raw_message;

type ImapSession = ::imap::Session<TlsStream<TcpStream>>;

/// Fetches a mailbox over IMAPS, one connection per fetch.
///
/// The mailbox is opened with `EXAMINE`, so fetching never marks messages
/// as seen.
#[derive(Debug, Clone)]
pub struct ImapSource {
    config: ImapConfig,
}

impl ImapSource {
    pub fn new(config: ImapConfig) -> Self {
        Self { config }
    }

    fn connect(&self) -> Result<ImapSession> {
        let cfg = &self.config;
        let tls = TlsConnector::builder().build().map_err(MailFsError::fetch)?;
        let client = ::imap::connect((cfg.host.as_str(), cfg.port), cfg.host.as_str(), &tls)
            .map_err(|e| MailFsError::fetch(format!("connect to {}:{}: {e}", cfg.host, cfg.port)))?;
        let session = client
            .login(cfg.user.as_str(), cfg.password.as_str())
            .map_err(|(e, _)| MailFsError::fetch(format!("login as {}: {e}", cfg.user)))?;
        debug!(host = %cfg.host, user = %cfg.user, "Logged in");
        Ok(session)
    }

    fn fetch_all(&self, session: &mut ImapSession) -> Result<Vec<RawMessage>> {
        let mailbox = session
            .examine(&self.config.mailbox)
            .map_err(|e| MailFsError::fetch(format!("examine {}: {e}", self.config.mailbox)))?;
        let Some(range) = sequence_range(mailbox.exists, self.config.message_limit) else {
            info!(mailbox = %self.config.mailbox, "Mailbox is empty");
            return Ok(Vec::new());
        };

        debug!(mailbox = %self.config.mailbox, exists = mailbox.exists, %range, "Fetching messages");
        let fetches = session
            .fetch(&range, "(UID RFC822)")
            .map_err(|e| MailFsError::fetch(format!("fetch {range}: {e}")))?;

        let mut messages = Vec::with_capacity(fetches.len());
        for fetch in fetches.iter() {
            match to_raw_message(fetch.message, fetch.uid, fetch.body()) {
                Ok(msg) => messages.push(msg),
                Err(e) => warn!(seq = fetch.message, error = %e, "Skipping fetched item"),
            }
        }
        Ok(messages)
    }
}

impl MailSource for ImapSource {
    fn fetch(&self) -> Result<Vec<RawMessage>> {
        let mut session = self.connect()?;
        let result = self.fetch_all(&mut session);
        if let Err(e) = session.logout() {
            debug!(error = %e, "IMAP logout failed");
        }
        let messages = result?;
        info!(count = messages.len(), "Fetched messages");
        Ok(messages)
    }
}

/// Sequence set covering the first `limit` of `exists` messages, or all of
/// them. `None` when there is nothing to fetch.
fn sequence_range(exists: u32, limit: Option<u32>) -> Option<String> {
    let last = limit.map_or(exists, |limit| limit.min(exists));
    (last > 0).then(|| format!("1:{last}"))
}

fn to_raw_message(seq: u32, uid: Option<u32>, body: Option<&[u8]>) -> Result<RawMessage> {
    let uid = uid.ok_or_else(|| MailFsError::Parse {
        uid: seq,
        reason: "server sent no UID".to_string(),
    })?;
    let body = body.ok_or_else(|| MailFsError::Parse {
        uid,
        reason: "server sent no message body".to_string(),
    })?;
    Ok(parse_raw_message(uid, body))
}
