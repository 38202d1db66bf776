//! Normalization of fetched messages into [`MailMetadata`].

use chrono::Datelike;

use crate::error::{MailFsError, Result};
use crate::model::address::sender_component;
use crate::model::mail::{MailMetadata, RawMessage};
use crate::parser::header::decode_encoded_words;
use crate::parser::slug::subject_slug;

/// Build the metadata record for one message.
///
/// Fails with [`MailFsError::MissingSubject`] when the message carries no
/// `Subject:` header at all; an empty or unsluggable subject is fine and
/// yields the `__no-subject__` slug.
pub fn parse_metadata(msg: &RawMessage) -> Result<MailMetadata> {
    let subject_raw = msg
        .header("subject")
        .ok_or(MailFsError::MissingSubject { uid: msg.uid })?;
    let subject_slug = subject_slug(&decode_encoded_words(subject_raw));

    let from_raw = msg.header("from").unwrap_or_default();
    let sender = sender_component(&decode_encoded_words(from_raw));

    Ok(MailMetadata {
        uid: msg.uid,
        sender,
        subject_slug,
        year: msg.date.year(),
        month: msg.date.month(),
        day: msg.date.day(),
        timestamp: msg.date.timestamp(),
        content: render_content(msg),
    })
}

/// Parse a whole batch, skipping (and logging) messages that cannot be used.
///
/// Returns the usable records in input order plus the number skipped.
pub fn parse_batch(messages: &[RawMessage]) -> (Vec<MailMetadata>, usize) {
    let mut parsed = Vec::with_capacity(messages.len());
    let mut skipped = 0;

    for msg in messages {
        match parse_metadata(msg) {
            Ok(meta) => parsed.push(meta),
            Err(e) => {
                tracing::warn!(uid = msg.uid, error = %e, "Skipping message");
                skipped += 1;
            }
        }
    }

    (parsed, skipped)
}

/// Serialize what a reader of the file sees: every header as `name: value`
/// joined by CRLF, a blank line, then the text body (the HTML body when the
/// text body is empty).
fn render_content(msg: &RawMessage) -> Vec<u8> {
    let body = if msg.text.is_empty() {
        &msg.html
    } else {
        &msg.text
    };

    let headers = msg
        .headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("\r\n");

    let mut content = String::with_capacity(headers.len() + body.len() + 4);
    content.push_str(&headers);
    content.push_str("\r\n\r\n");
    content.push_str(body);
    content.into_bytes()
}
