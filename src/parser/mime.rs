//! Conversion of a raw RFC 822 message into a [`RawMessage`].

use chrono::DateTime;
use mail_parser::{MessageParser, PartType};

use crate::model::mail::RawMessage;
use crate::parser::header;

/// Parse the full bytes of a fetched message.
///
/// Never fails: when `mail-parser` cannot make sense of the input, the
/// headers are still split by hand and everything after the first blank line
/// becomes the text body.
pub fn parse_raw_message(uid: u32, raw: &[u8]) -> RawMessage {
    let header_block = header::decode_header_bytes(&raw[..find_header_end(raw)]);
    let headers = header::split_headers(&header_block);

    let date_fallback = || {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("date"))
            .and_then(|(_, v)| header::parse_date(v))
            .unwrap_or_else(|| DateTime::UNIX_EPOCH.fixed_offset())
    };

    match MessageParser::default().parse(raw) {
        Some(msg) => {
            let date = msg
                .date()
                .and_then(|d| DateTime::parse_from_rfc3339(&d.to_rfc3339()).ok())
                .unwrap_or_else(date_fallback);

            // body_text()/body_html() convert between the two formats; only
            // take parts that really are of the requested type.
            let text = msg
                .text_part(0)
                .and_then(|part| match &part.body {
                    PartType::Text(text) => Some(text.to_string()),
                    _ => None,
                })
                .unwrap_or_default();
            let html = msg
                .html_part(0)
                .and_then(|part| match &part.body {
                    PartType::Html(html) => Some(html.to_string()),
                    _ => None,
                })
                .unwrap_or_default();

            RawMessage {
                uid,
                headers,
                date,
                text,
                html,
            }
        }
        None => RawMessage {
            uid,
            date: date_fallback(),
            headers,
            text: extract_body_fallback(raw),
            html: String::new(),
        },
    }
}

/// Byte offset where the header block ends (start of the first blank line),
/// or the input length when there is no body.
fn find_header_end(data: &[u8]) -> usize {
    data.windows(2)
        .position(|w| w == b"\n\n")
        .into_iter()
        .chain(data.windows(4).position(|w| w == b"\r\n\r\n"))
        .min()
        .unwrap_or(data.len())
}

/// Fallback body extraction when `mail-parser` cannot parse the message.
fn extract_body_fallback(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    if let Some(pos) = text.find("\r\n\r\n") {
        text[pos + 4..].to_string()
    } else if let Some(pos) = text.find("\n\n") {
        text[pos + 2..].to_string()
    } else {
        String::new()
    }
}
