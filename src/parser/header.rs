//! RFC 5322 header handling: byte decoding, unfolding, encoded-words (RFC 2047), and dates.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use mail_parser::MessageParser;
use tracing::warn;

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Split a header block into `(name, value)` pairs.
///
/// Continuation lines (starting with space or tab) are joined to the previous
/// header. Names keep their case, values are trimmed, order and repeats are
/// preserved. Parsing stops at the first blank line.
pub fn split_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_string();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
    }

    result
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Values without encoded-words are returned as-is. If decoding fails the
/// original text is preserved.
pub fn decode_encoded_words(input: &str) -> String {
    if !input.contains("=?") {
        return input.to_string();
    }

    // Wrap the value in a minimal message so mail-parser applies its
    // charset-aware RFC 2047 decoder.
    let fake_msg = format!("Subject: {input}\r\n\r\n");
    MessageParser::default()
        .parse(fake_msg.as_bytes())
        .and_then(|msg| msg.subject().map(str::to_string))
        .unwrap_or_else(|| input.to_string())
}

/// Parse a `Date:` value, keeping the sender's UTC offset.
///
/// Accepts RFC 2822 (with or without the weekday), RFC 3339, IMAP-style
/// `DD-Mon-YYYY`, and whatever `mail-parser` can salvage beyond that. A value
/// without an offset is taken as UTC.
pub fn parse_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    let strict = DateTime::parse_from_rfc2822(trimmed)
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed))
        .ok();
    strict
        .or_else(|| loose_date(trimmed))
        .or_else(|| mail_parser_date(trimmed))
        .or_else(|| {
            warn!(date = trimmed, "Could not parse date");
            None
        })
}

fn loose_date(value: &str) -> Option<DateTime<FixedOffset>> {
    const WITH_OFFSET: [&str; 2] = ["%d %b %Y %H:%M:%S %z", "%Y %m %d %H:%M:%S %z"];
    const WITHOUT_OFFSET: [&str; 2] = ["%d %b %Y %H:%M:%S", "%Y %m %d %H:%M:%S"];

    // Only the date separators; a trailing "-0500" offset must survive.
    let candidate = without_weekday(value).replacen('-', " ", 2);

    WITH_OFFSET
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&candidate, fmt).ok())
        .or_else(|| {
            WITHOUT_OFFSET
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(&candidate, fmt).ok())
                .map(|naive| naive.and_utc().fixed_offset())
        })
}

fn mail_parser_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let wrapped = format!("Date: {value}\r\n\r\n");
    let parsed = MessageParser::default().parse(wrapped.as_bytes())?;
    DateTime::parse_from_rfc3339(&parsed.date()?.to_rfc3339()).ok()
}

/// `"Thu, 04 Jan"` → `"04 Jan"`.
fn without_weekday(value: &str) -> &str {
    const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    DAYS.iter()
        .find_map(|day| value.strip_prefix(day))
        .map_or(value, |rest| rest.trim_start_matches(',').trim())
}
