//! Sender address extraction from a decoded `From:` value.

use crate::model::{truncate_name, NAME_MAX};

/// Directory name used for messages whose `From:` yields nothing usable.
pub const UNKNOWN_SENDER: &str = "__no-sender__";

/// The `local@domain` part of `Name <addr>`, `"Quoted, Name" <addr>`,
/// `<addr>`, or a bare `addr`.
///
/// The last `<...>` pair wins, so a `<` inside the phrase does no harm. Without
/// a closed pair the whole trimmed value is returned.
pub fn mailbox_address(raw: &str) -> &str {
    let value = raw.trim();
    value
        .rfind('<')
        .and_then(|open| {
            let close = open + value[open..].find('>')?;
            Some(value[open + 1..close].trim())
        })
        .unwrap_or(value)
}

/// The sender of a `From:` value as a single path component.
///
/// `/` and NUL are replaced with `_` and the result is cut to [`NAME_MAX`]
/// bytes. An empty address, `.` and `..` all map to [`UNKNOWN_SENDER`].
pub fn sender_component(raw: &str) -> String {
    let address = mailbox_address(raw);
    if matches!(address, "" | "." | "..") {
        return UNKNOWN_SENDER.to_string();
    }
    let safe = address.replace(['/', '\0'], "_");
    truncate_name(&safe, NAME_MAX).to_string()
}
