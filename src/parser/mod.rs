//! Message parsing: raw RFC 822 decoding, header handling, slugs, and metadata.

pub mod header;
pub mod metadata;
pub mod mime;
pub mod slug;
