//! Core data model: raw fetched messages, normalized metadata, and addresses.

pub mod address;
pub mod mail;

/// Longest single path component, in bytes, that the kernel accepts.
pub const NAME_MAX: usize = 255;

/// The longest prefix of `name` that fits in `max` bytes without splitting a
/// character.
pub fn truncate_name(name: &str, max: usize) -> &str {
    if name.len() <= max {
        return name;
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_name() {
        assert_eq!(truncate_name("short", 10), "short");
        assert_eq!(truncate_name("abcdef", 3), "abc");
        // "é" is two bytes; cutting inside it backs off to the boundary.
        assert_eq!(truncate_name("caé", 3), "ca");
        assert_eq!(truncate_name("caé", 4), "caé");
    }
}
