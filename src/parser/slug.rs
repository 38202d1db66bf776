//! Subject slugification.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Slug used when a subject has no ASCII letters or digits left.
pub const NO_SUBJECT: &str = "__no-subject__";

/// Turn a decoded subject into a lowercase ASCII slug.
///
/// Accents are folded (`"Café"` → `"cafe"`), apostrophes vanish, and every
/// other run of non-alphanumeric characters collapses into a single `-`.
/// Leading and trailing separators are dropped. Returns an empty string when
/// nothing survives.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_sep = false;

    for c in input.nfkd().filter(|c| !is_combining_mark(*c)) {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else if c == '\'' || c == '\u{2019}' {
            continue;
        } else {
            pending_sep = true;
        }
    }

    slug
}

/// [`slugify`], mapping an empty result to [`NO_SUBJECT`].
pub fn subject_slug(subject: &str) -> String {
    let slug = slugify(subject);
    if slug.is_empty() {
        NO_SUBJECT.to_string()
    } else {
        slug
    }
}
