//! Video slug validation.
//!
//! A slug is the URL-safe identifier for a Video: lowercase alphanumeric
//! segments joined by single hyphens, e.g. `my-uploaded-video`.

use std::sync::LazyLock;

use regex::Regex;

static SLUG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap());

/// Maximum slug length.
pub const MAX_SLUG_LENGTH: usize = 200;

/// Validate a Video slug against the canonical pattern.
///
/// Rejects path traversal sequences, uppercase, whitespace, empty strings,
/// doubled/leading/trailing hyphens, and anything over [`MAX_SLUG_LENGTH`].
pub fn is_valid_slug(slug: &str) -> bool {
    if slug.is_empty() || slug.len() > MAX_SLUG_LENGTH {
        return false;
    }
    if slug.contains("..") || slug.contains('/') || slug.contains('\\') {
        return false;
    }
    SLUG_PATTERN.is_match(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_slugs() {
        assert!(is_valid_slug("my-video"));
        assert!(is_valid_slug("video123"));
        assert!(is_valid_slug("a1-b2-c3"));
    }

    #[test]
    fn rejects_boundary_cases() {
        assert!(!is_valid_slug("../a"));
        assert!(!is_valid_slug("a/../b"));
        assert!(!is_valid_slug("A-B"));
        assert!(!is_valid_slug("a b"));
        assert!(!is_valid_slug("a--b"));
        assert!(!is_valid_slug("-a"));
        assert!(!is_valid_slug("a-"));
        assert!(!is_valid_slug(""));
    }
}
