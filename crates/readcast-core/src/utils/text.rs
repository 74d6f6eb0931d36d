//! Text normalization for cache keys.

/// Collapse every run of Unicode whitespace to a single space and trim.
///
/// Two texts that differ only in cosmetic whitespace normalize to the same
/// string and therefore share a cache entry.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_and_trims() {
        assert_eq!(normalize_text("  Hello \n\t world  "), "Hello world");
        assert_eq!(normalize_text("a\u{00A0}\u{2003}b"), "a b");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_preserves_case_and_punctuation() {
        assert_eq!(normalize_text("Hello, World!"), "Hello, World!");
    }
}
