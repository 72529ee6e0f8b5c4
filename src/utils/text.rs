//! Text and token estimation utilities.

/// Approximate characters per token for Latin-script text.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the number of tokens in a text.
///
/// A planning heuristic (`ceil(len / 4)`), not an exact count; downstream
/// accounting must never treat it as billing truth.
pub fn estimate_tokens(text: &str) -> u32 {
    text.len().div_ceil(CHARS_PER_TOKEN) as u32
}

/// Check if content has meaningful text (not just whitespace).
pub fn has_meaningful_content(content: &str) -> bool {
    content.chars().any(|c| !c.is_whitespace())
}

/// Truncate a string to at most `max_chars`, cutting on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(4000)), 1000);
    }

    #[test]
    fn test_has_meaningful_content() {
        assert!(!has_meaningful_content(""));
        assert!(!has_meaningful_content("   \n\n\t  "));
        assert!(has_meaningful_content("a"));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("héllo", 2), "hé");
    }
}
