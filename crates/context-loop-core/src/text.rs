//! Small, deterministic text helpers shared by summaries, embedding text,
//! and prompt rendering.

/// Collapse every run of whitespace (including newlines) into one space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max_chars` characters, appending `…` when cut.
///
/// Operates on `char` boundaries so multi-byte text is never split.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('…');
    out
}

/// Whitespace-collapsed, truncated excerpt of a body of text.
pub fn excerpt(s: &str, max_chars: usize) -> String {
    truncate_chars(&collapse_whitespace(s), max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a\n\n b\t c "), "a b c");
    }

    #[test]
    fn test_truncate_short_is_identity() {
        assert_eq!(truncate_chars("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_multibyte() {
        let s = "héllo wörld";
        let t = truncate_chars(s, 4);
        assert_eq!(t, "héll…");
    }
}
