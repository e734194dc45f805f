//! Lexical helpers for scanning Terraform text.
//!
//! None of this is an HCL parser. Block boundaries are found by counting
//! braces and string literals by backslash-aware quote scanning, which is
//! sufficient for the machine-generated files this tool targets. Brace
//! characters inside string literals are not understood by [`block_body`];
//! the generated payloads never contain them outside of quoted attribute
//! values that the callers extract separately.

/// Returns the block body starting at `start` (the position just past an
/// opening brace) up to, but not including, the matching closing brace.
///
/// When the text ends before the braces balance, the remainder is returned
/// as-is. Callers treat that as a degraded block, not an error.
pub fn block_body(content: &str, start: usize) -> &str {
    let mut depth = 1usize;
    for (offset, ch) in content[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return &content[start..start + offset];
                }
            }
            _ => {}
        }
    }
    &content[start..]
}

/// Extracts a complete quoted literal, including both quote characters,
/// starting at or after `start`.
///
/// Leading whitespace is skipped. A quote preceded by an odd number of
/// consecutive backslashes is escaped content; an even count (zero included)
/// terminates the literal. Returns `None` when no opening quote follows or
/// the literal never closes.
pub fn quoted_literal(content: &str, start: usize) -> Option<&str> {
    let rest = &content[start..];
    let open = start + (rest.len() - rest.trim_start().len());
    if !content[open..].starts_with('"') {
        return None;
    }

    let bytes = content.as_bytes();
    let mut pos = open + 1;
    while pos < bytes.len() {
        if bytes[pos] == b'"' {
            let mut backslashes = 0;
            while pos - backslashes > open + 1 && bytes[pos - backslashes - 1] == b'\\' {
                backslashes += 1;
            }
            if backslashes % 2 == 0 {
                return Some(&content[open..=pos]);
            }
        }
        pos += 1;
    }

    None
}

/// Expands Terraform string escapes (`\"`, `\n`, `\r`, `\t`, `\\`) in a
/// single pass. Outer quotes are stripped when present; unrecognized escape
/// sequences are kept verbatim.
pub fn unescape(literal: &str) -> String {
    let inner = literal
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(literal);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn block_body_tracks_nesting() {
        let text = "outer { inner { a = 1 } b = 2 } tail";
        let start = text.find('{').unwrap() + 1;
        assert_eq!(block_body(text, start), " inner { a = 1 } b = 2 ");
    }

    #[test]
    fn block_body_unbalanced_returns_remainder() {
        let text = "outer { inner { a = 1 }";
        let start = text.find('{').unwrap() + 1;
        assert_eq!(block_body(text, start), " inner { a = 1 }");
    }

    #[test]
    fn quoted_literal_skips_leading_whitespace() {
        assert_eq!(quoted_literal("   \"abc\" tail", 0), Some("\"abc\""));
    }

    #[test]
    fn quoted_literal_even_backslashes_terminate() {
        // two backslashes then a quote: the quote closes the literal
        assert_eq!(quoted_literal(r#""a\\" rest"#, 0), Some(r#""a\\""#));
    }

    #[test]
    fn quoted_literal_odd_backslashes_continue() {
        // one backslash escapes the quote, the literal runs on
        assert_eq!(quoted_literal(r#""a\"b" rest"#, 0), Some(r#""a\"b""#));
    }

    #[test]
    fn quoted_literal_missing_quotes() {
        assert_eq!(quoted_literal("no quote here", 0), None);
        assert_eq!(quoted_literal("\"never closed", 0), None);
    }

    #[test]
    fn unescape_expands_sequences() {
        assert_eq!(unescape(r#""a\nb\tc\"d\\e""#), "a\nb\tc\"d\\e");
    }

    #[test]
    fn unescape_keeps_unknown_escapes() {
        assert_eq!(unescape(r#""a\qb""#), "a\\qb");
    }

    #[test]
    fn unescape_without_outer_quotes() {
        assert_eq!(unescape(r"one\ntwo"), "one\ntwo");
    }
}
