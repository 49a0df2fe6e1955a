//! Small string helpers shared by prompt assembly and rendering.

/// First `max_chars` characters of `s`, never splitting a UTF-8 sequence.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate and append `...` when anything was cut.
pub fn ellipsize(s: &str, max_chars: usize) -> String {
    let cut = truncate_chars(s, max_chars);
    if cut.len() < s.len() {
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}

/// Case-insensitive check for any keyword. `keywords` are expected lowercase.
pub fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

/// `1234567` -> `1,234,567`
pub fn with_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(ellipsize("abcdef", 3), "abc...");
        assert_eq!(ellipsize("abc", 3), "abc");
    }

    #[test]
    fn thousands_separator() {
        assert_eq!(with_thousands(0), "0");
        assert_eq!(with_thousands(999), "999");
        assert_eq!(with_thousands(1000), "1,000");
        assert_eq!(with_thousands(1234567), "1,234,567");
    }
}
