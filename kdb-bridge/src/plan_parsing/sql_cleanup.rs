//! Cleanup of a single SQL statement returned as raw model text.

use regex::Regex;

use super::reasoning::strip_reasoning;

lazy_static::lazy_static! {
    static ref FENCE: Option<Regex> = Regex::new(r"(?i)```(?:sql)?").ok();
    static ref EMBEDDED_SELECT: Option<Regex> = Regex::new(r"(?is)SELECT\s+.+").ok();
}

fn strip_wrapping_quotes(s: &str) -> &str {
    let mut chars = s.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) if first == last && (first == '"' || first == '\'') => {
            &s[first.len_utf8()..s.len() - last.len_utf8()]
        }
        _ => s,
    }
}

/// Remove reasoning, code fences, one pair of wrapping quotes and backslash-escaped quotes.
pub fn clean_sql(raw: &str) -> String {
    let answer = strip_reasoning(raw).answer;
    let unfenced = match FENCE.as_ref() {
        Some(re) => re.replace_all(&answer, "").into_owned(),
        None => answer,
    };
    strip_wrapping_quotes(unfenced.trim())
        .trim()
        .replace("\\\"", "\"")
        .replace("\\'", "'")
}

/// The statement if it starts with SELECT, else an embedded `SELECT ...` span.
pub fn validated_select(cleaned: &str) -> Option<String> {
    let trimmed = cleaned.trim();
    if trimmed
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("select"))
    {
        return Some(trimmed.to_string());
    }
    EMBEDDED_SELECT
        .as_ref()?
        .find(trimmed)
        .map(|m| m.as_str().trim().to_string())
}
