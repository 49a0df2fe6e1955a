//! Strict JSON object extraction from model text.
//!
//! Strategies run in order and a candidate only counts once `serde_json` accepts it:
//! 1. a fenced code block holding an object,
//! 2. the span from the first `{` to the last `}`,
//! 3. the first balanced top-level `{...}` span that parses.

use regex::Regex;
use serde_json::Value;

lazy_static::lazy_static! {
    static ref FENCED_OBJECT: Option<Regex> = Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").ok();
}

fn parses_as_object(candidate: &str) -> bool {
    matches!(serde_json::from_str::<Value>(candidate), Ok(Value::Object(_)))
}

/// Object inside a ```json fence (or a bare ``` fence).
pub fn fenced_object(text: &str) -> Option<String> {
    let re = FENCED_OBJECT.as_ref()?;
    let candidate = re.captures(text)?.get(1)?.as_str().trim().to_string();
    parses_as_object(&candidate).then_some(candidate)
}

/// Everything between the first `{` and the last `}`.
pub fn outer_braces(text: &str) -> Option<String> {
    let first = text.find('{')?;
    let last = text.rfind('}')?;
    if last <= first {
        return None;
    }
    let candidate = &text[first..=last];
    parses_as_object(candidate).then(|| candidate.to_string())
}

/// End index (inclusive) of the balanced object starting at the beginning of `s`.
/// Braces inside string literals are ignored.
pub fn balanced_object_end(s: &str) -> Option<usize> {
    if !s.starts_with('{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// First top-level balanced object that parses. Unparseable spans are skipped whole.
pub fn first_balanced_object(text: &str) -> Option<String> {
    let mut offset = 0;
    while let Some(rel) = text[offset..].find('{') {
        let start = offset + rel;
        match balanced_object_end(&text[start..]) {
            Some(end) => {
                let candidate = &text[start..=start + end];
                if parses_as_object(candidate) {
                    return Some(candidate.to_string());
                }
                offset = start + end + 1;
            }
            None => offset = start + 1,
        }
    }
    None
}

/// Run the strategies in priority order.
pub fn extract_json_object(text: &str) -> Option<String> {
    fenced_object(text)
        .or_else(|| outer_braces(text))
        .or_else(|| first_balanced_object(text))
}
