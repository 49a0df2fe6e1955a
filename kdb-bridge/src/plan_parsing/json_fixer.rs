//! Lenient repair for plan objects that almost parse.
//!
//! Models trained on Python tend to emit `True`/`None`, trailing commas and comments.

use regex::Regex;
use serde_json::Value;

use super::json_candidates::{balanced_object_end, fenced_object};

lazy_static::lazy_static! {
    static ref LINE_COMMENT: Option<Regex> = Regex::new(r"(?m)^\s*//.*$").ok();
    static ref BLOCK_COMMENT: Option<Regex> = Regex::new(r"(?s)/\*.*?\*/").ok();
    static ref PY_TRUE: Option<Regex> = Regex::new(r"\bTrue\b").ok();
    static ref PY_FALSE: Option<Regex> = Regex::new(r"\bFalse\b").ok();
    static ref PY_NONE: Option<Regex> = Regex::new(r"\bNone\b").ok();
    static ref TRAILING_COMMA: Option<Regex> = Regex::new(r",(\s*[}\]])").ok();
    static ref LOOSE_FENCE: Option<Regex> = Regex::new(r"(?s)```(?:json)?\s*(\{.*)```").ok();
}

fn replace(re: &Option<Regex>, text: String, with: &str) -> String {
    match re.as_ref() {
        Some(re) => re.replace_all(&text, with).into_owned(),
        None => text,
    }
}

/// Normalize Python literals, comments, trailing commas and a leading BOM.
pub fn repair_malformed_json(raw: &str) -> String {
    let text = raw.trim_start_matches('\u{feff}').to_string();
    let text = replace(&LINE_COMMENT, text, "");
    let text = replace(&BLOCK_COMMENT, text, "");
    let text = replace(&PY_TRUE, text, "true");
    let text = replace(&PY_FALSE, text, "false");
    let text = replace(&PY_NONE, text, "null");
    replace(&TRAILING_COMMA, text, "$1")
}

/// The region most likely to hold the plan object: a fence body, else from the first `{`
/// to its balanced end (or the end of the text when unbalanced).
fn candidate_region(text: &str) -> Option<String> {
    if let Some(fenced) = fenced_object(text) {
        return Some(fenced);
    }
    if let Some(caps) = LOOSE_FENCE.as_ref().and_then(|re| re.captures(text)) {
        if let Some(body) = caps.get(1) {
            return Some(body.as_str().trim().to_string());
        }
    }
    let start = text.find('{')?;
    let rest = &text[start..];
    Some(match balanced_object_end(rest) {
        Some(end) => rest[..=end].to_string(),
        None => rest.to_string(),
    })
}

/// Parse an object after repair, falling back to json5 (unquoted keys, single quotes).
pub fn parse_lenient_object(text: &str) -> Option<Value> {
    let region = candidate_region(text)?;
    let repaired = repair_malformed_json(&region);

    let parsed = serde_json::from_str::<Value>(&repaired)
        .ok()
        .or_else(|| json5::from_str::<Value>(&repaired).ok())?;

    match parsed {
        Value::Object(_) => Some(parsed),
        _ => None,
    }
}
