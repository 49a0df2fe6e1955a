//! Removal of `<think>`/`<thinking>` blocks emitted by reasoning models.

use regex::Regex;

lazy_static::lazy_static! {
    static ref CLOSED_BLOCK: Option<Regex> =
        Regex::new(r"(?is)<think(?:ing)?>.*?</think(?:ing)?>").ok();
    static ref ORPHAN_CLOSE: Option<Regex> = Regex::new(r"(?is)^.*?</think(?:ing)?>").ok();
    static ref UNTERMINATED: Option<Regex> = Regex::new(r"(?is)<think(?:ing)?>(.*)$").ok();
}

/// Model output with reasoning removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stripped {
    /// Text outside any reasoning block, trimmed.
    pub answer: String,
    /// Body of an unclosed reasoning block, if one ran to the end of the text.
    pub unterminated_tail: Option<String>,
}

/// Strip closed blocks, a leading orphan `</think>` (open tag in the prompt), and an
/// unclosed block that runs to the end of the text.
pub fn strip_reasoning(text: &str) -> Stripped {
    let mut answer = match CLOSED_BLOCK.as_ref() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    };

    if let Some(re) = ORPHAN_CLOSE.as_ref() {
        answer = re.replace(&answer, "").into_owned();
    }

    let mut unterminated_tail = None;
    if let Some(re) = UNTERMINATED.as_ref() {
        if let Some(caps) = re.captures(&answer) {
            unterminated_tail = caps.get(1).map(|m| m.as_str().trim().to_string());
            if let Some(whole) = caps.get(0) {
                answer.truncate(whole.start());
            }
        }
    }

    Stripped {
        answer: answer.trim().to_string(),
        unterminated_tail: unterminated_tail.filter(|t| !t.is_empty()),
    }
}
