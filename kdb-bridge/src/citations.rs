//! Source blocks and record counts for answers handed to the search layer.

use crate::protocol::{ContentItem, ToolCallResult};
use crate::text::truncate_chars;

const PREVIEW_ITEMS: usize = 2;
const PREVIEW_CHARS: usize = 200;

/// Markdown source block listing every tool call behind an answer.
/// Failed calls are listed without a result preview.
pub fn format_citations(query: &str, results: &[ToolCallResult]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut lines = vec![
        "---".to_string(),
        "**Source**: KDB+ Database (Intelligent MCP Client)".to_string(),
        format!("**Query**: {}", query),
        "**Tools Used**:".to_string(),
    ];

    for result in results {
        lines.push(format!("- {}", result.tool));
        if !result.purpose.is_empty() {
            lines.push(format!("  Purpose: {}", result.purpose));
        }
        if result.arguments.as_object().is_some_and(|args| !args.is_empty()) {
            lines.push(format!("  Arguments: {}", result.arguments));
        }
        if result.is_error || result.content.is_empty() {
            continue;
        }
        lines.push("  Result preview:".to_string());
        for item in result.content.iter().take(PREVIEW_ITEMS) {
            if let ContentItem::Text { text } = item {
                lines.push(format!("    {}...", truncate_chars(text, PREVIEW_CHARS)));
            }
        }
    }

    lines.push("---".to_string());
    lines.join("\n")
}

/// Content items across successful results.
pub fn count_records(results: &[ToolCallResult]) -> usize {
    results
        .iter()
        .filter(|r| !r.is_error)
        .map(|r| r.content.len())
        .sum()
}
