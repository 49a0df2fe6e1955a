//! Final answer synthesis over accumulated tool results.

use crate::llm::LanguageModel;
use crate::prompts;
use crate::protocol::{ContentItem, ToolCallResult};

/// Numbered steps with purpose and either the error or the text content.
pub fn format_results(results: &[ToolCallResult]) -> String {
    let mut lines = Vec::new();
    for (i, result) in results.iter().enumerate() {
        lines.push(format!("### Step {}: {}", i + 1, result.tool));
        if !result.purpose.is_empty() {
            lines.push(format!("Purpose: {}", result.purpose));
        }
        match &result.error {
            Some(error) => lines.push(format!("Error: {}", error)),
            None => {
                for item in &result.content {
                    if let ContentItem::Text { text } = item {
                        lines.push(text.clone());
                    }
                }
            }
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

/// One model call. On failure the formatted results are returned raw.
pub async fn synthesize(model: &dyn LanguageModel, query: &str, results: &[ToolCallResult]) -> String {
    let formatted = format_results(results);
    let prompt = prompts::synthesis_prompt(query, &formatted);

    match model.generate(&prompt).await {
        Ok(answer) => answer.trim().to_string(),
        Err(e) => {
            tracing::error!(error = %e, "result synthesis failed");
            format!("Error synthesizing results: {}\n\nRaw results:\n{}", e, formatted)
        }
    }
}
