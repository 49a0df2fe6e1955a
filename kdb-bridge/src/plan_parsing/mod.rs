//! Turning noisy model output into a [`QueryPlan`].
//!
//! Order of attempts:
//! 1. strip reasoning blocks (an empty remainder fails the attempt),
//! 2. strict JSON: fenced block, outer braces, balanced scan,
//! 3. lenient repair (Python literals, trailing commas, json5),
//! 4. SQL recovery into a one-step plan,
//! 5. an empty plan whose reasoning previews the raw response.
//!
//! None of these steps return errors.

pub mod json_candidates;
pub mod json_fixer;
pub mod reasoning;
pub mod sql_cleanup;
pub mod sql_fallback;

use serde_json::Value;

use crate::catalog::SqlTool;
use crate::protocol::{PlanStep, QueryPlan};
use crate::text::truncate_chars;

pub use json_candidates::extract_json_object;
pub use reasoning::strip_reasoning;
pub use sql_cleanup::{clean_sql, validated_select};
pub use sql_fallback::extract_sql;

const PREVIEW_CHARS: usize = 200;

pub const SQL_FALLBACK_REASONING: &str = "Extracted SQL from response (JSON parsing failed)";
pub const SQL_FALLBACK_PURPOSE: &str = "Execute user query";
pub const EMPTY_AFTER_REASONING: &str =
    "Model response contained only reasoning blocks; no plan was produced.";

/// Extract the plan object as a JSON string using the strict strategies.
///
/// When stripping leaves nothing usable but an unclosed reasoning block holds an object,
/// that object is returned.
pub fn extract_plan_json(raw: &str) -> Option<String> {
    let stripped = strip_reasoning(raw);
    if !stripped.answer.is_empty() {
        if let Some(found) = extract_json_object(&stripped.answer) {
            return Some(found);
        }
    }
    stripped
        .unterminated_tail
        .as_deref()
        .and_then(extract_json_object)
}

fn preview(raw: &str) -> String {
    if raw.trim().is_empty() {
        return "empty".to_string();
    }
    truncate_chars(raw, PREVIEW_CHARS).replace('\n', " ")
}

/// One-step plan around a recovered statement.
pub fn sql_plan(sql: &str, tool: &SqlTool) -> QueryPlan {
    QueryPlan {
        reasoning: SQL_FALLBACK_REASONING.to_string(),
        data_available: true,
        limitations: None,
        steps: vec![PlanStep {
            tool: tool.name.clone(),
            arguments: tool.arguments(sql),
            purpose: SQL_FALLBACK_PURPOSE.to_string(),
        }],
    }
}

/// Parse a planner response. `sql_tool` receives statements recovered without JSON.
pub fn parse_plan(raw: &str, sql_tool: &SqlTool) -> QueryPlan {
    if let Some(json) = extract_plan_json(raw) {
        if let Ok(value) = serde_json::from_str::<Value>(&json) {
            return QueryPlan::from_json(&value);
        }
    }

    // An unclosed reasoning tail only feeds the strict JSON pass above; statements the model
    // was still weighing are never executed.
    let stripped = strip_reasoning(raw);
    if stripped.answer.is_empty() {
        tracing::warn!(chars = raw.len(), "planner response empty after removing reasoning");
        return QueryPlan::without_steps(EMPTY_AFTER_REASONING);
    }
    let search_space = stripped.answer.as_str();

    if let Some(value) = json_fixer::parse_lenient_object(search_space) {
        tracing::debug!("planner JSON recovered by lenient repair");
        return QueryPlan::from_json(&value);
    }

    if let Some(sql) = extract_sql(search_space) {
        tracing::info!(sql = %truncate_chars(&sql, 100), "using SQL recovered from planner response");
        return sql_plan(&sql, sql_tool);
    }

    tracing::warn!(preview = %truncate_chars(raw, 500), "could not extract a plan from model response");
    QueryPlan::without_steps(format!(
        "Failed to parse LLM response. Preview: {}...",
        preview(raw)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool() -> SqlTool {
        SqlTool {
            name: "kdbx_run_sql_query".to_string(),
            argument: "query".to_string(),
        }
    }

    fn parses_to_a1(raw: &str) {
        let json = extract_plan_json(raw).unwrap_or_else(|| panic!("no JSON in {:?}", raw));
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, json!({"a": 1}), "input {:?}", raw);
    }

    #[test]
    fn extraction_handles_common_shapes() {
        parses_to_a1("```json\n{\"a\":1}\n```");
        parses_to_a1("blah {\"a\":1} blah");
        parses_to_a1("<think>I will answer with {\"a\":1}");

        let nested = extract_plan_json("{\"a\": {\"b\": 1}} trailing junk").unwrap();
        let value: Value = serde_json::from_str(&nested).unwrap();
        assert_eq!(value, json!({"a": {"b": 1}}));
    }

    #[test]
    fn closed_reasoning_does_not_leak_objects() {
        let raw = "<think>maybe {\"steps\": [1]}</think>{\"reasoning\": \"final\", \"steps\": []}";
        let plan = parse_plan(raw, &tool());
        assert_eq!(plan.reasoning, "final");
        assert!(plan.steps.is_empty());
    }

    #[test]
    fn only_reasoning_yields_diagnostic_plan() {
        let plan = parse_plan("<think>hmm</think>", &tool());
        assert!(plan.steps.is_empty());
        assert_eq!(plan.reasoning, EMPTY_AFTER_REASONING);
    }

    #[test]
    fn sql_inside_unclosed_reasoning_is_not_run() {
        let raw = "<think>Maybe I should run SELECT price FROM trades_old but that table is gone";
        let plan = parse_plan(raw, &tool());
        assert!(plan.steps.is_empty());
        assert_eq!(plan.reasoning, EMPTY_AFTER_REASONING);
    }

    #[test]
    fn lenient_repair_before_sql_fallback() {
        let raw = "{\"reasoning\": \"r\", \"data_available\": True, \"steps\": [{\"tool\": \"kdbx_run_sql_query\", \"arguments\": {\"query\": \"SELECT 1 FROM daily\"}, \"purpose\": \"p\"},]}";
        let plan = parse_plan(raw, &tool());
        assert_eq!(plan.reasoning, "r");
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].purpose, "p");
    }

    #[test]
    fn sql_fallback_builds_single_step() {
        let plan = parse_plan("Sure! SELECT close FROM daily WHERE sym = 'AAPL'", &tool());
        assert_eq!(plan.reasoning, SQL_FALLBACK_REASONING);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].tool, "kdbx_run_sql_query");
        assert_eq!(plan.steps[0].arguments, json!({"query": "SELECT close FROM daily"}));
        assert_eq!(plan.steps[0].purpose, SQL_FALLBACK_PURPOSE);
    }

    #[test]
    fn unusable_output_previews_response() {
        let plan = parse_plan("I am not sure\nwhat you mean", &tool());
        assert!(plan.steps.is_empty());
        assert_eq!(
            plan.reasoning,
            "Failed to parse LLM response. Preview: I am not sure what you mean..."
        );
    }
}
