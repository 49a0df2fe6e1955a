//! Schema discovery against a live server: resources first, tools as a fallback.

use serde_json::json;

use crate::catalog::Catalog;
use crate::config::ClientConfig;
use crate::protocol::ToolCallResult;
use crate::schema_synth::{self, ResourceContent, SynthesizedSchema, DISCOVER_DYNAMICALLY};
use crate::session::McpSession;

const SCHEMA_TOOL_KEYWORDS: &[&str] = &["schema", "tables", "describe", "list", "meta", "columns"];

/// Canonical "what tables exist" statements, q forms first.
const LIST_TABLE_QUERIES: &[&str] = &["tables[]", "meta `", "SHOW TABLES", "SELECT name FROM tables"];

/// Read and categorize every model-facing resource. Falls back to tool probing when the
/// server advertises no resources. Never fails.
pub async fn discover_schema(
    session: &McpSession,
    catalog: &Catalog,
    config: &ClientConfig,
) -> SynthesizedSchema {
    let listed = session.list_resources().await;
    if listed.is_empty() {
        tracing::info!("no resources advertised, attempting schema discovery via tools");
        return SynthesizedSchema {
            schema: discover_via_tools(session, catalog).await,
            ..SynthesizedSchema::default()
        };
    }
    tracing::info!(count = listed.len(), "discovered resources");

    let mut for_llm: Vec<_> = listed
        .iter()
        .filter(|r| schema_synth::is_for_llm(r))
        .cloned()
        .collect();
    let dropped = listed.len() - for_llm.len();
    if dropped > 0 {
        tracing::info!(dropped, "filtered resources not intended for the model");
    }
    schema_synth::sort_by_priority(&mut for_llm);

    let mut read = Vec::with_capacity(for_llm.len());
    for resource in for_llm {
        let content = session.read_resource(&resource.uri).await;
        if content.is_empty() {
            tracing::warn!(uri = %resource.uri, "resource returned empty content");
            continue;
        }
        tracing::info!(
            resource = resource.display_name(),
            priority = resource.priority(),
            chars = content.len(),
            "read resource"
        );
        read.push(ResourceContent { resource, content });
    }

    schema_synth::synthesize(&listed, &read, config.resource_preview_chars)
}

/// Schema text from a tool's successful output, rejecting outputs that look like errors.
fn usable_text(result: &ToolCallResult, reject: &[&str]) -> Option<String> {
    if result.is_error {
        return None;
    }
    let text = result.text();
    let lower = text.to_lowercase();
    if text.trim().is_empty() || reject.iter().any(|r| lower.contains(r)) {
        return None;
    }
    Some(text)
}

/// Try schema-looking tools with no arguments, then list-tables statements against every
/// SQL-capable tool. Returns the placeholder text when nothing works.
pub async fn discover_via_tools(session: &McpSession, catalog: &Catalog) -> String {
    for tool in &catalog.tools {
        let haystack = format!("{} {}", tool.name, tool.description_text()).to_lowercase();
        if !SCHEMA_TOOL_KEYWORDS.iter().any(|k| haystack.contains(k)) {
            continue;
        }
        tracing::info!(tool = %tool.name, "attempting schema discovery via tool");
        let result = session.call_tool(&tool.name, json!({})).await;
        if let Some(text) = usable_text(&result, &["error"]) {
            tracing::info!(tool = %tool.name, chars = text.len(), "schema discovered via tool");
            return text;
        }
    }

    for sql_tool in catalog.sql_tools() {
        for query in LIST_TABLE_QUERIES {
            let result = session
                .call_tool(&sql_tool.name, sql_tool.arguments(query))
                .await;
            if let Some(text) = usable_text(&result, &["error", "can't lookup"]) {
                tracing::info!(tool = %sql_tool.name, query, "schema discovered via SQL");
                return format!("Available tables:\n{}", text);
            }
        }
    }

    tracing::warn!("could not discover schema, planner will be told to discover dynamically");
    DISCOVER_DYNAMICALLY.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ContentItem;

    fn ok(text: &str) -> ToolCallResult {
        ToolCallResult {
            tool: "t".into(),
            arguments: json!({}),
            is_error: false,
            content: vec![ContentItem::text(text)],
            error: None,
            purpose: String::new(),
        }
    }

    #[test]
    fn usable_text_rejects_error_looking_output() {
        assert_eq!(usable_text(&ok("daily\ntrade"), &["error"]).as_deref(), Some("daily\ntrade"));
        assert!(usable_text(&ok("'type Error"), &["error"]).is_none());
        assert!(usable_text(&ok("can't lookup tables"), &["error", "can't lookup"]).is_none());
        assert!(usable_text(&ok("  "), &["error"]).is_none());
        assert!(usable_text(&ToolCallResult::failure("t", json!({}), "boom"), &[]).is_none());
    }
}
