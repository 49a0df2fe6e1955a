//! Shared types for the MCP catalog, tool results, query plans and probed data content.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Default priority for resources that carry no priority annotation.
pub const DEFAULT_RESOURCE_PRIORITY: f64 = 0.5;

// ============ Catalog Types ============

/// MCP tool definition from a tools/list response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", alias = "input_schema", default)]
    pub input_schema: Option<Value>,
}

/// One parameter flattened out of a tool's JSON-schema `properties`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolParameter {
    pub name: String,
    pub param_type: String,
    pub required: bool,
    pub description: Option<String>,
}

impl ToolDescriptor {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            input_schema: None,
        }
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    /// Parameters in schema order, or `None` when the tool declares no input schema.
    pub fn parameters(&self) -> Option<Vec<ToolParameter>> {
        let schema = self.input_schema.as_ref()?;
        let required: Vec<&str> = schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        let params = schema
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|props| {
                props
                    .iter()
                    .map(|(name, info)| ToolParameter {
                        name: name.clone(),
                        param_type: info
                            .get("type")
                            .and_then(|t| t.as_str())
                            .unwrap_or("any")
                            .to_string(),
                        required: required.contains(&name.as_str()),
                        description: info
                            .get("description")
                            .and_then(|d| d.as_str())
                            .filter(|d| !d.is_empty())
                            .map(String::from),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(params)
    }
}

/// Audience/priority hints attached to a resource by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceAnnotations {
    #[serde(default, deserialize_with = "string_or_list")]
    pub audience: Option<Vec<String>>,
    #[serde(default)]
    pub priority: Option<f64>,
}

/// MCP resource definition from a resources/list response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "mimeType", alias = "mime_type", default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub annotations: Option<ResourceAnnotations>,
}

impl ResourceDescriptor {
    pub fn new(uri: &str, name: &str, description: &str) -> Self {
        Self {
            uri: uri.to_string(),
            name: Some(name.to_string()),
            description: Some(description.to_string()),
            mime_type: None,
            annotations: None,
        }
    }

    pub fn with_annotations(mut self, audience: Option<&[&str]>, priority: Option<f64>) -> Self {
        self.annotations = Some(ResourceAnnotations {
            audience: audience.map(|a| a.iter().map(|s| s.to_string()).collect()),
            priority,
        });
        self
    }

    /// Name used for headings and logs; falls back to the URI.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.uri)
    }

    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn priority(&self) -> f64 {
        self.annotations
            .as_ref()
            .and_then(|a| a.priority)
            .filter(|p| p.is_finite())
            .unwrap_or(DEFAULT_RESOURCE_PRIORITY)
    }

    pub fn audience(&self) -> Option<&[String]> {
        self.annotations.as_ref().and_then(|a| a.audience.as_deref())
    }
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(vec![s]),
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
        ),
        _ => None,
    })
}

// ============ Tool Results ============

/// One item of a tool result's `content` list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text {
        text: String,
    },
    /// Image/audio/blob payloads, kept opaque.
    Binary {
        kind: String,
        data: String,
        mime_type: Option<String>,
    },
    /// Embedded resource content
    Resource {
        uri: String,
        text: Option<String>,
        mime_type: Option<String>,
    },
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Text { text: text.into() }
    }

    /// Convert a raw MCP content entry. Unknown shapes are stringified as text.
    pub fn from_mcp(raw: &Value) -> Self {
        let kind = raw.get("type").and_then(|t| t.as_str()).unwrap_or("");

        if let Some(text) = raw.get("text").and_then(|t| t.as_str()) {
            if kind.is_empty() || kind == "text" {
                return ContentItem::text(text);
            }
        }

        if let Some(resource) = raw.get("resource") {
            return ContentItem::Resource {
                uri: resource
                    .get("uri")
                    .and_then(|u| u.as_str())
                    .unwrap_or_default()
                    .to_string(),
                text: resource
                    .get("text")
                    .and_then(|t| t.as_str())
                    .map(String::from),
                mime_type: resource
                    .get("mimeType")
                    .and_then(|m| m.as_str())
                    .map(String::from),
            };
        }

        if let Some(data) = raw.get("data").and_then(|d| d.as_str()) {
            return ContentItem::Binary {
                kind: if kind.is_empty() { "binary".to_string() } else { kind.to_string() },
                data: data.to_string(),
                mime_type: raw
                    .get("mimeType")
                    .and_then(|m| m.as_str())
                    .map(String::from),
            };
        }

        match raw {
            Value::String(s) => ContentItem::text(s.clone()),
            other => ContentItem::text(other.to_string()),
        }
    }

    /// Textual payload, if this item carries one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentItem::Text { text } => Some(text),
            ContentItem::Resource { text, .. } => text.as_deref(),
            ContentItem::Binary { .. } => None,
        }
    }
}

/// Outcome of a single tool invocation. Failures are data, never errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallResult {
    pub tool: String,
    pub arguments: Value,
    pub is_error: bool,
    pub content: Vec<ContentItem>,
    pub error: Option<String>,
    pub purpose: String,
}

impl ToolCallResult {
    /// Build from a raw `tools/call` result (`{content: [...], isError: bool}`).
    pub fn from_mcp(tool: &str, arguments: Value, raw: &Value) -> Self {
        let content: Vec<ContentItem> = raw
            .get("content")
            .and_then(|c| c.as_array())
            .map(|items| items.iter().map(ContentItem::from_mcp).collect())
            .unwrap_or_default();
        let is_error = raw
            .get("isError")
            .or_else(|| raw.get("is_error"))
            .and_then(|e| e.as_bool())
            .unwrap_or(false);

        let error = if is_error {
            let texts: Vec<&str> = content
                .iter()
                .filter_map(|c| match c {
                    ContentItem::Text { text } if !text.trim().is_empty() => Some(text.as_str()),
                    _ => None,
                })
                .collect();
            Some(if texts.is_empty() {
                format!("Tool '{}' reported an error without details", tool)
            } else {
                texts.join(" ")
            })
        } else {
            None
        };

        Self {
            tool: tool.to_string(),
            arguments,
            is_error,
            content,
            error,
            purpose: String::new(),
        }
    }

    /// A transport-level failure expressed as a result.
    pub fn failure(tool: &str, arguments: Value, message: &str) -> Self {
        Self {
            tool: tool.to_string(),
            arguments,
            is_error: true,
            content: vec![ContentItem::text(format!("Tool execution error: {}", message))],
            error: Some(message.to_string()),
            purpose: String::new(),
        }
    }

    pub fn with_purpose(mut self, purpose: &str) -> Self {
        self.purpose = purpose.to_string();
        self
    }

    /// All textual content joined by newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentItem::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============ Query Plans ============

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanStep {
    pub tool: String,
    pub arguments: Value,
    pub purpose: String,
}

/// A model-produced plan. Built once per planning iteration and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPlan {
    pub reasoning: String,
    pub data_available: bool,
    pub limitations: Option<String>,
    pub steps: Vec<PlanStep>,
}

impl QueryPlan {
    /// A plan with no steps, carrying a diagnostic or explanatory reasoning string.
    pub fn without_steps(reasoning: impl Into<String>) -> Self {
        Self {
            reasoning: reasoning.into(),
            data_available: true,
            limitations: None,
            steps: Vec::new(),
        }
    }

    /// Read a plan object leniently: missing fields take defaults, malformed steps are dropped.
    pub fn from_json(value: &Value) -> Self {
        let reasoning = match value.get("reasoning") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let data_available = !matches!(
            value.get("data_available"),
            Some(Value::Bool(false))
        ) && !matches!(
            value.get("data_available").and_then(|v| v.as_str()),
            Some(s) if s.eq_ignore_ascii_case("false")
        );

        let limitations = value
            .get("limitations")
            .and_then(|l| l.as_str())
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("null"))
            .map(String::from);

        let steps = value
            .get("steps")
            .and_then(|s| s.as_array())
            .map(|arr| arr.iter().filter_map(PlanStep::from_json).collect())
            .unwrap_or_default();

        Self {
            reasoning,
            data_available,
            limitations,
            steps,
        }
    }

    /// Answer text for a plan that declared the data unavailable.
    pub fn unavailable_answer(&self) -> String {
        match &self.limitations {
            Some(limitations) => format!("{}\n\n{}", self.reasoning, limitations),
            None => self.reasoning.clone(),
        }
    }
}

impl PlanStep {
    fn from_json(value: &Value) -> Option<Self> {
        let tool = ["tool", "name", "tool_name"]
            .iter()
            .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
            .map(str::trim)
            .filter(|t| !t.is_empty())?
            .to_string();

        let arguments = ["arguments", "args", "parameters"]
            .iter()
            .find_map(|key| value.get(*key))
            .filter(|v| v.is_object())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        let purpose = value
            .get("purpose")
            .and_then(|p| p.as_str())
            .unwrap_or_default()
            .to_string();

        Some(Self {
            tool,
            arguments,
            purpose,
        })
    }
}

// ============ Probed Data Content ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub min: String,
    pub max: String,
}

/// What probing learned about one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataContentEntry {
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbols: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_text: Option<BTreeMap<String, Vec<String>>>,
}

/// Probed content keyed by table name.
pub type DataContent = BTreeMap<String, DataContentEntry>;

// ============ Public Outcomes ============

/// Result of the plan/execute/re-plan loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntelligentAnswer {
    pub answer: String,
    pub tool_results: Vec<ToolCallResult>,
}

/// Result of the single-query chat path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub sql_query: Option<String>,
    pub rows: Vec<Value>,
}

impl ChatAnswer {
    pub fn text_only(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sql_query: None,
            rows: Vec::new(),
        }
    }
}

/// Answer plus rendered citations, as handed to the search/merge layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub answer: String,
    pub citations: String,
    pub record_count: usize,
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        self.answer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_parameters_follow_required_list() {
        let tool = ToolDescriptor::new("kdbx_run_sql_query", "Run SQL").with_input_schema(json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "SQL to run"},
                "limit": {"type": "integer"}
            },
            "required": ["query"]
        }));

        let params = tool.parameters().unwrap();
        let query = params.iter().find(|p| p.name == "query").unwrap();
        let limit = params.iter().find(|p| p.name == "limit").unwrap();
        assert!(query.required);
        assert_eq!(query.description.as_deref(), Some("SQL to run"));
        assert!(!limit.required);
        assert_eq!(limit.param_type, "integer");
    }

    #[test]
    fn resource_annotations_accept_single_audience_string() {
        let res: ResourceDescriptor = serde_json::from_value(json!({
            "uri": "file://schema",
            "name": "kdbx_describe_tables",
            "annotations": {"audience": "assistant", "priority": 0.9}
        }))
        .unwrap();
        assert_eq!(res.audience(), Some(&["assistant".to_string()][..]));
        assert_eq!(res.priority(), 0.9);
    }

    #[test]
    fn resource_priority_defaults_to_half() {
        let res = ResourceDescriptor::new("u", "n", "d");
        assert_eq!(res.priority(), DEFAULT_RESOURCE_PRIORITY);
    }

    #[test]
    fn error_result_carries_joined_text() {
        let raw = json!({
            "isError": true,
            "content": [
                {"type": "text", "text": "table not found:"},
                {"type": "text", "text": "trades"}
            ]
        });
        let result = ToolCallResult::from_mcp("kdbx_run_sql_query", json!({}), &raw);
        assert!(result.is_error);
        assert_eq!(result.error.as_deref(), Some("table not found: trades"));
    }

    #[test]
    fn error_result_without_text_still_has_message() {
        let raw = json!({"isError": true, "content": []});
        let result = ToolCallResult::from_mcp("t", json!({}), &raw);
        assert!(result.error.as_deref().is_some_and(|e| !e.is_empty()));
    }

    #[test]
    fn content_items_cover_binary_and_embedded_resources() {
        let raw = json!({
            "content": [
                {"type": "image", "data": "aGVsbG8=", "mimeType": "image/png"},
                {"type": "resource", "resource": {"uri": "kdb://t", "text": "rows", "mimeType": "text/plain"}}
            ]
        });
        let result = ToolCallResult::from_mcp("t", json!({}), &raw);
        assert!(matches!(&result.content[0], ContentItem::Binary { kind, .. } if kind == "image"));
        assert_eq!(result.text(), "rows");
    }

    #[test]
    fn plan_from_json_defaults_and_drops_bad_steps() {
        let plan = QueryPlan::from_json(&json!({
            "reasoning": "use daily",
            "steps": [
                {"tool": "kdbx_run_sql_query", "arguments": {"query": "SELECT 1"}, "purpose": "probe"},
                {"purpose": "no tool here"}
            ]
        }));
        assert!(plan.data_available);
        assert_eq!(plan.limitations, None);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].arguments["query"], "SELECT 1");
    }

    #[test]
    fn unavailable_answer_joins_limitations() {
        let plan = QueryPlan::from_json(&json!({
            "reasoning": "R",
            "data_available": false,
            "limitations": "L",
            "steps": []
        }));
        assert!(!plan.data_available);
        assert_eq!(plan.unavailable_answer(), "R\n\nL");
    }
}
