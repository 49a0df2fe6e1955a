//! Soft-failing MCP operations on top of a [`McpChannel`].
//!
//! Only `list_tools` reports errors. Resource discovery degrades to empty values and tool calls
//! turn every failure into a [`ToolCallResult`] with `is_error` set.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::TransportError;
use crate::protocol::{ResourceDescriptor, ToolCallResult, ToolDescriptor};
use crate::transport::McpChannel;

/// Upper bound on tools/list pages, guarding against servers that repeat cursors.
const MAX_LIST_PAGES: usize = 50;

#[derive(Clone)]
pub struct McpSession {
    channel: Arc<dyn McpChannel>,
}

impl McpSession {
    pub fn new(channel: Arc<dyn McpChannel>) -> Self {
        Self { channel }
    }

    pub fn endpoint(&self) -> String {
        self.channel.describe()
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, TransportError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self.channel.round_trip("tools/list", params).await?;

            let page: Vec<ToolDescriptor> = match result.get("tools") {
                Some(raw) => serde_json::from_value(raw.clone())?,
                None => Vec::new(),
            };
            tools.extend(page);

            cursor = result
                .get("nextCursor")
                .and_then(|c| c.as_str())
                .filter(|c| !c.is_empty())
                .map(String::from);
            if cursor.is_none() {
                break;
            }
        }

        tracing::info!(count = tools.len(), endpoint = %self.endpoint(), "listed MCP tools");
        Ok(tools)
    }

    /// Servers without resource support yield an empty list.
    pub async fn list_resources(&self) -> Vec<ResourceDescriptor> {
        let result = match self.channel.round_trip("resources/list", None).await {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(error = %e, "resource listing unavailable");
                return Vec::new();
            }
        };

        let raw = result
            .get("resources")
            .and_then(|r| r.as_array())
            .cloned()
            .unwrap_or_default();

        raw.into_iter()
            .filter_map(|entry| match serde_json::from_value::<ResourceDescriptor>(entry) {
                Ok(resource) => Some(resource),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping malformed resource descriptor");
                    None
                }
            })
            .collect()
    }

    /// Text of a resource, or an empty string when it cannot be read.
    pub async fn read_resource(&self, uri: &str) -> String {
        match self
            .channel
            .round_trip("resources/read", Some(json!({ "uri": uri })))
            .await
        {
            Ok(result) => resource_text(&result),
            Err(e) => {
                tracing::warn!(uri, error = %e, "failed to read resource");
                String::new()
            }
        }
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolCallResult {
        let params = json!({ "name": name, "arguments": arguments });
        match self.channel.round_trip("tools/call", Some(params)).await {
            Ok(raw) => {
                let result = ToolCallResult::from_mcp(name, arguments, &raw);
                if let Some(error) = &result.error {
                    tracing::debug!(tool = name, error = %error, "tool reported an error");
                }
                result
            }
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "tool call failed");
                ToolCallResult::failure(name, arguments, &e.to_string())
            }
        }
    }
}

fn resource_text(result: &Value) -> String {
    result
        .get("contents")
        .and_then(|c| c.as_array())
        .map(|contents| {
            contents
                .iter()
                .filter_map(|c| c.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}
