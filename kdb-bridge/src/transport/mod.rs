//! JSON-RPC plumbing for MCP servers.
//!
//! A channel performs exactly one request per session: open, handshake, request, tear down.
//! Nothing is shared between calls.

pub mod http;
pub mod stdio;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::TransportConfig;
use crate::error::TransportError;

pub use http::HttpChannel;
pub use stdio::StdioChannel;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// One MCP request in its own freshly opened session.
#[async_trait]
pub trait McpChannel: Send + Sync {
    async fn round_trip(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError>;

    /// Human-readable endpoint for logs.
    fn describe(&self) -> String;
}

/// Build the channel for a transport configuration.
pub fn connect(config: &TransportConfig) -> Result<Arc<dyn McpChannel>, TransportError> {
    Ok(match config {
        TransportConfig::Http { url, timeout_secs } => {
            Arc::new(HttpChannel::new(url, *timeout_secs)?)
        }
        TransportConfig::Stdio {
            command,
            args,
            env,
            timeout_secs,
        } => Arc::new(StdioChannel::new(command, args.clone(), env.clone(), *timeout_secs)),
    })
}

/// MCP JSON-RPC request
#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn call(id: u64, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: Some(id),
            method: method.to_string(),
            params,
        }
    }

    pub fn notification(method: &str) -> Self {
        Self {
            jsonrpc: "2.0",
            id: None,
            method: method.to_string(),
            params: None,
        }
    }
}

/// MCP JSON-RPC response
#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcResponse {
    /// Servers echo ids as numbers, occasionally as strings.
    pub fn matches(&self, expected: u64) -> bool {
        match &self.id {
            Some(Value::Number(n)) => n.as_u64() == Some(expected),
            Some(Value::String(s)) => s.parse::<u64>().ok() == Some(expected),
            _ => false,
        }
    }

    pub fn into_result(self) -> Result<Value, TransportError> {
        if let Some(error) = self.error {
            return Err(TransportError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        self.result
            .ok_or_else(|| TransportError::Protocol("No result in response".to_string()))
    }
}

pub(crate) fn initialize_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_omits_id() {
        let raw = serde_json::to_value(JsonRpcRequest::notification("notifications/initialized")).unwrap();
        assert!(raw.get("id").is_none());
        assert_eq!(raw["method"], "notifications/initialized");
    }

    #[test]
    fn response_id_matches_string_or_number() {
        let numeric: JsonRpcResponse = serde_json::from_str(r#"{"jsonrpc":"2.0","id":7,"result":{}}"#).unwrap();
        let textual: JsonRpcResponse = serde_json::from_str(r#"{"jsonrpc":"2.0","id":"7","result":{}}"#).unwrap();
        assert!(numeric.matches(7));
        assert!(textual.matches(7));
        assert!(!numeric.matches(8));
    }

    #[test]
    fn rpc_error_becomes_transport_error() {
        let response: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();
        match response.into_result() {
            Err(TransportError::Rpc { code, message }) => {
                assert_eq!(code, -32601);
                assert_eq!(message, "Method not found");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
