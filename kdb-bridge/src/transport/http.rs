//! Streamable-HTTP MCP channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;

use super::{initialize_params, JsonRpcRequest, JsonRpcResponse, McpChannel};
use crate::error::TransportError;

const SESSION_HEADER: &str = "Mcp-Session-Id";

pub struct HttpChannel {
    url: String,
    http_client: reqwest::Client,
    request_id: AtomicU64,
}

impl HttpChannel {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/event-stream"),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            url: url.to_string(),
            http_client,
            request_id: AtomicU64::new(0),
        })
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn post(
        &self,
        request: &JsonRpcRequest,
        session_id: Option<&str>,
    ) -> Result<reqwest::Response, TransportError> {
        let mut builder = self.http_client.post(&self.url).json(request);
        if let Some(session_id) = session_id {
            builder = builder.header(SESSION_HEADER, session_id);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Status { status, body });
        }
        Ok(response)
    }

    async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<(Value, Option<String>), TransportError> {
        let id = self.next_id();
        let request = JsonRpcRequest::call(id, method, params);
        tracing::debug!(method, id, "sending MCP request over HTTP");

        let response = self.post(&request, session_id).await?;
        let returned_session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let is_sse = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        let body = response.text().await?;

        let parsed = if is_sse {
            find_sse_response(&body, id)?
        } else {
            parse_json_response(&body, id)?
        };
        Ok((parsed.into_result()?, returned_session))
    }

    async fn close(&self, session_id: &str) {
        let result = self
            .http_client
            .delete(&self.url)
            .header(SESSION_HEADER, session_id)
            .send()
            .await;
        if let Err(e) = result {
            tracing::debug!(error = %e, "failed to close MCP HTTP session");
        }
    }
}

#[async_trait]
impl McpChannel for HttpChannel {
    async fn round_trip(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError> {
        let (_, session_id) = self
            .call("initialize", Some(initialize_params()), None)
            .await?;

        let notification = JsonRpcRequest::notification("notifications/initialized");
        if let Err(e) = self.post(&notification, session_id.as_deref()).await {
            tracing::debug!(error = %e, "initialized notification rejected");
        }

        let outcome = self
            .call(method, params, session_id.as_deref())
            .await
            .map(|(value, _)| value);

        if let Some(session_id) = session_id.as_deref() {
            self.close(session_id).await;
        }
        outcome
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// A plain JSON body must answer `expected_id`. Id-less error replies (JSON-RPC parse errors)
/// are passed through so the server's message is kept.
fn parse_json_response(body: &str, expected_id: u64) -> Result<JsonRpcResponse, TransportError> {
    let response = serde_json::from_str::<JsonRpcResponse>(body)?;
    let idless_error = response.error.is_some() && matches!(response.id, None | Some(Value::Null));
    if response.matches(expected_id) || idless_error {
        return Ok(response);
    }
    Err(TransportError::Protocol(format!(
        "Response id {:?} does not match request id {}",
        response.id, expected_id
    )))
}

/// Pull the JSON-RPC response with `expected_id` out of an SSE body.
fn find_sse_response(body: &str, expected_id: u64) -> Result<JsonRpcResponse, TransportError> {
    for line in body.lines() {
        let Some(data) = line.trim().strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() {
            continue;
        }
        match serde_json::from_str::<JsonRpcResponse>(data) {
            Ok(response) if response.matches(expected_id) => return Ok(response),
            Ok(_) => continue,
            Err(e) => {
                tracing::trace!(error = %e, "skipping non-response SSE event");
            }
        }
    }
    Err(TransportError::Protocol(format!(
        "No response with id {} in event stream",
        expected_id
    )))
}
