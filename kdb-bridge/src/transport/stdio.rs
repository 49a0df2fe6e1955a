//! Stdio MCP channel: one child process per request.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{ChildStdin, ChildStdout, Command};

use super::{initialize_params, JsonRpcRequest, JsonRpcResponse, McpChannel};
use crate::error::TransportError;

pub struct StdioChannel {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    timeout: Duration,
}

/// Pipes of a spawned server, alive for a single round trip.
struct StdioSession {
    stdin: ChildStdin,
    stdout_lines: Lines<BufReader<ChildStdout>>,
    request_id: u64,
    timeout: Duration,
}

impl StdioSession {
    async fn write(&mut self, request: &JsonRpcRequest) -> Result<(), TransportError> {
        let line = serde_json::to_string(request)?;
        tracing::trace!(request = %line, "writing to MCP server stdin");
        self.stdin.write_all(format!("{}\n", line).as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn send_request(&mut self, method: &str, params: Option<Value>) -> Result<Value, TransportError> {
        self.request_id += 1;
        let id = self.request_id;
        self.write(&JsonRpcRequest::call(id, method, params)).await?;

        match tokio::time::timeout(self.timeout, self.read_response(id)).await {
            Ok(response) => response?.into_result(),
            Err(_) => Err(TransportError::Timeout(id)),
        }
    }

    /// Read lines until the response for `expected_id` arrives. Notifications, logs and
    /// responses to other ids are skipped.
    async fn read_response(&mut self, expected_id: u64) -> Result<JsonRpcResponse, TransportError> {
        loop {
            let Some(line) = self.stdout_lines.next_line().await? else {
                return Err(TransportError::Protocol(
                    "Server closed connection (EOF)".to_string(),
                ));
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                Ok(response) if response.matches(expected_id) => return Ok(response),
                Ok(response) => {
                    tracing::trace!(id = ?response.id, expected_id, "skipping unrelated message");
                }
                Err(_) => {
                    tracing::trace!(line = trimmed, "skipping non-JSON-RPC line");
                }
            }
        }
    }
}

impl StdioChannel {
    pub fn new(
        command: &str,
        args: Vec<String>,
        env: HashMap<String, String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            command: command.to_string(),
            args,
            env,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl McpChannel for StdioChannel {
    async fn round_trip(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| TransportError::Spawn {
            command: self.command.clone(),
            reason: e.to_string(),
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Protocol("Failed to open stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Protocol("Failed to open stdout".to_string()))?;

        let mut session = StdioSession {
            stdin,
            stdout_lines: BufReader::new(stdout).lines(),
            request_id: 0,
            timeout: self.timeout,
        };

        session
            .send_request("initialize", Some(initialize_params()))
            .await?;
        if let Err(e) = session
            .write(&JsonRpcRequest::notification("notifications/initialized"))
            .await
        {
            tracing::debug!(error = %e, "failed to send initialized notification");
        }

        let outcome = session.send_request(method, params).await;

        drop(session);
        if let Err(e) = child.kill().await {
            tracing::debug!(error = %e, command = %self.command, "MCP server process already exited");
        }
        outcome
    }

    fn describe(&self) -> String {
        format!("{} {}", self.command, self.args.join(" "))
            .trim()
            .to_string()
    }
}
