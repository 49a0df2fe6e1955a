//! In-memory MCP server and model used by the engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::KdbMcpClient;
use crate::config::ClientConfig;
use crate::error::{LlmError, TransportError};
use crate::llm::LanguageModel;
use crate::session::McpSession;
use crate::transport::McpChannel;

/// What a scripted tool call returns.
#[derive(Clone, Debug)]
pub enum Reply {
    Text(String),
    Rows(Value),
    ToolError(String),
    Transport(String),
}

struct Rule {
    tool: String,
    needle: String,
    reply: Reply,
}

/// Answers MCP requests from fixed scripts and records every request.
pub struct ScriptedChannel {
    tools: Option<Vec<Value>>,
    resources: Option<Vec<Value>>,
    resource_texts: HashMap<String, String>,
    rules: Vec<Rule>,
    log: Mutex<Vec<(String, Option<Value>)>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self {
            tools: Some(Vec::new()),
            resources: Some(Vec::new()),
            resource_texts: HashMap::new(),
            rules: Vec::new(),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_sql_tool(self) -> Self {
        self.with_tool(json!({
            "name": "kdbx_run_sql_query",
            "description": "Run a SQL query against KDB-X",
            "inputSchema": {
                "type": "object",
                "properties": {"query": {"type": "string", "description": "SQL statement"}},
                "required": ["query"]
            }
        }))
    }

    pub fn with_tool(mut self, tool: Value) -> Self {
        self.tools.get_or_insert_with(Vec::new).push(tool);
        self
    }

    /// `tools/list` fails, as when the server is unreachable.
    pub fn without_tool_listing(mut self) -> Self {
        self.tools = None;
        self
    }

    pub fn with_resource(mut self, descriptor: Value, text: &str) -> Self {
        let uri = descriptor["uri"].as_str().unwrap_or_default().to_string();
        self.resource_texts.insert(uri, text.to_string());
        self.resources.get_or_insert_with(Vec::new).push(descriptor);
        self
    }

    /// `resources/list` fails like a server without resource support.
    pub fn without_resource_support(mut self) -> Self {
        self.resources = None;
        self
    }

    /// First matching rule wins. `needle` is searched in the serialized arguments.
    pub fn on_call(mut self, tool: &str, needle: &str, reply: Reply) -> Self {
        self.rules.push(Rule {
            tool: tool.to_string(),
            needle: needle.to_string(),
            reply,
        });
        self
    }

    pub fn count(&self, method: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|(m, _)| m == method).count()
    }

    /// `(tool, arguments)` for every tools/call request, in order.
    pub fn tool_calls(&self) -> Vec<(String, Value)> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == "tools/call")
            .filter_map(|(_, params)| params.clone())
            .map(|p| {
                (
                    p["name"].as_str().unwrap_or_default().to_string(),
                    p["arguments"].clone(),
                )
            })
            .collect()
    }

    fn call_tool(&self, params: &Value) -> Result<Value, TransportError> {
        let name = params["name"].as_str().unwrap_or_default();
        let arguments = params["arguments"].to_string();
        let rule = self
            .rules
            .iter()
            .find(|r| r.tool == name && arguments.contains(&r.needle));

        match rule.map(|r| r.reply.clone()) {
            Some(Reply::Text(text)) => Ok(json!({"content": [{"type": "text", "text": text}]})),
            Some(Reply::Rows(rows)) => Ok(json!({
                "content": [{"type": "text", "text": json!({"data": rows}).to_string()}]
            })),
            Some(Reply::ToolError(message)) => Ok(json!({
                "content": [{"type": "text", "text": message}],
                "isError": true
            })),
            Some(Reply::Transport(message)) => Err(TransportError::Protocol(message)),
            None => Ok(json!({
                "content": [{"type": "text", "text": "Error: unscripted call"}],
                "isError": true
            })),
        }
    }
}

#[async_trait]
impl McpChannel for ScriptedChannel {
    async fn round_trip(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError> {
        self.log.lock().unwrap().push((method.to_string(), params.clone()));
        let params = params.unwrap_or(Value::Null);

        match method {
            "tools/list" => match &self.tools {
                Some(tools) => Ok(json!({ "tools": tools })),
                None => Err(TransportError::Http("connection refused".to_string())),
            },
            "resources/list" => match &self.resources {
                Some(resources) => Ok(json!({ "resources": resources })),
                None => Err(TransportError::Rpc {
                    code: -32601,
                    message: "Method not found".to_string(),
                }),
            },
            "resources/read" => {
                let uri = params["uri"].as_str().unwrap_or_default();
                match self.resource_texts.get(uri) {
                    Some(text) => Ok(json!({"contents": [{"uri": uri, "text": text}]})),
                    None => Err(TransportError::Protocol(format!("unknown resource {}", uri))),
                }
            }
            "tools/call" => self.call_tool(&params),
            other => Err(TransportError::Protocol(format!("unexpected method {}", other))),
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Replays queued completions and records every prompt it receives.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, String>>>,
    repeat: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            repeat: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Returns the same completion forever.
    pub fn always(response: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            repeat: Some(response.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a failed model call.
    pub fn then_fail(self, message: &str) -> Self {
        self.responses.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    pub fn with_responses<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.responses
            .lock()
            .unwrap()
            .extend(responses.into_iter().map(|r| Ok(r.into())));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(LlmError::Request(message)),
            None => self
                .repeat
                .clone()
                .ok_or_else(|| LlmError::Request("script exhausted".to_string())),
        }
    }
}

pub fn client(channel: &Arc<ScriptedChannel>, model: &Arc<ScriptedModel>) -> KdbMcpClient {
    client_with_config(channel, model, ClientConfig::default())
}

pub fn client_with_config(
    channel: &Arc<ScriptedChannel>,
    model: &Arc<ScriptedModel>,
    config: ClientConfig,
) -> KdbMcpClient {
    let channel: Arc<dyn McpChannel> = channel.clone();
    let model: Arc<dyn LanguageModel> = model.clone();
    KdbMcpClient::new(McpSession::new(channel), model, config)
}

/// Schema resource in the shape KDB-X servers publish.
pub fn describe_tables_resource() -> Value {
    json!({
        "uri": "kdbx://describe_tables",
        "name": "kdbx_describe_tables",
        "description": "Tables and columns in the database",
        "annotations": {"audience": ["assistant"], "priority": 0.9}
    })
}

pub const DAILY_SCHEMA: &str = "Table: daily\nColumns: date, sym, open, high, low, close, volume";

/// A server with one SQL tool, one schema resource and a populated `daily` table.
pub fn market_server() -> ScriptedChannel {
    ScriptedChannel::new()
        .with_sql_tool()
        .with_resource(describe_tables_resource(), DAILY_SCHEMA)
        .on_call("kdbx_run_sql_query", "COUNT(*)", Reply::Rows(json!([{"row_count": 2520}])))
        .on_call(
            "kdbx_run_sql_query",
            "DISTINCT",
            Reply::Rows(json!([{"sym": "AAPL"}, {"sym": "MSFT"}])),
        )
        .on_call(
            "kdbx_run_sql_query",
            "MIN(",
            Reply::Rows(json!([{"min_date": "2020-01-02", "max_date": "2024-12-31"}])),
        )
}
