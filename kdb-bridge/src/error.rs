use thiserror::Error;

/// Failures talking to the MCP server. Only `McpSession` sees these; everything above it
/// receives soft-failed values instead.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("MCP server returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to spawn MCP server process '{command}': {reason}")]
    Spawn { command: String, reason: String },

    #[error("I/O error on MCP server pipe: {0}")]
    Io(#[from] std::io::Error),

    #[error("MCP error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed MCP response: {0}")]
    Protocol(String),

    #[error("Request timed out waiting for id {0}")]
    Timeout(u64),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Protocol(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Model request failed: {0}")]
    Request(String),

    #[error("Model returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Missing content in model response")]
    EmptyCompletion,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Request(err.to_string())
    }
}

/// The only errors allowed to cross the client's public entry points.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to list MCP tools: {0}")]
    ToolListing(#[source] TransportError),

    #[error("Query exceeded its deadline of {0} ms")]
    DeadlineExceeded(u128),
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),
}
