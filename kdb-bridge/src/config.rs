use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_SQL_TOOL: &str = "kdbx_run_sql_query";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Engine tuning. Every field has a default so partial JSON overrides work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Column-name fragments that identify the instrument/symbol column.
    pub symbol_patterns: Vec<String>,
    pub date_patterns: Vec<String>,
    pub text_patterns: Vec<String>,
    /// Words that look like identifiers in schema prose but are never tables or columns.
    pub table_filter_words: Vec<String>,
    /// Explicit SQL tool name; otherwise resolved from the catalog.
    pub sql_tool: Option<String>,
    pub max_iterations: usize,
    pub symbol_limit: usize,
    pub text_sample_limit: usize,
    pub schema_prompt_chars: usize,
    pub data_prompt_chars: usize,
    pub context_chars: usize,
    pub resource_preview_chars: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            symbol_patterns: strings(&["sym", "symbol", "ticker", "stock", "instrument", "security"]),
            date_patterns: strings(&["date", "datetime", "time", "timestamp", "dt", "ts"]),
            text_patterns: strings(&[
                "title",
                "summary",
                "description",
                "text",
                "content",
                "name",
                "headline",
                "body",
                "message",
                "comment",
                "note",
            ]),
            table_filter_words: strings(&[
                "table", "tables", "schema", "column", "columns", "type", "description", "example",
                "name", "the", "select", "from", "where", "and", "or", "not",
            ]),
            sql_tool: None,
            max_iterations: 3,
            symbol_limit: 100,
            text_sample_limit: 10,
            schema_prompt_chars: 2000,
            data_prompt_chars: 2000,
            context_chars: 2000,
            resource_preview_chars: 5000,
        }
    }
}

impl ClientConfig {
    /// Load overrides from inline JSON or an `@path` reference.
    pub fn from_json_or_file(raw: &str) -> Result<Self, ConfigError> {
        parse_json_or_file(raw)
    }

    pub fn is_filter_word(&self, word: &str) -> bool {
        self.table_filter_words
            .iter()
            .any(|w| w.eq_ignore_ascii_case(word))
    }
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// How to reach the MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    Http {
        url: String,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
}

impl TransportConfig {
    pub fn http(url: &str) -> Self {
        TransportConfig::Http {
            url: url.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_model_timeout() -> u64 {
    120
}

impl ModelConfig {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_model_timeout(),
        }
    }
}

/// Return the raw string, or the contents of the file when prefixed with `@`.
pub fn read_value_or_file(raw: &str) -> Result<String, ConfigError> {
    if let Some(path) = raw.strip_prefix('@') {
        fs::read_to_string(Path::new(path)).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })
    } else {
        Ok(raw.to_string())
    }
}

/// Parse a JSON value from either inline JSON or a @path reference
pub fn parse_json_or_file<T: DeserializeOwned>(raw: &str) -> Result<T, ConfigError> {
    let data = read_value_or_file(raw)?;
    Ok(serde_json::from_str(&data)?)
}
