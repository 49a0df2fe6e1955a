//! Command-line argument parsing and launch configuration.
//!
//! Every option can also come from the environment, matching how the engine is deployed
//! next to the research assistant.

use clap::{Parser, Subcommand};

use crate::config::{parse_json_or_file, ClientConfig, ModelConfig, TransportConfig};
use crate::error::ConfigError;

pub const DEFAULT_ENDPOINT: &str = "https://kdbxmcp.kxailab.com/mcp";
pub const DEFAULT_MODEL_BASE_URL: &str = "https://integrate.api.nvidia.com/v1";
pub const DEFAULT_MODEL_NAME: &str = "meta/llama-3.3-70b-instruct";

/// CLI arguments for kdb-bridge
#[derive(Parser, Debug, Clone)]
#[command(name = "kdb-bridge", about = "Ask a KDB-X MCP server questions in plain language")]
pub struct CliArgs {
    /// Streamable-HTTP MCP endpoint
    #[arg(long, value_name = "URL", env = "KDB_MCP_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", env = "KDB_TIMEOUT", default_value_t = crate::config::DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,
    /// Full transport config (inline JSON or @path/to/json). Overrides --endpoint.
    #[arg(long, value_name = "JSON_OR_@FILE", env = "KDB_MCP_TRANSPORT")]
    pub transport: Option<String>,
    /// OpenAI-compatible base URL for the instruct model
    #[arg(long, value_name = "URL", env = "INSTRUCT_BASE_URL", default_value = DEFAULT_MODEL_BASE_URL)]
    pub model_base_url: String,
    #[arg(long, value_name = "MODEL", env = "INSTRUCT_MODEL_NAME", default_value = DEFAULT_MODEL_NAME)]
    pub model_name: String,
    /// API key; NVIDIA_API_KEY is used when unset
    #[arg(long, value_name = "KEY", env = "INSTRUCT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    /// Engine overrides (inline JSON or @path/to/json)
    #[arg(long, value_name = "JSON_OR_@FILE", env = "KDB_BRIDGE_CONFIG")]
    pub config: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the server's tools as the planner sees them
    Tools,
    /// Print the synthesized schema text
    Schema,
    /// Probe table content and print the description
    Probe {
        /// Restrict probing to these tables
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,
    },
    /// Plan, execute and synthesize an answer
    Ask {
        query: String,
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Give up after this many seconds
        #[arg(long, value_name = "SECS")]
        deadline: Option<u64>,
        /// Print citations and record count as well
        #[arg(long, default_value_t = false)]
        citations: bool,
    },
    /// Generate and run a single SQL statement
    Chat { query: String },
    /// Show which backend a query would be routed to
    Classify {
        query: String,
        /// Force the route (true = KDB+, false = documents)
        #[arg(long, value_parser = clap::builder::BoolishValueParser::new())]
        use_kdb: Option<bool>,
    },
}

impl CliArgs {
    pub fn transport_config(&self) -> Result<TransportConfig, ConfigError> {
        match &self.transport {
            Some(raw) => parse_json_or_file(raw),
            None => Ok(TransportConfig::Http {
                url: self.endpoint.clone(),
                timeout_secs: self.timeout,
            }),
        }
    }

    pub fn model_config(&self) -> ModelConfig {
        let api_key = self
            .api_key
            .clone()
            .or_else(|| std::env::var("NVIDIA_API_KEY").ok())
            .filter(|k| !k.is_empty());
        ModelConfig::new(&self.model_base_url, &self.model_name, api_key)
    }

    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        match &self.config {
            Some(raw) => ClientConfig::from_json_or_file(raw),
            None => Ok(ClientConfig::default()),
        }
    }
}
