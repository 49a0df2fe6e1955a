pub mod catalog;
pub mod citations;
pub mod cli;
pub mod client;
pub mod config;
pub mod data_probe;
pub mod error;
pub mod fast_path;
pub mod llm;
pub mod plan_parsing;
pub mod planner;
pub mod prompts;
pub mod protocol;
pub mod query_loop;
pub mod result_parsing;
pub mod routing;
pub mod schema_discovery;
pub mod schema_parse;
pub mod schema_synth;
pub mod session;
pub mod synthesis;
pub mod text;
pub mod transport;

#[cfg(test)]
mod tests;

pub use client::{with_deadline, KdbMcpClient};
pub use config::{ClientConfig, ModelConfig, TransportConfig};
pub use error::{EngineError, LlmError, TransportError};
pub use llm::{LanguageModel, OpenAiChatModel};
pub use protocol::{ChatAnswer, IntelligentAnswer, QueryPlan, SearchOutcome, ToolCallResult};
pub use routing::{classify_route, is_kdb_query, QueryRoute};
pub use session::McpSession;
