//! Single-statement chat path: one SQL generation, one execution, one short answer.

use crate::catalog::SqlTool;
use crate::config::ClientConfig;
use crate::llm::LanguageModel;
use crate::plan_parsing::{clean_sql, validated_select};
use crate::prompts;
use crate::protocol::ChatAnswer;
use crate::result_parsing;
use crate::session::McpSession;
use crate::text::truncate_chars;

const SCHEMA_QUESTION_PHRASES: &[&str] = &[
    "what table",
    "which table",
    "list table",
    "show table",
    "available table",
    "what schema",
    "describe schema",
    "database schema",
    "what column",
    "which column",
    "list column",
    "show column",
    "available column",
];

const ANSWER_PREVIEW_ROWS: usize = 10;

pub const NO_DATA_ANSWER: &str = "Query executed but returned no data.";

/// Metadata questions are answered from cached schema text without running SQL.
pub fn is_schema_question(query: &str) -> bool {
    crate::text::contains_any(query, SCHEMA_QUESTION_PHRASES)
}

/// Cached text the fast path works from.
pub struct ChatContext<'a> {
    pub schema: &'a str,
    pub sql_guidance: &'a str,
    pub data_content: &'a str,
}

pub struct FastPath<'a> {
    pub session: &'a McpSession,
    pub model: &'a dyn LanguageModel,
    pub sql_tool: &'a SqlTool,
    pub config: &'a ClientConfig,
}

impl<'a> FastPath<'a> {
    pub async fn run(&self, query: &str, ctx: &ChatContext<'_>) -> ChatAnswer {
        if is_schema_question(query) {
            tracing::info!("schema question detected, answering from cached schema");
            if let Some(answer) = self.answer_from_schema(query, ctx).await {
                return ChatAnswer::text_only(answer);
            }
        }

        let Some(sql) = self.generate_sql(query, ctx).await else {
            return ChatAnswer::text_only(format!("Could not generate SQL for: {}", query));
        };
        tracing::info!(sql = %sql, "generated SQL");

        let result = self
            .session
            .call_tool(&self.sql_tool.name, self.sql_tool.arguments(&sql))
            .await;
        if result.is_error {
            let message = result.error.as_deref().unwrap_or("Query execution failed");
            return ChatAnswer {
                answer: format!("Query failed: {}", message),
                sql_query: Some(sql),
                rows: Vec::new(),
            };
        }

        let rows = result_parsing::extract_rows(&result);
        let answer = if rows.is_empty() {
            NO_DATA_ANSWER.to_string()
        } else {
            self.answer_from_rows(query, &sql, &rows).await
        };

        ChatAnswer {
            answer,
            sql_query: Some(sql),
            rows,
        }
    }

    async fn answer_from_schema(&self, query: &str, ctx: &ChatContext<'_>) -> Option<String> {
        let mut info = ctx.schema.trim().to_string();
        if !ctx.sql_guidance.trim().is_empty() {
            info.push_str("\n\n");
            info.push_str(ctx.sql_guidance.trim());
        }
        if info.is_empty() {
            return None;
        }

        match self.model.generate(&prompts::schema_answer_prompt(&info, query)).await {
            Ok(answer) if !answer.trim().is_empty() => Some(answer.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "schema answer failed, falling back to SQL");
                None
            }
        }
    }

    async fn generate_sql(&self, query: &str, ctx: &ChatContext<'_>) -> Option<String> {
        let prompt = prompts::sql_generation_prompt(
            truncate_chars(ctx.schema, self.config.schema_prompt_chars),
            truncate_chars(ctx.data_content, self.config.data_prompt_chars),
            query,
        );

        let raw = match self.model.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(error = %e, "SQL generation failed");
                return None;
            }
        };

        let cleaned = clean_sql(&raw);
        let sql = validated_select(&cleaned);
        if sql.is_none() {
            tracing::warn!(response = %truncate_chars(&cleaned, 100), "response does not look like SQL");
        }
        sql
    }

    async fn answer_from_rows(&self, query: &str, sql: &str, rows: &[serde_json::Value]) -> String {
        let preview = &rows[..rows.len().min(ANSWER_PREVIEW_ROWS)];
        let preview_json = serde_json::to_string_pretty(preview).unwrap_or_default();
        let prompt = prompts::row_answer_prompt(query, sql, rows.len(), &preview_json);

        match self.model.generate(&prompt).await {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                tracing::error!(error = %e, "answer generation failed");
                format!("Found {} rows of data.", rows.len())
            }
        }
    }
}
