//! Probing tables for real content: row counts, symbols, date ranges and text samples.
//!
//! Every probe is independent. A failed probe leaves its field unset and never stops the
//! remaining probes or tables. When several columns match a role pattern only the first one
//! (in column order) is probed.

use std::collections::BTreeSet;

use crate::catalog::SqlTool;
use crate::config::ClientConfig;
use crate::protocol::{DataContent, DataContentEntry};
use crate::result_parsing;
use crate::schema_parse::SchemaTables;
use crate::session::McpSession;
use crate::text::{ellipsize, with_thousands};

const TABLE_LIST_QUERIES: &[&str] = &[
    "SHOW TABLES",
    "SELECT name FROM tables",
    "SELECT table_name FROM information_schema.tables",
];

const TABLE_NAME_KEYS: &[&str] = &["name", "table_name", "tablename", "TABLE_NAME"];

const SYMBOL_PREVIEW: usize = 20;
const SAMPLE_PREVIEW: usize = 5;
const SAMPLE_CHARS: usize = 80;

pub const NO_DATA_CONTENT: &str = "No data content discovered yet. Run data content discovery first.";

/// Columns whose lowercased name contains any pattern, in column order.
pub fn matching_columns(columns: &[String], patterns: &[String]) -> Vec<String> {
    columns
        .iter()
        .filter(|col| {
            let lower = col.to_lowercase();
            patterns.iter().any(|p| lower.contains(&p.to_lowercase()))
        })
        .cloned()
        .collect()
}

pub fn sample_row_query(table: &str) -> String {
    format!("SELECT * FROM {} LIMIT 1", table)
}

pub fn row_count_query(table: &str) -> String {
    format!("SELECT COUNT(*) as row_count FROM {}", table)
}

pub fn distinct_values_query(table: &str, column: &str, limit: usize) -> String {
    format!("SELECT DISTINCT {} FROM {} LIMIT {}", column, table, limit)
}

pub fn date_range_query(table: &str, column: &str) -> String {
    format!(
        "SELECT MIN({col}) as min_date, MAX({col}) as max_date FROM {table}",
        col = column,
        table = table
    )
}

pub fn text_sample_query(table: &str, column: &str, order_by: Option<&str>, limit: usize) -> String {
    match order_by {
        Some(date) => format!(
            "SELECT DISTINCT {} FROM {} ORDER BY {} DESC LIMIT {}",
            column, table, date, limit
        ),
        None => format!("SELECT DISTINCT {} FROM {} LIMIT {}", column, table, limit),
    }
}

/// Runs probe statements through the SQL tool.
pub struct Prober<'a> {
    session: &'a McpSession,
    sql: &'a SqlTool,
    config: &'a ClientConfig,
}

impl<'a> Prober<'a> {
    pub fn new(session: &'a McpSession, sql: &'a SqlTool, config: &'a ClientConfig) -> Self {
        Self {
            session,
            sql,
            config,
        }
    }

    async fn run(&self, statement: &str) -> Option<crate::protocol::ToolCallResult> {
        let result = self
            .session
            .call_tool(&self.sql.name, self.sql.arguments(statement))
            .await;
        if result.is_error {
            tracing::debug!(
                statement,
                error = result.error.as_deref().unwrap_or_default(),
                "probe failed"
            );
            return None;
        }
        Some(result)
    }

    /// Table names from catalog statements, used when schema text names no tables.
    pub async fn discover_tables(&self) -> Vec<String> {
        for statement in TABLE_LIST_QUERIES {
            let Some(result) = self.run(statement).await else {
                continue;
            };
            let mut tables = Vec::new();
            for row in result_parsing::extract_rows(&result) {
                match &row {
                    serde_json::Value::String(name) if !name.is_empty() => tables.push(name.clone()),
                    serde_json::Value::Object(obj) => {
                        for key in TABLE_NAME_KEYS {
                            if let Some(name) = obj.get(*key).and_then(|v| v.as_str()) {
                                if !name.is_empty() {
                                    tables.push(name.to_string());
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
            if !tables.is_empty() {
                tracing::info!(statement, ?tables, "discovered tables via SQL");
                return tables;
            }
        }
        Vec::new()
    }

    /// Probe one table. Returns `None` when no columns could be determined.
    pub async fn probe_table(&self, table: &str, schema_columns: &[String]) -> Option<DataContentEntry> {
        let columns = if schema_columns.is_empty() {
            let discovered = match self.run(&sample_row_query(table)).await {
                Some(result) => result_parsing::column_names(&result),
                None => Vec::new(),
            };
            if !discovered.is_empty() {
                tracing::info!(table, columns = ?discovered, "discovered columns via SQL");
            }
            discovered
        } else {
            schema_columns.to_vec()
        };

        if columns.is_empty() {
            tracing::debug!(table, "no columns found, skipping table");
            return None;
        }

        let mut entry = DataContentEntry {
            columns: columns.clone(),
            ..DataContentEntry::default()
        };

        if let Some(result) = self.run(&row_count_query(table)).await {
            entry.row_count = result_parsing::count_value(&result, "row_count");
        }

        let symbol_columns = matching_columns(&columns, &self.config.symbol_patterns);
        if let Some(sym_col) = symbol_columns.first() {
            let statement = distinct_values_query(table, sym_col, self.config.symbol_limit);
            if let Some(result) = self.run(&statement).await {
                let symbols = result_parsing::column_values(&result, sym_col);
                if !symbols.is_empty() {
                    tracing::info!(table, column = %sym_col, count = symbols.len(), "found symbols");
                    entry.symbols = Some(symbols);
                    entry.symbol_column = Some(sym_col.clone());
                }
            }
        }

        let date_columns = matching_columns(&columns, &self.config.date_patterns);
        let date_col = date_columns.first();
        if let Some(date_col) = date_col {
            if let Some(result) = self.run(&date_range_query(table, date_col)).await {
                if let Some(range) = result_parsing::date_range(&result) {
                    tracing::info!(table, min = %range.min, max = %range.max, "found date range");
                    entry.date_range = Some(range);
                    entry.date_column = Some(date_col.clone());
                }
            }
        }

        let text_columns = matching_columns(&columns, &self.config.text_patterns);
        if let Some(text_col) = text_columns.first() {
            let statement = text_sample_query(
                table,
                text_col,
                date_col.map(String::as_str),
                self.config.text_sample_limit,
            );
            if let Some(result) = self.run(&statement).await {
                let mut samples = result_parsing::column_values(&result, text_col);
                samples.truncate(self.config.text_sample_limit);
                if !samples.is_empty() {
                    entry.sample_text = Some([(text_col.clone(), samples)].into_iter().collect());
                }
            }
        }
        if !text_columns.is_empty() {
            entry.text_columns = Some(text_columns);
        }

        Some(entry)
    }

    /// Probe every table, keeping only those with columns.
    pub async fn probe_all(&self, tables: &SchemaTables) -> DataContent {
        let mut content = DataContent::new();
        for (table, columns) in tables.iter() {
            if let Some(entry) = self.probe_table(table, columns).await {
                content.insert(table.to_string(), entry);
            }
        }
        for (table, entry) in &content {
            tracing::info!(
                table = %table,
                rows = ?entry.row_count,
                symbols = entry.symbols.as_ref().map_or(0, Vec::len),
                "probed table"
            );
        }
        content
    }
}

/// Prompt section describing probed content.
pub fn describe_data_content(content: &DataContent) -> String {
    if content.is_empty() {
        return NO_DATA_CONTENT.to_string();
    }

    let mut parts = vec!["## Available Data Content (Discovered from Database)".to_string()];

    let symbol_cols: BTreeSet<&str> = content
        .values()
        .filter_map(|e| e.symbol_column.as_deref())
        .collect();
    if !symbol_cols.is_empty() {
        let cols = symbol_cols
            .iter()
            .map(|c| format!("`{}`", c))
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!(
            "**IMPORTANT**: Use {} column(s) for filtering by ticker/symbol, not company names.",
            cols
        ));
    }
    parts.push(String::new());

    for (table, entry) in content {
        parts.push(format!("### Table: {}", table));

        if !entry.columns.is_empty() {
            parts.push(format!("- **Columns**: {}", entry.columns.join(", ")));
        }

        if let Some(symbols) = &entry.symbols {
            let column = entry.symbol_column.as_deref().unwrap_or("symbol");
            let preview: Vec<&str> = symbols.iter().take(SYMBOL_PREVIEW).map(String::as_str).collect();
            parts.push(format!(
                "- **Available values in `{}`**: {}",
                column,
                preview.join(", ")
            ));
            if symbols.len() > SYMBOL_PREVIEW {
                parts.push(format!("  (and {} more)", symbols.len() - SYMBOL_PREVIEW));
            }
        }

        if let Some(range) = &entry.date_range {
            parts.push(format!("- **Date range**: {} to {}", range.min, range.max));
        }

        if let Some(rows) = entry.row_count {
            parts.push(format!("- **Total rows**: {}", with_thousands(rows)));
        }

        if let Some(text_columns) = &entry.text_columns {
            parts.push(format!(
                "- **Text columns** (searchable): {}",
                text_columns.join(", ")
            ));
        }

        if let Some(samples) = &entry.sample_text {
            for (column, values) in samples {
                parts.push(format!("- **Sample `{}` values**:", column));
                for value in values.iter().take(SAMPLE_PREVIEW) {
                    parts.push(format!("  - {}", ellipsize(value, SAMPLE_CHARS)));
                }
            }
        }

        parts.push(String::new());
    }

    parts.join("\n")
}
