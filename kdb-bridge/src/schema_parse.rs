//! Table and column extraction from free-form schema text.
//!
//! Each matcher is a pure function over the text. [`extract_tables`] runs them in priority
//! order: table+column matchers first, table-only matchers only when those found nothing, and
//! finally a KDB-X `TABLE ANALYSIS` pass that fills in columns for tables still lacking them.

use regex::Regex;

use crate::config::ClientConfig;

/// A table name with the raw column text that followed it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMatch {
    pub table: String,
    pub columns_raw: Option<String>,
}

type Matcher = fn(&str) -> Vec<TableMatch>;

/// Matchers tried in order; all of them contribute.
const TABLE_COLUMN_MATCHERS: &[Matcher] = &[
    analysis_headers,
    heading_with_columns,
    labelled_table_with_columns,
    dash_list_with_columns,
    dash_list_parenthesized,
    markdown_rows,
];

lazy_static::lazy_static! {
    static ref ANALYSIS_HEADER: Option<Regex> = Regex::new(r"TABLE\s+ANALYSIS:\s+(\w+)").ok();
    static ref HEADING_COLUMNS: Option<Regex> =
        Regex::new(r"###\s+(\w+)\s*\n[^\n]*?[Cc]olumns?[:\s]+([^\n]+)").ok();
    static ref LABELLED_COLUMNS: Option<Regex> =
        Regex::new(r"[Tt]able[:\s]+(\w+)\s*\n[^\n]*?[Cc]olumns?[:\s]+([^\n]+)").ok();
    static ref DASH_COLUMNS: Option<Regex> = Regex::new(r"(?m)^-\s+(\w+)[:\s]+([a-zA-Z_,\s]+)$").ok();
    static ref DASH_PAREN: Option<Regex> = Regex::new(r"(?m)^-\s+(\w+)\s*\(([^)]+)\)").ok();
    static ref MARKDOWN_ROW: Option<Regex> =
        Regex::new(r"(?m)^\|[ \t]*(\w+)[ \t]*\|([^|\n]+(?:\|[^|\n]+)*)\|?[ \t]*$").ok();
    static ref TABLE_ONLY: Vec<Regex> = [
        r#"[Tt]able[:\s]+[`"']?(\w+)[`"']?"#,
        r"###\s+(\w+)",
        r"(?m)^-\s+(\w+)\s*:",
        r"FROM\s+(\w+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect();
    static ref ANALYSIS_SPLIT: Option<Regex> = Regex::new(r"TABLE\s+ANALYSIS:\s+").ok();
    static ref LEADING_WORD: Option<Regex> = Regex::new(r"^(\w+)").ok();
    static ref KDBX_COLUMN: Option<Regex> = Regex::new(r"(?m)^\s{2}(\w+)\s+\|\s+type=").ok();
    static ref COLUMN_SPLIT: Option<Regex> = Regex::new(r"[,|\s]+").ok();
}

fn captures(re: &Option<Regex>, text: &str, with_columns: bool) -> Vec<TableMatch> {
    let Some(re) = re.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|caps| {
            let table = caps.get(1)?.as_str().to_string();
            let columns_raw = if with_columns {
                caps.get(2).map(|m| m.as_str().to_string())
            } else {
                None
            };
            Some(TableMatch { table, columns_raw })
        })
        .collect()
}

/// `TABLE ANALYSIS: daily` (KDB-X describe output). Table only.
pub fn analysis_headers(text: &str) -> Vec<TableMatch> {
    captures(&ANALYSIS_HEADER, text, false)
}

/// `### daily` followed by a `Columns: ...` line.
pub fn heading_with_columns(text: &str) -> Vec<TableMatch> {
    captures(&HEADING_COLUMNS, text, true)
}

/// `Table: daily` followed by a `Columns: ...` line.
pub fn labelled_table_with_columns(text: &str) -> Vec<TableMatch> {
    captures(&LABELLED_COLUMNS, text, true)
}

/// `- daily: date, sym, close`
pub fn dash_list_with_columns(text: &str) -> Vec<TableMatch> {
    captures(&DASH_COLUMNS, text, true)
}

/// `- daily (date, sym, close)`
pub fn dash_list_parenthesized(text: &str) -> Vec<TableMatch> {
    captures(&DASH_PAREN, text, true)
}

/// `| daily | date | sym |`
pub fn markdown_rows(text: &str) -> Vec<TableMatch> {
    captures(&MARKDOWN_ROW, text, true)
}

/// Table names from looser mentions, used when no matcher above found anything.
pub fn table_names_only(text: &str) -> Vec<String> {
    TABLE_ONLY
        .iter()
        .flat_map(|re| {
            re.captures_iter(text)
                .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Columns listed as `  name | type=...` under each `TABLE ANALYSIS:` section.
pub fn kdbx_analysis_columns(text: &str) -> Vec<(String, Vec<String>)> {
    let (Some(split), Some(leading), Some(column)) = (
        ANALYSIS_SPLIT.as_ref(),
        LEADING_WORD.as_ref(),
        KDBX_COLUMN.as_ref(),
    ) else {
        return Vec::new();
    };

    split
        .split(text)
        .skip(1)
        .filter_map(|section| {
            let table = leading.captures(section)?.get(1)?.as_str().to_string();
            let columns: Vec<String> = column
                .captures_iter(section)
                .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
                .collect();
            Some((table, columns))
        })
        .collect()
}

/// Split a raw column list on commas, pipes and whitespace, dropping quotes,
/// single characters and filter words.
pub fn split_columns(raw: &str, config: &ClientConfig) -> Vec<String> {
    let Some(re) = COLUMN_SPLIT.as_ref() else {
        return Vec::new();
    };
    re.split(raw)
        .map(|col| col.trim().trim_matches(|c| c == '`' || c == '"' || c == '\''))
        .filter(|col| col.chars().count() > 1 && !config.is_filter_word(col))
        .map(String::from)
        .collect()
}

/// Tables in discovery order with their known columns (possibly empty).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaTables {
    entries: Vec<(String, Vec<String>)>,
}

impl SchemaTables {
    fn position(&self, table: &str) -> Option<usize> {
        self.entries.iter().position(|(name, _)| name == table)
    }

    /// Add a table, merging any new columns into an existing entry.
    pub fn merge(&mut self, table: &str, columns: Vec<String>) {
        match self.position(table) {
            Some(idx) => {
                let existing = &mut self.entries[idx].1;
                for col in columns {
                    if !existing.contains(&col) {
                        existing.push(col);
                    }
                }
            }
            None => self.entries.push((table.to_string(), columns)),
        }
    }

    pub fn contains(&self, table: &str) -> bool {
        self.position(table).is_some()
    }

    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.position(table).map(|idx| self.entries[idx].1.as_slice())
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, cols)| (name.as_str(), cols.as_slice()))
    }
}

/// Find tables (and columns where stated) in schema text.
pub fn extract_tables(text: &str, config: &ClientConfig) -> SchemaTables {
    let mut tables = SchemaTables::default();
    if text.trim().is_empty() {
        return tables;
    }

    for matcher in TABLE_COLUMN_MATCHERS {
        for found in matcher(text) {
            if config.is_filter_word(&found.table) {
                continue;
            }
            let columns = found
                .columns_raw
                .as_deref()
                .map(|raw| split_columns(raw, config))
                .unwrap_or_default();
            tables.merge(&found.table, columns);
        }
    }

    if tables.is_empty() {
        for name in table_names_only(text) {
            if !config.is_filter_word(&name) && !tables.contains(&name) {
                tables.merge(&name, Vec::new());
            }
        }
    }

    for (table, columns) in kdbx_analysis_columns(text) {
        if columns.is_empty() {
            continue;
        }
        if let Some(idx) = tables.position(&table) {
            if tables.entries[idx].1.is_empty() {
                tables.entries[idx].1 = columns;
            }
        }
    }

    tracing::debug!(tables = ?tables.names(), "extracted tables from schema text");
    tables
}
