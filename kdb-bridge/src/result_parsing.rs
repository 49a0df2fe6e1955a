//! Row extraction from SQL tool output.
//!
//! SQL tools answer with text content holding a JSON envelope: `{"data": [...]}`,
//! `{"rows": [...]}` or `{"status": "success", "data": ...}`. `data` may itself be a
//! JSON-encoded string. A bare JSON array is accepted as rows too. When several text items
//! parse as envelopes the last one wins.

use serde_json::{Map, Value};

use crate::protocol::{ContentItem, DateRange, ToolCallResult};

/// Rows from one parsed envelope, or `None` when the value is not an envelope.
pub fn rows_from_envelope(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(rows) => Some(rows.clone()),
        Value::Object(obj) => {
            let raw = obj.get("data").or_else(|| obj.get("rows"))?;
            match raw {
                Value::Array(rows) => Some(rows.clone()),
                Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
                    Ok(Value::Array(rows)) => Some(rows),
                    _ => None,
                },
                Value::Null => Some(Vec::new()),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Rows from the last text item that parses as an envelope.
pub fn extract_rows(result: &ToolCallResult) -> Vec<Value> {
    result
        .content
        .iter()
        .filter_map(|item| match item {
            ContentItem::Text { text } => serde_json::from_str::<Value>(text.trim()).ok(),
            _ => None,
        })
        .filter_map(|parsed| rows_from_envelope(&parsed))
        .last()
        .unwrap_or_default()
}

pub fn first_row(result: &ToolCallResult) -> Option<Map<String, Value>> {
    extract_rows(result)
        .into_iter()
        .next()
        .and_then(|row| match row {
            Value::Object(map) => Some(map),
            _ => None,
        })
}

/// Column names from the first row of a `SELECT *` probe.
pub fn column_names(result: &ToolCallResult) -> Vec<String> {
    first_row(result)
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default()
}

/// Scalar cell rendered as a plain string. Nulls, empty strings and nested values are skipped.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Distinct scalar values of `column`, in row order.
pub fn column_values(result: &ToolCallResult, column: &str) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for row in extract_rows(result) {
        if let Some(text) = row.get(column).and_then(scalar_text) {
            if !values.contains(&text) {
                values.push(text);
            }
        }
    }
    values
}

/// Non-negative count from the first row; accepts numbers and numeric strings.
pub fn count_value(result: &ToolCallResult, key: &str) -> Option<u64> {
    match first_row(result)?.get(key)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `min_date`/`max_date` from the first row, both required.
pub fn date_range(result: &ToolCallResult) -> Option<DateRange> {
    let row = first_row(result)?;
    let min = row.get("min_date").and_then(scalar_text)?;
    let max = row.get("max_date").and_then(scalar_text)?;
    Some(DateRange { min, max })
}
