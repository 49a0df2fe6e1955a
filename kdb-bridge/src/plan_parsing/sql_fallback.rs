//! Last-chance SQL recovery when the model ignored the JSON format.

use regex::Regex;

/// Shorter matches are noise, not statements.
const MIN_SQL_LEN: usize = 10;

lazy_static::lazy_static! {
    static ref SQL_PATTERNS: Vec<Regex> = [
        // SELECT ... FROM/LIMIT ident
        r"(?i)SELECT\s+[\s\S]+?(?:FROM|LIMIT)\s+\w+",
        // "query": "..."
        r#"(?i)"query"\s*:\s*"([^"]+)""#,
        // `SELECT ...`
        r"(?i)`([^`]*SELECT[^`]*)`",
        // query: '...' / query='...'
        r#"(?i)query["']?\s*[:=]\s*["']([^"']+)["']"#,
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect();
}

/// First statement found by the patterns, in priority order.
pub fn extract_sql(text: &str) -> Option<String> {
    SQL_PATTERNS.iter().find_map(|re| {
        let caps = re.captures(text)?;
        let sql = caps.get(1).or_else(|| caps.get(0))?.as_str().trim();
        (sql.len() > MIN_SQL_LEN).then(|| sql.to_string())
    })
}
