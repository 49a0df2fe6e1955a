//! Cheap keyword routing between the database engine and document search.

use serde::Serialize;

/// Financial and time-series vocabulary. Matched as lowercase substrings, so short entries
/// such as `fx` and `var` also hit inside longer words.
pub const KDB_KEYWORDS: &[&str] = &[
    "price", "stock", "trade", "market", "ticker", "volume",
    "time-series", "timeseries", "historical", "financial data",
    "quote", "bid", "ask", "spread", "ohlc", "candle",
    "moving average", "returns", "volatility", "correlation",
    "portfolio", "equity", "bond", "forex", "fx", "currency",
    "derivative", "option", "future", "swap", "index",
    "nasdaq", "nyse", "s&p", "dow jones", "ftse",
    "trading", "execution", "order", "position", "pnl",
    "profit", "loss", "sharpe", "drawdown", "var", "risk",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryRoute {
    Kdb,
    Documents,
}

pub fn is_kdb_query(query: &str) -> bool {
    crate::text::contains_any(query, KDB_KEYWORDS)
}

/// An explicit caller choice wins. Otherwise keyword detection applies, and only when the
/// engine is enabled.
pub fn classify_route(query: &str, explicit: Option<bool>, kdb_enabled: bool) -> QueryRoute {
    match explicit {
        Some(true) => QueryRoute::Kdb,
        Some(false) => QueryRoute::Documents,
        None if kdb_enabled && is_kdb_query(query) => QueryRoute::Kdb,
        None => QueryRoute::Documents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_detection() {
        assert!(is_kdb_query("What was the closing PRICE of AAPL?"));
        assert!(is_kdb_query("show me the 30 day moving average"));
        assert!(!is_kdb_query("Summarize the onboarding document"));
    }

    #[test]
    fn explicit_flag_overrides_keywords() {
        assert_eq!(classify_route("summarize the memo", Some(true), false), QueryRoute::Kdb);
        assert_eq!(classify_route("AAPL stock price", Some(false), true), QueryRoute::Documents);
    }

    #[test]
    fn auto_detection_requires_enabled_engine() {
        assert_eq!(classify_route("AAPL stock price", None, true), QueryRoute::Kdb);
        assert_eq!(classify_route("AAPL stock price", None, false), QueryRoute::Documents);
        assert_eq!(classify_route("summarize the memo", None, true), QueryRoute::Documents);
    }
}
