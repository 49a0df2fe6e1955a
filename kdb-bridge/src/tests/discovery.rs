//! Catalog initialization, schema synthesis and data probing against a scripted server.

use std::sync::Arc;

use serde_json::json;

use super::support::{self, market_server, Reply, ScriptedChannel, ScriptedModel};
use crate::data_probe::NO_DATA_CONTENT;
use crate::error::EngineError;
use crate::protocol::DateRange;
use crate::schema_synth::DISCOVER_DYNAMICALLY;

fn schema_resource(uri: &str, name: &str, annotations: Option<serde_json::Value>) -> serde_json::Value {
    let mut descriptor = json!({"uri": uri, "name": name, "description": "Table schema"});
    if let Some(annotations) = annotations {
        descriptor["annotations"] = annotations;
    }
    descriptor
}

#[tokio::test]
async fn initialize_runs_discovery_once() {
    let channel = Arc::new(market_server());
    let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
    let client = support::client(&channel, &model);

    client.initialize(false).await.unwrap();
    let tools_description = client.get_tools_description().await;
    let schema = client.get_schema_description().await;

    client.initialize(false).await.unwrap();

    assert_eq!(channel.count("tools/list"), 1);
    assert_eq!(channel.count("resources/list"), 1);
    assert_eq!(channel.count("resources/read"), 1);
    assert_eq!(client.get_tools_description().await, tools_description);
    assert_eq!(client.get_schema_description().await, schema);
    assert!(tools_description.contains("### kdbx_run_sql_query"));
    assert!(schema.contains("## kdbx_describe_tables\nTable: daily"));
}

#[tokio::test]
async fn concurrent_first_initialize_lists_tools_once() {
    let channel = Arc::new(market_server());
    let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
    let client = support::client(&channel, &model);

    let (a, b) = futures::join!(client.initialize(false), client.initialize(false));
    a.unwrap();
    b.unwrap();

    assert_eq!(channel.count("tools/list"), 1);
    assert_eq!(channel.count("resources/read"), 1);
}

#[tokio::test]
async fn forced_initialize_rediscovers() {
    let channel = Arc::new(market_server());
    let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
    let client = support::client(&channel, &model);

    client.initialize(false).await.unwrap();
    client.initialize(true).await.unwrap();

    assert_eq!(channel.count("tools/list"), 2);
    assert_eq!(channel.count("resources/read"), 2);
}

#[tokio::test]
async fn forced_initialize_drops_probed_content() {
    let channel = Arc::new(market_server());
    let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
    let client = support::client(&channel, &model);

    client.discover_data_content(None, false).await;
    let probe_calls = channel.count("tools/call");
    assert!(probe_calls > 0);

    client.initialize(true).await.unwrap();
    assert_eq!(client.get_data_content_description().await, NO_DATA_CONTENT);

    let content = client.discover_data_content(None, false).await;
    assert_eq!(content["daily"].row_count, Some(2520));
    assert_eq!(channel.count("tools/call"), probe_calls * 2);
}

#[tokio::test]
async fn resources_for_other_audiences_are_dropped() {
    let channel = Arc::new(
        ScriptedChannel::new()
            .with_sql_tool()
            .with_resource(
                schema_resource("kdbx://trades", "trades_schema", Some(json!({"audience": ["llm"]}))),
                "TABLE trades",
            )
            .with_resource(
                schema_resource("kdbx://ops", "ops_schema", Some(json!({"audience": ["other"]}))),
                "TABLE ops",
            )
            .with_resource(schema_resource("kdbx://quotes", "quotes_schema", None), "TABLE quotes"),
    );
    let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
    let client = support::client(&channel, &model);

    client.initialize(false).await.unwrap();
    let schema = client.get_schema_description().await;

    assert_eq!(channel.count("resources/read"), 2);
    assert!(schema.contains("## trades_schema\nTABLE trades"));
    assert!(schema.contains("## quotes_schema\nTABLE quotes"));
    assert!(!schema.contains("TABLE ops"));
}

#[tokio::test]
async fn schema_sections_follow_priority() {
    let channel = Arc::new(
        ScriptedChannel::new()
            .with_sql_tool()
            .with_resource(
                schema_resource("kdbx://low", "low_tables", Some(json!({"priority": 0.2}))),
                "TABLE low",
            )
            .with_resource(
                schema_resource("kdbx://high", "high_tables", Some(json!({"priority": 0.9}))),
                "TABLE high",
            )
            .with_resource(
                schema_resource("kdbx://mid", "mid_tables", Some(json!({"priority": 0.5}))),
                "TABLE mid",
            ),
    );
    let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
    let client = support::client(&channel, &model);

    client.initialize(false).await.unwrap();
    let schema = client.get_schema_description().await;

    let high = schema.find("## high_tables").unwrap();
    let mid = schema.find("## mid_tables").unwrap();
    let low = schema.find("## low_tables").unwrap();
    assert!(high < mid && mid < low, "unexpected order in {}", schema);
}

#[tokio::test]
async fn schema_tool_is_used_without_resources() {
    let described = "TABLE ANALYSIS: daily\n  sym | type=symbol\n  close | type=float";
    let channel = Arc::new(
        ScriptedChannel::new()
            .without_resource_support()
            .with_tool(json!({"name": "kdbx_describe_tables", "description": "Describe tables"}))
            .with_sql_tool()
            .on_call("kdbx_describe_tables", "", Reply::Text(described.to_string())),
    );
    let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
    let client = support::client(&channel, &model);

    client.initialize(false).await.unwrap();

    assert_eq!(client.get_schema_description().await, described);
    assert_eq!(channel.tool_calls()[0], ("kdbx_describe_tables".to_string(), json!({})));
}

#[tokio::test]
async fn undiscoverable_schema_becomes_placeholder() {
    let channel = Arc::new(ScriptedChannel::new().without_resource_support().with_sql_tool());
    let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
    let client = support::client(&channel, &model);

    client.initialize(false).await.unwrap();

    assert_eq!(client.get_schema_description().await, DISCOVER_DYNAMICALLY);
    // tables[], meta, SHOW TABLES, SELECT name FROM tables
    assert_eq!(channel.count("tools/call"), 4);
}

#[tokio::test]
async fn tool_listing_failure_is_reported() {
    let channel = Arc::new(ScriptedChannel::new().without_tool_listing());
    let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
    let client = support::client(&channel, &model);

    let err = client.initialize(false).await.unwrap_err();
    assert!(matches!(err, EngineError::ToolListing(_)));
    assert!(!client.is_initialized().await);

    assert!(client.discover_data_content(None, false).await.is_empty());
    assert!(client.search("AAPL price").await.is_empty());
    assert!(model.prompts().is_empty());
}

#[tokio::test]
async fn probing_populates_and_caches_content() {
    let channel = Arc::new(market_server());
    let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
    let client = support::client(&channel, &model);

    let content = client.discover_data_content(None, false).await;
    let daily = &content["daily"];
    assert_eq!(daily.columns, vec!["date", "sym", "open", "high", "low", "close", "volume"]);
    assert_eq!(daily.row_count, Some(2520));
    assert_eq!(daily.symbols.as_deref(), Some(&["AAPL".to_string(), "MSFT".to_string()][..]));
    assert_eq!(daily.symbol_column.as_deref(), Some("sym"));
    assert_eq!(
        daily.date_range,
        Some(DateRange {
            min: "2020-01-02".to_string(),
            max: "2024-12-31".to_string(),
        })
    );
    assert_eq!(daily.date_column.as_deref(), Some("date"));

    let calls = channel.count("tools/call");
    client.discover_data_content(None, false).await;
    assert_eq!(channel.count("tools/call"), calls);

    client.discover_data_content(None, true).await;
    assert!(channel.count("tools/call") > calls);

    let description = client.get_data_content_description().await;
    assert!(description.contains("- **Available values in `sym`**: AAPL, MSFT"));
    assert!(description.contains("- **Total rows**: 2,520"));
}

#[tokio::test]
async fn failed_row_count_keeps_other_fields() {
    let channel = Arc::new(
        ScriptedChannel::new()
            .with_sql_tool()
            .with_resource(support::describe_tables_resource(), support::DAILY_SCHEMA)
            .on_call("kdbx_run_sql_query", "COUNT(*)", Reply::ToolError("'length".to_string()))
            .on_call(
                "kdbx_run_sql_query",
                "DISTINCT",
                Reply::Rows(json!([{"sym": "AAPL"}, {"sym": "IBM"}])),
            ),
    );
    let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
    let client = support::client(&channel, &model);

    let content = client.discover_data_content(None, false).await;
    let daily = &content["daily"];

    assert_eq!(daily.row_count, None);
    assert_eq!(daily.symbols.as_deref(), Some(&["AAPL".to_string(), "IBM".to_string()][..]));
    assert_eq!(daily.date_range, None);
}

#[tokio::test]
async fn tables_are_listed_via_sql_when_schema_names_none() {
    let channel = Arc::new(
        ScriptedChannel::new()
            .without_resource_support()
            .with_sql_tool()
            .on_call("kdbx_run_sql_query", "SHOW TABLES", Reply::Rows(json!([{"name": "trade"}])))
            .on_call(
                "kdbx_run_sql_query",
                "SELECT *",
                Reply::Rows(json!([{"time": "09:30:00", "sym": "AAPL", "price": 185.2}])),
            )
            .on_call("kdbx_run_sql_query", "COUNT(*)", Reply::Rows(json!([{"row_count": "17"}]))),
    );
    let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
    let client = support::client(&channel, &model);

    let content = client.discover_data_content(None, false).await;

    assert_eq!(content.keys().collect::<Vec<_>>(), vec!["trade"]);
    assert_eq!(content["trade"].columns, vec!["time", "sym", "price"]);
    assert_eq!(content["trade"].row_count, Some(17));
}

#[tokio::test]
async fn requested_tables_limit_probing() {
    let channel = Arc::new(market_server());
    let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
    let client = support::client(&channel, &model);

    let requested = vec!["daily".to_string()];
    let content = client.discover_data_content(Some(&requested), true).await;

    assert_eq!(content.len(), 1);
    assert_eq!(content["daily"].row_count, Some(2520));
}
