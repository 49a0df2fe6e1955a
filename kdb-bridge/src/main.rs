use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kdb_bridge::cli::{CliArgs, Command};
use kdb_bridge::{classify_route, transport, with_deadline, KdbMcpClient, McpSession, OpenAiChatModel};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries answers
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kdb_bridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    if let Command::Classify { query, use_kdb } = &args.command {
        let route = classify_route(query, *use_kdb, true);
        println!("{}", serde_json::to_string(&route)?);
        return Ok(());
    }

    let transport_config = args.transport_config().context("invalid transport config")?;
    let client_config = args.client_config().context("invalid engine config")?;
    let channel = transport::connect(&transport_config).context("failed to build MCP transport")?;
    let model = OpenAiChatModel::new(args.model_config()).context("failed to build model client")?;
    let client = KdbMcpClient::new(McpSession::new(channel), Arc::new(model), client_config);

    match args.command {
        Command::Tools => {
            client.initialize(false).await?;
            println!("{}", client.get_tools_description().await);
        }
        Command::Schema => {
            client.initialize(false).await?;
            println!("{}", client.get_schema_description().await);
        }
        Command::Probe { tables } => {
            client.initialize(false).await?;
            client.discover_data_content(tables.as_deref(), true).await;
            println!("{}", client.get_data_content_description().await);
        }
        Command::Ask {
            query,
            max_iterations,
            deadline,
            citations,
        } => {
            let run = client.intelligent_query(&query, max_iterations);
            let answer = match deadline {
                Some(secs) => with_deadline(Duration::from_secs(secs), run).await?,
                None => run.await?,
            };
            println!("{}", answer.answer);
            if citations {
                println!();
                println!(
                    "{}",
                    kdb_bridge::citations::format_citations(&query, &answer.tool_results)
                );
                println!(
                    "Records: {}",
                    kdb_bridge::citations::count_records(&answer.tool_results)
                );
            }
        }
        Command::Chat { query } => {
            let answer = client.simple_chat_query(&query).await?;
            if let Some(sql) = &answer.sql_query {
                println!("SQL: {}\n", sql);
            }
            println!("{}", answer.answer);
            if !answer.rows.is_empty() {
                println!("\n{}", serde_json::to_string_pretty(&answer.rows)?);
            }
        }
        Command::Classify { .. } => {}
    }

    Ok(())
}
