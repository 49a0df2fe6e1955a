//! The long-lived client handle: catalog, schema and probed-content caches plus the public
//! query entry points.
//!
//! One instance is built by the host application and shared by reference. Queries may run
//! concurrently; they read snapshots of the caches. `initialize` and data probing are each
//! guarded so concurrent first calls do the discovery work once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use crate::catalog::{Catalog, SqlTool};
use crate::citations;
use crate::config::ClientConfig;
use crate::data_probe::{self, Prober};
use crate::error::{EngineError, Result};
use crate::fast_path::{ChatContext, FastPath};
use crate::llm::LanguageModel;
use crate::prompts::PlannerContext;
use crate::protocol::{ChatAnswer, DataContent, IntelligentAnswer, SearchOutcome, ToolDescriptor};
use crate::query_loop::{QueryLoop, UNABLE_TO_ANSWER};
use crate::schema_discovery;
use crate::schema_parse::{self, SchemaTables};
use crate::schema_synth::SynthesizedSchema;
use crate::session::McpSession;

#[derive(Debug, Default)]
struct DiscoveryState {
    catalog: Catalog,
    schema: SynthesizedSchema,
    initialized: bool,
}

/// Cached text one query works from, copied out so no lock is held across model calls.
struct Snapshot {
    tools_description: String,
    schema: SynthesizedSchema,
    sql_tool: SqlTool,
}

pub struct KdbMcpClient {
    session: McpSession,
    model: Arc<dyn LanguageModel>,
    config: ClientConfig,
    state: RwLock<DiscoveryState>,
    data_content: RwLock<Option<DataContent>>,
    init_lock: Mutex<()>,
    probe_lock: Mutex<()>,
}

impl KdbMcpClient {
    pub fn new(session: McpSession, model: Arc<dyn LanguageModel>, config: ClientConfig) -> Self {
        Self {
            session,
            model,
            config,
            state: RwLock::new(DiscoveryState::default()),
            data_content: RwLock::new(None),
            init_lock: Mutex::new(()),
            probe_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.initialized
    }

    /// List tools and discover schema. A no-op once done unless `force_refresh` is set, which
    /// also drops probed data content so the next query re-probes.
    ///
    /// Only a failed tool listing is reported; schema discovery always degrades to text.
    pub async fn initialize(&self, force_refresh: bool) -> Result<()> {
        if !force_refresh && self.is_initialized().await {
            return Ok(());
        }

        let _guard = self.init_lock.lock().await;
        if !force_refresh && self.is_initialized().await {
            return Ok(());
        }

        if force_refresh {
            // Probed content belongs to the previous discovery cycle
            *self.data_content.write().await = None;
        }

        tracing::info!(endpoint = %self.session.endpoint(), "initializing MCP client");
        let tools = self
            .session
            .list_tools()
            .await
            .map_err(EngineError::ToolListing)?;
        tracing::info!(
            count = tools.len(),
            tools = ?tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "discovered tools"
        );

        let catalog = Catalog::new(tools);
        let schema = schema_discovery::discover_schema(&self.session, &catalog, &self.config).await;
        tracing::info!(
            schema_chars = schema.schema.len(),
            guidance_chars = schema.sql_guidance.len(),
            context_resources = schema.additional_context.len(),
            "schema discovery complete"
        );

        *self.state.write().await = DiscoveryState {
            catalog,
            schema,
            initialized: true,
        };
        Ok(())
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        self.initialize(false).await?;
        Ok(self.state.read().await.catalog.tools.clone())
    }

    pub async fn get_tools_description(&self) -> String {
        self.state.read().await.catalog.tools_description.clone()
    }

    pub async fn get_schema_description(&self) -> String {
        self.state.read().await.schema.schema.clone()
    }

    pub async fn get_data_content_description(&self) -> String {
        match self.data_content.read().await.as_ref() {
            Some(content) => data_probe::describe_data_content(content),
            None => data_probe::NO_DATA_CONTENT.to_string(),
        }
    }

    async fn snapshot(&self) -> Snapshot {
        let state = self.state.read().await;
        Snapshot {
            tools_description: state.catalog.tools_description.clone(),
            schema: state.schema.clone(),
            sql_tool: state.catalog.sql_tool(&self.config),
        }
    }

    /// Probe table content. Returns the cache unless `force_refresh` is set or nothing has
    /// been probed yet. `tables` restricts probing to the named tables.
    pub async fn discover_data_content(
        &self,
        tables: Option<&[String]>,
        force_refresh: bool,
    ) -> DataContent {
        if !force_refresh {
            if let Some(cached) = self.data_content.read().await.as_ref() {
                return cached.clone();
            }
        }

        if let Err(e) = self.initialize(false).await {
            tracing::warn!(error = %e, "cannot probe data content without a tool catalog");
            return DataContent::new();
        }

        let _guard = self.probe_lock.lock().await;
        if !force_refresh {
            if let Some(cached) = self.data_content.read().await.as_ref() {
                return cached.clone();
            }
        }

        let snapshot = self.snapshot().await;
        let prober = Prober::new(&self.session, &snapshot.sql_tool, &self.config);
        let targets = self.probe_targets(&prober, &snapshot.schema.schema, tables).await;
        if targets.is_empty() {
            tracing::warn!("no tables found to probe");
        }

        let content = prober.probe_all(&targets).await;
        tracing::info!(tables = content.len(), "data content discovery complete");
        *self.data_content.write().await = Some(content.clone());
        content
    }

    async fn probe_targets(
        &self,
        prober: &Prober<'_>,
        schema_text: &str,
        requested: Option<&[String]>,
    ) -> SchemaTables {
        let parsed = schema_parse::extract_tables(schema_text, &self.config);

        if let Some(requested) = requested {
            let mut targets = SchemaTables::default();
            for table in requested {
                let columns = parsed.columns(table).map(<[String]>::to_vec).unwrap_or_default();
                targets.merge(table, columns);
            }
            return targets;
        }

        if !parsed.is_empty() {
            return parsed;
        }

        tracing::info!("schema text names no tables, listing tables via SQL");
        let mut targets = SchemaTables::default();
        for table in prober.discover_tables().await {
            targets.merge(&table, Vec::new());
        }
        targets
    }

    /// Drop every cached derivation and rebuild it from the server.
    pub async fn refresh_schema(&self) -> Result<()> {
        self.initialize(true).await?;
        self.discover_data_content(None, true).await;
        Ok(())
    }

    async fn prepare(&self) -> Result<()> {
        self.initialize(false).await?;
        if self.data_content.read().await.is_none() {
            tracing::info!("discovering data content before first query");
            self.discover_data_content(None, false).await;
        }
        Ok(())
    }

    /// Plan, execute and re-plan with the client's model.
    pub async fn intelligent_query(
        &self,
        query: &str,
        max_iterations: Option<usize>,
    ) -> Result<IntelligentAnswer> {
        let model = Arc::clone(&self.model);
        self.intelligent_query_with(model.as_ref(), query, max_iterations)
            .await
    }

    /// Same as [`Self::intelligent_query`] with a caller-supplied model.
    pub async fn intelligent_query_with(
        &self,
        model: &dyn LanguageModel,
        query: &str,
        max_iterations: Option<usize>,
    ) -> Result<IntelligentAnswer> {
        self.prepare().await?;

        let snapshot = self.snapshot().await;
        let data_description = self.get_data_content_description().await;
        let context = PlannerContext {
            tools_description: &snapshot.tools_description,
            schema: &snapshot.schema.schema,
            discovered_schema: "",
            data_content: &data_description,
            sql_guidance: &snapshot.schema.sql_guidance,
            additional_context: &snapshot.schema.additional_context,
            sql_tool: &snapshot.sql_tool.name,
            sql_argument: &snapshot.sql_tool.argument,
            context_chars: self.config.context_chars,
        };

        let iterations = max_iterations.unwrap_or(self.config.max_iterations);
        let answer = QueryLoop::new(&self.session, model, context, &snapshot.sql_tool, iterations)
            .run(query)
            .await;
        tracing::info!(
            tool_calls = answer.tool_results.len(),
            answer_chars = answer.answer.len(),
            "intelligent query finished"
        );
        Ok(answer)
    }

    /// One generated SQL statement, executed once.
    pub async fn simple_chat_query(&self, query: &str) -> Result<ChatAnswer> {
        let model = Arc::clone(&self.model);
        self.simple_chat_query_with(model.as_ref(), query).await
    }

    pub async fn simple_chat_query_with(
        &self,
        model: &dyn LanguageModel,
        query: &str,
    ) -> Result<ChatAnswer> {
        self.prepare().await?;

        let snapshot = self.snapshot().await;
        let data_description = self.get_data_content_description().await;
        let ctx = ChatContext {
            schema: &snapshot.schema.schema,
            sql_guidance: &snapshot.schema.sql_guidance,
            data_content: &data_description,
        };

        let fast_path = FastPath {
            session: &self.session,
            model,
            sql_tool: &snapshot.sql_tool,
            config: &self.config,
        };
        Ok(fast_path.run(query, &ctx).await)
    }

    /// Answer plus citations for the search/merge layer. Any failure, and the
    /// unable-to-answer sentinel, yield an empty outcome.
    pub async fn search(&self, query: &str) -> SearchOutcome {
        let answer = match self.intelligent_query(query, None).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(error = %e, "KDB+ search failed");
                return SearchOutcome::default();
            }
        };

        if answer.answer.is_empty() || answer.answer.starts_with(UNABLE_TO_ANSWER) {
            tracing::info!(query = %crate::text::truncate_chars(query, 50), "KDB+ could not answer query");
            return SearchOutcome::default();
        }

        SearchOutcome {
            citations: citations::format_citations(query, &answer.tool_results),
            record_count: citations::count_records(&answer.tool_results),
            answer: answer.answer,
        }
    }
}

/// Bound any engine future by wall-clock time.
pub async fn with_deadline<F, T>(deadline: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::DeadlineExceeded(deadline.as_millis())),
    }
}
