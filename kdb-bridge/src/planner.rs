use crate::catalog::SqlTool;
use crate::llm::LanguageModel;
use crate::plan_parsing;
use crate::prompts::{self, PlannerContext};
use crate::protocol::QueryPlan;

/// Ask the model for a plan. Model failures become an empty plan carrying the error.
pub async fn plan(
    model: &dyn LanguageModel,
    ctx: &PlannerContext<'_>,
    sql_tool: &SqlTool,
    query: &str,
) -> QueryPlan {
    let prompt = prompts::planner_prompt(ctx, query);

    let raw = match model.generate(&prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!(error = %e, "planner model call failed");
            return QueryPlan::without_steps(format!("Error: {}", e));
        }
    };
    tracing::debug!(chars = raw.len(), "planner response received");

    let plan = plan_parsing::parse_plan(raw.trim(), sql_tool);
    tracing::info!(
        steps = plan.steps.len(),
        data_available = plan.data_available,
        reasoning = %crate::text::truncate_chars(&plan.reasoning, 200),
        "tool plan"
    );
    plan
}
