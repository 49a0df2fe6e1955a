//! Plan, execute, re-plan, synthesize.
//!
//! The loop is an explicit state machine. The iteration counter travels inside the state,
//! and the only self-imposed bound is `max_iterations` plan calls.

use crate::catalog::SqlTool;
use crate::llm::LanguageModel;
use crate::planner;
use crate::prompts::PlannerContext;
use crate::protocol::{IntelligentAnswer, PlanStep, QueryPlan, ToolCallResult};
use crate::session::McpSession;
use crate::synthesis;

pub const UNABLE_TO_ANSWER: &str = "Unable to answer with available tools.";

const DISCOVERY_KEYWORDS: &[&str] = &["schema", "discover", "list tables", "describe", "metadata"];

/// A step whose stated purpose is learning structure rather than answering.
pub fn is_discovery_step(step: &PlanStep) -> bool {
    crate::text::contains_any(&step.purpose, DISCOVERY_KEYWORDS)
}

#[derive(Debug)]
enum LoopState {
    Plan { iteration: usize },
    Execute { iteration: usize, plan: QueryPlan },
    Synthesize,
    Done(IntelligentAnswer),
}

pub struct QueryLoop<'a> {
    session: &'a McpSession,
    model: &'a dyn LanguageModel,
    context: PlannerContext<'a>,
    sql_tool: &'a SqlTool,
    max_iterations: usize,
}

impl<'a> QueryLoop<'a> {
    pub fn new(
        session: &'a McpSession,
        model: &'a dyn LanguageModel,
        context: PlannerContext<'a>,
        sql_tool: &'a SqlTool,
        max_iterations: usize,
    ) -> Self {
        Self {
            session,
            model,
            context,
            sql_tool,
            max_iterations: max_iterations.max(1),
        }
    }

    pub async fn run(&self, query: &str) -> IntelligentAnswer {
        let mut discovered = String::new();
        let mut results: Vec<ToolCallResult> = Vec::new();
        let mut state = LoopState::Plan { iteration: 0 };

        loop {
            state = match state {
                LoopState::Plan { iteration } => {
                    tracing::info!(iteration = iteration + 1, max = self.max_iterations, "planning");
                    let ctx = PlannerContext {
                        discovered_schema: &discovered,
                        ..self.context
                    };
                    let plan = planner::plan(self.model, &ctx, self.sql_tool, query).await;
                    self.after_plan(iteration, plan)
                }
                LoopState::Execute { iteration, plan } => {
                    let ran_discovery = self
                        .execute(&plan.steps, &mut results, &mut discovered)
                        .await;
                    if ran_discovery && iteration + 1 < self.max_iterations {
                        tracing::info!(
                            iteration = iteration + 1,
                            chars = discovered.len(),
                            "schema discovered, re-planning"
                        );
                        LoopState::Plan {
                            iteration: iteration + 1,
                        }
                    } else {
                        LoopState::Synthesize
                    }
                }
                LoopState::Synthesize => {
                    let tool_results = std::mem::take(&mut results);
                    if tool_results.is_empty() {
                        LoopState::Done(IntelligentAnswer {
                            answer: UNABLE_TO_ANSWER.to_string(),
                            tool_results,
                        })
                    } else {
                        let answer = synthesis::synthesize(self.model, query, &tool_results).await;
                        LoopState::Done(IntelligentAnswer {
                            answer,
                            tool_results,
                        })
                    }
                }
                LoopState::Done(answer) => return answer,
            };
        }
    }

    fn after_plan(&self, iteration: usize, plan: QueryPlan) -> LoopState {
        if !plan.data_available {
            tracing::info!("planner reports data unavailable");
            return LoopState::Done(IntelligentAnswer {
                answer: plan.unavailable_answer(),
                tool_results: Vec::new(),
            });
        }

        if plan.steps.is_empty() {
            if iteration == 0 {
                let answer = if plan.reasoning.is_empty() {
                    UNABLE_TO_ANSWER.to_string()
                } else {
                    plan.reasoning
                };
                return LoopState::Done(IntelligentAnswer {
                    answer,
                    tool_results: Vec::new(),
                });
            }
            return LoopState::Synthesize;
        }

        LoopState::Execute { iteration, plan }
    }

    /// Run steps strictly in order. Returns whether any discovery step ran.
    async fn execute(
        &self,
        steps: &[PlanStep],
        results: &mut Vec<ToolCallResult>,
        discovered: &mut String,
    ) -> bool {
        let mut ran_discovery = false;

        for step in steps {
            tracing::info!(tool = %step.tool, purpose = %step.purpose, "executing step");
            let result = self
                .session
                .call_tool(&step.tool, step.arguments.clone())
                .await
                .with_purpose(&step.purpose);

            if is_discovery_step(step) {
                ran_discovery = true;
                if !result.is_error {
                    let text = result.text();
                    if !text.is_empty() {
                        discovered.push_str(&format!("\n\nDiscovered from {}:\n{}", step.tool, text));
                    }
                }
            }
            if result.is_error {
                tracing::warn!(
                    tool = %step.tool,
                    error = result.error.as_deref().unwrap_or_default(),
                    "step failed"
                );
            }
            results.push(result);
        }

        ran_discovery
    }
}
