//! Planning and atomic thinking-skill agents

use super::AgentContext;
use crate::error::Result;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Generates an actionable plan for a request, and chooses thinking-module
/// sequences for the self-discover pipeline.
pub struct PlanningAgent {
    ctx: AgentContext,
}

impl PlanningAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn plan(
        &self,
        query: &str,
        reasoning_instruction: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.ctx
            .complete(
                "PLANNING_PROMPT",
                &[
                    ("query", query),
                    ("reasoning_instruction", reasoning_instruction),
                ],
                cancel,
            )
            .await
    }

    /// Returns the comma-separated module sequence chosen for a query,
    /// e.g. `DECOMPOSE, RAG_SEARCH, SYNTHESIZE`.
    pub async fn select_thinking_modules(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let raw = self
            .ctx
            .complete("MODULE_SELECTION_PROMPT", &[("query", query)], cancel)
            .await?;
        let sequence: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        debug!(?sequence, "thinking module sequence selected");
        Ok(sequence)
    }
}

/// Breaks a complex request into simpler subtasks.
pub struct DecomposeAgent {
    ctx: AgentContext,
}

impl DecomposeAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self, query: &str, cancel: &CancellationToken) -> Result<String> {
        self.ctx
            .complete("DECOMPOSE_PROMPT", &[("query", query)], cancel)
            .await
    }
}

/// Points out weaknesses in a draft.
pub struct CritiqueAgent {
    ctx: AgentContext,
}

impl CritiqueAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self, draft: &str, cancel: &CancellationToken) -> Result<String> {
        self.ctx
            .complete("CRITIQUE_PROMPT", &[("draft", draft)], cancel)
            .await
    }
}

/// Merges accumulated information into one conclusion.
pub struct SynthesizeAgent {
    ctx: AgentContext,
}

impl SynthesizeAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self, information_list: &str, cancel: &CancellationToken) -> Result<String> {
        self.ctx
            .complete(
                "SYNTHESIZE_PROMPT",
                &[("information_list", information_list)],
                cancel,
            )
            .await
    }
}

/// Produces an improved search query from a retrieval evaluation.
pub struct QueryRefinementAgent {
    ctx: AgentContext,
}

impl QueryRefinementAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn refine(
        &self,
        query: &str,
        evaluation_summary: &str,
        suggestions: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.ctx
            .complete(
                "QUERY_REFINEMENT_PROMPT",
                &[
                    ("query", query),
                    ("evaluation_summary", evaluation_summary),
                    ("suggestions", suggestions),
                ],
                cancel,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock_context;

    #[tokio::test]
    async fn test_module_selection_parses_sequence() {
        let (ctx, _) = mock_context(vec!["DECOMPOSE, RAG_SEARCH , synthesize".to_string()]);
        let agent = PlanningAgent::new(ctx);
        let modules = agent
            .select_thinking_modules("how do fusion reactors work?", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(modules, vec!["DECOMPOSE", "RAG_SEARCH", "SYNTHESIZE"]);
    }

    #[tokio::test]
    async fn test_plan_passes_through_model_output() {
        let (ctx, recorder) = mock_context(vec!["1. read\n2. think".to_string()]);
        let agent = PlanningAgent::new(ctx);
        let plan = agent
            .plan("explain ownership", "", &CancellationToken::new())
            .await
            .unwrap();
        assert!(plan.contains("1. read"));
        assert!(recorder.lock().last().unwrap().contains("explain ownership"));
    }
}
