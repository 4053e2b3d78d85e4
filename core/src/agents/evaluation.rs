//! Scoring and critique agents
//!
//! These agents grade other outputs: retrieval quality, thought paths,
//! reasoning steps, whole responses.

use super::AgentContext;
use crate::error::Result;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Verdict on a batch of retrieved information.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalEvaluation {
    #[serde(default)]
    pub relevance_score: i64,
    #[serde(default)]
    pub completeness_score: i64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub suggestions: String,
}

pub struct RetrievalEvaluatorAgent {
    ctx: AgentContext,
}

impl RetrievalEvaluatorAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn evaluate(
        &self,
        query: &str,
        retrieved_info: &str,
        cancel: &CancellationToken,
    ) -> Result<RetrievalEvaluation> {
        self.ctx
            .complete_json(
                "RETRIEVAL_EVALUATOR_PROMPT",
                &[("query", query), ("retrieved_info", retrieved_info)],
                cancel,
            )
            .await
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ThoughtScore {
    #[serde(default)]
    score: f64,
}

/// Scores how promising a thought path is, in [0, 1].
pub struct ThoughtEvaluatorAgent {
    ctx: AgentContext,
}

impl ThoughtEvaluatorAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn score(
        &self,
        query: &str,
        thought_path: &str,
        cancel: &CancellationToken,
    ) -> Result<f64> {
        let parsed: ThoughtScore = self
            .ctx
            .complete_json(
                "THOUGHT_EVALUATION_PROMPT",
                &[("query", query), ("thought_path", thought_path)],
                cancel,
            )
            .await?;
        Ok(parsed.score.clamp(0.0, 1.0))
    }
}

/// Per-step reward from the process reward model.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessReward {
    #[serde(default)]
    pub reward_score: f64,
    #[serde(default)]
    pub justification: String,
}

pub struct ProcessRewardAgent {
    ctx: AgentContext,
}

impl ProcessRewardAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn reward(
        &self,
        query: &str,
        step_name: &str,
        step_content: &str,
        cancel: &CancellationToken,
    ) -> Result<ProcessReward> {
        self.ctx
            .complete_json(
                "PROCESS_REWARD_PROMPT",
                &[
                    ("query", query),
                    ("step_name", step_name),
                    ("step_content", step_content),
                ],
                cancel,
            )
            .await
    }
}

/// Marker the critic emits when it finds nothing to improve.
pub const NO_ISSUES_MARKER: &str = "no issues found";

/// Meta-cognitive critic over the whole reasoning process.
pub struct SelfCriticAgent {
    ctx: AgentContext,
}

impl SelfCriticAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn critique(
        &self,
        query: &str,
        plan: &str,
        cognitive_loop_output: &str,
        final_answer: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.ctx
            .complete(
                "SELF_CRITICISM_PROMPT",
                &[
                    ("query", query),
                    ("plan", plan),
                    ("cognitive_loop_output", cognitive_loop_output),
                    ("final_answer", final_answer),
                ],
                cancel,
            )
            .await
    }
}

/// Surfaces latent problems and follow-up questions.
pub struct ProblemDiscoveryAgent {
    ctx: AgentContext,
}

impl ProblemDiscoveryAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn discover(
        &self,
        query: &str,
        plan: &str,
        cognitive_loop_output: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        self.ctx
            .complete_json(
                "PROBLEM_DISCOVERY_PROMPT",
                &[
                    ("query", query),
                    ("plan", plan),
                    ("cognitive_loop_output", cognitive_loop_output),
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
    async fn test_retrieval_evaluation_parses_scores() {
        let (ctx, _) = mock_context(vec![
            r#"{"relevance_score": 5, "completeness_score": 7, "summary": "thin", "suggestions": "search deeper"}"#
                .to_string(),
        ]);
        let agent = RetrievalEvaluatorAgent::new(ctx);
        let evaluation = agent
            .evaluate("q", "docs", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(evaluation.relevance_score, 5);
        assert_eq!(evaluation.completeness_score, 7);
        assert_eq!(evaluation.suggestions, "search deeper");
    }

    #[tokio::test]
    async fn test_thought_score_is_clamped() {
        let (ctx, _) = mock_context(vec![r#"{"score": 1.7}"#.to_string()]);
        let agent = ThoughtEvaluatorAgent::new(ctx);
        let score = agent
            .score("q", "path", &CancellationToken::new())
            .await
            .unwrap();
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_problem_discovery_returns_list() {
        let (ctx, _) = mock_context(vec![r#"["latency risk", "unclear scope"]"#.to_string()]);
        let agent = ProblemDiscoveryAgent::new(ctx);
        let problems = agent
            .discover("q", "p", "out", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(problems.len(), 2);
    }
}
