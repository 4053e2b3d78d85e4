//! Orchestrator
//!
//! Picks the initial pipeline for a query. Rules apply in order, first
//! match wins: a URL forces `full`; a matching specialist tool selects
//! `micro_llm_expert`; otherwise the orchestration model decides from the
//! query, its complexity level and the affective state. A keyword overlay
//! independently sets the reasoning emphasis. The orchestrator never
//! consults the arbiter - that is the engine's job.

use crate::agents::knowledge::ComplexityAnalyzer;
use crate::agents::AgentContext;
use crate::cognitive::find_url;
use crate::error::{NoesisError, Result};
use crate::models::{OrchestrationDecision, PipelineKind, ReasoningEmphasis};
use crate::tools::{ToolRegistry, SPECIALIST_PREFIX};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const BIRDS_EYE_KEYWORDS: &[&str] = &[
    "全体像",
    "戦略",
    "将来",
    "哲学",
    "概要",
    "大局",
    "ビジョン",
    "抽象",
    "big picture",
    "strategy",
    "vision",
    "philosophy",
    "abstract",
    "overview",
];

const DETAIL_KEYWORDS: &[&str] = &[
    "具体例",
    "詳細",
    "手順",
    "データ",
    "正確な",
    "特定",
    "実装",
    "技術",
    "specific",
    "details",
    "steps",
    "data",
    "exact",
    "implementation",
    "technical",
];

#[derive(Debug, Deserialize)]
struct RawDecision {
    chosen_mode: String,
    reasoning: Option<String>,
    confidence_score: Option<f64>,
    parameters: Option<HashMap<String, Value>>,
}

pub struct Orchestrator {
    ctx: AgentContext,
    complexity: ComplexityAnalyzer,
    tools: ToolRegistry,
}

impl Orchestrator {
    pub fn new(ctx: AgentContext, complexity: ComplexityAnalyzer, tools: ToolRegistry) -> Self {
        Self {
            ctx,
            complexity,
            tools,
        }
    }

    /// Keyword-bucket overlay for the reasoning emphasis. Ties (including
    /// zero hits on both sides) leave it unset.
    fn determine_reasoning_emphasis(query: &str) -> Option<ReasoningEmphasis> {
        let lower = query.to_lowercase();
        let bird_score = BIRDS_EYE_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count();
        let detail_score = DETAIL_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count();

        if bird_score > detail_score && bird_score > 0 {
            Some(ReasoningEmphasis::BirdsEyeView)
        } else if detail_score > bird_score && detail_score > 0 {
            Some(ReasoningEmphasis::DetailOriented)
        } else {
            None
        }
    }

    /// Produce the initial orchestration decision for a query.
    pub async fn decide(
        &self,
        query: &str,
        affective_summary: &str,
        cancel: &CancellationToken,
    ) -> Result<OrchestrationDecision> {
        let emphasis = Self::determine_reasoning_emphasis(query);

        // Rule 1: a URL in the query forces the browsing-capable pipeline.
        if find_url(query).is_some() {
            info!("URL detected; forcing 'full' mode");
            let mut decision = OrchestrationDecision::new(
                PipelineKind::Full,
                "The query contains a URL, so the full pipeline with web browsing was selected",
                1.0,
            );
            decision.set_reasoning_emphasis(emphasis);
            return Ok(decision);
        }

        match self.decide_inner(query, affective_summary, cancel).await {
            Ok(mut decision) => {
                decision.set_reasoning_emphasis(emphasis);
                info!(mode = %decision.chosen_mode, "orchestration decision");
                Ok(decision)
            }
            Err(e) if e.is_cancellation() => Err(e),
            Err(e) => {
                error!("orchestration failed: {}; falling back to 'full'", e);
                let mut decision = OrchestrationDecision::new(
                    PipelineKind::Full,
                    "An error occurred during orchestration; 'full' was chosen as a fallback.",
                    0.5,
                );
                decision.set_reasoning_emphasis(emphasis);
                Ok(decision)
            }
        }
    }

    async fn decide_inner(
        &self,
        query: &str,
        affective_summary: &str,
        cancel: &CancellationToken,
    ) -> Result<OrchestrationDecision> {
        // Rule 2: route to a specialist when one matches the query domain.
        if self.tools.has_specialists().await {
            let descriptions = self.tools.descriptions().await;
            let verdict = self
                .ctx
                .complete(
                    "EXPERT_MATCH_PROMPT",
                    &[("tools", descriptions.as_str()), ("query", query)],
                    cancel,
                )
                .await?;
            let verdict = verdict.trim();
            if verdict != "none" && verdict.starts_with(SPECIALIST_PREFIX) {
                info!(tool = verdict, "specialist matched; selecting micro_llm_expert");
                return Ok(OrchestrationDecision::new(
                    PipelineKind::MicroLlmExpert,
                    format!(
                        "The query matches a specialist domain covered by '{}'",
                        verdict
                    ),
                    0.95,
                ));
            }
        }

        // Rule 3: the orchestration model decides from complexity + affect.
        let complexity_level = self.complexity.analyze(query, cancel).await;
        let complexity_str = format!("Level {}", complexity_level);

        let raw: RawDecision = self
            .ctx
            .complete_json(
                "ORCHESTRATION_PROMPT",
                &[
                    ("query", query),
                    ("complexity_level", complexity_str.as_str()),
                    ("affective_state", affective_summary),
                ],
                cancel,
            )
            .await?;

        if PipelineKind::parse(&raw.chosen_mode).is_none() {
            // The engine would fall back to simple anyway, but an unknown
            // mode here means the model ignored the instruction set.
            return Err(NoesisError::MalformedOutput {
                reason: format!("model chose unknown mode '{}'", raw.chosen_mode),
            });
        }

        Ok(OrchestrationDecision {
            chosen_mode: raw.chosen_mode,
            reasoning: raw
                .reasoning
                .unwrap_or_else(|| "LLM did not provide a reasoning.".to_string()),
            confidence_score: raw.confidence_score.unwrap_or(0.5).clamp(0.0, 1.0),
            parameters: raw.parameters.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::prompts::PromptStore;
    use crate::testing::MockModel;
    use crate::tools::SpecialistTool;
    use std::sync::Arc;

    async fn orchestrator(
        responses: Vec<String>,
        with_specialist: bool,
    ) -> Orchestrator {
        let llm: Arc<dyn crate::llm::LanguageModel> = Arc::new(MockModel::scripted(responses));
        let ctx = AgentContext::new(llm.clone(), Arc::new(PromptStore::ephemeral()), "mock");
        let tools = ToolRegistry::new();
        if with_specialist {
            tools
                .register(Arc::new(SpecialistTool::new(
                    "noesis-micro-chemistry",
                    "expert on chemistry",
                    llm,
                )))
                .await;
        }
        Orchestrator::new(ctx.clone(), ComplexityAnalyzer::new(ctx), tools)
    }

    #[tokio::test]
    async fn test_url_forces_full_mode() {
        // No scripted responses: the URL rule fires before any model call.
        let orchestrator = orchestrator(vec![], false).await;
        let decision = orchestrator
            .decide(
                "Please read https://example.com/page",
                "neutral",
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(decision.chosen_mode, "full");
        assert!((decision.confidence_score - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_specialist_match_selects_micro_expert() {
        let orchestrator = orchestrator(
            vec!["Specialist_noesis-micro-chemistry".to_string()],
            true,
        )
        .await;
        let decision = orchestrator
            .decide("what is a covalent bond?", "neutral", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(decision.chosen_mode, "micro_llm_expert");
        assert!((decision.confidence_score - 0.95).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_model_decision_with_defaults() {
        // complexity verdict, then an orchestration decision missing the
        // optional fields.
        let orchestrator = orchestrator(
            vec![
                r#"{"complexity_level": "Level 3", "reason": "r"}"#.to_string(),
                r#"{"chosen_mode": "speculative"}"#.to_string(),
            ],
            false,
        )
        .await;
        let decision = orchestrator
            .decide("draft three takes on this", "neutral", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(decision.chosen_mode, "speculative");
        assert_eq!(decision.reasoning, "LLM did not provide a reasoning.");
        assert!((decision.confidence_score - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_full() {
        let llm: Arc<dyn crate::llm::LanguageModel> = Arc::new(MockModel::failing());
        let ctx = AgentContext::new(llm, Arc::new(PromptStore::ephemeral()), "mock");
        let orchestrator = Orchestrator::new(
            ctx.clone(),
            ComplexityAnalyzer::new(ctx),
            ToolRegistry::new(),
        );

        let decision = orchestrator
            .decide("anything", "neutral", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(decision.chosen_mode, "full");
        assert!((decision.confidence_score - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_unknown_mode_from_model_falls_back_to_full() {
        let orchestrator = orchestrator(
            vec![
                r#"{"complexity_level": "Level 2", "reason": "r"}"#.to_string(),
                r#"{"chosen_mode": "galaxy_brain"}"#.to_string(),
            ],
            false,
        )
        .await;
        let decision = orchestrator
            .decide("q", "neutral", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(decision.chosen_mode, "full");
    }

    #[test]
    fn test_reasoning_emphasis_buckets() {
        assert_eq!(
            Orchestrator::determine_reasoning_emphasis("give me the big picture strategy"),
            Some(ReasoningEmphasis::BirdsEyeView)
        );
        assert_eq!(
            Orchestrator::determine_reasoning_emphasis("show the exact implementation steps"),
            Some(ReasoningEmphasis::DetailOriented)
        );
        assert_eq!(
            Orchestrator::determine_reasoning_emphasis("この計画の全体像と詳細を教えて"),
            None
        );
        assert_eq!(Orchestrator::determine_reasoning_emphasis("hello"), None);
    }

    #[tokio::test]
    async fn test_emphasis_overlays_url_rule() {
        let orchestrator = orchestrator(vec![], false).await;
        let decision = orchestrator
            .decide(
                "summarize the strategy at https://example.com/plan",
                "neutral",
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(decision.chosen_mode, "full");
        assert_eq!(
            decision.reasoning_emphasis(),
            Some(ReasoningEmphasis::BirdsEyeView)
        );
    }
}
