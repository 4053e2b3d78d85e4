//! Execution traces and the self-evolution cycle
//!
//! The full pipeline emits one [`ExecutionTrace`] per request. During idle
//! time the governor asks [`SelfEvolution`] to analyze the latest trace:
//! the process reward model grades each step, the meta-cognitive critic
//! reviews the outcome, and surviving weaknesses turn into improvement
//! suggestions that the correction agent may apply.

use crate::agents::evaluation::{ProcessRewardAgent, SelfCriticAgent, NO_ISSUES_MARKER};
use crate::agents::improvement::{SelfCorrectionAgent, SelfImprovementAgent};
use crate::analytics::{event_types, AnalyticsBus};
use crate::pipelines::full::TraceSink;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The record of one request's reasoning, in step order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub query: String,
    pub reasoning_trace: Vec<(String, String)>,
    pub final_answer: String,
    pub self_criticism: String,
}

impl ExecutionTrace {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            reasoning_trace: Vec::new(),
            final_answer: String::new(),
            self_criticism: String::new(),
        }
    }

    pub fn record(&mut self, step_name: &str, content: &str) {
        self.reasoning_trace
            .push((step_name.to_string(), content.to_string()));
    }

    fn step(&self, name: &str) -> &str {
        self.reasoning_trace
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, content)| content.as_str())
            .unwrap_or("")
    }
}

pub struct SelfEvolution {
    reward_agent: ProcessRewardAgent,
    critic: SelfCriticAgent,
    improvement_agent: SelfImprovementAgent,
    correction_agent: SelfCorrectionAgent,
    analytics: Arc<AnalyticsBus>,
    traces: Mutex<Vec<ExecutionTrace>>,
}

impl SelfEvolution {
    pub fn new(
        reward_agent: ProcessRewardAgent,
        critic: SelfCriticAgent,
        improvement_agent: SelfImprovementAgent,
        correction_agent: SelfCorrectionAgent,
        analytics: Arc<AnalyticsBus>,
    ) -> Self {
        Self {
            reward_agent,
            critic,
            improvement_agent,
            correction_agent,
            analytics,
            traces: Mutex::new(Vec::new()),
        }
    }

    pub fn trace_count(&self) -> usize {
        self.traces.lock().len()
    }

    /// Analyze the most recent trace and run the improvement cycle. The
    /// trace list is cleared regardless of outcome.
    pub async fn analyze_own_performance(&self, cancel: &CancellationToken) {
        let latest = {
            let traces = self.traces.lock();
            match traces.last() {
                Some(trace) => trace.clone(),
                None => {
                    info!("no execution traces to analyze; skipping self-evolution");
                    return;
                }
            }
        };

        info!("self-evolution cycle started");

        // Step 1: per-step process rewards.
        let mut process_feedback = Vec::new();
        for (step_name, step_content) in &latest.reasoning_trace {
            match self
                .reward_agent
                .reward(&latest.query, step_name, step_content, cancel)
                .await
            {
                Ok(reward) => process_feedback.push(json!({
                    "step": step_name,
                    "reward": reward.reward_score,
                    "justification": reward.justification,
                })),
                Err(e) => warn!("process reward for '{}' failed: {}", step_name, e),
            }
        }
        self.analytics
            .publish(event_types::PROCESS_FEEDBACK, json!(process_feedback));

        // Step 2: meta-cognitive critique of the whole trace.
        let criticism = match self
            .critic
            .critique(
                &latest.query,
                latest.step("step_1_plan"),
                latest.step("step_2_cognitive_loop_output"),
                &latest.final_answer,
                cancel,
            )
            .await
        {
            Ok(criticism) => criticism,
            Err(e) => {
                warn!("meta-cognitive critique failed: {}", e);
                self.traces.lock().clear();
                return;
            }
        };
        self.analytics
            .publish(event_types::SELF_CRITICISM, json!(criticism));

        if criticism.is_empty() || criticism.to_lowercase().contains(NO_ISSUES_MARKER) {
            info!("no significant weaknesses found; ending self-evolution cycle");
            self.traces.lock().clear();
            return;
        }

        // Step 3: design improvements from the weaknesses and rewards.
        let trace_json = serde_json::to_string(&latest).unwrap_or_default();
        let feedback_json = serde_json::to_string(&process_feedback).unwrap_or_default();
        let suggestions = match self
            .improvement_agent
            .suggest(&trace_json, &feedback_json, &criticism, cancel)
            .await
        {
            Ok(suggestions) if !suggestions.is_empty() => suggestions,
            Ok(_) => {
                warn!("no improvement suggestions were produced");
                self.traces.lock().clear();
                return;
            }
            Err(e) => {
                warn!("improvement suggestion design failed: {}", e);
                self.traces.lock().clear();
                return;
            }
        };
        self.analytics
            .publish(event_types::IMPROVEMENT_SUGGESTIONS, json!(suggestions));

        // Step 4: consider and apply.
        self.correction_agent
            .consider_and_apply(&suggestions, cancel)
            .await;

        self.traces.lock().clear();
        info!("self-evolution cycle completed");
    }
}

#[async_trait]
impl TraceSink for SelfEvolution {
    async fn collect(&self, trace: ExecutionTrace) {
        self.traces.lock().push(trace);
        info!("execution trace collected for self-analysis");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentContext;
    use crate::config::prompts::PromptStore;
    use crate::evolution::micro_llm::MicroLlmManager;
    use crate::memory::knowledge_graph::PersistentKnowledgeGraph;
    use crate::memory::log::MemoryLog;
    use crate::testing::MockModel;
    use crate::tools::ToolRegistry;

    fn sample_trace() -> ExecutionTrace {
        let mut trace = ExecutionTrace::new("why is the sky blue?");
        trace.record("step_1_plan", "1. recall optics");
        trace.record("step_2_cognitive_loop_output", "rayleigh scattering");
        trace.final_answer = "because of rayleigh scattering".to_string();
        trace
    }

    fn build(
        dir: &std::path::Path,
        responses: Vec<String>,
    ) -> (SelfEvolution, Arc<PromptStore>) {
        let llm: Arc<dyn crate::llm::LanguageModel> =
            Arc::new(MockModel::scripted(responses));
        let prompts = Arc::new(PromptStore::ephemeral());
        let ctx = AgentContext::new(llm.clone(), prompts.clone(), "mock");
        let memory_log = Arc::new(
            MemoryLog::open(dir.join("log.jsonl"), dir.join("sessions")).unwrap(),
        );
        let graph = Arc::new(PersistentKnowledgeGraph::open(dir.join("kg.json")));
        let micro = Arc::new(MicroLlmManager::new(
            llm,
            graph,
            ToolRegistry::new(),
            "base",
            dir.join("micro"),
        ));
        let evolution = SelfEvolution::new(
            ProcessRewardAgent::new(ctx.clone()),
            SelfCriticAgent::new(ctx.clone()),
            SelfImprovementAgent::new(ctx.clone()),
            SelfCorrectionAgent::new(ctx, memory_log, micro, prompts.clone()),
            Arc::new(AnalyticsBus::new()),
        );
        (evolution, prompts)
    }

    #[tokio::test]
    async fn test_no_traces_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (evolution, _) = build(dir.path(), vec!["should never be used".to_string()]);
        evolution.analyze_own_performance(&CancellationToken::new()).await;
        assert_eq!(evolution.trace_count(), 0);
    }

    #[tokio::test]
    async fn test_clean_critique_clears_traces_without_suggesting() {
        let dir = tempfile::tempdir().unwrap();
        // Two step rewards, then a clean critique.
        let (evolution, _) = build(
            dir.path(),
            vec![
                r#"{"reward_score": 0.9, "justification": "solid"}"#.to_string(),
                r#"{"reward_score": 0.8, "justification": "fine"}"#.to_string(),
                NO_ISSUES_MARKER.to_string(),
            ],
        );
        evolution.collect(sample_trace()).await;
        assert_eq!(evolution.trace_count(), 1);

        evolution.analyze_own_performance(&CancellationToken::new()).await;
        assert_eq!(evolution.trace_count(), 0);
    }

    #[tokio::test]
    async fn test_full_cycle_applies_prompt_refinement() {
        let dir = tempfile::tempdir().unwrap();
        let (evolution, prompts) = build(
            dir.path(),
            vec![
                // rewards for the two steps
                r#"{"reward_score": 0.2, "justification": "weak"}"#.to_string(),
                r#"{"reward_score": 0.4, "justification": "shallow"}"#.to_string(),
                // critique with substance
                "the plan was superficial".to_string(),
                // improvement suggestions
                r#"[{"type": "PromptRefinement", "details": {"target_prompt_key": "PLANNING_PROMPT", "new_prompt_suggestion": "Deep plan: {{ query }}"}}]"#
                    .to_string(),
                // correction decision
                "Apply the refinement.".to_string(),
            ],
        );
        evolution.collect(sample_trace()).await;
        evolution.analyze_own_performance(&CancellationToken::new()).await;

        assert_eq!(prompts.get("PLANNING_PROMPT"), "Deep plan: {{ query }}");
        assert_eq!(evolution.trace_count(), 0);
    }
}
