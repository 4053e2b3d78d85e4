//! Master agent
//!
//! Composes the final user-facing answer, folding in recent background
//! insights from the memory log.

use super::AgentContext;
use crate::error::Result;
use crate::memory::log::MemoryLog;
use crate::models::OrchestrationDecision;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct MasterAgent {
    ctx: AgentContext,
    memory_log: Arc<MemoryLog>,
}

impl MasterAgent {
    pub fn new(ctx: AgentContext, memory_log: Arc<MemoryLog>) -> Self {
        Self { ctx, memory_log }
    }

    fn recent_insight(&self, topic: &str, fallback: &str) -> String {
        let joined = self
            .memory_log
            .get_recent_insights(topic, 1)
            .into_iter()
            .filter_map(|entry| {
                entry
                    .get("synthesized_knowledge")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect::<Vec<_>>()
            .join("\n");
        if joined.is_empty() {
            fallback.to_string()
        } else {
            joined
        }
    }

    pub async fn generate_final_answer(
        &self,
        query: &str,
        plan: &str,
        cognitive_loop_output: &str,
        decision: &OrchestrationDecision,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let autonomous = self.recent_insight(
            "autonomous_thought",
            "No notable insights from autonomous research.",
        );
        let improvements = self.recent_insight(
            "self_improvement_applied_decision",
            "No notable insights from self-improvement.",
        );

        self.ctx
            .complete(
                "MASTER_AGENT_PROMPT",
                &[
                    ("query", query),
                    ("plan", plan),
                    ("cognitive_loop_output", cognitive_loop_output),
                    ("reasoning_instruction", decision.reasoning_instruction()),
                    ("recent_autonomous_thoughts", autonomous.as_str()),
                    ("recent_self_improvement_insights", improvements.as_str()),
                ],
                cancel,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PipelineKind;
    use crate::testing::mock_context;

    #[tokio::test]
    async fn test_final_answer_includes_memory_insights() {
        let dir = tempfile::tempdir().unwrap();
        let memory_log = Arc::new(
            MemoryLog::open(dir.path().join("log.jsonl"), dir.path().join("sessions")).unwrap(),
        );
        memory_log
            .log_autonomous_thought("autonomous_thought", "fusion research is accelerating")
            .unwrap();

        let (ctx, recorder) = mock_context(vec!["final answer".to_string()]);
        let agent = MasterAgent::new(ctx, memory_log);
        let decision = OrchestrationDecision::new(PipelineKind::Full, "test", 0.9);

        let answer = agent
            .generate_final_answer("q", "plan", "findings", &decision, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(answer, "final answer");
        let prompt = recorder.lock().last().unwrap().clone();
        assert!(prompt.contains("fusion research is accelerating"));
    }
}
