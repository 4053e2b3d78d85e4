//! Conceptual reasoning pipeline
//!
//! The full-pipeline skeleton with a plan that instructs latent-space
//! concept operations, which the cognitive loop's conceptual branch then
//! executes.

use super::Pipeline;
use crate::agents::master::MasterAgent;
use crate::agents::reasoning::PlanningAgent;
use crate::cognitive::CognitiveLoop;
use crate::error::Result;
use crate::models::{MasterResponse, OrchestrationDecision, PipelineKind};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

const CONCEPTUAL_PLAN_INSTRUCTION: &str =
    "This task requires abstract concept manipulation. Include steps such as \
     「概念のベクトル化」,「概念の合成」and「概念の分析」in the thinking plan.";

pub struct ConceptualReasoningPipeline {
    planner: Arc<PlanningAgent>,
    cognitive: Arc<CognitiveLoop>,
    master: Arc<MasterAgent>,
}

impl ConceptualReasoningPipeline {
    pub fn new(
        planner: Arc<PlanningAgent>,
        cognitive: Arc<CognitiveLoop>,
        master: Arc<MasterAgent>,
    ) -> Self {
        Self {
            planner,
            cognitive,
            master,
        }
    }
}

#[async_trait]
impl Pipeline for ConceptualReasoningPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::ConceptualReasoning
    }

    async fn run(
        &self,
        query: &str,
        decision: &OrchestrationDecision,
        cancel: &CancellationToken,
    ) -> Result<MasterResponse> {
        info!("conceptual reasoning pipeline started");

        let plan = self
            .planner
            .plan(query, CONCEPTUAL_PLAN_INSTRUCTION, cancel)
            .await?;

        let cognitive_loop_output = self
            .cognitive
            .run(query, &plan, decision.reasoning_instruction(), cancel)
            .await?;

        let final_answer = self
            .master
            .generate_final_answer(query, &plan, &cognitive_loop_output, decision, cancel)
            .await?;

        Ok(MasterResponse {
            final_answer,
            self_criticism: String::new(),
            potential_problems:
                "Inaccurate concept vectors or uninterpretable vector arithmetic can derail \
                 the reasoning."
                    .to_string(),
            retrieved_info: format!(
                "Plan:\n{}\n\nCognitive loop output:\n{}",
                plan, cognitive_loop_output
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentContext;
    use crate::conceptual::{ConceptualMemory, SensoryUnit};
    use crate::config::prompts::PromptStore;
    use crate::memory::knowledge_graph::PersistentKnowledgeGraph;
    use crate::memory::log::MemoryLog;
    use crate::memory::vector::InMemoryVectorStore;
    use crate::testing::MockModel;
    use crate::tools::ToolRegistry;

    #[tokio::test]
    async fn test_conceptual_plan_reaches_master() {
        let dir = tempfile::tempdir().unwrap();
        // plan (conceptual), KG fragment, synthesis, master answer.
        let llm: Arc<dyn crate::llm::LanguageModel> = Arc::new(MockModel::scripted(vec![
            "1. 「時間」と「川」の概念を合成する".to_string(),
            r#"{"nodes": [], "edges": []}"#.to_string(),
            "metaphorical synthesis".to_string(),
            "time flows like a river".to_string(),
        ]));
        let ctx = AgentContext::new(llm.clone(), Arc::new(PromptStore::ephemeral()), "mock");
        let memory_log = Arc::new(
            MemoryLog::open(dir.path().join("log.jsonl"), dir.path().join("sessions")).unwrap(),
        );
        let cognitive = Arc::new(CognitiveLoop::new(
            ctx.clone(),
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(PersistentKnowledgeGraph::open(dir.path().join("kg.json"))),
            ToolRegistry::new(),
            memory_log.clone(),
            Arc::new(SensoryUnit::new(llm, "embed")),
            Arc::new(ConceptualMemory::new()),
            3,
        ));
        let pipeline = ConceptualReasoningPipeline::new(
            Arc::new(PlanningAgent::new(ctx.clone())),
            cognitive,
            Arc::new(MasterAgent::new(ctx, memory_log)),
        );

        let response = pipeline
            .run(
                "what is time?",
                &OrchestrationDecision::new(PipelineKind::ConceptualReasoning, "t", 0.8),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(response.final_answer, "time flows like a river");
        assert!(response.retrieved_info.contains("Plan:"));
    }
}
