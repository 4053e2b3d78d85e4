//! Self-discover pipeline
//!
//! The planner chooses a sequence of atomic thinking modules; each module
//! runs in order, seeing the previous module's output. Unknown module
//! names are skipped with a warning.

use super::Pipeline;
use crate::agents::reasoning::{CritiqueAgent, DecomposeAgent, PlanningAgent, SynthesizeAgent};
use crate::cognitive::CognitiveLoop;
use crate::error::Result;
use crate::models::{MasterResponse, OrchestrationDecision, PipelineKind};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct SelfDiscoverPipeline {
    planner: Arc<PlanningAgent>,
    decompose: DecomposeAgent,
    critique: CritiqueAgent,
    synthesize: SynthesizeAgent,
    cognitive: Arc<CognitiveLoop>,
}

impl SelfDiscoverPipeline {
    pub fn new(
        planner: Arc<PlanningAgent>,
        decompose: DecomposeAgent,
        critique: CritiqueAgent,
        synthesize: SynthesizeAgent,
        cognitive: Arc<CognitiveLoop>,
    ) -> Self {
        Self {
            planner,
            decompose,
            critique,
            synthesize,
            cognitive,
        }
    }
}

#[async_trait]
impl Pipeline for SelfDiscoverPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::SelfDiscover
    }

    async fn run(
        &self,
        query: &str,
        _decision: &OrchestrationDecision,
        cancel: &CancellationToken,
    ) -> Result<MasterResponse> {
        let sequence = self.planner.select_thinking_modules(query, cancel).await?;
        info!(?sequence, "self-discover strategy selected");

        let mut last_output = String::new();
        let mut execution_trace: Vec<String> = Vec::new();

        for module in &sequence {
            let output = match module.as_str() {
                "DECOMPOSE" => self.decompose.run(query, cancel).await?,
                "CRITIQUE" => self.critique.run(&last_output, cancel).await?,
                "SYNTHESIZE" => {
                    let info_list = execution_trace.join("\n---\n");
                    self.synthesize.run(&info_list, cancel).await?
                }
                "RAG_SEARCH" => {
                    self.cognitive
                        .run(query, "search for relevant information", "", cancel)
                        .await?
                }
                unknown => {
                    warn!("unknown thinking module '{}' skipped", unknown);
                    continue;
                }
            };

            last_output = output.clone();
            execution_trace.push(format!("[output of {}]\n{}", module, output));
        }

        let final_answer = if last_output.is_empty() {
            "The process completed without producing a definite final output.".to_string()
        } else {
            last_output
        };

        Ok(MasterResponse {
            final_answer,
            self_criticism: String::new(),
            potential_problems:
                "A poorly chosen module strategy can make the thinking process inefficient."
                    .to_string(),
            retrieved_info: execution_trace.join("\n\n"),
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

    fn build(dir: &std::path::Path, responses: Vec<String>) -> SelfDiscoverPipeline {
        let llm: Arc<dyn crate::llm::LanguageModel> = Arc::new(MockModel::scripted(responses));
        let ctx = AgentContext::new(llm.clone(), Arc::new(PromptStore::ephemeral()), "mock");
        let memory_log = Arc::new(
            MemoryLog::open(dir.join("log.jsonl"), dir.join("sessions")).unwrap(),
        );
        let cognitive = Arc::new(CognitiveLoop::new(
            ctx.clone(),
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(PersistentKnowledgeGraph::open(dir.join("kg.json"))),
            ToolRegistry::new(),
            memory_log,
            Arc::new(SensoryUnit::new(llm, "embed")),
            Arc::new(ConceptualMemory::new()),
            3,
        ));
        SelfDiscoverPipeline::new(
            Arc::new(PlanningAgent::new(ctx.clone())),
            DecomposeAgent::new(ctx.clone()),
            CritiqueAgent::new(ctx.clone()),
            SynthesizeAgent::new(ctx),
            cognitive,
        )
    }

    #[tokio::test]
    async fn test_modules_run_in_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = build(
            dir.path(),
            vec![
                "DECOMPOSE, CRITIQUE, SYNTHESIZE".to_string(),
                "subtask a; subtask b".to_string(),
                "subtask b is redundant".to_string(),
                "final synthesis of both".to_string(),
            ],
        );

        let response = pipeline
            .run(
                "design a cache",
                &OrchestrationDecision::new(PipelineKind::SelfDiscover, "t", 0.8),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(response.final_answer, "final synthesis of both");
        assert!(response.retrieved_info.contains("[output of DECOMPOSE]"));
        assert!(response.retrieved_info.contains("[output of CRITIQUE]"));
    }

    #[tokio::test]
    async fn test_unknown_modules_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = build(
            dir.path(),
            vec![
                "MEDITATE, DECOMPOSE".to_string(),
                "the subtasks".to_string(),
            ],
        );

        let response = pipeline
            .run(
                "q",
                &OrchestrationDecision::new(PipelineKind::SelfDiscover, "t", 0.8),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(response.final_answer, "the subtasks");
        assert!(!response.retrieved_info.contains("MEDITATE"));
    }

    #[tokio::test]
    async fn test_empty_strategy_yields_explanatory_answer() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = build(dir.path(), vec!["".to_string()]);
        let response = pipeline
            .run(
                "q",
                &OrchestrationDecision::new(PipelineKind::SelfDiscover, "t", 0.8),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(response.final_answer.contains("without producing"));
    }
}
