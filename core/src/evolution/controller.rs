//! Evolutionary controller
//!
//! The direction-setting authority: benchmarks the system, maps the
//! measured capabilities into the knowledge graph, checks for knowledge
//! gaps, and decides what the idle cycles should pursue next.

use crate::agents::knowledge::{CapabilityMapperAgent, KnowledgeGapAnalyzer};
use crate::error::Result;
use crate::evolution::benchmark::PerformanceBenchmark;
use crate::memory::knowledge_graph::PersistentKnowledgeGraph;
use crate::memory::log::MemoryLog;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Benchmark scores below this pivot the goal to performance work.
const PERFORMANCE_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalKind {
    PerformanceImprovement,
    KnowledgeAcquisition,
    Exploration,
}

/// The directive driving background task selection. Only one is active at
/// a time; each directional re-evaluation replaces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionaryGoal {
    pub kind: GoalKind,
    pub reason: String,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

pub struct EvolutionaryController {
    benchmark: Arc<PerformanceBenchmark>,
    capability_mapper: CapabilityMapperAgent,
    gap_analyzer: KnowledgeGapAnalyzer,
    memory_log: Arc<MemoryLog>,
    knowledge_graph: Arc<PersistentKnowledgeGraph>,
}

impl EvolutionaryController {
    pub fn new(
        benchmark: Arc<PerformanceBenchmark>,
        capability_mapper: CapabilityMapperAgent,
        gap_analyzer: KnowledgeGapAnalyzer,
        memory_log: Arc<MemoryLog>,
        knowledge_graph: Arc<PersistentKnowledgeGraph>,
    ) -> Self {
        Self {
            benchmark,
            capability_mapper,
            gap_analyzer,
            memory_log,
            knowledge_graph,
        }
    }

    /// Analyze the system's current state and decide the next goal.
    pub async fn determine_direction(&self, cancel: &CancellationToken) -> Result<EvolutionaryGoal> {
        info!("determining the next evolutionary direction");

        // 1. Measure.
        let report = self.benchmark.run_benchmarks(cancel).await;
        let overall_score = report.summary.overall_score;

        // 2. Map capabilities into long-term memory.
        let report_json = serde_json::to_string_pretty(&report).unwrap_or_default();
        match self
            .capability_mapper
            .map_capabilities(&report_json, cancel)
            .await
        {
            Ok(fragment) if !fragment.is_empty() => {
                self.knowledge_graph.merge(fragment);
                if let Err(e) = self.knowledge_graph.save() {
                    warn!("capability graph save failed: {}", e);
                }
            }
            Ok(_) => warn!("capability mapping produced an empty graph"),
            Err(e) => warn!("capability mapping failed: {}", e),
        }

        // 3. Look for knowledge gaps.
        let knowledge_gap = self.gap_analyzer.analyze_for_gaps(cancel).await;

        // 4. Decide.
        let goal = if overall_score < PERFORMANCE_THRESHOLD {
            EvolutionaryGoal {
                kind: GoalKind::PerformanceImprovement,
                reason: format!(
                    "Overall performance score ({:.2}) is below the target threshold.",
                    overall_score
                ),
                details: "Focus on analyzing execution traces to improve pipeline efficiency."
                    .to_string(),
                topic: None,
            }
        } else if let Some(topic) = knowledge_gap {
            EvolutionaryGoal {
                kind: GoalKind::KnowledgeAcquisition,
                reason: format!("A knowledge gap was identified in the topic: '{}'.", topic),
                details: format!("Trigger micro model creation for the topic '{}'.", topic),
                topic: Some(topic),
            }
        } else {
            EvolutionaryGoal {
                kind: GoalKind::Exploration,
                reason: "System is stable. Focusing on autonomous research and wisdom synthesis."
                    .to_string(),
                details: "Prioritize autonomous research and wisdom synthesis tasks.".to_string(),
                topic: None,
            }
        };

        info!(?goal.kind, "new evolutionary goal set");
        if let Err(e) = self
            .memory_log
            .log_event("evolutionary_goal_set", json!(goal))
        {
            warn!("failed to record the evolutionary goal: {}", e);
        }

        Ok(goal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentContext;
    use crate::arbiter::ResourceArbiter;
    use crate::config::prompts::PromptStore;
    use crate::energy::EnergyManager;
    use crate::engine::Engine;
    use crate::models::{MasterResponse, OrchestrationDecision, PipelineKind};
    use crate::pipelines::{into_map, Pipeline};
    use async_trait::async_trait;
    use crate::testing::MockModel;

    struct EmptyPipeline {
        kind: PipelineKind,
    }

    #[async_trait]
    impl Pipeline for EmptyPipeline {
        fn kind(&self) -> PipelineKind {
            self.kind
        }
        async fn run(
            &self,
            _query: &str,
            _decision: &OrchestrationDecision,
            _cancel: &CancellationToken,
        ) -> crate::error::Result<MasterResponse> {
            // Answers contain no benchmark keywords: accuracy 0.
            Ok(MasterResponse {
                final_answer: "nothing useful".to_string(),
                self_criticism: String::new(),
                potential_problems: String::new(),
                retrieved_info: String::new(),
            })
        }
    }

    fn wired_benchmark() -> Arc<PerformanceBenchmark> {
        let benchmark = Arc::new(PerformanceBenchmark::new());
        let engine = Arc::new(Engine::new(
            into_map(vec![
                Arc::new(EmptyPipeline {
                    kind: PipelineKind::Full,
                }),
                Arc::new(EmptyPipeline {
                    kind: PipelineKind::Simple,
                }),
            ]),
            ResourceArbiter::new(Arc::new(EnergyManager::new(100.0, 1.0))),
        ));
        benchmark.set_engine(engine);
        benchmark
    }

    fn controller(
        dir: &std::path::Path,
        responses: Vec<String>,
    ) -> (EvolutionaryController, Arc<MemoryLog>) {
        let llm: Arc<dyn crate::llm::LanguageModel> = Arc::new(MockModel::scripted(responses));
        let ctx = AgentContext::new(llm, Arc::new(PromptStore::ephemeral()), "mock");
        let memory_log = Arc::new(
            MemoryLog::open(dir.join("log.jsonl"), dir.join("sessions")).unwrap(),
        );
        let graph = Arc::new(PersistentKnowledgeGraph::open(dir.join("kg.json")));
        let controller = EvolutionaryController::new(
            wired_benchmark(),
            CapabilityMapperAgent::new(ctx.clone()),
            KnowledgeGapAnalyzer::new(ctx, memory_log.clone(), graph.clone()),
            memory_log.clone(),
            graph,
        );
        (controller, memory_log)
    }

    #[tokio::test]
    async fn test_poor_score_yields_performance_goal() {
        let dir = tempfile::tempdir().unwrap();
        // Pipelines answer with no keywords -> score 0 < 0.7, so the goal
        // is performance work regardless of gap analysis.
        let (controller, memory_log) = controller(
            dir.path(),
            vec![r#"{"nodes": [], "edges": []}"#.to_string()],
        );

        let goal = controller
            .determine_direction(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(goal.kind, GoalKind::PerformanceImprovement);
        assert!(goal.topic.is_none());

        // The decision is durably recorded.
        let events = memory_log.get_recent_events(5);
        assert!(events
            .iter()
            .any(|e| e["event_type"] == "evolutionary_goal_set"));
    }
}
