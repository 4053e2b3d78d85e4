//! Full pipeline
//!
//! Plan, run the cognitive loop, compose the final answer, then critique
//! and problem-discover in parallel. The execution trace is handed to the
//! self-evolution subsystem as a fire-and-forget background task after the
//! response is ready.

use super::Pipeline;
use crate::agents::evaluation::{ProblemDiscoveryAgent, SelfCriticAgent};
use crate::agents::master::MasterAgent;
use crate::agents::reasoning::PlanningAgent;
use crate::analytics::{event_types, AnalyticsBus};
use crate::cognitive::{find_url, CognitiveLoop};
use crate::error::Result;
use crate::evolution::trace::ExecutionTrace;
use crate::memory::log::MemoryLog;
use crate::models::{MasterResponse, OrchestrationDecision, PipelineKind};
use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Master-agent input is capped to keep the composition prompt bounded.
const COMPOSE_INPUT_LIMIT: usize = 8_000;

/// Consumer-site interface for the self-evolution subsystem; wired after
/// construction to break the pipeline <-> evolution cycle.
#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn collect(&self, trace: ExecutionTrace);
}

pub struct FullPipeline {
    planner: Arc<PlanningAgent>,
    cognitive: Arc<CognitiveLoop>,
    master: Arc<MasterAgent>,
    critic: SelfCriticAgent,
    problem_discovery: ProblemDiscoveryAgent,
    memory_log: Arc<MemoryLog>,
    analytics: Arc<AnalyticsBus>,
    trace_sink: OnceLock<Arc<dyn TraceSink>>,
}

impl FullPipeline {
    pub fn new(
        planner: Arc<PlanningAgent>,
        cognitive: Arc<CognitiveLoop>,
        master: Arc<MasterAgent>,
        critic: SelfCriticAgent,
        problem_discovery: ProblemDiscoveryAgent,
        memory_log: Arc<MemoryLog>,
        analytics: Arc<AnalyticsBus>,
    ) -> Self {
        Self {
            planner,
            cognitive,
            master,
            critic,
            problem_discovery,
            memory_log,
            analytics,
            trace_sink: OnceLock::new(),
        }
    }

    /// One-shot post-construction wiring of the trace consumer.
    pub fn set_trace_sink(&self, sink: Arc<dyn TraceSink>) {
        if self.trace_sink.set(sink).is_err() {
            warn!("trace sink was already wired; ignoring the second one");
        }
    }
}

#[async_trait]
impl Pipeline for FullPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Full
    }

    async fn run(
        &self,
        query: &str,
        decision: &OrchestrationDecision,
        cancel: &CancellationToken,
    ) -> Result<MasterResponse> {
        info!("full pipeline started");
        let mut trace = ExecutionTrace::new(query);
        let reasoning_instruction = decision.reasoning_instruction();

        let plan = self
            .planner
            .plan(query, reasoning_instruction, cancel)
            .await?;
        trace.record("step_1_plan", &plan);

        let cognitive_loop_output = self
            .cognitive
            .run(query, &plan, reasoning_instruction, cancel)
            .await?;
        trace.record("step_2_cognitive_loop_output", &cognitive_loop_output);

        let final_answer = if find_url(query).is_some() {
            // Browsing queries already end in a focused summary.
            trace.record(
                "step_3_final_answer_generation",
                "cognitive loop output used directly because the query contains a URL",
            );
            cognitive_loop_output.clone()
        } else {
            let bounded: String = cognitive_loop_output
                .chars()
                .take(COMPOSE_INPUT_LIMIT)
                .collect();
            let answer = self
                .master
                .generate_final_answer(query, &plan, &bounded, decision, cancel)
                .await?;
            trace.record("step_3_final_answer_generation", &answer);
            answer
        };

        // Post-hoc meta-cognition: critique and problem discovery run
        // concurrently, neither blocks on the other.
        let (criticism, problems) = tokio::join!(
            self.critic
                .critique(query, &plan, &cognitive_loop_output, &final_answer, cancel),
            self.problem_discovery
                .discover(query, &plan, &cognitive_loop_output, cancel),
        );

        let self_criticism = match criticism {
            Ok(c) => c,
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                warn!("self-criticism failed: {}", e);
                String::new()
            }
        };
        trace.record("step_4_self_criticism", &self_criticism);
        self.analytics
            .publish(event_types::SELF_CRITICISM, json!(self_criticism));

        let potential_problems = match problems {
            Ok(list) if list.is_empty() => "None in particular.".to_string(),
            Ok(list) => list.join("\n"),
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                warn!("problem discovery failed: {}", e);
                "None in particular.".to_string()
            }
        };
        trace.record("step_5_potential_problems", &potential_problems);
        self.analytics
            .publish(event_types::POTENTIAL_PROBLEMS, json!(potential_problems));

        trace.final_answer = final_answer.clone();
        trace.self_criticism = self_criticism.clone();

        // Fire-and-forget follow-up: record the interaction and hand the
        // trace to self-evolution. No ordering relative to later requests.
        let memory_log = self.memory_log.clone();
        let sink = self.trace_sink.get().cloned();
        let analytics = self.analytics.clone();
        let query_owned = query.to_string();
        let answer_owned = final_answer.clone();
        tokio::spawn(async move {
            if let Err(e) = memory_log.log_interaction(&query_owned, &answer_owned) {
                warn!("failed to log interaction: {}", e);
            }
            if let Some(sink) = sink {
                analytics.publish(event_types::EXECUTION_TRACE, json!(trace));
                sink.collect(trace).await;
                info!("execution trace collected for self-evolution");
            }
        });

        Ok(MasterResponse {
            final_answer,
            self_criticism,
            potential_problems,
            retrieved_info: cognitive_loop_output,
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
    use crate::memory::vector::{Document, InMemoryVectorStore};
    use crate::testing::MockModel;
    use crate::tools::ToolRegistry;
    use parking_lot::Mutex;

    struct RecordingSink {
        traces: Mutex<Vec<ExecutionTrace>>,
        notify: tokio::sync::Notify,
    }

    #[async_trait]
    impl TraceSink for RecordingSink {
        async fn collect(&self, trace: ExecutionTrace) {
            self.traces.lock().push(trace);
            self.notify.notify_one();
        }
    }

    async fn build_pipeline(
        responses: Vec<String>,
        dir: &std::path::Path,
    ) -> (FullPipeline, Arc<AnalyticsBus>) {
        let model = MockModel::scripted(responses);
        let llm: Arc<dyn crate::llm::LanguageModel> = Arc::new(model);
        let prompts = Arc::new(PromptStore::ephemeral());
        let ctx = AgentContext::new(llm.clone(), prompts, "mock");
        let memory_log = Arc::new(
            MemoryLog::open(dir.join("log.jsonl"), dir.join("sessions")).unwrap(),
        );
        let analytics = Arc::new(AnalyticsBus::new());
        let cognitive = Arc::new(CognitiveLoop::new(
            ctx.clone(),
            Arc::new(InMemoryVectorStore::with_documents(vec![Document::new(
                "relevant background information",
            )])),
            Arc::new(PersistentKnowledgeGraph::open(dir.join("kg.json"))),
            ToolRegistry::new(),
            memory_log.clone(),
            Arc::new(SensoryUnit::new(llm, "embed")),
            Arc::new(ConceptualMemory::new()),
            3,
        ));
        let pipeline = FullPipeline::new(
            Arc::new(PlanningAgent::new(ctx.clone())),
            cognitive,
            Arc::new(MasterAgent::new(ctx.clone(), memory_log.clone())),
            SelfCriticAgent::new(ctx.clone()),
            ProblemDiscoveryAgent::new(ctx.clone()),
            memory_log,
            analytics.clone(),
        );
        (pipeline, analytics)
    }

    fn full_decision() -> OrchestrationDecision {
        OrchestrationDecision::new(PipelineKind::Full, "test", 0.9)
    }

    #[tokio::test]
    async fn test_full_run_produces_criticism_and_trace() {
        let dir = tempfile::tempdir().unwrap();
        // plan, retrieval evaluation, KG fragment, synthesis, master,
        // criticism, problems.
        let (pipeline, _analytics) = build_pipeline(
            vec![
                "1. research the background information".to_string(),
                r#"{"relevance_score": 9, "completeness_score": 9, "summary": "", "suggestions": ""}"#.to_string(),
                r#"{"nodes": [], "edges": []}"#.to_string(),
                "synthesized findings".to_string(),
                "the final answer".to_string(),
                "the plan lacked depth".to_string(),
                r#"["ambiguity in the question"]"#.to_string(),
            ],
            dir.path(),
        )
        .await;

        let sink = Arc::new(RecordingSink {
            traces: Mutex::new(Vec::new()),
            notify: tokio::sync::Notify::new(),
        });
        pipeline.set_trace_sink(sink.clone());

        let response = pipeline
            .run(
                "explain the background information",
                &full_decision(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(response.final_answer, "the final answer");
        assert_eq!(response.self_criticism, "the plan lacked depth");
        assert_eq!(response.potential_problems, "ambiguity in the question");
        assert_eq!(response.retrieved_info, "synthesized findings");

        // The background task delivers the trace to the sink.
        sink.notify.notified().await;
        let traces = sink.traces.lock();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].final_answer, "the final answer");
        let step_names: Vec<&str> =
            traces[0].reasoning_trace.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(step_names[0], "step_1_plan");
        assert!(step_names.contains(&"step_4_self_criticism"));
    }

    #[tokio::test]
    async fn test_url_query_skips_master_composition() {
        let dir = tempfile::tempdir().unwrap();
        // Without a browser tool the loop falls back to retrieval, which
        // finds nothing for this query; the empty findings skip the KG
        // step. Script: plan, evaluation, synthesis, critic, problems -
        // and no master call.
        let (pipeline, _analytics) = build_pipeline(
            vec![
                "1. browse".to_string(),
                r#"{"relevance_score": 9, "completeness_score": 9, "summary": "", "suggestions": ""}"#.to_string(),
                "summary of the page".to_string(),
                "criticism".to_string(),
                r#"[]"#.to_string(),
            ],
            dir.path(),
        )
        .await;

        let response = pipeline
            .run(
                "summarize https://example.com/a",
                &full_decision(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        // Cognitive loop output used directly as the final answer.
        assert_eq!(response.final_answer, "summary of the page");
        assert_eq!(response.potential_problems, "None in particular.");
    }

    #[tokio::test]
    async fn test_cancelled_before_start_makes_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _analytics) = build_pipeline(vec!["x".to_string()], dir.path()).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = pipeline
            .run("q", &full_decision(), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
    }
}
