//! Runtime container
//!
//! Builds the whole object graph from a [`Config`]: stores, tools, agents,
//! pipelines, engine, governor and the analytics bus, with the two late
//! bindings (trace sink into the full pipeline, engine into the benchmark)
//! wired through one-shot setters after construction.

use crate::affect::AffectiveEngine;
use crate::agents::dialogue::{
    DialogueParticipantAgent, DialogueStage, IntegratedInformationAgent, MediatorAgent,
};
use crate::agents::evaluation::{
    ProblemDiscoveryAgent, ProcessRewardAgent, SelfCriticAgent, ThoughtEvaluatorAgent,
};
use crate::agents::improvement::{SelfCorrectionAgent, SelfImprovementAgent};
use crate::agents::knowledge::{
    CapabilityMapperAgent, ComplexityAnalyzer, KnowledgeGapAnalyzer, KnowledgeGraphAgent,
};
use crate::agents::master::MasterAgent;
use crate::agents::reasoning::{CritiqueAgent, DecomposeAgent, PlanningAgent, SynthesizeAgent};
use crate::agents::tooling::ToolUsingAgent;
use crate::agents::AgentContext;
use crate::analytics::AnalyticsBus;
use crate::arbiter::ResourceArbiter;
use crate::cognitive::tot::TreeOfThoughtsAgent;
use crate::cognitive::CognitiveLoop;
use crate::conceptual::{ConceptualMemory, SensoryUnit};
use crate::config::prompts::PromptStore;
use crate::config::Config;
use crate::energy::EnergyManager;
use crate::engine::Engine;
use crate::error::Result;
use crate::evolution::autonomous::AutonomousResearcher;
use crate::evolution::benchmark::PerformanceBenchmark;
use crate::evolution::consolidation::Consolidator;
use crate::evolution::controller::EvolutionaryController;
use crate::evolution::micro_llm::MicroLlmManager;
use crate::evolution::trace::SelfEvolution;
use crate::governor::Governor;
use crate::llm::{self, LanguageModel};
use crate::memory::knowledge_graph::PersistentKnowledgeGraph;
use crate::memory::log::MemoryLog;
use crate::memory::vector::{InMemoryVectorStore, VectorStore};
use crate::memory::working::WorkingMemory;
use crate::orchestrator::Orchestrator;
use crate::pipelines::conceptual::ConceptualReasoningPipeline;
use crate::pipelines::full::FullPipeline;
use crate::pipelines::internal_dialogue::InternalDialoguePipeline;
use crate::pipelines::iterative_correction::IterativeCorrectionPipeline;
use crate::pipelines::micro_expert::MicroExpertPipeline;
use crate::pipelines::parallel::ParallelPipeline;
use crate::pipelines::quantum::QuantumPipeline;
use crate::pipelines::self_discover::SelfDiscoverPipeline;
use crate::pipelines::simple::SimplePipeline;
use crate::pipelines::speculative::SpeculativePipeline;
use crate::pipelines::tree_of_thoughts::TreeOfThoughtsPipeline;
use crate::pipelines::{into_map, Pipeline};
use crate::sandbox::SandboxManager;
use crate::tools::browser::WebBrowserTool;
use crate::tools::sandbox_tools::{SandboxCommandTool, SandboxLogTool};
use crate::tools::web_search::WebSearchTool;
use crate::tools::ToolRegistry;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// Prediction errors accumulated before the working memory is flushed to
/// a session file for offline consolidation.
const WORKING_MEMORY_FLUSH_THRESHOLD: usize = 5;

/// The assembled runtime. One instance owns the process-wide singletons.
pub struct Runtime {
    pub config: Config,
    pub energy: Arc<EnergyManager>,
    pub analytics: Arc<AnalyticsBus>,
    pub prompts: Arc<PromptStore>,
    pub memory_log: Arc<MemoryLog>,
    pub knowledge_graph: Arc<PersistentKnowledgeGraph>,
    pub vector_store: Arc<dyn VectorStore>,
    pub tools: ToolRegistry,
    pub sandbox: Arc<SandboxManager>,
    pub affective: Arc<AffectiveEngine>,
    pub orchestrator: Arc<Orchestrator>,
    pub engine: Arc<Engine>,
    pub governor: Arc<Governor>,
    working_memory: Mutex<WorkingMemory>,
}

impl Runtime {
    /// Record a high-novelty observation from the current interaction.
    /// Once enough accumulate, the session is flushed for the offline
    /// consolidation cycle and a fresh session starts.
    pub fn observe_prediction_error(&self, error_data: serde_json::Value) {
        let mut memory = self.working_memory.lock();
        memory.add_prediction_error(error_data);
        if memory.prediction_errors.len() >= WORKING_MEMORY_FLUSH_THRESHOLD {
            if let Err(e) = self.memory_log.save_working_memory_for_consolidation(&memory) {
                warn!("failed to flush working memory: {}", e);
            }
            memory.clear();
        }
    }
}

impl Runtime {
    /// Build and wire everything. Fails only on configuration problems
    /// (unknown backend, unwritable storage paths).
    pub async fn build(config: Config) -> Result<Runtime> {
        let backend: Arc<dyn LanguageModel> =
            llm::build_backend(&config.llm_backend, &config.ollama_host)?;
        Self::build_with_backend(config, backend).await
    }

    /// Same as [`build`](Self::build) with an explicit model backend;
    /// integration tests inject a scripted one here.
    pub async fn build_with_backend(
        config: Config,
        backend: Arc<dyn LanguageModel>,
    ) -> Result<Runtime> {
        // Process-wide singletons.
        let energy = Arc::new(EnergyManager::default());
        let analytics = Arc::new(AnalyticsBus::new());
        let prompts = Arc::new(PromptStore::open(config.prompts_path())?);
        prompts.save()?;
        let memory_log = Arc::new(MemoryLog::open(
            config.memory_log_path(),
            config.working_memory_dir(),
        )?);
        let knowledge_graph = Arc::new(PersistentKnowledgeGraph::open(
            config.knowledge_graph_path(),
        ));
        let vector_store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        let sandbox = Arc::new(SandboxManager::new(config.sandbox_dir())?);
        let affective = Arc::new(AffectiveEngine::new());

        // Tools, including runtime-discovered specialists.
        let tools = ToolRegistry::new();
        tools.register(Arc::new(WebBrowserTool::new())).await;
        tools
            .register(Arc::new(SandboxCommandTool::new(sandbox.clone())))
            .await;
        tools
            .register(Arc::new(SandboxLogTool::new(sandbox.clone())))
            .await;
        if let Some(search) = WebSearchTool::from_env() {
            tools.register(Arc::new(search)).await;
        }

        // Agent contexts per model role.
        let ctx = AgentContext::new(backend.clone(), prompts.clone(), &config.generation_model);
        let drafter_ctx = ctx.clone().with_model(&config.drafter_model);
        let verifier_ctx = ctx
            .clone()
            .with_model(&config.verifier_model)
            .with_temperature(0.4);
        let formatter_ctx = ctx.clone().with_temperature(0.7);

        let micro_llm = Arc::new(MicroLlmManager::new(
            backend.clone(),
            knowledge_graph.clone(),
            tools.clone(),
            &config.generation_model,
            config.micro_llm_dir(),
        ));
        micro_llm.load_specialist_tools().await;

        // The cognitive core.
        let sensory = Arc::new(SensoryUnit::new(backend.clone(), &config.embedding_model));
        let conceptual_memory = Arc::new(ConceptualMemory::new());
        let cognitive = Arc::new(CognitiveLoop::new(
            ctx.clone(),
            vector_store.clone(),
            knowledge_graph.clone(),
            tools.clone(),
            memory_log.clone(),
            sensory,
            conceptual_memory,
            config.pipelines.cognitive_loop_max_iterations,
        ));

        let planner = Arc::new(PlanningAgent::new(ctx.clone()));
        let master = Arc::new(MasterAgent::new(ctx.clone(), memory_log.clone()));

        // Pipelines.
        let full = Arc::new(FullPipeline::new(
            planner.clone(),
            cognitive.clone(),
            master.clone(),
            SelfCriticAgent::new(ctx.clone()),
            ProblemDiscoveryAgent::new(ctx.clone()),
            memory_log.clone(),
            analytics.clone(),
        ));
        let pipelines: Vec<Arc<dyn Pipeline>> = vec![
            Arc::new(SimplePipeline::new(ctx.clone(), vector_store.clone())),
            full.clone(),
            Arc::new(ParallelPipeline::new(ctx.clone(), cognitive.clone())),
            Arc::new(QuantumPipeline::new(
                ctx.clone(),
                IntegratedInformationAgent::new(ctx.clone()),
                config.quantum_personas.clone(),
            )),
            Arc::new(SpeculativePipeline::new(
                drafter_ctx,
                verifier_ctx,
                config.pipelines.num_drafts,
            )),
            Arc::new(SelfDiscoverPipeline::new(
                planner.clone(),
                DecomposeAgent::new(ctx.clone()),
                CritiqueAgent::new(ctx.clone()),
                SynthesizeAgent::new(ctx.clone()),
                cognitive.clone(),
            )),
            Arc::new(InternalDialoguePipeline::new(
                DialogueParticipantAgent::new(ctx.clone()),
                DialogueStage::new(ctx.clone(), MediatorAgent::new(ctx.clone())),
                IntegratedInformationAgent::new(ctx.clone()),
                config.pipelines.max_turns,
            )),
            Arc::new(ConceptualReasoningPipeline::new(
                planner.clone(),
                cognitive.clone(),
                master,
            )),
            Arc::new(MicroExpertPipeline::new(
                formatter_ctx,
                ToolUsingAgent::new(ctx.clone()),
                tools.clone(),
            )),
            Arc::new(TreeOfThoughtsPipeline::new(TreeOfThoughtsAgent::new(
                ctx.clone(),
                ThoughtEvaluatorAgent::new(ctx.clone()),
            ))),
            Arc::new(IterativeCorrectionPipeline::new(
                ctx.clone(),
                config.pipelines.iterative_correction_max_iterations,
            )),
        ];

        let engine = Arc::new(Engine::new(
            into_map(pipelines),
            ResourceArbiter::new(energy.clone()),
        ));

        // Background subsystems.
        let self_evolution = Arc::new(SelfEvolution::new(
            ProcessRewardAgent::new(ctx.clone()),
            SelfCriticAgent::new(ctx.clone()),
            SelfImprovementAgent::new(ctx.clone()),
            SelfCorrectionAgent::new(
                ctx.clone(),
                memory_log.clone(),
                micro_llm.clone(),
                prompts.clone(),
            ),
            analytics.clone(),
        ));
        // Late bindings: the full pipeline feeds traces to self-evolution,
        // and the benchmark drives the finished engine.
        full.set_trace_sink(self_evolution.clone());
        let benchmark = Arc::new(PerformanceBenchmark::new());
        benchmark.set_engine(engine.clone());

        let controller = Arc::new(EvolutionaryController::new(
            benchmark,
            CapabilityMapperAgent::new(ctx.clone()),
            KnowledgeGapAnalyzer::new(ctx.clone(), memory_log.clone(), knowledge_graph.clone()),
            memory_log.clone(),
            knowledge_graph.clone(),
        ));
        let researcher = Arc::new(AutonomousResearcher::new(
            ctx.clone(),
            memory_log.clone(),
            vector_store.clone(),
            tools.clone(),
            config.research_topics.clone(),
        ));
        let consolidator = Arc::new(Consolidator::new(
            ctx.clone(),
            KnowledgeGraphAgent::new(ctx.clone()),
            memory_log.clone(),
            knowledge_graph.clone(),
            vector_store.clone(),
        ));
        let governor = Arc::new(Governor::new(
            controller,
            self_evolution,
            researcher,
            consolidator,
            micro_llm,
            energy.clone(),
            config.intervals.clone(),
        ));

        let orchestrator = Arc::new(Orchestrator::new(
            ctx.clone(),
            ComplexityAnalyzer::new(ctx),
            tools.clone(),
        ));

        info!("runtime assembled");
        Ok(Runtime {
            config,
            energy,
            analytics,
            prompts,
            memory_log,
            knowledge_graph,
            vector_store,
            tools,
            sandbox,
            affective,
            orchestrator,
            engine,
            governor,
            working_memory: Mutex::new(WorkingMemory::new()),
        })
    }
}
