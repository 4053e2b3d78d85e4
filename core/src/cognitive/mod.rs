//! The cognitive loop
//!
//! The iterative retrieve-evaluate-refine / symbolic / conceptual
//! sub-procedure at the heart of the `full` family of pipelines. The plan
//! text selects the branch; afterwards a knowledge-graph fragment is
//! mined from the findings (bounded by a hard timeout) and folded into
//! long-term memory before the final synthesis.

pub mod symbolic;
pub mod tot;

use crate::agents::evaluation::RetrievalEvaluatorAgent;
use crate::agents::knowledge::KnowledgeGraphAgent;
use crate::agents::reasoning::QueryRefinementAgent;
use crate::agents::tooling::ToolUsingAgent;
use crate::agents::AgentContext;
use crate::conceptual::{ConceptualMemory, ImaginationEngine, SensoryUnit};
use crate::error::Result;
use crate::memory::knowledge_graph::PersistentKnowledgeGraph;
use crate::memory::log::MemoryLog;
use crate::memory::vector::VectorStore;
use crate::tools::browser::BROWSER_TOOL_NAME;
use crate::tools::ToolRegistry;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use symbolic::{SymbolicReasoningLoop, SymbolicVerifier};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Quality bar for retrieval scores; both must exceed it to stop early.
const SCORE_THRESHOLD: i64 = 8;
/// Specialist summarizer consulted for URL content when present.
const SUMMARIZER_SPECIALIST: &str = "Specialist_Summarization_Expert";
/// Page text beyond this many chars is cut before summarization.
const PAGE_CONTENT_LIMIT: usize = 15_000;
/// Only this much of the findings feeds knowledge-graph extraction.
const KG_INPUT_LIMIT: usize = 4_000;
const KG_TIMEOUT: Duration = Duration::from_secs(60);
/// How many recent simulation insights reach the synthesis prompt.
const PHYSICAL_INSIGHT_LIMIT: usize = 3;

lazy_static! {
    static ref URL_RE: Regex = Regex::new(r"https?://\S+").unwrap();
    static ref CONCEPT_PAIR_RE: Regex = Regex::new("「(.+?)」と「(.+?)」").unwrap();
}

/// Truncate on a char boundary.
fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

pub fn find_url(text: &str) -> Option<&str> {
    URL_RE.find(text).map(|m| m.as_str())
}

pub struct CognitiveLoop {
    ctx: AgentContext,
    vector_store: Arc<dyn VectorStore>,
    retrieval_evaluator: RetrievalEvaluatorAgent,
    query_refiner: QueryRefinementAgent,
    tool_agent: ToolUsingAgent,
    kg_agent: KnowledgeGraphAgent,
    knowledge_graph: Arc<PersistentKnowledgeGraph>,
    tools: ToolRegistry,
    memory_log: Arc<MemoryLog>,
    sensory: Arc<SensoryUnit>,
    conceptual_memory: Arc<ConceptualMemory>,
    symbolic: SymbolicReasoningLoop,
    max_iterations: usize,
}

impl CognitiveLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ctx: AgentContext,
        vector_store: Arc<dyn VectorStore>,
        knowledge_graph: Arc<PersistentKnowledgeGraph>,
        tools: ToolRegistry,
        memory_log: Arc<MemoryLog>,
        sensory: Arc<SensoryUnit>,
        conceptual_memory: Arc<ConceptualMemory>,
        max_iterations: usize,
    ) -> Self {
        Self {
            retrieval_evaluator: RetrievalEvaluatorAgent::new(ctx.clone()),
            query_refiner: QueryRefinementAgent::new(ctx.clone()),
            tool_agent: ToolUsingAgent::new(ctx.clone()),
            kg_agent: KnowledgeGraphAgent::new(ctx.clone()),
            symbolic: SymbolicReasoningLoop::new(ctx.clone()),
            ctx,
            vector_store,
            knowledge_graph,
            tools,
            memory_log,
            sensory,
            conceptual_memory,
            max_iterations,
        }
    }

    /// Run the loop for `(query, plan, reasoning_instruction)` and return
    /// the synthesis text.
    pub async fn run(
        &self,
        query: &str,
        plan: &str,
        reasoning_instruction: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let symbolic_mode = SymbolicVerifier::plan_requests_symbolic(plan);

        let final_retrieved_info = if symbolic_mode {
            self.symbolic.run(query, plan, cancel).await?
        } else if plan.contains("概念") {
            self.conceptual_operations(plan, cancel).await?
        } else {
            self.iterative_retrieval(query, cancel).await?
        };

        let long_term_memory_context = if symbolic_mode || final_retrieved_info.is_empty() {
            info!("skipping knowledge graph extraction for this branch");
            "No knowledge graph was generated for this analysis.".to_string()
        } else {
            self.extract_and_merge_graph(&final_retrieved_info, cancel)
                .await
        };

        let physical_insights = {
            let joined = self
                .memory_log
                .get_recent_insights("physical_simulation_insight", PHYSICAL_INSIGHT_LIMIT)
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
                "No notable insights from physical simulation at present.".to_string()
            } else {
                joined
            }
        };

        self.ctx
            .complete(
                "COGNITIVE_SYNTHESIS_PROMPT",
                &[
                    ("query", query),
                    ("plan", plan),
                    ("long_term_memory_context", long_term_memory_context.as_str()),
                    ("final_retrieved_info", final_retrieved_info.as_str()),
                    ("physical_insights", physical_insights.as_str()),
                    ("reasoning_instruction", reasoning_instruction),
                ],
                cancel,
            )
            .await
    }

    /// Extract a graph fragment from the findings and merge it, bounded by
    /// a hard timeout. Timeouts and failures degrade to a note; the loop
    /// never fails on this step.
    async fn extract_and_merge_graph(
        &self,
        findings: &str,
        cancel: &CancellationToken,
    ) -> String {
        let chunk = truncate_chars(findings, KG_INPUT_LIMIT);
        match tokio::time::timeout(KG_TIMEOUT, self.kg_agent.extract(&chunk, cancel)).await {
            Ok(Ok(fragment)) if !fragment.nodes.is_empty() => {
                self.knowledge_graph.merge(fragment);
                if let Err(e) = self.knowledge_graph.save() {
                    warn!("knowledge graph save failed: {}", e);
                }
                self.knowledge_graph.get_summary()
            }
            Ok(Ok(_)) => {
                warn!("generated knowledge graph fragment was empty");
                "The generated knowledge graph fragment was empty.".to_string()
            }
            Ok(Err(e)) => {
                warn!("knowledge graph extraction failed: {}", e);
                "Knowledge graph generation failed.".to_string()
            }
            Err(_) => {
                warn!("knowledge graph extraction timed out; skipping");
                "Knowledge graph generation timed out and was skipped.".to_string()
            }
        }
    }

    /// Conceptual branch: execute the synthesis operations named in the
    /// plan through the latent-space units.
    async fn conceptual_operations(
        &self,
        plan: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(crate::error::NoesisError::Cancelled);
        }

        let mut results = Vec::new();
        for step in plan.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if !step.contains("概念") {
                continue;
            }
            let Some(captures) = CONCEPT_PAIR_RE.captures(step) else {
                results.push(
                    "[conceptual operation] The planned operation could not be interpreted."
                        .to_string(),
                );
                continue;
            };
            let concept_a = captures[1].to_string();
            let concept_b = captures[2].to_string();
            debug!(%concept_a, %concept_b, "conceptual synthesis");

            let vectors = self
                .sensory
                .encode_texts(&[concept_a.clone(), concept_b.clone()])
                .await?;
            if vectors.len() != 2 {
                results.push("[conceptual operation] Concept vectorization failed.".to_string());
                continue;
            }
            let combined = ImaginationEngine::combine_concepts(&vectors, &[1.0, 1.0])?;
            let neighbours = self.conceptual_memory.search_similar(&combined, 3);

            let related = if neighbours.is_empty() {
                "unknown territory".to_string()
            } else {
                neighbours
                    .iter()
                    .filter_map(|c| c.metadata.get("text").cloned())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            results.push(format!(
                "[conceptual operation] Combining '{}' and '{}' produced a new abstract \
                 concept, most similar to existing concepts: {}.",
                concept_a, concept_b, related
            ));
        }

        if results.is_empty() {
            Ok("Conceptual operations ran but produced no usable results.".to_string())
        } else {
            Ok(results.join("\n\n"))
        }
    }

    /// Retrieval branch. A URL in the query short-circuits to the browser
    /// tool plus summarization; otherwise retrieval quality is evaluated
    /// per iteration, with one tool escalation allowed before stopping.
    async fn iterative_retrieval(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if let Some(url) = find_url(query) {
            if let Some(browser) = self.tools.get(BROWSER_TOOL_NAME).await {
                info!(url, "URL detected; using the browser tool");
                let question = URL_RE.replace_all(query, "").trim().to_string();
                let page_content = browser.use_async(url).await?;
                let page_content = truncate_chars(&page_content, PAGE_CONTENT_LIMIT);

                // A summarization specialist may exist by now; its absence
                // silently falls through to the generic summarizer chain.
                if let Some(summarizer) = self.tools.get(SUMMARIZER_SPECIALIST).await {
                    info!("delegating page summarization to the specialist tool");
                    let summary_query = format!(
                        "User question: {}\n\nWeb page content:\n{}",
                        question, page_content
                    );
                    return summarizer.use_async(&summary_query).await;
                }
                return self
                    .ctx
                    .complete(
                        "SUMMARIZER_PROMPT",
                        &[
                            ("question", question.as_str()),
                            ("page_content", page_content.as_str()),
                        ],
                        cancel,
                    )
                    .await;
            }
            warn!("no browser tool registered; falling back to retrieval");
        }

        let mut current_query = query.to_string();
        let mut final_info = String::new();

        for iteration in 1..=self.max_iterations {
            debug!(iteration, query = %current_query, "retrieval iteration");
            let mut tool_used_this_cycle = false;

            let documents = self.vector_store.retrieve(&current_query).await?;
            let mut retrieved_info = documents
                .iter()
                .map(|d| d.content.clone())
                .collect::<Vec<_>>()
                .join("\n\n");

            let evaluation = self
                .retrieval_evaluator
                .evaluate(&current_query, &retrieved_info, cancel)
                .await?;
            debug!(
                relevance = evaluation.relevance_score,
                completeness = evaluation.completeness_score,
                "retrieval quality"
            );

            let scores_sufficient = evaluation.relevance_score > SCORE_THRESHOLD
                && evaluation.completeness_score > SCORE_THRESHOLD;

            if !scores_sufficient {
                info!("retrieval quality is low; considering an external tool");
                let descriptions = self.tools.descriptions().await;
                let task = format!(
                    "Select the best tool and input to fill the information the internal \
                     search missed for: '{}'",
                    current_query
                );
                match self.tool_agent.select(&descriptions, &task, cancel).await {
                    Ok(choice) => match self.tools.get(&choice.tool_name).await {
                        Some(tool) => match tool.use_async(&choice.tool_input).await {
                            Ok(result) => {
                                retrieved_info.push_str(&format!(
                                    "\n\n--- External tool ({}) ---\n{}",
                                    choice.tool_name, result
                                ));
                                tool_used_this_cycle = true;
                            }
                            Err(e) => warn!("tool '{}' failed: {}", choice.tool_name, e),
                        },
                        None => warn!("selected tool '{}' is not registered", choice.tool_name),
                    },
                    Err(e) => warn!("tool selection failed: {}", e),
                }
            }

            final_info = retrieved_info;

            if scores_sufficient || tool_used_this_cycle {
                info!("retrieval loop finished (quality met or tool escalation used)");
                break;
            }

            if iteration == self.max_iterations {
                warn!("retrieval loop hit the iteration bound");
                break;
            }

            current_query = self
                .query_refiner
                .refine(
                    query,
                    &evaluation.summary,
                    &evaluation.suggestions,
                    cancel,
                )
                .await?;
            debug!(refined = %current_query, "query refined");
        }

        Ok(final_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::prompts::PromptStore;
    use crate::memory::vector::{Document, InMemoryVectorStore};
    use crate::testing::MockModel;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct FactsTool;

    #[async_trait]
    impl Tool for FactsTool {
        fn name(&self) -> &str {
            "FactFinder"
        }
        fn description(&self) -> &str {
            "finds facts"
        }
        async fn use_async(&self, _input: &str) -> Result<String> {
            Ok("FACTS".to_string())
        }
    }

    struct PageTool;

    #[async_trait]
    impl Tool for PageTool {
        fn name(&self) -> &str {
            BROWSER_TOOL_NAME
        }
        fn description(&self) -> &str {
            "fetches pages"
        }
        async fn use_async(&self, _input: &str) -> Result<String> {
            Ok("An example page about example things.".to_string())
        }
    }

    async fn build_loop(
        responses: Vec<String>,
        documents: Vec<Document>,
        tools: ToolRegistry,
        dir: &std::path::Path,
    ) -> (CognitiveLoop, std::sync::Arc<Mutex<Vec<String>>>) {
        let model = MockModel::scripted(responses);
        let prompt_log = model.prompt_log();
        let llm: Arc<dyn crate::llm::LanguageModel> = Arc::new(model);
        let ctx = AgentContext::new(llm.clone(), Arc::new(PromptStore::ephemeral()), "mock");
        let memory_log = Arc::new(
            MemoryLog::open(dir.join("log.jsonl"), dir.join("sessions")).unwrap(),
        );
        let knowledge_graph = Arc::new(PersistentKnowledgeGraph::open(dir.join("kg.json")));
        let cognitive = CognitiveLoop::new(
            ctx,
            Arc::new(InMemoryVectorStore::with_documents(documents)),
            knowledge_graph,
            tools,
            memory_log,
            Arc::new(SensoryUnit::new(llm, "embed")),
            Arc::new(ConceptualMemory::new()),
            3,
        );
        (cognitive, prompt_log)
    }

    #[tokio::test]
    async fn test_tool_escalation_ends_loop_after_one_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let tools = ToolRegistry::new();
        tools.register(Arc::new(FactsTool)).await;

        // 1: evaluation (poor scores), 2: tool selection, 3: KG fragment,
        // 4: synthesis.
        let (cognitive, prompt_log) = build_loop(
            vec![
                r#"{"relevance_score": 5, "completeness_score": 5, "summary": "thin", "suggestions": "look elsewhere"}"#.to_string(),
                "FactFinder: missing facts".to_string(),
                r#"{"nodes": [], "edges": []}"#.to_string(),
                "the synthesis".to_string(),
            ],
            vec![Document::new("vaguely related text about the facts topic")],
            tools,
            dir.path(),
        )
        .await;

        let output = cognitive
            .run("tell me the facts topic", "1. research", "", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output, "the synthesis");
        // One evaluation, one tool selection, one KG call, one synthesis.
        let prompts = prompt_log.lock();
        assert_eq!(prompts.len(), 4);
        assert!(prompts.last().unwrap().contains("FACTS"));
    }

    #[tokio::test]
    async fn test_good_scores_skip_tool_escalation() {
        let dir = tempfile::tempdir().unwrap();
        let (cognitive, prompt_log) = build_loop(
            vec![
                r#"{"relevance_score": 9, "completeness_score": 10, "summary": "good", "suggestions": ""}"#.to_string(),
                r#"{"nodes": [{"id": "x", "label": "Thing"}], "edges": []}"#.to_string(),
                "synthesized".to_string(),
            ],
            vec![Document::new("directly relevant content about ownership")],
            ToolRegistry::new(),
            dir.path(),
        )
        .await;

        let output = cognitive
            .run("explain ownership content", "1. research", "", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output, "synthesized");
        // evaluation + KG + synthesis, no tool selection call
        assert_eq!(prompt_log.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_url_branch_uses_browser_and_summarizer() {
        let dir = tempfile::tempdir().unwrap();
        let tools = ToolRegistry::new();
        tools.register(Arc::new(PageTool)).await;

        // 1: generic summarizer, 2: KG fragment, 3: synthesis.
        let (cognitive, prompt_log) = build_loop(
            vec![
                "page summary".to_string(),
                r#"{"nodes": [], "edges": []}"#.to_string(),
                "final synthesis".to_string(),
            ],
            vec![],
            tools,
            dir.path(),
        )
        .await;

        let output = cognitive
            .run(
                "Please read https://example.com/page",
                "1. browse",
                "",
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(output, "final synthesis");
        let prompts = prompt_log.lock();
        // Summarizer saw the page text; synthesis saw the summary.
        assert!(prompts[0].contains("example page"));
        assert!(prompts.last().unwrap().contains("page summary"));
    }

    #[tokio::test]
    async fn test_symbolic_plan_skips_knowledge_graph() {
        let dir = tempfile::tempdir().unwrap();
        // hypothesis, conclusion (final), synthesis - no KG call.
        let (cognitive, prompt_log) = build_loop(
            vec![
                "draw the segment".to_string(),
                "結論として、証明された。".to_string(),
                "proof synthesis".to_string(),
            ],
            vec![],
            ToolRegistry::new(),
            dir.path(),
        )
        .await;

        let output = cognitive
            .run("prove it", "数学的証明を行う", "", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output, "proof synthesis");
        assert_eq!(prompt_log.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_conceptual_plan_runs_latent_operations() {
        let dir = tempfile::tempdir().unwrap();
        // KG fragment + synthesis; embeddings come from the mock backend.
        let (cognitive, prompt_log) = build_loop(
            vec![
                r#"{"nodes": [], "edges": []}"#.to_string(),
                "conceptual synthesis".to_string(),
            ],
            vec![],
            ToolRegistry::new(),
            dir.path(),
        )
        .await;

        let plan = "1. 「ライオン」と「猫」の概念を合成する";
        let output = cognitive
            .run("imagine a new animal", plan, "", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output, "conceptual synthesis");
        let prompts = prompt_log.lock();
        assert!(prompts.last().unwrap().contains("conceptual operation"));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("日本語テスト", 3), "日本語");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn test_find_url() {
        assert_eq!(
            find_url("read https://example.com/x please"),
            Some("https://example.com/x")
        );
        assert!(find_url("no links here").is_none());
    }
}
