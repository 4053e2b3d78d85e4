//! Memory consolidation and wisdom synthesis
//!
//! Offline replay of working-memory sessions into long-term stores: one
//! unprocessed session per cycle is synthesized into facts, merged into
//! the knowledge graph, indexed in the vector store, and retired. Wisdom
//! synthesis distills cross-cutting insights from the whole graph.

use crate::agents::knowledge::KnowledgeGraphAgent;
use crate::agents::AgentContext;
use crate::memory::knowledge_graph::PersistentKnowledgeGraph;
use crate::memory::log::MemoryLog;
use crate::memory::vector::{Document, VectorStore};
use serde_json::Value;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct Consolidator {
    ctx: AgentContext,
    kg_agent: KnowledgeGraphAgent,
    memory_log: Arc<MemoryLog>,
    knowledge_graph: Arc<PersistentKnowledgeGraph>,
    vector_store: Arc<dyn VectorStore>,
}

impl Consolidator {
    pub fn new(
        ctx: AgentContext,
        kg_agent: KnowledgeGraphAgent,
        memory_log: Arc<MemoryLog>,
        knowledge_graph: Arc<PersistentKnowledgeGraph>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            ctx,
            kg_agent,
            memory_log,
            knowledge_graph,
            vector_store,
        }
    }

    fn processed_sessions(&self) -> HashSet<String> {
        match fs::read_to_string(self.memory_log.processed_sessions_log()) {
            Ok(raw) => raw.lines().map(str::trim).map(str::to_string).collect(),
            Err(_) => HashSet::new(),
        }
    }

    fn unprocessed_sessions(&self) -> Vec<String> {
        let processed = self.processed_sessions();
        let mut sessions: Vec<String> = match fs::read_dir(self.memory_log.session_dir()) {
            Ok(entries) => entries
                .flatten()
                .filter_map(|entry| entry.file_name().into_string().ok())
                .filter(|name| name.ends_with(".json") && !processed.contains(name))
                .collect(),
            Err(_) => Vec::new(),
        };
        sessions.sort();
        sessions
    }

    fn mark_processed(&self, session_file: &str) {
        let path = self.memory_log.processed_sessions_log();
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| writeln!(file, "{}", session_file));
        if let Err(e) = result {
            error!("failed to record processed session '{}': {}", session_file, e);
        }
    }

    /// Consolidate at most one session per cycle.
    pub async fn run_consolidation_cycle(&self, cancel: &CancellationToken) {
        info!("memory consolidation cycle started");
        let unprocessed = self.unprocessed_sessions();
        let Some(session_file) = unprocessed.first() else {
            info!("no new session memories to consolidate");
            return;
        };
        info!(sessions = unprocessed.len(), "unprocessed sessions found");

        let session_path = self.memory_log.session_dir().join(session_file);
        let session_data: Value = match fs::read_to_string(&session_path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str(&raw).map_err(|e| e.to_string()))
        {
            Ok(data) => data,
            Err(e) => {
                error!("failed to read session file {}: {}", session_path.display(), e);
                self.mark_processed(session_file);
                return;
            }
        };

        let session_id = session_data
            .get("session_id")
            .and_then(Value::as_str)
            .unwrap_or("unknown_session")
            .to_string();
        let prediction_errors = session_data
            .get("prediction_errors")
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));

        if prediction_errors.as_array().map_or(true, Vec::is_empty) {
            warn!(session_id, "session holds no prediction errors to consolidate");
            self.mark_processed(session_file);
            let _ = fs::remove_file(&session_path);
            return;
        }

        info!(session_id, "consolidating session contents");
        let errors_json = serde_json::to_string_pretty(&prediction_errors).unwrap_or_default();
        let synthesized = match self
            .ctx
            .complete(
                "CONSOLIDATION_PROMPT",
                &[("prediction_errors", errors_json.as_str())],
                cancel,
            )
            .await
        {
            Ok(synthesized) if !synthesized.trim().is_empty() => synthesized,
            Ok(_) => {
                warn!("consolidation produced no new knowledge");
                self.mark_processed(session_file);
                let _ = fs::remove_file(&session_path);
                return;
            }
            Err(e) => {
                error!("consolidation synthesis failed: {}", e);
                return;
            }
        };

        match self.kg_agent.extract(&synthesized, cancel).await {
            Ok(fragment) if !fragment.is_empty() => {
                self.knowledge_graph.merge(fragment);
                if let Err(e) = self.knowledge_graph.save() {
                    error!("knowledge graph save failed: {}", e);
                }
            }
            Ok(_) => warn!("consolidated knowledge produced an empty graph fragment"),
            Err(e) => error!("knowledge graph extraction failed: {}", e),
        }

        let documents: Vec<Document> = synthesized
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|fact| Document::with_source(fact, format!("consolidated_from_{}", session_id)))
            .collect();
        if !documents.is_empty() {
            let count = documents.len();
            if let Err(e) = self.vector_store.add_documents(documents).await {
                error!("failed to index consolidated facts: {}", e);
            } else {
                info!(count, "consolidated facts added to the knowledge base");
            }
        }

        let record = format!("[consolidated knowledge]\n{}", synthesized);
        if let Err(e) = self
            .memory_log
            .log_autonomous_thought(&format!("consolidation_of_{}", session_id), &record)
        {
            error!("failed to log the consolidation: {}", e);
        }

        self.mark_processed(session_file);
        let _ = fs::remove_file(&session_path);
        info!(session = %session_file, "session consolidated and retired");
    }

    /// Distill deeper insights from the whole knowledge graph.
    pub async fn synthesize_wisdom(&self, cancel: &CancellationToken) {
        info!("wisdom synthesis cycle started");
        let graph_text = self.knowledge_graph.snapshot().to_text();
        if graph_text.contains("empty") {
            info!("knowledge graph is empty; skipping wisdom synthesis");
            return;
        }

        match self
            .ctx
            .complete(
                "WISDOM_SYNTHESIS_PROMPT",
                &[("knowledge_graph_summary", graph_text.as_str())],
                cancel,
            )
            .await
        {
            Ok(wisdom) if !wisdom.trim().is_empty() => {
                let record = format!("[synthesized wisdom]\n{}", wisdom);
                if let Err(e) = self
                    .memory_log
                    .log_autonomous_thought("wisdom_synthesis", &record)
                {
                    error!("failed to log the synthesized wisdom: {}", e);
                }
                info!("wisdom synthesis recorded");
            }
            Ok(_) => warn!("wisdom synthesis came back empty"),
            Err(e) => error!("wisdom synthesis failed: {}", e),
        }
    }
}
