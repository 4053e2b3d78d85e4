//! Knowledge-structuring agents
//!
//! Extraction of graph fragments from text, capability mapping from
//! benchmark reports, gap analysis over the dialogue history, and the
//! query complexity classifier.

use super::AgentContext;
use crate::error::Result;
use crate::memory::knowledge_graph::{KnowledgeGraph, PersistentKnowledgeGraph};
use crate::memory::log::MemoryLog;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Extracts a knowledge-graph fragment from a chunk of text.
pub struct KnowledgeGraphAgent {
    ctx: AgentContext,
}

impl KnowledgeGraphAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn extract(
        &self,
        text_chunk: &str,
        cancel: &CancellationToken,
    ) -> Result<KnowledgeGraph> {
        self.ctx
            .complete_json("KNOWLEDGE_GRAPH_PROMPT", &[("text_chunk", text_chunk)], cancel)
            .await
    }
}

/// Maps a benchmark report onto a capability knowledge graph.
pub struct CapabilityMapperAgent {
    ctx: AgentContext,
}

impl CapabilityMapperAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn map_capabilities(
        &self,
        benchmark_report: &str,
        cancel: &CancellationToken,
    ) -> Result<KnowledgeGraph> {
        self.ctx
            .complete_json(
                "CAPABILITY_MAPPER_PROMPT",
                &[("benchmark_report", benchmark_report)],
                cancel,
            )
            .await
    }
}

#[derive(Debug, Deserialize)]
struct GapVerdict {
    #[serde(default)]
    topic: Option<String>,
}

/// Compares recent queries with the knowledge graph to find one topic
/// worth acquiring knowledge on.
pub struct KnowledgeGapAnalyzer {
    ctx: AgentContext,
    memory_log: Arc<MemoryLog>,
    knowledge_graph: Arc<PersistentKnowledgeGraph>,
}

impl KnowledgeGapAnalyzer {
    pub fn new(
        ctx: AgentContext,
        memory_log: Arc<MemoryLog>,
        knowledge_graph: Arc<PersistentKnowledgeGraph>,
    ) -> Self {
        Self {
            ctx,
            memory_log,
            knowledge_graph,
        }
    }

    /// Returns one under-covered topic, or None when there is no notable
    /// gap or no history to analyze.
    pub async fn analyze_for_gaps(&self, cancel: &CancellationToken) -> Option<String> {
        let recent_queries: Vec<String> = self
            .memory_log
            .get_recent_events(20)
            .into_iter()
            .filter(|e| e.get("type").and_then(Value::as_str) == Some("interaction"))
            .filter_map(|e| e.get("query").and_then(Value::as_str).map(str::to_string))
            .collect();

        if recent_queries.is_empty() {
            info!("no dialogue history to analyze for knowledge gaps");
            return None;
        }

        let graph_summary = self.knowledge_graph.get_summary();
        let joined = recent_queries.join("\n- ");

        let verdict: Result<GapVerdict> = self
            .ctx
            .complete_json(
                "KNOWLEDGE_GAP_PROMPT",
                &[
                    ("recent_queries", joined.as_str()),
                    ("knowledge_graph_summary", graph_summary.as_str()),
                ],
                cancel,
            )
            .await;

        match verdict {
            Ok(GapVerdict { topic: Some(topic) }) if !topic.is_empty() && topic != "none" => {
                info!(topic, "knowledge gap identified");
                Some(topic)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("knowledge gap analysis failed: {}", e);
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ComplexityVerdict {
    #[serde(default)]
    complexity_level: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    reason: Option<String>,
}

/// Classifies a query into complexity level 1-4. Parse or model failures
/// default to level 2.
pub struct ComplexityAnalyzer {
    ctx: AgentContext,
}

impl ComplexityAnalyzer {
    pub const DEFAULT_LEVEL: u8 = 2;

    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn analyze(&self, query: &str, cancel: &CancellationToken) -> u8 {
        let verdict: Result<ComplexityVerdict> = self
            .ctx
            .complete_json("COMPLEXITY_ANALYSIS_PROMPT", &[("query", query)], cancel)
            .await;

        match verdict {
            Ok(ComplexityVerdict {
                complexity_level: Some(level),
                ..
            }) => Self::parse_level(&level).unwrap_or_else(|| {
                warn!(level, "unrecognized complexity level; defaulting");
                Self::DEFAULT_LEVEL
            }),
            Ok(_) => {
                warn!("complexity analysis returned no level; defaulting");
                Self::DEFAULT_LEVEL
            }
            Err(e) => {
                warn!("complexity analysis failed: {}; defaulting", e);
                Self::DEFAULT_LEVEL
            }
        }
    }

    fn parse_level(level: &str) -> Option<u8> {
        let digit = level.chars().find(|c| c.is_ascii_digit())?;
        let parsed = digit.to_digit(10)? as u8;
        (1..=4).contains(&parsed).then_some(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock_context;

    #[tokio::test]
    async fn test_graph_extraction_parses_fragment() {
        let (ctx, _) = mock_context(vec![
            r#"{"nodes": [{"id": "sun", "label": "Star"}], "edges": []}"#.to_string(),
        ]);
        let agent = KnowledgeGraphAgent::new(ctx);
        let graph = agent.extract("the sun is a star", &CancellationToken::new()).await.unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].id, "sun");
    }

    #[tokio::test]
    async fn test_complexity_parses_level() {
        let (ctx, _) = mock_context(vec![
            r#"{"complexity_level": "Level 3", "reason": "multi-step"}"#.to_string(),
        ]);
        let analyzer = ComplexityAnalyzer::new(ctx);
        assert_eq!(analyzer.analyze("q", &CancellationToken::new()).await, 3);
    }

    #[tokio::test]
    async fn test_complexity_defaults_on_garbage() {
        let (ctx, _) = mock_context(vec!["not json at all".to_string()]);
        let analyzer = ComplexityAnalyzer::new(ctx);
        assert_eq!(
            analyzer.analyze("q", &CancellationToken::new()).await,
            ComplexityAnalyzer::DEFAULT_LEVEL
        );
    }

    #[tokio::test]
    async fn test_gap_analysis_without_history_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let memory_log = Arc::new(
            MemoryLog::open(dir.path().join("log.jsonl"), dir.path().join("sessions")).unwrap(),
        );
        let graph = Arc::new(PersistentKnowledgeGraph::open(dir.path().join("kg.json")));
        let (ctx, _) = mock_context(vec![r#"{"topic": "fusion"}"#.to_string()]);

        let analyzer = KnowledgeGapAnalyzer::new(ctx, memory_log, graph);
        assert!(analyzer.analyze_for_gaps(&CancellationToken::new()).await.is_none());
    }

    #[tokio::test]
    async fn test_gap_analysis_surfaces_topic() {
        let dir = tempfile::tempdir().unwrap();
        let memory_log = Arc::new(
            MemoryLog::open(dir.path().join("log.jsonl"), dir.path().join("sessions")).unwrap(),
        );
        memory_log.log_interaction("how does fusion work?", "...").unwrap();
        let graph = Arc::new(PersistentKnowledgeGraph::open(dir.path().join("kg.json")));
        let (ctx, _) = mock_context(vec![r#"{"topic": "fusion"}"#.to_string()]);

        let analyzer = KnowledgeGapAnalyzer::new(ctx, memory_log, graph);
        assert_eq!(
            analyzer.analyze_for_gaps(&CancellationToken::new()).await,
            Some("fusion".to_string())
        );
    }
}
