//! Simple pipeline
//!
//! Routes between a direct answer and a RAG answer. Retrieval that comes
//! back empty, and any transient failure, falls back to the direct chain;
//! only cancellation propagates out.

use super::Pipeline;
use crate::agents::AgentContext;
use crate::error::Result;
use crate::memory::vector::VectorStore;
use crate::models::{MasterResponse, OrchestrationDecision, PipelineKind};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct RouteVerdict {
    #[serde(default)]
    route: String,
}

pub struct SimplePipeline {
    ctx: AgentContext,
    vector_store: Arc<dyn VectorStore>,
}

impl SimplePipeline {
    pub fn new(ctx: AgentContext, vector_store: Arc<dyn VectorStore>) -> Self {
        Self { ctx, vector_store }
    }

    async fn direct_answer(&self, query: &str, cancel: &CancellationToken) -> Result<String> {
        self.ctx
            .complete("DIRECT_RESPONSE_PROMPT", &[("query", query)], cancel)
            .await
    }

    async fn answer(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<(String, String)> {
        let verdict: Result<RouteVerdict> = self
            .ctx
            .complete_json("ROUTING_PROMPT", &[("query", query)], cancel)
            .await;

        let route = match verdict {
            Ok(v) => v.route,
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                warn!("routing failed ({}); falling back to DIRECT", e);
                "DIRECT".to_string()
            }
        };
        info!(route, "simple pipeline routed");

        if route == "RAG" {
            let documents = self.vector_store.retrieve(query).await?;
            let retrieved_info = documents
                .iter()
                .map(|d| d.content.clone())
                .collect::<Vec<_>>()
                .join("\n\n");

            if retrieved_info.trim().is_empty() {
                warn!("RAG retrieval found nothing; falling back to DIRECT");
                let answer = self.direct_answer(query, cancel).await?;
                return Ok((answer, String::new()));
            }

            let answer = self
                .ctx
                .complete(
                    "SIMPLE_RAG_PROMPT",
                    &[("query", query), ("retrieved_info", retrieved_info.as_str())],
                    cancel,
                )
                .await?;
            return Ok((answer, retrieved_info));
        }

        let answer = self.direct_answer(query, cancel).await?;
        Ok((answer, String::new()))
    }
}

#[async_trait]
impl Pipeline for SimplePipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Simple
    }

    async fn run(
        &self,
        query: &str,
        _decision: &OrchestrationDecision,
        cancel: &CancellationToken,
    ) -> Result<MasterResponse> {
        let (final_answer, retrieved_info) = match self.answer(query, cancel).await {
            Ok(result) => result,
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                warn!("simple pipeline failed ({}); retrying the direct chain", e);
                match self.direct_answer(query, cancel).await {
                    Ok(answer) => (answer, String::new()),
                    Err(e) if e.is_cancellation() => return Err(e),
                    Err(e) => {
                        warn!("direct fallback also failed: {}", e);
                        (
                            "We apologize - an error occurred while processing your question."
                                .to_string(),
                            String::new(),
                        )
                    }
                }
            }
        };

        Ok(MasterResponse {
            final_answer,
            self_criticism: String::new(),
            potential_problems: String::new(),
            retrieved_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::prompts::PromptStore;
    use crate::memory::vector::{Document, InMemoryVectorStore};
    use crate::testing::MockModel;

    fn decision() -> OrchestrationDecision {
        OrchestrationDecision::new(PipelineKind::Simple, "test", 0.8)
    }

    fn pipeline(
        responses: Vec<String>,
        documents: Vec<Document>,
    ) -> (SimplePipeline, std::sync::Arc<parking_lot::Mutex<Vec<String>>>) {
        let model = MockModel::scripted(responses);
        let log = model.prompt_log();
        let ctx = AgentContext::new(
            Arc::new(model),
            Arc::new(PromptStore::ephemeral()),
            "mock",
        );
        (
            SimplePipeline::new(ctx, Arc::new(InMemoryVectorStore::with_documents(documents))),
            log,
        )
    }

    #[tokio::test]
    async fn test_direct_route() {
        let (pipeline, _) = pipeline(
            vec![
                r#"{"route": "DIRECT"}"#.to_string(),
                "direct answer".to_string(),
            ],
            vec![],
        );
        let response = pipeline
            .run("hello", &decision(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.final_answer, "direct answer");
        assert_eq!(response.retrieved_info, "");
        assert_eq!(response.self_criticism, "");
    }

    #[tokio::test]
    async fn test_rag_route_with_documents() {
        let (pipeline, _) = pipeline(
            vec![
                r#"{"route": "RAG"}"#.to_string(),
                "grounded answer".to_string(),
            ],
            vec![Document::new("ownership rules in rust memory management")],
        );
        let response = pipeline
            .run(
                "explain rust ownership rules",
                &decision(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(response.final_answer, "grounded answer");
        assert!(response.retrieved_info.contains("ownership rules"));
    }

    #[tokio::test]
    async fn test_empty_retrieval_falls_back_to_direct() {
        let (pipeline, log) = pipeline(
            vec![
                r#"{"route": "RAG"}"#.to_string(),
                "direct fallback".to_string(),
            ],
            vec![],
        );
        let response = pipeline
            .run("anything unknown", &decision(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.final_answer, "direct fallback");
        assert_eq!(response.retrieved_info, "");
        // Routing call + direct call only
        assert_eq!(log.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_garbage_routing_falls_back_to_direct() {
        let (pipeline, _) = pipeline(
            vec![
                "no idea".to_string(),
                "still answered".to_string(),
            ],
            vec![],
        );
        let response = pipeline
            .run("hello", &decision(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.final_answer, "still answered");
    }

    #[tokio::test]
    async fn test_cancellation_propagates() {
        let (pipeline, log) = pipeline(vec!["unused".to_string()], vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = pipeline.run("q", &decision(), &cancel).await.unwrap_err();
        assert!(err.is_cancellation());
        // No external calls after the signal was observed.
        assert!(log.lock().is_empty());
    }
}
