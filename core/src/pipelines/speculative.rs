//! Speculative pipeline
//!
//! A fast drafter model produces K rough drafts in parallel; a stronger
//! verifier model reviews and merges them into the final answer.

use super::Pipeline;
use crate::agents::AgentContext;
use crate::error::Result;
use crate::models::{MasterResponse, OrchestrationDecision, PipelineKind};
use async_trait::async_trait;
use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct SpeculativePipeline {
    drafter_ctx: AgentContext,
    verifier_ctx: AgentContext,
    num_drafts: usize,
}

impl SpeculativePipeline {
    pub fn new(drafter_ctx: AgentContext, verifier_ctx: AgentContext, num_drafts: usize) -> Self {
        Self {
            drafter_ctx,
            verifier_ctx,
            num_drafts: num_drafts.max(1),
        }
    }
}

#[async_trait]
impl Pipeline for SpeculativePipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Speculative
    }

    async fn run(
        &self,
        query: &str,
        _decision: &OrchestrationDecision,
        cancel: &CancellationToken,
    ) -> Result<MasterResponse> {
        info!(drafts = self.num_drafts, "speculative pipeline fan-out");

        let drafts = try_join_all((0..self.num_drafts).map(|_| {
            let ctx = self.drafter_ctx.clone();
            async move { ctx.complete("DRAFT_PROMPT", &[("query", query)], cancel).await }
        }))
        .await?;

        let formatted_drafts = drafts
            .iter()
            .enumerate()
            .map(|(i, draft)| format!("[draft {}]\n{}", i + 1, draft))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        let final_answer = self
            .verifier_ctx
            .complete(
                "VERIFICATION_PROMPT",
                &[("query", query), ("drafts", formatted_drafts.as_str())],
                cancel,
            )
            .await?;

        Ok(MasterResponse {
            final_answer,
            self_criticism: String::new(),
            potential_problems:
                "Low-quality drafts can drag down the quality of the merged answer."
                    .to_string(),
            retrieved_info: formatted_drafts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::prompts::PromptStore;
    use crate::testing::MockModel;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_drafts_then_verification() {
        let model = MockModel::scripted(vec![
            "draft one".to_string(),
            "draft two".to_string(),
            "draft three".to_string(),
            "verified merge".to_string(),
        ]);
        let prompt_log = model.prompt_log();
        let ctx = AgentContext::new(
            Arc::new(model),
            Arc::new(PromptStore::ephemeral()),
            "mock",
        );
        let pipeline = SpeculativePipeline::new(ctx.clone(), ctx, 3);

        let response = pipeline
            .run(
                "outline a strategy",
                &OrchestrationDecision::new(PipelineKind::Speculative, "t", 0.8),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(response.final_answer, "verified merge");
        assert!(response.retrieved_info.contains("[draft 1]"));
        assert!(response.retrieved_info.contains("draft three"));
        // The verifier saw every draft.
        let last_prompt = prompt_log.lock().last().unwrap().clone();
        assert!(last_prompt.contains("draft one"));
        assert!(last_prompt.contains("draft three"));
    }

    #[tokio::test]
    async fn test_at_least_one_draft_is_generated() {
        let ctx = AgentContext::new(
            Arc::new(MockModel::scripted(vec![
                "only draft".to_string(),
                "verified".to_string(),
            ])),
            Arc::new(PromptStore::ephemeral()),
            "mock",
        );
        let pipeline = SpeculativePipeline::new(ctx.clone(), ctx, 0);
        let response = pipeline
            .run(
                "q",
                &OrchestrationDecision::new(PipelineKind::Speculative, "t", 0.8),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(response.final_answer, "verified");
    }
}
