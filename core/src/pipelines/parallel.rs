//! Parallel pipeline
//!
//! Runs the cognitive loop concurrently at three complexity regimes and
//! lets an editor model pick and merge the best synthesis.

use super::Pipeline;
use crate::agents::AgentContext;
use crate::cognitive::CognitiveLoop;
use crate::error::Result;
use crate::models::{MasterResponse, OrchestrationDecision, PipelineKind};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

const COMPLEXITY_REGIMES: [&str; 3] = ["low", "medium", "high"];

pub struct ParallelPipeline {
    ctx: AgentContext,
    cognitive: Arc<CognitiveLoop>,
}

impl ParallelPipeline {
    pub fn new(ctx: AgentContext, cognitive: Arc<CognitiveLoop>) -> Self {
        Self { ctx, cognitive }
    }
}

#[async_trait]
impl Pipeline for ParallelPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Parallel
    }

    async fn run(
        &self,
        query: &str,
        _decision: &OrchestrationDecision,
        cancel: &CancellationToken,
    ) -> Result<MasterResponse> {
        info!("parallel pipeline started");

        let runs = COMPLEXITY_REGIMES.map(|regime| {
            let framed_query = format!("(analyze at {} complexity) {}", regime, query);
            let cognitive = self.cognitive.clone();
            async move {
                let output = cognitive
                    .run(&framed_query, "parallel analysis", "", cancel)
                    .await?;
                Ok::<(String, String), crate::error::NoesisError>((regime.to_string(), output))
            }
        });
        let [low, medium, high] = runs;
        let (low, medium, high) = tokio::try_join!(low, medium, high)?;

        let formatted_results = [low, medium, high]
            .iter()
            .map(|(regime, output)| format!("[analysis at {} complexity]\n{}", regime, output))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        let final_answer = self
            .ctx
            .complete(
                "PARALLEL_SELECTION_PROMPT",
                &[("query", query), ("results", formatted_results.as_str())],
                cancel,
            )
            .await?;

        Ok(MasterResponse {
            final_answer,
            self_criticism: String::new(),
            potential_problems:
                "Nuance can be lost when perspectives from different analyses are merged."
                    .to_string(),
            retrieved_info: formatted_results,
        })
    }
}
