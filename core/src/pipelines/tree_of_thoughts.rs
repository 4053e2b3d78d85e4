//! Tree-of-thoughts pipeline
//!
//! Wraps the beam search and turns the best thought into the response.

use super::Pipeline;
use crate::cognitive::tot::TreeOfThoughtsAgent;
use crate::error::Result;
use crate::models::{MasterResponse, OrchestrationDecision, PipelineKind};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

const DEFAULT_K: usize = 3;
const DEFAULT_DEPTH: usize = 3;
const DEFAULT_BEAM: usize = 2;

pub struct TreeOfThoughtsPipeline {
    agent: TreeOfThoughtsAgent,
}

impl TreeOfThoughtsPipeline {
    pub fn new(agent: TreeOfThoughtsAgent) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl Pipeline for TreeOfThoughtsPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::TreeOfThoughts
    }

    async fn run(
        &self,
        query: &str,
        _decision: &OrchestrationDecision,
        cancel: &CancellationToken,
    ) -> Result<MasterResponse> {
        info!("tree-of-thoughts pipeline started");
        let (tree, best) = self
            .agent
            .search(query, DEFAULT_K, DEFAULT_DEPTH, DEFAULT_BEAM, cancel)
            .await?;

        let best_node = tree.node(best);
        let (final_answer, retrieved_info) = if best == tree.root() {
            (
                "No definite conclusion was reached despite extended deliberation.".to_string(),
                "The tree-of-thoughts search produced no viable solution path.".to_string(),
            )
        } else {
            (
                best_node.state.clone(),
                format!(
                    "The tree-of-thoughts search reached a conclusion over {} steps.\n\
                     Final score of the best thought path: {:.2}",
                    DEFAULT_DEPTH, best_node.score
                ),
            )
        };

        Ok(MasterResponse {
            final_answer,
            self_criticism: String::new(),
            potential_problems:
                "Poorly tuned breadth or depth can miss the best solution or waste compute."
                    .to_string(),
            retrieved_info,
        })
    }
}
