//! Reasoning pipelines
//!
//! The closed set of execution strategies the engine can dispatch to. All
//! pipelines share one contract: `run(query, decision, cancel)` produces a
//! [`MasterResponse`], suspending internally on every external call and
//! honoring cancellation.

pub mod conceptual;
pub mod full;
pub mod internal_dialogue;
pub mod iterative_correction;
pub mod micro_expert;
pub mod parallel;
pub mod quantum;
pub mod self_discover;
pub mod simple;
pub mod speculative;
pub mod tree_of_thoughts;

use crate::error::Result;
use crate::models::{MasterResponse, OrchestrationDecision, PipelineKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait Pipeline: Send + Sync {
    fn kind(&self) -> PipelineKind;

    async fn run(
        &self,
        query: &str,
        decision: &OrchestrationDecision,
        cancel: &CancellationToken,
    ) -> Result<MasterResponse>;
}

/// Name -> pipeline map consumed by the engine.
pub type PipelineMap = HashMap<String, Arc<dyn Pipeline>>;

pub fn into_map(pipelines: Vec<Arc<dyn Pipeline>>) -> PipelineMap {
    pipelines
        .into_iter()
        .map(|p| (p.kind().as_str().to_string(), p))
        .collect()
}
