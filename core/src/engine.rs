//! Engine
//!
//! The only component that invokes pipelines. Arbitrates the incoming
//! decision against the energy budget, resolves the pipeline (falling back
//! to `simple` for unknown modes), and absorbs panics and failures into
//! canned responses so a request can never take the process down.

use crate::arbiter::ResourceArbiter;
use crate::models::{MasterResponse, OrchestrationDecision, PipelineKind};
use crate::pipelines::PipelineMap;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct Engine {
    pipelines: PipelineMap,
    arbiter: ResourceArbiter,
}

impl Engine {
    pub fn new(pipelines: PipelineMap, arbiter: ResourceArbiter) -> Self {
        Self { pipelines, arbiter }
    }

    /// Run a query under the arbitrated decision, reporting which pipeline
    /// actually executed.
    pub async fn run_with_mode(
        &self,
        query: &str,
        decision: OrchestrationDecision,
        cancel: &CancellationToken,
    ) -> (String, MasterResponse) {
        let final_decision = self.arbiter.arbitrate(decision);

        let pipeline = match self.pipelines.get(&final_decision.chosen_mode) {
            Some(pipeline) => pipeline.clone(),
            None => {
                warn!(
                    "invalid execution mode '{}'; falling back to 'simple'",
                    final_decision.chosen_mode
                );
                match self.pipelines.get(PipelineKind::Simple.as_str()) {
                    Some(pipeline) => pipeline.clone(),
                    None => {
                        error!("no 'simple' pipeline registered; cannot dispatch");
                        return (
                            final_decision.chosen_mode.clone(),
                            MasterResponse::apology(),
                        );
                    }
                }
            }
        };

        let executed_mode = pipeline.kind().as_str().to_string();
        info!(mode = %executed_mode, "running pipeline");

        // The pipeline runs on its own task so a panic is contained and
        // surfaces as a join error instead of unwinding the caller.
        let task = {
            let pipeline = pipeline.clone();
            let query = query.to_string();
            let final_decision = final_decision.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { pipeline.run(&query, &final_decision, &cancel).await })
        };

        let response = match task.await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_cancellation() => {
                info!("pipeline run was cancelled");
                MasterResponse::cancelled()
            }
            Ok(Err(e)) => {
                error!("pipeline '{}' failed: {}", executed_mode, e);
                MasterResponse::apology()
            }
            Err(join_error) => {
                error!(
                    "pipeline '{}' aborted fatally: {}",
                    executed_mode, join_error
                );
                MasterResponse::apology()
            }
        };

        (executed_mode, response)
    }

    pub async fn run(
        &self,
        query: &str,
        decision: OrchestrationDecision,
        cancel: &CancellationToken,
    ) -> MasterResponse {
        self.run_with_mode(query, decision, cancel).await.1
    }

    pub fn pipeline_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pipelines.keys().cloned().collect();
        names.sort();
        names
    }
}
