//! Iterative correction pipeline
//!
//! Alternates speculative correction with step-by-step verification until
//! the verifier accepts the proposal or the iteration bound is reached.

use super::Pipeline;
use crate::agents::AgentContext;
use crate::error::Result;
use crate::models::{MasterResponse, OrchestrationDecision, PipelineKind};
use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct Verdict {
    #[serde(default)]
    is_correct: bool,
    #[serde(default)]
    issues: String,
}

pub struct IterativeCorrectionPipeline {
    ctx: AgentContext,
    max_iterations: usize,
}

impl IterativeCorrectionPipeline {
    pub fn new(ctx: AgentContext, max_iterations: usize) -> Self {
        Self {
            ctx,
            max_iterations: max_iterations.max(1),
        }
    }
}

#[async_trait]
impl Pipeline for IterativeCorrectionPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::IterativeCorrection
    }

    async fn run(
        &self,
        query: &str,
        _decision: &OrchestrationDecision,
        cancel: &CancellationToken,
    ) -> Result<MasterResponse> {
        let original = query;
        let mut current = query.to_string();
        let mut history = String::new();

        for iteration in 1..=self.max_iterations {
            info!(iteration, self.max_iterations, "correction cycle");

            let proposed_fix = self
                .ctx
                .complete(
                    "SPECULATIVE_CORRECTION_PROMPT",
                    &[("original_code", original), ("current_code", current.as_str())],
                    cancel,
                )
                .await?;

            let verdict: Verdict = match self
                .ctx
                .complete_json(
                    "STEP_VERIFICATION_PROMPT",
                    &[("original_code", original), ("proposed_fix", proposed_fix.as_str())],
                    cancel,
                )
                .await
            {
                Ok(verdict) => verdict,
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    warn!("verification output unusable ({}); treating as rejected", e);
                    Verdict {
                        is_correct: false,
                        issues: "verifier output could not be parsed".to_string(),
                    }
                }
            };

            history.push_str(&format!(
                "--- Iteration {} ---\nProposed fix:\n{}\n\nVerification: correct={} {}\n\n",
                iteration, proposed_fix, verdict.is_correct, verdict.issues
            ));

            current = proposed_fix;
            if verdict.is_correct {
                info!("verifier accepted the fix; ending the correction cycle");
                break;
            }
            if iteration == self.max_iterations {
                warn!("correction loop hit the iteration bound");
            }
        }

        Ok(MasterResponse {
            final_answer: current,
            self_criticism: String::new(),
            potential_problems:
                "The verifier can misjudge a fix; the final result still warrants human review."
                    .to_string(),
            retrieved_info: history,
        })
    }
}
