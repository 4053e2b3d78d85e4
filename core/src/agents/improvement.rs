//! Self-improvement agents
//!
//! The improvement agent turns self-criticism and per-step rewards into
//! structured suggestions; the correction agent decides which to apply and
//! executes the recognized ones (micro-model creation, prompt refinement).

use super::AgentContext;
use crate::config::prompts::PromptStore;
use crate::error::Result;
use crate::evolution::micro_llm::MicroLlmManager;
use crate::memory::log::MemoryLog;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Marker the correction model emits when nothing should be applied.
pub const NO_APPLICATION_MARKER: &str = "no suggestions to apply";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementSuggestion {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub details: Value,
}

/// Designs improvement suggestions from an execution trace analysis.
pub struct SelfImprovementAgent {
    ctx: AgentContext,
}

impl SelfImprovementAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn suggest(
        &self,
        trace_data: &str,
        process_feedback: &str,
        self_criticism: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ImprovementSuggestion>> {
        self.ctx
            .complete_json(
                "SELF_IMPROVEMENT_PROMPT",
                &[
                    ("trace_data", trace_data),
                    ("process_feedback", process_feedback),
                    ("self_criticism", self_criticism),
                ],
                cancel,
            )
            .await
    }
}

/// Considers suggestions, records the decision and executes the ones the
/// runtime knows how to apply.
pub struct SelfCorrectionAgent {
    ctx: AgentContext,
    memory_log: Arc<MemoryLog>,
    micro_llm: Arc<MicroLlmManager>,
    prompts: Arc<PromptStore>,
}

impl SelfCorrectionAgent {
    pub fn new(
        ctx: AgentContext,
        memory_log: Arc<MemoryLog>,
        micro_llm: Arc<MicroLlmManager>,
        prompts: Arc<PromptStore>,
    ) -> Self {
        Self {
            ctx,
            memory_log,
            micro_llm,
            prompts,
        }
    }

    /// Weigh the suggestions, log the decision, and execute recognized
    /// suggestion types. Unknown types are logged and skipped.
    pub async fn consider_and_apply(
        &self,
        suggestions: &[ImprovementSuggestion],
        cancel: &CancellationToken,
    ) {
        if suggestions.is_empty() {
            info!("no self-improvement suggestions to apply");
            return;
        }

        let suggestions_str = suggestions
            .iter()
            .map(|s| serde_json::to_string(s).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\n");

        let decision = match self
            .ctx
            .complete(
                "SELF_CORRECTION_PROMPT",
                &[("improvement_suggestions", suggestions_str.as_str())],
                cancel,
            )
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                error!("self-correction decision failed: {}", e);
                return;
            }
        };

        if decision.is_empty() || decision.to_lowercase().contains(NO_APPLICATION_MARKER) {
            info!("self-improvement application declined");
            return;
        }

        let record = format!(
            "[self-improvement application decision]\nDecision: {}\nOriginal suggestions: {}",
            decision, suggestions_str
        );
        if let Err(e) = self
            .memory_log
            .log_autonomous_thought("self_improvement_applied_decision", &record)
        {
            error!("failed to record self-improvement decision: {}", e);
        }

        self.execute(suggestions).await;
    }

    async fn execute(&self, suggestions: &[ImprovementSuggestion]) {
        for suggestion in suggestions {
            match suggestion.kind.as_str() {
                "CreateMicroLLM" => {
                    let topic = suggestion.details.get("topic").and_then(Value::as_str);
                    match topic {
                        Some(topic) => {
                            info!(topic, "applying CreateMicroLLM suggestion");
                            if let Err(e) = self.micro_llm.run_creation_cycle(topic).await {
                                error!("micro model creation failed: {}", e);
                            }
                        }
                        None => warn!("CreateMicroLLM suggestion is missing a topic"),
                    }
                }
                "PromptRefinement" => {
                    let key = suggestion
                        .details
                        .get("target_prompt_key")
                        .and_then(Value::as_str);
                    let template = suggestion
                        .details
                        .get("new_prompt_suggestion")
                        .and_then(Value::as_str);
                    match (key, template) {
                        (Some(key), Some(template)) => {
                            info!(key, "applying PromptRefinement suggestion");
                            match self.prompts.update(key, template) {
                                Ok(true) => info!(key, "prompt updated and persisted"),
                                Ok(false) => warn!(key, "prompt refinement target does not exist"),
                                Err(e) => error!("prompt update failed: {}", e),
                            }
                        }
                        _ => warn!("PromptRefinement suggestion is missing required fields"),
                    }
                }
                other => info!(kind = other, "unsupported improvement suggestion skipped"),
            }
        }
    }
}
