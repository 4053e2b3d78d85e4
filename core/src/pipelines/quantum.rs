//! Quantum-inspired pipeline
//!
//! A fixed persona list answers the query independently and in parallel;
//! the integrated-information agent fuses the superposition of viewpoints
//! into one answer. An empty persona list is a configuration problem and
//! produces an explanatory response.

use super::Pipeline;
use crate::agents::dialogue::IntegratedInformationAgent;
use crate::agents::AgentContext;
use crate::config::Persona;
use crate::error::Result;
use crate::models::{MasterResponse, OrchestrationDecision, PipelineKind};
use async_trait::async_trait;
use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct QuantumPipeline {
    ctx: AgentContext,
    integrator: IntegratedInformationAgent,
    personas: Vec<Persona>,
}

impl QuantumPipeline {
    pub fn new(
        ctx: AgentContext,
        integrator: IntegratedInformationAgent,
        personas: Vec<Persona>,
    ) -> Self {
        Self {
            ctx,
            integrator,
            personas,
        }
    }
}

#[async_trait]
impl Pipeline for QuantumPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Quantum
    }

    async fn run(
        &self,
        query: &str,
        _decision: &OrchestrationDecision,
        cancel: &CancellationToken,
    ) -> Result<MasterResponse> {
        if self.personas.is_empty() {
            warn!("no personas configured for the quantum pipeline");
            return Ok(MasterResponse {
                final_answer:
                    "The question could not be examined from multiple viewpoints: no personas \
                     are configured."
                        .to_string(),
                self_criticism: String::new(),
                potential_problems: "The quantum persona list in the configuration is empty."
                    .to_string(),
                retrieved_info: String::new(),
            });
        }

        info!(personas = self.personas.len(), "quantum pipeline fan-out");
        let answers = try_join_all(self.personas.iter().map(|persona| {
            let ctx = self.ctx.clone();
            async move {
                let output = ctx
                    .complete(
                        "PERSONA_RESPONSE_PROMPT",
                        &[("persona", persona.persona.as_str()), ("query", query)],
                        cancel,
                    )
                    .await?;
                Ok::<(String, String), crate::error::NoesisError>((persona.name.clone(), output))
            }
        }))
        .await?;

        let formatted = answers
            .iter()
            .map(|(name, output)| format!("[viewpoint of {}]\n{}", name, output))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        let final_answer = self.integrator.integrate(query, &formatted, cancel).await?;

        Ok(MasterResponse {
            final_answer,
            self_criticism: String::new(),
            potential_problems:
                "Strong disagreement between personas can flatten the integrated answer."
                    .to_string(),
            retrieved_info: formatted,
        })
    }
}
