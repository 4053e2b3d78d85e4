//! Internal dialogue pipeline
//!
//! Generates a set of thinking personas for the query, stages a mediated
//! debate between them, and integrates the transcript into one answer.

use super::Pipeline;
use crate::agents::dialogue::{
    DialogueParticipantAgent, DialogueStage, IntegratedInformationAgent,
};
use crate::error::Result;
use crate::models::{MasterResponse, OrchestrationDecision, PipelineKind};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct InternalDialoguePipeline {
    participants_agent: DialogueParticipantAgent,
    stage: DialogueStage,
    integrator: IntegratedInformationAgent,
    max_turns: usize,
}

impl InternalDialoguePipeline {
    pub fn new(
        participants_agent: DialogueParticipantAgent,
        stage: DialogueStage,
        integrator: IntegratedInformationAgent,
        max_turns: usize,
    ) -> Self {
        Self {
            participants_agent,
            stage,
            integrator,
            max_turns,
        }
    }
}

#[async_trait]
impl Pipeline for InternalDialoguePipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::InternalDialogue
    }

    async fn run(
        &self,
        query: &str,
        _decision: &OrchestrationDecision,
        cancel: &CancellationToken,
    ) -> Result<MasterResponse> {
        let participants = match self.participants_agent.generate(query, cancel).await {
            Ok(participants) if !participants.is_empty() => participants,
            Ok(_) | Err(_) => {
                error!("failed to generate dialogue participants");
                return Ok(MasterResponse {
                    final_answer:
                        "We apologize - the question could not be examined from multiple \
                         angles."
                            .to_string(),
                    self_criticism: String::new(),
                    potential_problems:
                        "The model may have failed to produce personas in the expected JSON \
                         shape."
                            .to_string(),
                    retrieved_info: String::new(),
                });
            }
        };
        info!(participants = participants.len(), "internal dialogue cast generated");

        let transcript = self
            .stage
            .run_dialogue(query, &participants, self.max_turns, cancel)
            .await?;

        let final_answer = self.integrator.integrate(query, &transcript, cancel).await?;

        Ok(MasterResponse {
            final_answer,
            self_criticism: String::new(),
            potential_problems:
                "The generated viewpoints can be biased, or the dialogue may fail to converge."
                    .to_string(),
            retrieved_info: transcript,
        })
    }
}
