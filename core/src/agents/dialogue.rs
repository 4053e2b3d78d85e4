//! Internal dialogue agents
//!
//! A society-of-mind debate: generated personas take turns, a mediator
//! steers the exchange and signals when to conclude, and the integrator
//! fuses the transcript into one answer.

use super::AgentContext;
use crate::error::Result;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
pub struct DialogueParticipant {
    pub name: String,
    pub persona: String,
}

#[derive(Debug, Deserialize)]
struct ParticipantList {
    #[serde(default)]
    participants: Vec<DialogueParticipant>,
}

/// Generates the set of debate personas for a query.
pub struct DialogueParticipantAgent {
    ctx: AgentContext,
}

impl DialogueParticipantAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn generate(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<DialogueParticipant>> {
        let list: ParticipantList = self
            .ctx
            .complete_json("DIALOGUE_PARTICIPANTS_PROMPT", &[("query", query)], cancel)
            .await?;
        Ok(list.participants)
    }
}

/// Facilitates the debate and decides when it has matured.
pub struct MediatorAgent {
    ctx: AgentContext,
}

/// Markers in a mediator action that signal the dialogue should conclude.
const CONCLUDE_MARKERS: &[&str] = &["conclusion", "integrate", "summing up", "結論", "統合", "まとめ"];

impl MediatorAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn next_action(
        &self,
        query: &str,
        dialogue_history: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.ctx
            .complete(
                "MEDIATOR_PROMPT",
                &[("query", query), ("dialogue_history", dialogue_history)],
                cancel,
            )
            .await
    }

    pub fn is_conclude_signal(action: &str) -> bool {
        let lower = action.to_lowercase();
        CONCLUDE_MARKERS.iter().any(|m| lower.contains(m))
    }
}

/// Integrates multiple viewpoints into one higher-order answer.
pub struct IntegratedInformationAgent {
    ctx: AgentContext,
}

impl IntegratedInformationAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn integrate(
        &self,
        query: &str,
        persona_outputs: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.ctx
            .complete(
                "INTEGRATED_INFORMATION_PROMPT",
                &[("query", query), ("persona_outputs", persona_outputs)],
                cancel,
            )
            .await
    }
}

/// The stage the debate plays out on: runs turns, applies mediator
/// guidance, and returns the transcript.
pub struct DialogueStage {
    ctx: AgentContext,
    mediator: MediatorAgent,
}

impl DialogueStage {
    pub fn new(ctx: AgentContext, mediator: MediatorAgent) -> Self {
        Self { ctx, mediator }
    }

    async fn participant_turn(
        &self,
        query: &str,
        participant: &DialogueParticipant,
        history: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let statement = self
            .ctx
            .complete(
                "PARTICIPANT_TURN_PROMPT",
                &[
                    ("name", participant.name.as_str()),
                    ("persona", participant.persona.as_str()),
                    ("query", query),
                    ("history", history),
                ],
                cancel,
            )
            .await?;
        Ok(format!("@{}: {}", participant.name, statement))
    }

    /// Run the debate for at most `max_turns` mediator rounds and return
    /// the transcript.
    pub async fn run_dialogue(
        &self,
        query: &str,
        participants: &[DialogueParticipant],
        max_turns: usize,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let mut history: Vec<String> = Vec::new();
        info!(
            participants = participants.len(),
            "internal dialogue started"
        );

        for turn in 0..max_turns {
            debug!(turn = turn + 1, max_turns, "dialogue turn");

            if turn == 0 {
                for participant in participants {
                    let statement = self
                        .participant_turn(query, participant, &history.join("\n"), cancel)
                        .await?;
                    history.push(statement);
                }
            }

            let action = self
                .mediator
                .next_action(query, &history.join("\n"), cancel)
                .await?;
            history.push(format!("@mediator: {}", action));

            if MediatorAgent::is_conclude_signal(&action) {
                info!("mediator called for a conclusion; ending dialogue");
                break;
            }

            // Mentioned participants speak next; with no mention, everyone does.
            let mentioned: Vec<&DialogueParticipant> = participants
                .iter()
                .filter(|p| action.contains(&format!("@{}", p.name)))
                .collect();
            let speakers: Vec<&DialogueParticipant> = if mentioned.is_empty() {
                participants.iter().collect()
            } else {
                mentioned
            };
            for participant in speakers {
                let statement = self
                    .participant_turn(query, participant, &history.join("\n"), cancel)
                    .await?;
                history.push(statement);
            }
        }

        Ok(history.join("\n"))
    }
}
