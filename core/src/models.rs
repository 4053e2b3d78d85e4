//! Shared data structures exchanged between the orchestrator, the engine
//! and the pipelines.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Closed set of execution strategies known to the engine.
///
/// The wire representation matches the mode names the orchestration model
/// is prompted with, so `serde` round-trips decisions unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    Simple,
    Full,
    Parallel,
    Quantum,
    Speculative,
    SelfDiscover,
    InternalDialogue,
    ConceptualReasoning,
    MicroLlmExpert,
    TreeOfThoughts,
    IterativeCorrection,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 11] = [
        PipelineKind::Simple,
        PipelineKind::Full,
        PipelineKind::Parallel,
        PipelineKind::Quantum,
        PipelineKind::Speculative,
        PipelineKind::SelfDiscover,
        PipelineKind::InternalDialogue,
        PipelineKind::ConceptualReasoning,
        PipelineKind::MicroLlmExpert,
        PipelineKind::TreeOfThoughts,
        PipelineKind::IterativeCorrection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineKind::Simple => "simple",
            PipelineKind::Full => "full",
            PipelineKind::Parallel => "parallel",
            PipelineKind::Quantum => "quantum",
            PipelineKind::Speculative => "speculative",
            PipelineKind::SelfDiscover => "self_discover",
            PipelineKind::InternalDialogue => "internal_dialogue",
            PipelineKind::ConceptualReasoning => "conceptual_reasoning",
            PipelineKind::MicroLlmExpert => "micro_llm_expert",
            PipelineKind::TreeOfThoughts => "tree_of_thoughts",
            PipelineKind::IterativeCorrection => "iterative_correction",
        }
    }

    pub fn parse(name: &str) -> Option<PipelineKind> {
        Self::ALL.iter().copied().find(|k| k.as_str() == name)
    }
}

impl std::fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Emphasis overlay derived from keyword inspection of the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasoningEmphasis {
    #[serde(rename = "bird's_eye_view")]
    BirdsEyeView,
    #[serde(rename = "detail_oriented")]
    DetailOriented,
}

/// The orchestrator's verdict on how a query should be executed.
///
/// Produced by the [`Orchestrator`](crate::orchestrator::Orchestrator),
/// possibly rewritten by the arbiter, consumed by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationDecision {
    pub chosen_mode: String,
    pub reasoning: String,
    pub confidence_score: f64,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

impl OrchestrationDecision {
    pub fn new(mode: PipelineKind, reasoning: impl Into<String>, confidence: f64) -> Self {
        Self {
            chosen_mode: mode.as_str().to_string(),
            reasoning: reasoning.into(),
            confidence_score: confidence,
            parameters: HashMap::new(),
        }
    }

    /// The recognized `reasoning_emphasis` parameter, if set.
    pub fn reasoning_emphasis(&self) -> Option<ReasoningEmphasis> {
        let value = self.parameters.get("reasoning_emphasis")?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn set_reasoning_emphasis(&mut self, emphasis: Option<ReasoningEmphasis>) {
        match emphasis {
            Some(e) => {
                let value = serde_json::to_value(e).unwrap_or(serde_json::Value::Null);
                self.parameters.insert("reasoning_emphasis".to_string(), value);
            }
            None => {
                self.parameters.remove("reasoning_emphasis");
            }
        }
    }

    /// Extra prompt instruction for the chosen emphasis, empty when unset.
    pub fn reasoning_instruction(&self) -> &'static str {
        match self.reasoning_emphasis() {
            Some(ReasoningEmphasis::BirdsEyeView) => {
                "Emphasize relationships between concepts, the big picture, \
                 long-term implications and abstract principles."
            }
            Some(ReasoningEmphasis::DetailOriented) => {
                "Emphasize concrete facts, detailed procedures, precise data \
                 and rigorous logical structure."
            }
            None => "",
        }
    }
}

/// Final response returned to the caller of the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterResponse {
    pub final_answer: String,
    pub self_criticism: String,
    pub potential_problems: String,
    pub retrieved_info: String,
}

impl MasterResponse {
    /// The canned response for an uncaught pipeline failure.
    pub fn apology() -> Self {
        Self {
            final_answer: "We apologize - an unexpected internal error occurred while \
                           processing your request."
                .to_string(),
            self_criticism: "Self-assessment could not run because of a fatal error."
                .to_string(),
            potential_problems: "Check the system logs.".to_string(),
            retrieved_info: String::new(),
        }
    }

    /// The canned response for a cancelled request.
    pub fn cancelled() -> Self {
        Self {
            final_answer: "The request was cancelled before a response could be produced."
                .to_string(),
            self_criticism: String::new(),
            potential_problems: String::new(),
            retrieved_info: String::new(),
        }
    }
}

/// Body of `POST /api/v1/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}
