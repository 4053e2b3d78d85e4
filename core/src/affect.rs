//! Affective state model
//!
//! A lightweight emotional register that biases orchestration. The state is
//! assessed per request from the query text and the previous response's
//! self-criticism.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Emotion {
    Calm,
    Anxious,
    Empathetic,
    Frustrated,
    FocusedOnFailure,
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Emotion::Calm => "calm",
            Emotion::Anxious => "anxious",
            Emotion::Empathetic => "empathetic",
            Emotion::Frustrated => "frustrated",
            Emotion::FocusedOnFailure => "focused on failure",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectiveState {
    pub emotion: Emotion,
    /// Intensity in [0, 1]
    pub intensity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Default for AffectiveState {
    fn default() -> Self {
        Self {
            emotion: Emotion::Calm,
            intensity: 0.0,
            reason: None,
        }
    }
}

impl AffectiveState {
    pub fn new(emotion: Emotion, intensity: f64, reason: impl Into<String>) -> Self {
        Self {
            emotion,
            intensity: intensity.clamp(0.0, 1.0),
            reason: Some(reason.into()),
        }
    }

    /// Calm at very low intensity counts as neutral.
    pub fn is_neutral(&self) -> bool {
        self.emotion == Emotion::Calm && self.intensity < 0.1
    }

    /// One-line summary handed to the orchestration prompt.
    pub fn summary(&self) -> String {
        if self.is_neutral() {
            "neutral".to_string()
        } else {
            format!("{} (intensity: {:.1})", self.emotion, self.intensity)
        }
    }
}

/// Assesses the affective state from the current query and the previous
/// response. Rules are evaluated in priority order; the first match wins.
pub struct AffectiveEngine {
    current: parking_lot::Mutex<AffectiveState>,
}

const EMPATHY_KEYWORDS: &[&str] = &[
    "painful",
    "sad",
    "exhausted",
    "don't know what to do",
    "辛い",
    "悲しい",
    "疲れた",
];

const CONCERN_MARKERS: &[&str] = &["problem", "limited", "failed", "問題", "限定的", "失敗"];

impl AffectiveEngine {
    pub fn new() -> Self {
        Self {
            current: parking_lot::Mutex::new(AffectiveState::default()),
        }
    }

    /// Re-evaluate the state for a new query. `previous_criticism` is the
    /// self-criticism of the last response, when one exists.
    pub fn assess(&self, query: &str, previous_criticism: Option<&str>) -> AffectiveState {
        let state = if let Some(criticism) = previous_criticism.filter(|c| {
            let lower = c.to_lowercase();
            CONCERN_MARKERS.iter().any(|marker| lower.contains(marker))
        }) {
            AffectiveState::new(
                Emotion::Anxious,
                0.6,
                format!("self-assessment raised concerns: {}", criticism),
            )
        } else if EMPATHY_KEYWORDS.iter().any(|kw| query.contains(kw)) {
            AffectiveState::new(
                Emotion::Empathetic,
                0.7,
                "the query suggests the user needs emotional support",
            )
        } else {
            AffectiveState::default()
        };

        *self.current.lock() = state.clone();
        state
    }

    pub fn current(&self) -> AffectiveState {
        self.current.lock().clone()
    }
}

impl Default for AffectiveEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_detection() {
        assert!(AffectiveState::default().is_neutral());
        let anxious = AffectiveState::new(Emotion::Anxious, 0.6, "r");
        assert!(!anxious.is_neutral());
        let faint_calm = AffectiveState {
            emotion: Emotion::Calm,
            intensity: 0.05,
            reason: None,
        };
        assert!(faint_calm.is_neutral());
    }

    #[test]
    fn test_empathy_keywords_trigger_empathetic_state() {
        let engine = AffectiveEngine::new();
        let state = engine.assess("I'm exhausted and don't know what to do", None);
        assert_eq!(state.emotion, Emotion::Empathetic);
        assert!(state.intensity > 0.5);
    }

    #[test]
    fn test_previous_criticism_triggers_anxiety() {
        let engine = AffectiveEngine::new();
        let state = engine.assess("hello", Some("the answer failed to address the question"));
        assert_eq!(state.emotion, Emotion::Anxious);
    }

    #[test]
    fn test_summary_for_neutral_state() {
        assert_eq!(AffectiveState::default().summary(), "neutral");
    }

    #[test]
    fn test_intensity_is_clamped() {
        let state = AffectiveState::new(Emotion::Frustrated, 3.0, "r");
        assert!(state.intensity <= 1.0);
    }
}
