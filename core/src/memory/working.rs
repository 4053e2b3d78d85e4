//! Working memory
//!
//! Short-term, per-session store of high-novelty observations (prediction
//! errors). Sessions are flushed to disk as standalone JSON files for the
//! offline consolidation cycle to replay into long-term memory.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingMemory {
    pub session_id: String,
    pub prediction_errors: Vec<Value>,
    pub context_summary: String,
}

impl WorkingMemory {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            prediction_errors: Vec::new(),
            context_summary: String::new(),
        }
    }

    pub fn add_prediction_error(&mut self, error_data: Value) {
        self.prediction_errors.push(error_data);
    }

    pub fn is_empty(&self) -> bool {
        self.prediction_errors.is_empty()
    }

    /// Reset to a fresh session.
    pub fn clear(&mut self) {
        self.session_id = Uuid::new_v4().to_string();
        self.prediction_errors.clear();
        self.context_summary.clear();
    }
}

impl Default for WorkingMemory {
    fn default() -> Self {
        Self::new()
    }
}
