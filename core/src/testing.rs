//! Test doubles shared across unit tests.

use crate::agents::AgentContext;
use crate::config::prompts::PromptStore;
use crate::error::{NoesisError, Result};
use crate::llm::{LanguageModel, ModelOptions};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A scripted model backend: returns canned responses in order, records
/// every prompt it sees, and tracks created models.
pub struct MockModel {
    responses: Mutex<VecDeque<String>>,
    prompts: Arc<Mutex<Vec<String>>>,
    created: Mutex<Vec<String>>,
    models: Vec<String>,
    fail: bool,
}

impl MockModel {
    pub fn scripted(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Arc::new(Mutex::new(Vec::new())),
            created: Mutex::new(Vec::new()),
            models: Vec::new(),
            fail: false,
        }
    }

    /// A backend whose generate calls always fail.
    pub fn failing() -> Self {
        let mut model = Self::scripted(Vec::new());
        model.fail = true;
        model
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    /// Shared handle to the prompts this model has been asked to complete.
    pub fn prompt_log(&self) -> Arc<Mutex<Vec<String>>> {
        self.prompts.clone()
    }

    pub fn created_models(&self) -> Vec<String> {
        self.created.lock().clone()
    }

    pub fn remaining_responses(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn generate(
        &self,
        _model: &str,
        prompt: &str,
        _options: &ModelOptions,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(NoesisError::Cancelled);
        }
        self.prompts.lock().push(prompt.to_string());
        if self.fail {
            return Err(NoesisError::Internal {
                message: "mock model configured to fail".to_string(),
            });
        }
        Ok(self.responses.lock().pop_front().unwrap_or_default())
    }

    async fn embed(&self, _model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Deterministic pseudo-embeddings: stable per input text.
        Ok(texts
            .iter()
            .map(|text| {
                (0..8u32)
                    .map(|i| {
                        text.bytes()
                            .enumerate()
                            .map(|(j, b)| ((b as u32).wrapping_mul(j as u32 + i + 1) % 101) as f32)
                            .sum::<f32>()
                            / 100.0
                    })
                    .collect()
            })
            .collect())
    }

    async fn create_model(&self, name: &str, _modelfile: &str) -> Result<bool> {
        self.created.lock().push(name.to_string());
        Ok(true)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(self.models.clone())
    }
}

/// Build an [`AgentContext`] over a scripted mock model, returning the
/// context and the shared prompt log.
pub fn mock_context(responses: Vec<String>) -> (AgentContext, Arc<Mutex<Vec<String>>>) {
    let model = MockModel::scripted(responses);
    let prompt_log = model.prompt_log();
    let ctx = AgentContext::new(
        Arc::new(model),
        Arc::new(PromptStore::ephemeral()),
        "mock-model",
    );
    (ctx, prompt_log)
}
