//! Typed agents
//!
//! An agent is a stateless call composing a named prompt template with a
//! model handle and a parse of the result. [`AgentContext`] carries the
//! shared pieces; each agent struct adds its input/output typing.
//!
//! Model JSON rarely arrives clean, so parsing strips code fences and
//! slices out the first JSON value before deserializing.

pub mod dialogue;
pub mod evaluation;
pub mod improvement;
pub mod knowledge;
pub mod master;
pub mod reasoning;
pub mod tooling;

use crate::config::prompts::PromptStore;
use crate::error::{NoesisError, Result};
use crate::llm::{LanguageModel, ModelOptions};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared state threaded through every agent: the model backend, the
/// prompt repository and the model this agent generation runs on.
#[derive(Clone)]
pub struct AgentContext {
    pub llm: Arc<dyn LanguageModel>,
    pub prompts: Arc<PromptStore>,
    pub model: String,
    pub options: ModelOptions,
}

impl AgentContext {
    pub fn new(llm: Arc<dyn LanguageModel>, prompts: Arc<PromptStore>, model: impl Into<String>) -> Self {
        Self {
            llm,
            prompts,
            model: model.into(),
            options: ModelOptions::default(),
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.options = ModelOptions::with_temperature(temperature);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Render the named prompt with `vars` and run a completion.
    pub async fn complete(
        &self,
        prompt_name: &str,
        vars: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(NoesisError::Cancelled);
        }
        let prompt = self.prompts.render(prompt_name, vars)?;
        let output = self
            .llm
            .generate(&self.model, &prompt, &self.options, cancel)
            .await?;
        Ok(output.trim().to_string())
    }

    /// Like [`complete`](Self::complete), parsing the output as JSON into `T`.
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        prompt_name: &str,
        vars: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<T> {
        let output = self.complete(prompt_name, vars, cancel).await?;
        parse_json_output(&output)
    }
}

/// Parse a model's output as JSON, tolerating code fences and prose around
/// the value.
pub fn parse_json_output<T: DeserializeOwned>(output: &str) -> Result<T> {
    let cleaned = strip_code_fences(output);

    if let Ok(value) = serde_json::from_str(cleaned.trim()) {
        return Ok(value);
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (cleaned.find(open), cleaned.rfind(close)) {
            if start < end {
                if let Ok(value) = serde_json::from_str(&cleaned[start..=end]) {
                    return Ok(value);
                }
            }
        }
    }

    Err(NoesisError::MalformedOutput {
        reason: format!("no JSON value found in model output: {:.120}", output),
    })
}

fn strip_code_fences(output: &str) -> String {
    let trimmed = output.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
        if let Some(end) = rest.rfind("```") {
            return rest[..end].trim().to_string();
        }
    }
    trimmed.to_string()
}
