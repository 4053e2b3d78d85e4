//! Language model provider abstraction
//!
//! Every external model call in the runtime goes through [`LanguageModel`],
//! so pipelines never assume a concrete backend. The backend is selected by
//! the `LLM_BACKEND` configuration value.

pub mod ollama;

use crate::error::{NoesisError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-call generation options.
#[derive(Debug, Clone, Default)]
pub struct ModelOptions {
    pub temperature: Option<f64>,
}

impl ModelOptions {
    pub fn with_temperature(temperature: f64) -> Self {
        Self {
            temperature: Some(temperature),
        }
    }
}

/// A model execution backend. All methods are awaitable and cancellable;
/// implementations must return [`NoesisError::Cancelled`] once the token
/// fires instead of completing the call.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run a completion on the named model.
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &ModelOptions,
        cancel: &CancellationToken,
    ) -> Result<String>;

    /// Embed a batch of texts into concept vectors.
    async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Create (fine-tune) a derived model from a modelfile definition.
    async fn create_model(&self, name: &str, modelfile: &str) -> Result<bool>;

    /// Names of the models available on the backend.
    async fn list_models(&self) -> Result<Vec<String>>;
}

/// Construct the backend selected by `llm_backend`.
pub fn build_backend(backend: &str, host: &str) -> Result<Arc<dyn LanguageModel>> {
    match backend {
        "ollama" => Ok(Arc::new(ollama::OllamaBackend::new(host)?)),
        other => Err(NoesisError::InvalidConfig {
            message: format!("unknown LLM backend '{}'", other),
        }),
    }
}
