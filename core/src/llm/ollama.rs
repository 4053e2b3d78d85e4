//! Ollama backend
//!
//! Talks to a local Ollama daemon over its HTTP API. Completions go through
//! `/api/generate`, embeddings through `/api/embeddings`, model creation
//! through `/api/create` and discovery through `/api/tags`.

use super::{LanguageModel, ModelOptions};
use crate::error::{NoesisError, Result};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct OllamaBackend {
    host: String,
    http_client: HttpClient,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

impl OllamaBackend {
    pub fn new(host: &str) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(300))
            .user_agent("noesis/0.2")
            .build()
            .map_err(|e| NoesisError::Internal {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NoesisError::BackendError {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl LanguageModel for OllamaBackend {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &ModelOptions,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(NoesisError::Cancelled);
        }

        let mut body = json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
        });
        if let Some(temperature) = options.temperature {
            body["options"] = json!({ "temperature": temperature });
        }

        debug!(model, prompt_len = prompt.len(), "ollama generate");
        let request = self.http_client.post(self.url("/api/generate")).json(&body);

        let response = tokio::select! {
            result = request.send() => Self::check_status(result?).await?,
            _ = cancel.cancelled() => return Err(NoesisError::Cancelled),
        };

        let parsed: GenerateResponse = tokio::select! {
            result = response.json() => result?,
            _ = cancel.cancelled() => return Err(NoesisError::Cancelled),
        };
        Ok(parsed.response)
    }

    async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            let body = json!({ "model": model, "prompt": text });
            let response = self
                .http_client
                .post(self.url("/api/embeddings"))
                .json(&body)
                .send()
                .await?;
            let parsed: EmbeddingResponse = Self::check_status(response).await?.json().await?;
            embeddings.push(parsed.embedding);
        }
        Ok(embeddings)
    }

    async fn create_model(&self, name: &str, modelfile: &str) -> Result<bool> {
        let body = json!({
            "name": name,
            "modelfile": modelfile,
            "stream": false,
        });
        let response = self
            .http_client
            .post(self.url("/api/create"))
            .json(&body)
            .send()
            .await?;
        match Self::check_status(response).await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!("model creation for '{}' failed: {}", name, e);
                Ok(false)
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .http_client
            .get(self.url("/api/tags"))
            .send()
            .await?;
        let parsed: TagsResponse = Self::check_status(response).await?.json().await?;
        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}
