//! Tool layer
//!
//! Tools are the runtime's only way to act on the outside world. They live
//! in a shared registry keyed by name; specialist tools backed by derived
//! micro-models are discovered at runtime and registered under the
//! `Specialist_` prefix.

pub mod browser;
pub mod sandbox_tools;
pub mod web_search;

use crate::error::{NoesisError, Result};
use crate::llm::{LanguageModel, ModelOptions};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Prefix identifying dynamically discovered specialist tools.
pub const SPECIALIST_PREFIX: &str = "Specialist_";

/// A trait for tools the agents can execute.
///
/// Implementations must be `Send + Sync`; execution is always async and
/// must surface failures as values, not panics.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The name of the tool (e.g. "WebBrowser")
    fn name(&self) -> &str;

    /// A brief description, shown to the tool-selection model
    fn description(&self) -> &str;

    /// Execute the tool with the provided input
    async fn use_async(&self, input: &str) -> Result<String>;
}

/// Shared name -> tool map with runtime registration.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().await;
        info!("tool '{}' registered", tool.name());
        tools.insert(tool.name().to_string(), tool);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    pub async fn has(&self, name: &str) -> bool {
        self.tools.read().await.contains_key(name)
    }

    /// Formatted `- name: description` list for tool-selection prompts.
    pub async fn descriptions(&self) -> String {
        let tools = self.tools.read().await;
        let mut lines: Vec<String> = tools
            .values()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect();
        lines.sort();
        lines.join("\n")
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// True when at least one specialist tool has been discovered.
    pub async fn has_specialists(&self) -> bool {
        self.tools
            .read()
            .await
            .keys()
            .any(|name| name.starts_with(SPECIALIST_PREFIX))
    }

    /// Execute a tool by name with error isolation.
    pub async fn execute(&self, name: &str, input: &str) -> Result<String> {
        let tool = self.get(name).await.ok_or_else(|| NoesisError::ToolNotFound {
            tool_name: name.to_string(),
        })?;
        tool.use_async(input)
            .await
            .map_err(|e| NoesisError::ToolExecutionFailed {
                tool_name: name.to_string(),
                error: e.to_string(),
            })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A specialist tool wrapping a derived micro-model.
pub struct SpecialistTool {
    name: String,
    description: String,
    model_name: String,
    llm: Arc<dyn LanguageModel>,
}

impl SpecialistTool {
    pub fn new(
        model_name: impl Into<String>,
        description: impl Into<String>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        let model_name = model_name.into();
        // Model names may contain characters that are invalid in tool names
        let sanitized = model_name.replace([':', '/'], "_");
        Self {
            name: format!("{}{}", SPECIALIST_PREFIX, sanitized),
            description: description.into(),
            model_name,
            llm,
        }
    }
}

#[async_trait]
impl Tool for SpecialistTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn use_async(&self, input: &str) -> Result<String> {
        self.llm
            .generate(
                &self.model_name,
                input,
                &ModelOptions::default(),
                &CancellationToken::new(),
            )
            .await
    }
}
