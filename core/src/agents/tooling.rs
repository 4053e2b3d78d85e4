//! Tool selection agent
//!
//! Given the registry's descriptions and a task, the model picks a tool
//! and an input for it in the `ToolName: tool input` line format.

use super::AgentContext;
use crate::error::{NoesisError, Result};
use tokio_util::sync::CancellationToken;

/// A parsed `ToolName: input` selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolChoice {
    pub tool_name: String,
    pub tool_input: String,
}

pub struct ToolUsingAgent {
    ctx: AgentContext,
}

impl ToolUsingAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    /// Raw selection line from the model.
    pub async fn select_raw(
        &self,
        tools: &str,
        task: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.ctx
            .complete(
                "TOOL_SELECTION_PROMPT",
                &[("tools", tools), ("task", task)],
                cancel,
            )
            .await
    }

    /// Selection parsed into a [`ToolChoice`]. Output not matching the
    /// `ToolName: input` shape is a malformed-output error.
    pub async fn select(
        &self,
        tools: &str,
        task: &str,
        cancel: &CancellationToken,
    ) -> Result<ToolChoice> {
        let raw = self.select_raw(tools, task, cancel).await?;
        parse_tool_choice(&raw)
    }
}

pub fn parse_tool_choice(raw: &str) -> Result<ToolChoice> {
    let line = raw.lines().find(|l| l.contains(": ")).unwrap_or(raw);
    match line.split_once(": ") {
        Some((name, input)) if !name.trim().is_empty() => Ok(ToolChoice {
            tool_name: name.trim().to_string(),
            tool_input: input.trim().to_string(),
        }),
        _ => Err(NoesisError::MalformedOutput {
            reason: format!("tool selection not in 'ToolName: input' form: {:.80}", raw),
        }),
    }
}
