//! Sandbox-backed tools
//!
//! Expose the sandbox manager to the tool-selection model: one tool runs
//! commands, another inspects the activity log.

use super::Tool;
use crate::error::Result;
use crate::sandbox::SandboxManager;
use async_trait::async_trait;
use std::sync::Arc;

pub const SANDBOX_COMMAND_TOOL_NAME: &str = "SandboxCommand";
pub const SANDBOX_LOG_TOOL_NAME: &str = "SandboxLogViewer";

pub struct SandboxCommandTool {
    sandbox: Arc<SandboxManager>,
}

impl SandboxCommandTool {
    pub fn new(sandbox: Arc<SandboxManager>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for SandboxCommandTool {
    fn name(&self) -> &str {
        SANDBOX_COMMAND_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Executes a shell command inside the isolated sandbox and returns its output."
    }

    async fn use_async(&self, input: &str) -> Result<String> {
        let (exit_code, output) = self.sandbox.execute_command(input).await;
        Ok(format!("exit code: {}\n{}", exit_code, output))
    }
}

pub struct SandboxLogTool {
    sandbox: Arc<SandboxManager>,
}

impl SandboxLogTool {
    pub fn new(sandbox: Arc<SandboxManager>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for SandboxLogTool {
    fn name(&self) -> &str {
        SANDBOX_LOG_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Shows the most recent sandbox command history with outcomes."
    }

    async fn use_async(&self, input: &str) -> Result<String> {
        let limit = input.trim().parse().unwrap_or(10);
        let lines = self.sandbox.recent_activity(limit);
        if lines.is_empty() {
            Ok("No sandbox activity recorded yet.".to_string())
        } else {
            Ok(lines.join("\n"))
        }
    }
}
