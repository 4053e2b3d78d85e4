//! Micro-LLM expert pipeline
//!
//! Routes a specialist query to the matching `Specialist_` tool, then has
//! a formatter model turn the expert's answer into a natural response.
//! Selection failures produce a fallback response, never re-orchestration.

use super::Pipeline;
use crate::agents::tooling::ToolUsingAgent;
use crate::agents::AgentContext;
use crate::error::Result;
use crate::models::{MasterResponse, OrchestrationDecision, PipelineKind};
use crate::tools::{ToolRegistry, SPECIALIST_PREFIX};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct MicroExpertPipeline {
    formatter_ctx: AgentContext,
    tool_agent: ToolUsingAgent,
    tools: ToolRegistry,
}

impl MicroExpertPipeline {
    pub fn new(formatter_ctx: AgentContext, tool_agent: ToolUsingAgent, tools: ToolRegistry) -> Self {
        Self {
            formatter_ctx,
            tool_agent,
            tools,
        }
    }

    fn no_expert_response(selection: &str) -> MasterResponse {
        MasterResponse {
            final_answer:
                "We apologize - no specialist capable of answering this question was found."
                    .to_string(),
            self_criticism: String::new(),
            potential_problems:
                "The matching micro model may not have been created yet, or the selection \
                 output was unusable."
                    .to_string(),
            retrieved_info: format!("Tool selection result: {}", selection),
        }
    }
}

#[async_trait]
impl Pipeline for MicroExpertPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::MicroLlmExpert
    }

    async fn run(
        &self,
        query: &str,
        _decision: &OrchestrationDecision,
        cancel: &CancellationToken,
    ) -> Result<MasterResponse> {
        let descriptions = self.tools.descriptions().await;
        let raw_selection = self
            .tool_agent
            .select_raw(&descriptions, query, cancel)
            .await?;

        let choice = match crate::agents::tooling::parse_tool_choice(&raw_selection) {
            Ok(choice) if choice.tool_name.starts_with(SPECIALIST_PREFIX) => choice,
            Ok(choice) => {
                warn!(tool = %choice.tool_name, "selected tool is not a specialist");
                return Ok(Self::no_expert_response(&raw_selection));
            }
            Err(_) => {
                warn!("specialist selection output was malformed");
                return Ok(Self::no_expert_response(&raw_selection));
            }
        };

        let Some(expert_tool) = self.tools.get(&choice.tool_name).await else {
            error!(tool = %choice.tool_name, "selected specialist is not registered");
            return Ok(Self::no_expert_response(&raw_selection));
        };

        info!(tool = %choice.tool_name, "running specialist tool");
        let expert_answer = expert_tool.use_async(&choice.tool_input).await?;

        let final_answer = self
            .formatter_ctx
            .complete(
                "EXPERT_FORMATTER_PROMPT",
                &[("user_query", query), ("expert_answer", expert_answer.as_str())],
                cancel,
            )
            .await?;

        Ok(MasterResponse {
            final_answer,
            self_criticism: String::new(),
            potential_problems:
                "A narrowly scoped expert answer can leave the formatted response short on \
                 context."
                    .to_string(),
            retrieved_info: format!(
                "Specialist tool '{}' was used.\nExpert answer:\n{}",
                choice.tool_name, expert_answer
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::prompts::PromptStore;
    use crate::testing::MockModel;
    use crate::tools::SpecialistTool;
    use std::sync::Arc;

    async fn build(
        responses: Vec<String>,
        with_specialist: bool,
    ) -> MicroExpertPipeline {
        let llm: Arc<dyn crate::llm::LanguageModel> = Arc::new(MockModel::scripted(responses));
        let ctx = AgentContext::new(llm.clone(), Arc::new(PromptStore::ephemeral()), "mock");
        let tools = ToolRegistry::new();
        if with_specialist {
            tools
                .register(Arc::new(SpecialistTool::new(
                    "noesis-micro-astronomy",
                    "expert on astronomy",
                    llm,
                )))
                .await;
        }
        MicroExpertPipeline::new(ctx.clone(), ToolUsingAgent::new(ctx), tools)
    }

    fn decision() -> OrchestrationDecision {
        OrchestrationDecision::new(PipelineKind::MicroLlmExpert, "t", 0.95)
    }

    #[tokio::test]
    async fn test_specialist_answer_is_formatted() {
        // selection, specialist generation, formatter.
        let pipeline = build(
            vec![
                "Specialist_noesis-micro-astronomy: how far is the moon".to_string(),
                "384 thousand km".to_string(),
                "The moon is about 384,000 km away.".to_string(),
            ],
            true,
        )
        .await;

        let response = pipeline
            .run("how far is the moon?", &decision(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(response.final_answer.contains("384,000"));
        assert!(response.retrieved_info.contains("Specialist_noesis-micro-astronomy"));
    }

    #[tokio::test]
    async fn test_non_specialist_selection_falls_back() {
        let pipeline = build(vec!["WebBrowser: https://moon.example".to_string()], true).await;
        let response = pipeline
            .run("how far is the moon?", &decision(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(response.final_answer.contains("no specialist"));
    }

    #[tokio::test]
    async fn test_missing_specialist_tool_falls_back() {
        let pipeline = build(
            vec!["Specialist_nonexistent: anything".to_string()],
            false,
        )
        .await;
        let response = pipeline
            .run("q", &decision(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(response.final_answer.contains("no specialist"));
    }
}
