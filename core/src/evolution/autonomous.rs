//! Autonomous research
//!
//! When the goal is exploration, the researcher picks a topic, gathers
//! material through the web search tool, synthesizes it into facts, and
//! files those facts into the vector store and the memory log.

use crate::agents::AgentContext;
use crate::memory::log::MemoryLog;
use crate::memory::vector::{Document, VectorStore};
use crate::tools::web_search::WEB_SEARCH_TOOL_NAME;
use crate::tools::ToolRegistry;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct AutonomousResearcher {
    ctx: AgentContext,
    memory_log: Arc<MemoryLog>,
    vector_store: Arc<dyn VectorStore>,
    tools: ToolRegistry,
    topics: Vec<String>,
}

impl AutonomousResearcher {
    pub fn new(
        ctx: AgentContext,
        memory_log: Arc<MemoryLog>,
        vector_store: Arc<dyn VectorStore>,
        tools: ToolRegistry,
        topics: Vec<String>,
    ) -> Self {
        Self {
            ctx,
            memory_log,
            vector_store,
            tools,
            topics,
        }
    }

    fn pick_topic(&self) -> String {
        self.topics
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| {
                warn!("no research topics configured; using the default");
                "the future of artificial intelligence".to_string()
            })
    }

    /// One gather-synthesize-store cycle. Failures abort the cycle; they
    /// never propagate to the governor.
    pub async fn run_cycle(&self, cancel: &CancellationToken) {
        let topic = self.pick_topic();
        info!(topic, "autonomous research cycle started");

        let Some(search) = self.tools.get(WEB_SEARCH_TOOL_NAME).await else {
            error!("web search tool is unavailable; aborting the research cycle");
            return;
        };

        let gathered = match search.use_async(&topic).await {
            Ok(gathered) if !gathered.trim().is_empty() => gathered,
            Ok(_) => {
                warn!(topic, "search returned nothing; aborting the research cycle");
                return;
            }
            Err(e) => {
                error!("information gathering failed: {}", e);
                return;
            }
        };

        let synthesized = match self
            .ctx
            .complete(
                "RESEARCH_SYNTHESIS_PROMPT",
                &[("topic", topic.as_str()), ("information", gathered.as_str())],
                cancel,
            )
            .await
        {
            Ok(synthesized) if !synthesized.trim().is_empty() => synthesized,
            Ok(_) => return,
            Err(e) => {
                error!("knowledge synthesis failed: {}", e);
                return;
            }
        };

        let document = Document::with_source(
            synthesized.clone(),
            format!("autonomous_research_{}", topic),
        );
        if let Err(e) = self.vector_store.add_documents(vec![document]).await {
            error!("failed to store researched knowledge: {}", e);
        }

        if let Err(e) = self.memory_log.log_autonomous_thought(&topic, &synthesized) {
            error!("failed to log the autonomous thought: {}", e);
        }
        info!(topic, "autonomous research cycle completed");
    }
}
