//! Micro-model lifecycle
//!
//! Creates small specialist models from topic-relevant knowledge-graph
//! content and registers them as `Specialist_` tools so the orchestrator
//! can route matching queries straight to them.

use crate::error::Result;
use crate::llm::LanguageModel;
use crate::memory::knowledge_graph::PersistentKnowledgeGraph;
use crate::tools::{SpecialistTool, Tool, ToolRegistry};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Name prefix for derived specialist models.
pub const MICRO_MODEL_PREFIX: &str = "noesis-micro-";

pub struct SpecializedModel {
    pub name: String,
    pub topic: String,
}

pub struct MicroLlmManager {
    llm: Arc<dyn LanguageModel>,
    knowledge_graph: Arc<PersistentKnowledgeGraph>,
    tools: ToolRegistry,
    base_model: String,
    model_dir: PathBuf,
}

impl MicroLlmManager {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        knowledge_graph: Arc<PersistentKnowledgeGraph>,
        tools: ToolRegistry,
        base_model: impl Into<String>,
        model_dir: PathBuf,
    ) -> Self {
        Self {
            llm,
            knowledge_graph,
            tools,
            base_model: base_model.into(),
            model_dir,
        }
    }

    fn model_name_for_topic(topic: &str) -> String {
        let slug = topic
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        format!("{}{}", MICRO_MODEL_PREFIX, slug)
    }

    fn topic_from_model_name(name: &str) -> Option<String> {
        let slug = name.strip_prefix(MICRO_MODEL_PREFIX)?;
        let slug = slug.split(':').next().unwrap_or(slug);
        Some(slug.replace('-', " "))
    }

    /// Specialist models currently present on the backend.
    pub async fn specialized_models(&self) -> Vec<SpecializedModel> {
        match self.llm.list_models().await {
            Ok(models) => models
                .into_iter()
                .filter_map(|name| {
                    Self::topic_from_model_name(&name).map(|topic| SpecializedModel { name, topic })
                })
                .collect(),
            Err(e) => {
                warn!("could not scan backend for specialist models: {}", e);
                Vec::new()
            }
        }
    }

    /// Register a `Specialist_` tool for every specialist model found on
    /// the backend.
    pub async fn load_specialist_tools(&self) {
        let models = self.specialized_models().await;
        for model in models {
            let description = format!(
                "Specialist tool for answering detailed questions about {}.",
                model.topic
            );
            let tool = SpecialistTool::new(model.name.clone(), description, self.llm.clone());
            if !self.tools.has(tool.name()).await {
                info!(model = model.name, "specialist tool loaded");
                self.tools.register(Arc::new(tool)).await;
            }
        }
    }

    /// Extract topic knowledge from the graph, write a modelfile, create
    /// the derived model, and register its tool. Returns the model name
    /// when a model was created.
    pub async fn run_creation_cycle(&self, topic: &str) -> Result<Option<String>> {
        info!(topic, "micro model creation cycle started");

        let relevant_nodes = self.knowledge_graph.nodes_matching(topic);
        if relevant_nodes.is_empty() {
            warn!(topic, "no knowledge found in the graph for topic");
            return Ok(None);
        }

        let knowledge_text = relevant_nodes
            .iter()
            .map(|node| serde_json::to_string(node).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\n");

        let model_name = Self::model_name_for_topic(topic);
        let modelfile = format!(
            "FROM {base}\n\
             SYSTEM \"\"\"You are the world's leading expert on \"{topic}\". Answer \
             concisely and accurately based on the knowledge provided.\n\n\
             Provided knowledge:\n{knowledge}\n\"\"\"\n\
             PARAMETER temperature 0.3\n\
             PARAMETER top_k 20\n",
            base = self.base_model,
            topic = topic,
            knowledge = knowledge_text,
        );

        fs::create_dir_all(&self.model_dir)?;
        let modelfile_path = self.model_dir.join(format!("Modelfile.{}", model_name));
        fs::write(&modelfile_path, &modelfile)?;

        if !self.llm.create_model(&model_name, &modelfile).await? {
            warn!(model_name, "backend refused to create the micro model");
            return Ok(None);
        }

        let description = format!(
            "Specialist tool for answering detailed questions about {}.",
            topic
        );
        self.tools
            .register(Arc::new(SpecialistTool::new(
                model_name.clone(),
                description,
                self.llm.clone(),
            )))
            .await;

        info!(model_name, "micro model created and registered");
        Ok(Some(model_name))
    }
}
