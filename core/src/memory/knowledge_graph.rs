//! Persistent knowledge graph
//!
//! Long-term structured memory. Fragments produced by the knowledge-graph
//! agent are merged in: nodes are deduplicated by id, edges are keyed by
//! (source, label, target) and their weights add up on repeat observation,
//! so frequently re-derived relations grow stronger. Saves are atomic
//! (write temp, fsync, rename).

use crate::error::Result;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        let now = Value::String(Utc::now().to_rfc3339());
        let mut metadata = HashMap::new();
        metadata.insert("created_at".to_string(), now.clone());
        metadata.insert("last_accessed".to_string(), now);
        Self {
            id: id.into(),
            label: label.into(),
            properties: HashMap::new(),
            metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub label: String,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl GraphEdge {
    pub fn new(
        source: impl Into<String>,
        label: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: label.into(),
            properties: HashMap::new(),
            weight: 1.0,
        }
    }

    fn key(&self) -> String {
        format!("{}-{}-{}", self.source, self.label, self.target)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl KnowledgeGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Human-readable rendering used in synthesis prompts.
    pub fn to_text(&self) -> String {
        if self.is_empty() {
            return "The knowledge graph is empty.".to_string();
        }

        let nodes = self
            .nodes
            .iter()
            .map(|n| format!("- node: {} (label: {})", n.id, n.label))
            .collect::<Vec<_>>()
            .join("\n");
        let edges = self
            .edges
            .iter()
            .map(|e| {
                format!(
                    "- relation: ({})-[{} (weight: {:.2})]->({})",
                    e.source, e.label, e.weight, e.target
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!("[nodes]\n{}\n\n[relations]\n{}", nodes, edges)
    }
}

pub struct PersistentKnowledgeGraph {
    path: PathBuf,
    graph: RwLock<KnowledgeGraph>,
}

impl PersistentKnowledgeGraph {
    /// Load the graph from `path`, starting empty when the file is missing
    /// or unreadable.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let graph = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(graph) => graph,
                Err(e) => {
                    warn!("failed to parse knowledge graph {}: {}; starting fresh", path.display(), e);
                    KnowledgeGraph::default()
                }
            },
            Err(_) => KnowledgeGraph::default(),
        };
        Self {
            path,
            graph: RwLock::new(graph),
        }
    }

    /// Merge a fragment: new nodes are appended when their id is unseen,
    /// edge weights add up on a (source, label, target) match.
    pub fn merge(&self, fragment: KnowledgeGraph) {
        if fragment.is_empty() {
            warn!("merge called with an empty knowledge graph fragment");
            return;
        }

        let mut graph = self.graph.write();

        let mut existing_ids: HashSet<String> =
            graph.nodes.iter().map(|n| n.id.clone()).collect();
        for node in fragment.nodes {
            if existing_ids.insert(node.id.clone()) {
                graph.nodes.push(node);
            }
        }

        let mut edge_index: HashMap<String, usize> = graph
            .edges
            .iter()
            .enumerate()
            .map(|(i, e)| (e.key(), i))
            .collect();
        for edge in fragment.edges {
            match edge_index.get(&edge.key()) {
                Some(&i) => {
                    graph.edges[i].weight += edge.weight;
                }
                None => {
                    edge_index.insert(edge.key(), graph.edges.len());
                    graph.edges.push(edge);
                }
            }
        }

        info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "knowledge graph merged"
        );
    }

    /// Persist the graph atomically.
    pub fn save(&self) -> Result<()> {
        let serialized = {
            let graph = self.graph.read();
            serde_json::to_string_pretty(&*graph)?
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(serialized.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Short textual summary used by gap analysis and wisdom prompts.
    pub fn get_summary(&self) -> String {
        let graph = self.graph.read();
        if graph.is_empty() {
            return "The knowledge graph is empty.".to_string();
        }

        let mut labels: Vec<String> = graph
            .nodes
            .iter()
            .take(5)
            .map(|n| n.label.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        labels.sort();

        format!(
            "The knowledge graph holds {} nodes and {} edges. Main entity categories: {:?}",
            graph.nodes.len(),
            graph.edges.len(),
            labels
        )
    }

    /// Touch a node's last-accessed timestamp.
    pub fn access_node(&self, node_id: &str) {
        let mut graph = self.graph.write();
        if let Some(node) = graph.nodes.iter_mut().find(|n| n.id == node_id) {
            node.metadata.insert(
                "last_accessed".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }
    }

    pub fn snapshot(&self) -> KnowledgeGraph {
        self.graph.read().clone()
    }

    /// Nodes whose id or label mentions the topic (case-insensitive).
    pub fn nodes_matching(&self, topic: &str) -> Vec<GraphNode> {
        let needle = topic.to_lowercase();
        self.graph
            .read()
            .nodes
            .iter()
            .filter(|n| {
                n.id.to_lowercase().contains(&needle) || n.label.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }
}
