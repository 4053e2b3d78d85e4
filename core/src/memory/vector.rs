//! Vector store collaborator interface
//!
//! The runtime only depends on the retrieve/add contract; the index itself
//! is an external concern. `InMemoryVectorStore` is the default wiring: a
//! token-overlap ranking over an in-process document list, good enough for
//! the retrieval loop's evaluate-and-refine cycle and for tests.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_source(content: impl Into<String>, source: impl Into<String>) -> Self {
        let mut doc = Self::new(content);
        doc.metadata.insert("source".to_string(), source.into());
        doc
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Retrieve documents relevant to the query, best first.
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>>;

    /// Add documents to the store.
    async fn add_documents(&self, documents: Vec<Document>) -> Result<()>;
}

pub struct InMemoryVectorStore {
    documents: RwLock<Vec<Document>>,
    top_k: usize,
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_string)
        .collect()
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            top_k: 4,
        }
    }

    pub fn with_documents(documents: Vec<Document>) -> Self {
        Self {
            documents: RwLock::new(documents),
            top_k: 4,
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let documents = self.documents.read().await;
        let mut scored: Vec<(usize, &Document)> = documents
            .iter()
            .map(|doc| {
                let doc_tokens = tokenize(&doc.content);
                let overlap = query_tokens.intersection(&doc_tokens).count();
                (overlap, doc)
            })
            .filter(|(score, _)| *score > 0)
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(self.top_k)
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn add_documents(&self, mut new_documents: Vec<Document>) -> Result<()> {
        let mut documents = self.documents.write().await;
        documents.append(&mut new_documents);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_retrieve_ranks_by_overlap() {
        let store = InMemoryVectorStore::with_documents(vec![
            Document::new("rust is a systems programming language"),
            Document::new("the weather today is sunny"),
            Document::new("rust programming favors ownership and borrowing"),
        ]);

        let results = store.retrieve("rust programming language").await.unwrap();
        assert!(!results.is_empty());
        assert!(results[0].content.contains("systems programming"));
        assert!(results.iter().all(|d| !d.content.contains("weather")));
    }

    #[tokio::test]
    async fn test_retrieve_empty_store_returns_nothing() {
        let store = InMemoryVectorStore::new();
        let results = store.retrieve("anything at all").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_added_documents_become_retrievable() {
        let store = InMemoryVectorStore::new();
        store
            .add_documents(vec![Document::with_source(
                "fusion reactors confine plasma with magnetic fields",
                "autonomous_research",
            )])
            .await
            .unwrap();

        let results = store.retrieve("fusion plasma").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].metadata.get("source").map(String::as_str),
            Some("autonomous_research")
        );
    }
}
