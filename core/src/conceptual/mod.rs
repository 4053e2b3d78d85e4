//! Conceptual reasoning in vector space
//!
//! Texts become concept vectors through the sensory unit (the backend's
//! embedding endpoint), the imagination engine combines them in latent
//! space, and the conceptual memory answers nearest-neighbour queries over
//! previously seen concepts.

use crate::error::{NoesisError, Result};
use crate::llm::LanguageModel;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Converts texts into concept vectors via the embedding model.
pub struct SensoryUnit {
    llm: Arc<dyn LanguageModel>,
    embedding_model: String,
}

impl SensoryUnit {
    pub fn new(llm: Arc<dyn LanguageModel>, embedding_model: impl Into<String>) -> Self {
        Self {
            llm,
            embedding_model: embedding_model.into(),
        }
    }

    pub async fn encode_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.llm.embed(&self.embedding_model, texts).await
    }
}

/// Operations over concept vectors in latent space.
pub struct ImaginationEngine;

impl ImaginationEngine {
    /// Weighted sum of concept vectors, L2-normalized.
    pub fn combine_concepts(vectors: &[Vec<f32>], weights: &[f32]) -> Result<Vec<f32>> {
        if vectors.is_empty() || vectors.len() != weights.len() {
            return Err(NoesisError::Internal {
                message: "combine_concepts needs matching, non-empty vectors and weights"
                    .to_string(),
            });
        }
        let dimension = vectors[0].len();
        let mut combined = vec![0.0f32; dimension];
        for (vector, &weight) in vectors.iter().zip(weights) {
            if vector.len() != dimension {
                return Err(NoesisError::Internal {
                    message: "concept vectors have mismatched dimensions".to_string(),
                });
            }
            for (slot, &component) in combined.iter_mut().zip(vector) {
                *slot += component * weight;
            }
        }
        Ok(normalize(combined))
    }

    /// Analogy: what `start_b` is to the transformation `start_a -> end_a`.
    pub fn find_analogy(start_a: &[f32], end_a: &[f32], start_b: &[f32]) -> Vec<f32> {
        let analogy = start_b
            .iter()
            .zip(end_a.iter().zip(start_a))
            .map(|(&b, (&ea, &sa))| b + (ea - sa))
            .collect();
        normalize(analogy)
    }
}

fn normalize(vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|c| c * c).sum::<f32>().sqrt();
    if norm == 0.0 {
        vector
    } else {
        vector.into_iter().map(|c| c / norm).collect()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|c| c * c).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|c| c * c).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// A concept stored with its vector and metadata.
#[derive(Debug, Clone)]
pub struct StoredConcept {
    pub vector: Vec<f32>,
    pub metadata: HashMap<String, String>,
}

/// In-process store of concept vectors with cosine k-NN search.
pub struct ConceptualMemory {
    concepts: RwLock<Vec<StoredConcept>>,
}

impl ConceptualMemory {
    pub fn new() -> Self {
        Self {
            concepts: RwLock::new(Vec::new()),
        }
    }

    pub fn add_concepts(&self, vectors: Vec<Vec<f32>>, metadata: Vec<HashMap<String, String>>) {
        if vectors.len() != metadata.len() {
            warn!("concept vectors and metadata lengths differ; dropping batch");
            return;
        }
        let mut concepts = self.concepts.write();
        for (vector, meta) in vectors.into_iter().zip(metadata) {
            concepts.push(StoredConcept {
                vector,
                metadata: meta,
            });
        }
    }

    /// The k stored concepts most similar to the query vector.
    pub fn search_similar(&self, query: &[f32], k: usize) -> Vec<StoredConcept> {
        let concepts = self.concepts.read();
        let mut scored: Vec<(f32, &StoredConcept)> = concepts
            .iter()
            .map(|c| (cosine_similarity(query, &c.vector), c))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(k).map(|(_, c)| c.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.concepts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.read().is_empty()
    }
}

impl Default for ConceptualMemory {
    fn default() -> Self {
        Self::new()
    }
}
