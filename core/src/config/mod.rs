//! Runtime configuration
//!
//! All settings come from environment variables with sensible defaults, so
//! the binary runs out of the box against a local Ollama instance.

pub mod prompts;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("noesis"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Idle-time scheduling intervals for the governor, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorIntervals {
    pub benchmark_secs: u64,
    pub self_evolution_secs: u64,
    pub autonomous_cycle_secs: u64,
    pub consolidation_cycle_secs: u64,
    pub wisdom_synthesis_secs: u64,
    pub micro_llm_creation_secs: u64,
}

impl Default for GovernorIntervals {
    fn default() -> Self {
        Self {
            benchmark_secs: 3600,
            self_evolution_secs: 60,
            autonomous_cycle_secs: 120,
            consolidation_cycle_secs: 300,
            wisdom_synthesis_secs: 600,
            micro_llm_creation_secs: 3600,
        }
    }
}

impl GovernorIntervals {
    pub fn benchmark(&self) -> Duration {
        Duration::from_secs(self.benchmark_secs)
    }
    pub fn self_evolution(&self) -> Duration {
        Duration::from_secs(self.self_evolution_secs)
    }
    pub fn autonomous_cycle(&self) -> Duration {
        Duration::from_secs(self.autonomous_cycle_secs)
    }
    pub fn consolidation_cycle(&self) -> Duration {
        Duration::from_secs(self.consolidation_cycle_secs)
    }
    pub fn wisdom_synthesis(&self) -> Duration {
        Duration::from_secs(self.wisdom_synthesis_secs)
    }
    pub fn micro_llm_creation(&self) -> Duration {
        Duration::from_secs(self.micro_llm_creation_secs)
    }
}

/// Per-pipeline execution bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Drafts generated in parallel by the speculative pipeline
    pub num_drafts: usize,
    /// Dialogue turns before the internal dialogue is cut off
    pub max_turns: usize,
    /// Retrieval iterations in the cognitive loop
    pub cognitive_loop_max_iterations: usize,
    /// Correction cycles in the iterative correction pipeline
    pub iterative_correction_max_iterations: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            num_drafts: 3,
            max_turns: 5,
            cognitive_loop_max_iterations: 3,
            iterative_correction_max_iterations: 3,
        }
    }
}

/// A fixed persona used by the quantum-inspired pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub persona: String,
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub analytics_port: u16,

    // LLM backend
    pub llm_backend: String,
    pub ollama_host: String,
    pub generation_model: String,
    pub verifier_model: String,
    pub drafter_model: String,
    pub embedding_model: String,

    // Persistence
    pub data_dir: PathBuf,

    // Scheduling and pipeline bounds
    pub intervals: GovernorIntervals,
    pub pipelines: PipelineSettings,

    // Fixed persona list for the quantum pipeline
    pub quantum_personas: Vec<Persona>,

    // Topics the autonomous researcher rotates through
    pub research_topics: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            analytics_port: 8001,
            llm_backend: "ollama".to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            generation_model: "gemma3:latest".to_string(),
            verifier_model: "gemma3:latest".to_string(),
            drafter_model: "gemma3:latest".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            data_dir: default_data_dir(),
            intervals: GovernorIntervals::default(),
            pipelines: PipelineSettings::default(),
            quantum_personas: default_personas(),
            research_topics: default_research_topics(),
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    pub fn load() -> Self {
        let defaults = Config::default();
        Self {
            host: env_string("HOST", &defaults.host),
            port: env_or("PORT", defaults.port),
            analytics_port: env_or("ANALYTICS_PORT", defaults.analytics_port),
            llm_backend: env_string("LLM_BACKEND", &defaults.llm_backend),
            ollama_host: env_string("OLLAMA_HOST", &defaults.ollama_host),
            generation_model: env_string("GENERATION_MODEL", &defaults.generation_model),
            verifier_model: env_string("VERIFIER_MODEL", &defaults.verifier_model),
            drafter_model: env_string("DRAFTER_MODEL", &defaults.drafter_model),
            embedding_model: env_string("EMBEDDING_MODEL", &defaults.embedding_model),
            data_dir: std::env::var("NOESIS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_data_dir()),
            intervals: GovernorIntervals {
                benchmark_secs: env_or(
                    "BENCHMARK_INTERVAL_SECONDS",
                    defaults.intervals.benchmark_secs,
                ),
                self_evolution_secs: env_or(
                    "SELF_EVOLUTION_INTERVAL_SECONDS",
                    defaults.intervals.self_evolution_secs,
                ),
                autonomous_cycle_secs: env_or(
                    "AUTONOMOUS_CYCLE_INTERVAL_SECONDS",
                    defaults.intervals.autonomous_cycle_secs,
                ),
                consolidation_cycle_secs: env_or(
                    "CONSOLIDATION_CYCLE_INTERVAL_SECONDS",
                    defaults.intervals.consolidation_cycle_secs,
                ),
                wisdom_synthesis_secs: env_or(
                    "WISDOM_SYNTHESIS_INTERVAL_SECONDS",
                    defaults.intervals.wisdom_synthesis_secs,
                ),
                micro_llm_creation_secs: env_or(
                    "MICRO_LLM_CREATION_INTERVAL_SECONDS",
                    defaults.intervals.micro_llm_creation_secs,
                ),
            },
            pipelines: PipelineSettings {
                num_drafts: env_or("NUM_DRAFTS", defaults.pipelines.num_drafts),
                max_turns: env_or("MAX_TURNS", defaults.pipelines.max_turns),
                cognitive_loop_max_iterations: env_or(
                    "MAX_ITERATIONS",
                    defaults.pipelines.cognitive_loop_max_iterations,
                ),
                iterative_correction_max_iterations: env_or(
                    "CORRECTION_MAX_ITERATIONS",
                    defaults.pipelines.iterative_correction_max_iterations,
                ),
            },
            quantum_personas: defaults.quantum_personas,
            research_topics: defaults.research_topics,
        }
    }

    pub fn knowledge_graph_path(&self) -> PathBuf {
        self.data_dir.join("memory").join("knowledge_graph.json")
    }

    pub fn memory_log_path(&self) -> PathBuf {
        self.data_dir.join("memory").join("session_memory.jsonl")
    }

    pub fn working_memory_dir(&self) -> PathBuf {
        self.data_dir.join("memory").join("working_memory_sessions")
    }

    pub fn prompts_path(&self) -> PathBuf {
        self.data_dir.join("prompts").join("prompts.json")
    }

    pub fn micro_llm_dir(&self) -> PathBuf {
        self.data_dir.join("memory").join("micro_llms")
    }

    pub fn sandbox_dir(&self) -> PathBuf {
        self.data_dir.join("sandbox")
    }
}

fn default_personas() -> Vec<Persona> {
    [
        (
            "Optimistic Futurist",
            "You are an optimistic futurist who believes in the possibilities of what is to come.",
        ),
        (
            "Skeptical Risk Analyst",
            "You are a skeptical risk analyst who calmly dissects the risks hidden in everything.",
        ),
        (
            "Empathetic Ethicist",
            "You are a highly empathetic ethicist who thinks deeply about how technology affects people.",
        ),
        (
            "Pragmatic Engineer",
            "You are a pragmatic engineer who values workable solutions over theory.",
        ),
    ]
    .into_iter()
    .map(|(name, persona)| Persona {
        name: name.to_string(),
        persona: persona.to_string(),
    })
    .collect()
}

fn default_research_topics() -> Vec<String> {
    [
        "latest AI technology trends",
        "sustainable energy sources",
        "progress in space exploration",
        "healthy diet and exercise",
        "global economic developments",
        "nuclear fusion energy",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intervals() {
        let config = Config::default();
        assert_eq!(config.intervals.self_evolution(), Duration::from_secs(60));
        assert_eq!(config.intervals.autonomous_cycle(), Duration::from_secs(120));
    }

    #[test]
    fn test_derived_paths() {
        let config = Config {
            data_dir: PathBuf::from("/tmp/noesis-test"),
            ..Config::default()
        };
        assert_eq!(
            config.knowledge_graph_path(),
            PathBuf::from("/tmp/noesis-test/memory/knowledge_graph.json")
        );
        assert!(config.prompts_path().ends_with("prompts/prompts.json"));
    }

    #[test]
    fn test_default_personas_nonempty() {
        assert!(!Config::default().quantum_personas.is_empty());
    }
}
