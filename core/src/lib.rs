//! Core library for noesis - a cognitive orchestration runtime
//!
//! # Architecture
//! - `orchestrator` / `engine` / `arbiter`: request-time pipeline
//!   selection, energy-based downgrade, and dispatch
//! - `pipelines` + `cognitive`: the closed set of reasoning strategies and
//!   the retrieve/symbolic/conceptual loop they share
//! - `governor` + `evolution`: idle-time scheduling of self-adaptation
//!   cycles under an evolving goal
//! - `memory`, `tools`, `llm`, `config`: the collaborators everything
//!   else is built from

#![deny(unsafe_code)]

pub mod affect;
pub mod agents;
pub mod analytics;
pub mod arbiter;
pub mod cognitive;
pub mod conceptual;
pub mod config;
pub mod energy;
pub mod engine;
pub mod error;
pub mod evolution;
pub mod governor;
pub mod llm;
pub mod memory;
pub mod models;
pub mod orchestrator;
pub mod pipelines;
pub mod runtime;
pub mod sandbox;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use energy::EnergyManager;
pub use engine::Engine;
pub use error::{NoesisError, Result};
pub use governor::Governor;
pub use models::{ChatRequest, MasterResponse, OrchestrationDecision, PipelineKind};
pub use orchestrator::Orchestrator;
pub use runtime::Runtime;
