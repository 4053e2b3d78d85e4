//! Performance benchmark
//!
//! Standardized tasks run through the engine to measure answer accuracy
//! and latency. The engine is wired after construction because the
//! benchmark is itself part of the engine's surroundings.

use crate::engine::Engine;
use crate::models::{OrchestrationDecision, PipelineKind, ReasoningEmphasis};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

struct BenchmarkTask {
    name: &'static str,
    query: &'static str,
    expected_keywords: &'static [&'static str],
    mode: PipelineKind,
}

const TASKS: &[BenchmarkTask] = &[
    BenchmarkTask {
        name: "Logical Puzzle",
        query: "A farmer must ferry a fox, a chicken and a bag of grain across a river, \
                never leaving the fox with the chicken or the chicken with the grain \
                unattended. Explain how.",
        expected_keywords: &["boat", "one at a time", "bring the chicken back"],
        mode: PipelineKind::Full,
    },
    BenchmarkTask {
        name: "Comparison",
        query: "Compare interpreted and compiled languages in three concise bullet points.",
        expected_keywords: &["compile", "runtime", "performance"],
        mode: PipelineKind::Simple,
    },
];

/// Latency above this many seconds starts to discount the overall score.
const TIME_PENALTY_FLOOR_SECS: f64 = 10.0;

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkSummary {
    pub total_tasks: usize,
    pub successful_tasks: usize,
    pub average_execution_time: f64,
    pub average_accuracy: f64,
    pub overall_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub summary: BenchmarkSummary,
    pub details: Value,
}

pub struct PerformanceBenchmark {
    engine: OnceLock<Arc<Engine>>,
}

impl PerformanceBenchmark {
    pub fn new() -> Self {
        Self {
            engine: OnceLock::new(),
        }
    }

    /// One-shot post-construction wiring of the engine.
    pub fn set_engine(&self, engine: Arc<Engine>) {
        if self.engine.set(engine).is_err() {
            warn!("benchmark engine was already wired; ignoring the second one");
        }
    }

    pub async fn run_benchmarks(&self, cancel: &CancellationToken) -> BenchmarkReport {
        let Some(engine) = self.engine.get() else {
            error!("benchmark invoked before the engine was wired");
            return BenchmarkReport {
                summary: BenchmarkSummary {
                    total_tasks: 0,
                    successful_tasks: 0,
                    average_execution_time: 0.0,
                    average_accuracy: 0.0,
                    overall_score: 0.0,
                },
                details: json!({}),
            };
        };

        info!("performance benchmark started");
        let mut details = serde_json::Map::new();
        let mut total_time = 0.0;
        let mut total_accuracy = 0.0;
        let mut successful = 0usize;

        for task in TASKS {
            info!(task = task.name, "running benchmark task");
            let mut decision =
                OrchestrationDecision::new(task.mode, format!("Benchmark task: {}", task.name), 1.0);
            decision.set_reasoning_emphasis(Some(ReasoningEmphasis::DetailOriented));

            let started = Instant::now();
            let response = engine.run(task.query, decision, cancel).await;
            let elapsed = started.elapsed().as_secs_f64();
            total_time += elapsed;

            let answer_lower = response.final_answer.to_lowercase();
            let hits = task
                .expected_keywords
                .iter()
                .filter(|kw| answer_lower.contains(&kw.to_lowercase()))
                .count();
            let accuracy = hits as f64 / task.expected_keywords.len() as f64;
            total_accuracy += accuracy;
            successful += 1;

            let mut preview: String = response.final_answer.chars().take(100).collect();
            if preview.len() < response.final_answer.len() {
                preview.push_str("...");
            }
            details.insert(
                task.name.to_string(),
                json!({
                    "execution_time_seconds": (elapsed * 100.0).round() / 100.0,
                    "accuracy": (accuracy * 100.0).round() / 100.0,
                    "success": true,
                    "output_preview": preview,
                }),
            );
        }

        let total_tasks = TASKS.len();
        let avg_time = if total_tasks > 0 {
            total_time / total_tasks as f64
        } else {
            0.0
        };
        let avg_accuracy = if successful > 0 {
            total_accuracy / successful as f64
        } else {
            0.0
        };
        let time_penalty = ((avg_time - TIME_PENALTY_FLOOR_SECS) / TIME_PENALTY_FLOOR_SECS).max(0.0);
        let overall_score = avg_accuracy * (1.0 - time_penalty).max(0.0);

        let summary = BenchmarkSummary {
            total_tasks,
            successful_tasks: successful,
            average_execution_time: (avg_time * 100.0).round() / 100.0,
            average_accuracy: (avg_accuracy * 100.0).round() / 100.0,
            overall_score: (overall_score * 100.0).round() / 100.0,
        };
        info!(
            overall_score = summary.overall_score,
            avg_time = summary.average_execution_time,
            "performance benchmark finished"
        );

        BenchmarkReport {
            summary,
            details: Value::Object(details),
        }
    }
}

impl Default for PerformanceBenchmark {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::ResourceArbiter;
    use crate::energy::EnergyManager;
    use crate::error::Result;
    use crate::models::MasterResponse;
    use crate::pipelines::{into_map, Pipeline};
    use async_trait::async_trait;

    struct KeywordPipeline {
        kind: PipelineKind,
        answer: &'static str,
    }

    #[async_trait]
    impl Pipeline for KeywordPipeline {
        fn kind(&self) -> PipelineKind {
            self.kind
        }
        async fn run(
            &self,
            _query: &str,
            _decision: &OrchestrationDecision,
            _cancel: &CancellationToken,
        ) -> Result<MasterResponse> {
            Ok(MasterResponse {
                final_answer: self.answer.to_string(),
                self_criticism: String::new(),
                potential_problems: String::new(),
                retrieved_info: String::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_benchmark_scores_keyword_hits() {
        let benchmark = PerformanceBenchmark::new();
        let energy = Arc::new(EnergyManager::new(100.0, 1.0));
        let engine = Arc::new(Engine::new(
            into_map(vec![
                Arc::new(KeywordPipeline {
                    kind: PipelineKind::Full,
                    answer: "Use the boat, one at a time, and bring the chicken back first.",
                }),
                Arc::new(KeywordPipeline {
                    kind: PipelineKind::Simple,
                    answer: "Compiled languages compile ahead of time; interpreted ones pay at \
                             runtime; performance differs.",
                }),
            ]),
            ResourceArbiter::new(energy),
        ));
        benchmark.set_engine(engine);

        let report = benchmark.run_benchmarks(&CancellationToken::new()).await;
        assert_eq!(report.summary.total_tasks, 2);
        assert_eq!(report.summary.successful_tasks, 2);
        assert!((report.summary.average_accuracy - 1.0).abs() < 1e-9);
        assert!(report.summary.overall_score > 0.9);
        assert!(report.details.get("Logical Puzzle").is_some());
    }

    #[tokio::test]
    async fn test_unwired_benchmark_reports_zero() {
        let benchmark = PerformanceBenchmark::new();
        let report = benchmark.run_benchmarks(&CancellationToken::new()).await;
        assert_eq!(report.summary.total_tasks, 0);
        assert!((report.summary.overall_score).abs() < f64::EPSILON);
    }
}
