//! Symbolic reasoning
//!
//! A hypothesis-generate / verify / deduce loop inspired by geometry
//! solvers: the model proposes one construction per iteration, a
//! rule-driven verifier closes over the fact set, and a deductive reasoner
//! states the strongest current conclusion. The loop stops early when the
//! conclusion carries a proof marker.

use crate::agents::AgentContext;
use crate::error::Result;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Plan markers that select the symbolic branch of the cognitive loop.
pub const SYMBOLIC_PLAN_MARKERS: &[&str] = &["記号的検証", "数学的証明"];

/// Conclusion markers that end the loop early.
pub const CONCLUSION_MARKERS: &[&str] = &["結論として", "証明された"];

const MAX_ITERATIONS: usize = 5;

lazy_static! {
    static ref CONNECT_RE: Regex = Regex::new(r"点(\S+)と点(\S+)を結ぶ").unwrap();
}

/// Pattern-driven deductive closure over a set of textual facts.
pub struct SymbolicVerifier;

impl SymbolicVerifier {
    /// Deduce new facts implied by the current set. Returns only facts not
    /// already present.
    pub fn verify_and_deduce(facts: &BTreeSet<String>) -> BTreeSet<String> {
        let mut deduced = BTreeSet::new();
        for fact in facts {
            // Connecting two points yields the segment between them.
            if let Some(captures) = CONNECT_RE.captures(fact) {
                let segment = format!(
                    "線分{}{}が存在する",
                    &captures[1], &captures[2]
                );
                if !facts.contains(&segment) {
                    deduced.insert(segment);
                }
            }
        }
        deduced
    }

    /// True when a plan requests the symbolic branch.
    pub fn plan_requests_symbolic(plan: &str) -> bool {
        SYMBOLIC_PLAN_MARKERS.iter().any(|m| plan.contains(m))
    }

    /// True when a conclusion text signals the proof is done.
    pub fn is_final_conclusion(conclusion: &str) -> bool {
        CONCLUSION_MARKERS.iter().any(|m| conclusion.contains(m))
    }
}

/// Runs the bounded hypothesis/verify/deduce loop and returns the full
/// reasoning trace as the loop output.
pub struct SymbolicReasoningLoop {
    ctx: AgentContext,
}

impl SymbolicReasoningLoop {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn run(
        &self,
        query: &str,
        plan: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        info!("symbolic reasoning loop started");
        let mut known_facts: BTreeSet<String> = BTreeSet::new();
        let mut trace = format!("Initial problem: {}\nPlan: {}\n\n", query, plan);

        for iteration in 1..=MAX_ITERATIONS {
            debug!(iteration, MAX_ITERATIONS, "symbolic iteration");

            let facts_str = if known_facts.is_empty() {
                "none".to_string()
            } else {
                known_facts.iter().cloned().collect::<Vec<_>>().join("; ")
            };

            let hypothesis = self
                .ctx
                .complete(
                    "HYPOTHESIS_PROMPT",
                    &[("query", query), ("known_facts", facts_str.as_str())],
                    cancel,
                )
                .await?;
            trace.push_str(&format!("step {}: [hypothesis] {}\n", iteration, hypothesis));
            known_facts.insert(hypothesis);

            let deduced = SymbolicVerifier::verify_and_deduce(&known_facts);
            if deduced.is_empty() {
                trace.push_str(&format!("step {}: [deduction] no new facts derived\n", iteration));
            } else {
                trace.push_str(&format!(
                    "step {}: [deduction] {}\n",
                    iteration,
                    deduced.iter().cloned().collect::<Vec<_>>().join(", ")
                ));
                known_facts.extend(deduced);
            }

            let facts_str = known_facts.iter().cloned().collect::<Vec<_>>().join("; ");
            let conclusion = self
                .ctx
                .complete(
                    "DEDUCTIVE_REASONING_PROMPT",
                    &[("query", query), ("known_facts", facts_str.as_str())],
                    cancel,
                )
                .await?;
            trace.push_str(&format!("step {}: [inference] {}\n\n", iteration, conclusion));

            if SymbolicVerifier::is_final_conclusion(&conclusion) {
                info!(iteration, "conclusion reached; ending symbolic loop");
                break;
            }
            if iteration == MAX_ITERATIONS {
                warn!("symbolic loop hit the iteration bound");
            }
        }

        info!("symbolic reasoning loop finished");
        Ok(trace)
    }
}
