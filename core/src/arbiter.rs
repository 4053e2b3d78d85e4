//! Resource arbiter
//!
//! Policy layer between orchestration and execution. When cognitive energy
//! is low, high-cost pipeline choices are downgraded to `simple` before the
//! engine dispatches them. The arbiter never debits energy itself; it only
//! reads the level.

use crate::energy::EnergyManager;
use crate::models::{OrchestrationDecision, PipelineKind};
use std::sync::Arc;
use tracing::{debug, warn};

pub const HIGH_COST_PIPELINES: [PipelineKind; 3] = [
    PipelineKind::TreeOfThoughts,
    PipelineKind::Full,
    PipelineKind::SelfDiscover,
];

pub const DEFAULT_ENERGY_THRESHOLD: f64 = 40.0;

pub struct ResourceArbiter {
    energy: Arc<EnergyManager>,
    threshold: f64,
}

impl ResourceArbiter {
    pub fn new(energy: Arc<EnergyManager>) -> Self {
        Self {
            energy,
            threshold: DEFAULT_ENERGY_THRESHOLD,
        }
    }

    pub fn with_threshold(energy: Arc<EnergyManager>, threshold: f64) -> Self {
        Self { energy, threshold }
    }

    /// Rewrite the decision when the chosen pipeline is high-cost and the
    /// budget is below the threshold; otherwise pass it through unchanged.
    pub fn arbitrate(&self, mut decision: OrchestrationDecision) -> OrchestrationDecision {
        let current_energy = self.energy.level();
        debug!(current_energy, mode = %decision.chosen_mode, "arbitrating decision");

        let is_high_cost = PipelineKind::parse(&decision.chosen_mode)
            .map(|kind| HIGH_COST_PIPELINES.contains(&kind))
            .unwrap_or(false);

        if is_high_cost && current_energy < self.threshold {
            warn!(
                current_energy,
                "cognitive energy is low; overriding pipeline choice from '{}' to 'simple'",
                decision.chosen_mode
            );
            decision.chosen_mode = PipelineKind::Simple.as_str().to_string();
            decision
                .reasoning
                .push_str(" (Overridden by resource arbiter due to low cognitive energy)");
            decision.confidence_score = decision.confidence_score.min(0.6);
        }

        decision
    }
}
