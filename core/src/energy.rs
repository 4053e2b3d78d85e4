//! Cognitive energy budget
//!
//! A process-wide scalar that expensive pipelines draw against. Energy
//! recovers linearly over wall-clock time and is capped at the maximum.
//! Every operation first applies the recovery for the elapsed interval, so
//! readers always observe an up-to-date level.

use parking_lot::Mutex;
use std::time::Instant;
use tracing::{debug, warn};

pub const DEFAULT_MAX_ENERGY: f64 = 100.0;
pub const DEFAULT_RECOVERY_RATE: f64 = 1.0;

struct EnergyState {
    current: f64,
    last_update: Instant,
}

pub struct EnergyManager {
    max_energy: f64,
    recovery_rate: f64,
    state: Mutex<EnergyState>,
}

impl EnergyManager {
    pub fn new(max_energy: f64, recovery_rate: f64) -> Self {
        Self::with_level(max_energy, max_energy, recovery_rate)
    }

    /// Start at an explicit level. Level is clamped to [0, max].
    pub fn with_level(max_energy: f64, level: f64, recovery_rate: f64) -> Self {
        Self {
            max_energy,
            recovery_rate,
            state: Mutex::new(EnergyState {
                current: level.clamp(0.0, max_energy),
                last_update: Instant::now(),
            }),
        }
    }

    fn recover_locked(&self, state: &mut EnergyState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_update);
        let recovered = elapsed.as_secs_f64() * self.recovery_rate;
        state.current = (state.current + recovered).min(self.max_energy);
        state.last_update = now;
    }

    /// Atomically recover elapsed energy, then debit `cost` if the budget
    /// covers it. Never blocks; an insufficient budget simply fails.
    pub fn consume(&self, cost: f64) -> bool {
        self.consume_at(cost, Instant::now())
    }

    pub fn consume_at(&self, cost: f64, now: Instant) -> bool {
        let mut state = self.state.lock();
        self.recover_locked(&mut state, now);
        if state.current >= cost {
            state.current -= cost;
            debug!(cost, current = state.current, "energy consumed");
            true
        } else {
            warn!(cost, current = state.current, "energy consumption refused");
            false
        }
    }

    /// The current level, after recovering the elapsed interval.
    pub fn level(&self) -> f64 {
        self.level_at(Instant::now())
    }

    pub fn level_at(&self, now: Instant) -> f64 {
        let mut state = self.state.lock();
        self.recover_locked(&mut state, now);
        state.current
    }

    /// Idempotent recovery tick; called unconditionally by the governor.
    pub fn recover(&self) {
        self.recover_at(Instant::now());
    }

    pub fn recover_at(&self, now: Instant) {
        let mut state = self.state.lock();
        self.recover_locked(&mut state, now);
    }

    pub fn max_energy(&self) -> f64 {
        self.max_energy
    }
}

impl Default for EnergyManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENERGY, DEFAULT_RECOVERY_RATE)
    }
}
