//! System governor
//!
//! One long-lived task that ticks every few seconds: it always lets the
//! energy budget recover, and while the system is idle it re-evaluates the
//! evolutionary direction and dispatches background cycles according to
//! the current goal, plus unconditional maintenance. Cycles run strictly
//! one at a time inside the tick; a failing cycle is logged and never
//! terminates the loop.

use crate::config::GovernorIntervals;
use crate::energy::EnergyManager;
use crate::evolution::autonomous::AutonomousResearcher;
use crate::evolution::consolidation::Consolidator;
use crate::evolution::controller::{EvolutionaryController, EvolutionaryGoal, GoalKind};
use crate::evolution::micro_llm::MicroLlmManager;
use crate::evolution::trace::SelfEvolution;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Task names used in the last-run table.
mod tasks {
    pub const EVOLUTIONARY_DIRECTION: &str = "evolutionary_direction";
    pub const SELF_EVOLUTION: &str = "self_evolution";
    pub const AUTONOMOUS_CYCLE: &str = "autonomous_cycle";
    pub const CONSOLIDATION_CYCLE: &str = "consolidation_cycle";
    pub const WISDOM_SYNTHESIS: &str = "wisdom_synthesis";
    pub const MICRO_LLM_PREFIX: &str = "micro_llm_";
}

struct GovernorState {
    is_idle: bool,
    last_active: Instant,
    last_run: HashMap<String, Instant>,
    run_counts: HashMap<String, u64>,
    current_goal: Option<EvolutionaryGoal>,
    started_at: Instant,
}

pub struct Governor {
    inner: Arc<GovernorInner>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
    stop_signal: CancellationToken,
}

pub struct GovernorInner {
    controller: Arc<EvolutionaryController>,
    self_evolution: Arc<SelfEvolution>,
    researcher: Arc<AutonomousResearcher>,
    consolidator: Arc<Consolidator>,
    micro_llm: Arc<MicroLlmManager>,
    energy: Arc<EnergyManager>,
    intervals: GovernorIntervals,
    state: Mutex<GovernorState>,
}

impl GovernorInner {
    /// Whether `task` is due at `now`, given its interval. Tasks that have
    /// never run are measured from governor start.
    fn task_due(&self, task: &str, interval: Duration, now: Instant) -> bool {
        let state = self.state.lock();
        let reference = state
            .last_run
            .get(task)
            .copied()
            .unwrap_or(state.started_at);
        now.saturating_duration_since(reference) > interval
    }

    fn mark_ran(&self, task: &str, now: Instant) {
        let mut state = self.state.lock();
        state.last_run.insert(task.to_string(), now);
        *state.run_counts.entry(task.to_string()).or_insert(0) += 1;
    }

    pub fn run_count(&self, task: &str) -> u64 {
        self.state.lock().run_counts.get(task).copied().unwrap_or(0)
    }

    pub fn current_goal(&self) -> Option<EvolutionaryGoal> {
        self.state.lock().current_goal.clone()
    }

    /// Time since the last busy/idle transition.
    pub fn time_since_activity_change(&self) -> Duration {
        self.state.lock().last_active.elapsed()
    }

    fn is_idle(&self) -> bool {
        self.state.lock().is_idle
    }

    /// One scheduler tick at `now`. Cycles run sequentially; each failure
    /// is contained here.
    pub async fn tick(&self, now: Instant, cancel: &CancellationToken) {
        self.energy.recover();

        if !self.is_idle() {
            return;
        }

        // Re-evaluate the direction on the benchmark interval.
        if self.task_due(tasks::EVOLUTIONARY_DIRECTION, self.intervals.benchmark(), now) {
            info!("governor: re-evaluating the evolutionary direction");
            match self.controller.determine_direction(cancel).await {
                Ok(goal) => {
                    self.state.lock().current_goal = Some(goal);
                }
                Err(e) => error!("evolutionary direction evaluation failed: {}", e),
            }
            self.mark_ran(tasks::EVOLUTIONARY_DIRECTION, now);
        }

        // Dispatch according to the current goal.
        let goal = self.current_goal();
        match goal {
            Some(EvolutionaryGoal {
                kind: GoalKind::PerformanceImprovement,
                ..
            }) => {
                if self.task_due(tasks::SELF_EVOLUTION, self.intervals.self_evolution(), now) {
                    info!("governor: task '{}' is due", tasks::SELF_EVOLUTION);
                    self.self_evolution.analyze_own_performance(cancel).await;
                    self.mark_ran(tasks::SELF_EVOLUTION, now);
                }
            }
            Some(EvolutionaryGoal {
                kind: GoalKind::KnowledgeAcquisition,
                topic: Some(ref topic),
                ..
            }) => {
                let task_name = format!("{}{}", tasks::MICRO_LLM_PREFIX, topic);
                if self.task_due(&task_name, self.intervals.micro_llm_creation(), now) {
                    info!("governor: task '{}' is due", task_name);
                    if let Err(e) = self.micro_llm.run_creation_cycle(topic).await {
                        error!("micro model creation cycle failed: {}", e);
                    }
                    self.mark_ran(&task_name, now);
                }
            }
            Some(EvolutionaryGoal {
                kind: GoalKind::Exploration,
                ..
            }) => {
                if self.task_due(tasks::AUTONOMOUS_CYCLE, self.intervals.autonomous_cycle(), now) {
                    info!("governor: task '{}' is due", tasks::AUTONOMOUS_CYCLE);
                    self.researcher.run_cycle(cancel).await;
                    self.mark_ran(tasks::AUTONOMOUS_CYCLE, now);
                }
            }
            Some(EvolutionaryGoal {
                kind: GoalKind::KnowledgeAcquisition,
                topic: None,
                ..
            })
            | None => {
                debug!("governor: no actionable goal this tick");
            }
        }

        // Unconditional maintenance.
        if self.task_due(
            tasks::CONSOLIDATION_CYCLE,
            self.intervals.consolidation_cycle(),
            now,
        ) {
            info!("governor: task '{}' is due", tasks::CONSOLIDATION_CYCLE);
            self.consolidator.run_consolidation_cycle(cancel).await;
            self.mark_ran(tasks::CONSOLIDATION_CYCLE, now);
        }
        if self.task_due(
            tasks::WISDOM_SYNTHESIS,
            self.intervals.wisdom_synthesis(),
            now,
        ) {
            info!("governor: task '{}' is due", tasks::WISDOM_SYNTHESIS);
            self.consolidator.synthesize_wisdom(cancel).await;
            self.mark_ran(tasks::WISDOM_SYNTHESIS, now);
        }
    }
}

impl Governor {
    pub fn new(
        controller: Arc<EvolutionaryController>,
        self_evolution: Arc<SelfEvolution>,
        researcher: Arc<AutonomousResearcher>,
        consolidator: Arc<Consolidator>,
        micro_llm: Arc<MicroLlmManager>,
        energy: Arc<EnergyManager>,
        intervals: GovernorIntervals,
    ) -> Self {
        let now = Instant::now();
        Self {
            inner: Arc::new(GovernorInner {
                controller,
                self_evolution,
                researcher,
                consolidator,
                micro_llm,
                energy,
                intervals,
                state: Mutex::new(GovernorState {
                    is_idle: false,
                    last_active: now,
                    last_run: HashMap::new(),
                    run_counts: HashMap::new(),
                    current_goal: None,
                    started_at: now,
                }),
            }),
            loop_handle: Mutex::new(None),
            stop_signal: CancellationToken::new(),
        }
    }

    pub fn inner(&self) -> Arc<GovernorInner> {
        self.inner.clone()
    }

    pub fn set_busy(&self) {
        let mut state = self.inner.state.lock();
        if state.is_idle {
            debug!("system state changed to: busy");
        }
        state.is_idle = false;
        state.last_active = Instant::now();
    }

    pub fn set_idle(&self) {
        let mut state = self.inner.state.lock();
        if !state.is_idle {
            debug!("system state changed to: idle");
        }
        state.is_idle = true;
        state.last_active = Instant::now();
    }

    /// Spawn the scheduler loop. Idempotent.
    pub fn start(&self) {
        let mut handle = self.loop_handle.lock();
        if handle.is_some() {
            return;
        }
        let inner = self.inner.clone();
        let stop = self.stop_signal.clone();
        *handle = Some(tokio::spawn(async move {
            info!("system governor loop started");
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep(TICK_INTERVAL) => {
                        inner.tick(Instant::now(), &stop).await;
                    }
                }
            }
            info!("system governor loop stopped");
        }));
    }

    /// Signal the loop to exit and wait for it. An in-flight cycle is not
    /// preempted; the loop exits on the next tick boundary.
    pub async fn stop(&self) {
        info!("stopping the system governor");
        self.stop_signal.cancel();
        let handle = self.loop_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
