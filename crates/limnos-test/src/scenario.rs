//! Scenario harness
//!
//! Ticks an [`Engine`] on a fixed simulated clock with seeded noise and checks
//! fleet-wide invariants after every tick:
//! - Every reading lies within its parameter's physical range
//! - History never exceeds the retention cap
//! - Anomaly likelihoods and insight confidences lie in [0, 1]
//! - Insights per tick never exceed the configured cap
//! - Each buoy's status matches a fresh classification of its readings

use std::time::Duration;

use chrono::Duration as ChronoDuration;
use thiserror::Error;

use limnos_analysis::StatusClassifier;
use limnos_core::{Buoy, ConfigError, SimulationConfig, Status, Timestamp};
use limnos_runtime::{Engine, TickOutcome};

use crate::fixtures::{epoch, Condition, FleetBuilder};

/// Scenario errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScenarioError {
    #[error("Scenario configuration rejected: {0}")]
    Config(#[from] ConfigError),

    #[error("Tick interval does not fit a calendar duration")]
    IntervalOverflow,
}

/// Deterministic clock: tick `n` happens at `start + n * step`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScenarioClock {
    start: Timestamp,
    step: ChronoDuration,
    ticks: u32,
}

impl ScenarioClock {
    pub fn new(start: Timestamp, step: Duration) -> Result<Self, ScenarioError> {
        let step = ChronoDuration::from_std(step).map_err(|_| ScenarioError::IntervalOverflow)?;
        Ok(ScenarioClock {
            start,
            step,
            ticks: 0,
        })
    }

    /// Time of the current tick
    pub fn now(&self) -> Timestamp {
        self.start + self.step * self.ticks as i32
    }

    /// Advance one tick and return its time
    pub fn advance(&mut self) -> Timestamp {
        self.ticks += 1;
        self.now()
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }
}

/// Scenario configuration
#[derive(Clone, Debug)]
pub struct ScenarioConfig {
    pub simulation: SimulationConfig,
    pub buoys: u64,
    pub condition: Condition,
    pub ticks: u32,
    pub seed: u64,
    pub start: Timestamp,
}

impl ScenarioConfig {
    /// A few buoys for a couple of simulated hours
    pub fn minimal() -> Self {
        ScenarioConfig {
            simulation: SimulationConfig::default(),
            buoys: 3,
            condition: Condition::Healthy,
            ticks: 12,
            seed: 1,
            start: epoch(),
        }
    }

    /// A mixed-size fleet over one simulated day at 10-minute ticks
    pub fn standard() -> Self {
        ScenarioConfig {
            simulation: SimulationConfig {
                tick_interval: Duration::from_secs(600),
                ..SimulationConfig::default()
            },
            buoys: 10,
            condition: Condition::Eutrophic,
            ticks: 144,
            seed: 7,
            start: epoch(),
        }
    }

    /// Full variability, a large degraded fleet, and a tight history cap
    pub fn stress() -> Self {
        let mut simulation = SimulationConfig::demo();
        simulation.variability = 1.0;
        simulation.retention.max_snapshots = 48;
        ScenarioConfig {
            simulation,
            buoys: 50,
            condition: Condition::Hypoxic,
            ticks: 300,
            seed: 99,
            start: epoch(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_ticks(mut self, ticks: u32) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Aggregate result of a scenario run
#[derive(Clone, Debug, Default)]
pub struct ScenarioResult {
    pub ticks: u32,
    pub anomalies: usize,
    pub insights: usize,
    pub transitions: usize,
    pub faults: usize,
    /// Largest insight count in any single tick
    pub peak_insights: usize,
    pub final_buoys: Vec<Buoy>,
    pub violations: Vec<String>,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Final buoys with the given status
    pub fn count_status(&self, status: Status) -> usize {
        self.final_buoys.iter().filter(|b| b.status == status).count()
    }
}

/// Runs a scenario to completion
pub struct ScenarioHarness {
    config: ScenarioConfig,
    engine: Engine,
    clock: ScenarioClock,
    classifier: StatusClassifier,
}

impl ScenarioHarness {
    pub fn new(config: ScenarioConfig) -> Result<Self, ScenarioError> {
        let fleet = FleetBuilder::new(config.buoys)
            .condition(config.condition)
            .seed(config.seed)
            .at(config.start)
            .build();
        let engine = Engine::seeded(config.simulation.clone(), config.seed)?.with_buoys(fleet);
        let clock = ScenarioClock::new(config.start, config.simulation.tick_interval)?;
        let classifier = StatusClassifier::from_config(&config.simulation);
        Ok(ScenarioHarness {
            config,
            engine,
            clock,
            classifier,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn clock(&self) -> &ScenarioClock {
        &self.clock
    }

    /// One tick; returns the outcome and any invariant violations
    pub fn step(&mut self) -> (TickOutcome, Vec<String>) {
        let now = self.clock.advance();
        let outcome = self.engine.tick(now);
        let violations = self.check_invariants(&outcome);
        (outcome, violations)
    }

    /// Run every configured tick
    pub fn run(&mut self) -> ScenarioResult {
        let mut result = ScenarioResult::default();
        for _ in 0..self.config.ticks {
            let (outcome, violations) = self.step();
            result.ticks += 1;
            result.anomalies += outcome.anomalies.len();
            result.insights += outcome.insights.len();
            result.transitions += outcome.transitions.len();
            result.faults += outcome.faults.len();
            result.peak_insights = result.peak_insights.max(outcome.insights.len());
            result
                .violations
                .extend(violations.into_iter().map(|v| format!("tick {}: {}", outcome.tick, v)));
        }
        result.final_buoys = self.engine.snapshot();
        result
    }

    fn check_invariants(&self, outcome: &TickOutcome) -> Vec<String> {
        let mut violations = Vec::new();
        let cap = self.config.simulation.retention.max_snapshots;

        for buoy in &outcome.buoys {
            for (parameter, value) in &buoy.readings {
                let (min, max) = parameter.range();
                if value.is_finite() && !(min..=max).contains(value) {
                    violations.push(format!("{} {} out of range: {}", buoy.id, parameter, value));
                }
            }

            let len = self.engine.history().len(buoy.id);
            if len > cap {
                violations.push(format!("{} history {} exceeds cap {}", buoy.id, len, cap));
            }

            let expected = self.classifier.classify(&buoy.readings, buoy.alerts.len());
            if expected != buoy.status {
                violations.push(format!(
                    "{} status {} but readings classify as {}",
                    buoy.id, buoy.status, expected
                ));
            }
        }

        for anomaly in &outcome.anomalies {
            if !(0.0..=1.0).contains(&anomaly.likelihood) {
                violations.push(format!("{} likelihood {}", anomaly.buoy, anomaly.likelihood));
            }
        }
        for insight in &outcome.insights {
            if !(0.0..=1.0).contains(&insight.confidence) {
                violations.push(format!("{} confidence {}", insight.id, insight.confidence));
            }
        }
        if outcome.insights.len() > self.config.simulation.max_insights_per_tick {
            violations.push(format!("{} insights in one tick", outcome.insights.len()));
        }

        violations
    }
}

/// Run a scenario end to end
pub fn run_scenario(config: ScenarioConfig) -> Result<ScenarioResult, ScenarioError> {
    Ok(ScenarioHarness::new(config)?.run())
}
