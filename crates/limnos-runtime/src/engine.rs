//! LIMNOS Engine - Pure tick function over an owned fleet

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use limnos_analysis::{AnomalyDetector, InsightBudget, InsightGenerator, StatusClassifier};
use limnos_core::{
    Anomaly, Buoy, BuoyId, BuoyMetadata, ConfigResult, InputError, Insight, Parameter, Readings,
    SimulationConfig, StatusTransition, Timestamp,
};
use limnos_history::{HistoricalStore, Snapshot};
use limnos_model::{NoiseSource, RngNoise, VariationModel};

use crate::InsightThrottle;

/// A reading that could not be advanced during a tick.
/// The parameter keeps its previous value and sits out that tick's analysis.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TickFault {
    pub buoy: BuoyId,
    pub parameter: Option<Parameter>,
    #[serde(serialize_with = "serialize_display")]
    pub error: InputError,
    pub at: Timestamp,
}

impl fmt::Display for TickFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.buoy, self.error)
    }
}

fn serialize_display<T: fmt::Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}

/// Everything one tick produced
#[derive(Clone, Debug, Default, Serialize)]
pub struct TickOutcome {
    /// Sequence number, starting at 1
    pub tick: u64,
    /// Full buoy set after the tick, in id order
    pub buoys: Vec<Buoy>,
    pub anomalies: Vec<Anomaly>,
    pub insights: Vec<Insight>,
    pub transitions: Vec<StatusTransition>,
    pub faults: Vec<TickFault>,
    /// Whether the throttle let the insight stage run
    pub insights_admitted: bool,
}

/// Running totals since the engine was built
#[derive(Clone, Debug, Default, Serialize)]
pub struct EngineStats {
    pub ticks: u64,
    pub anomalies: u64,
    pub insights: u64,
    pub transitions: u64,
    pub faults: u64,
    pub last_tick_duration: Duration,
}

/// Simulation engine: the fleet, its history and the analysis pipeline
pub struct Engine {
    config: SimulationConfig,
    buoys: BTreeMap<BuoyId, Buoy>,
    history: HistoricalStore,
    model: VariationModel,
    noise: Box<dyn NoiseSource>,
    detector: AnomalyDetector,
    classifier: StatusClassifier,
    generator: InsightGenerator,
    throttle: InsightThrottle,
    anomaly_log: VecDeque<Anomaly>,
    insight_log: VecDeque<Insight>,
    stats: EngineStats,
}

impl Engine {
    /// Create an engine with OS-seeded noise
    pub fn new(config: SimulationConfig) -> ConfigResult<Self> {
        Self::with_noise(config, Box::new(RngNoise::from_entropy()))
    }

    /// Create an engine with reproducible noise
    pub fn seeded(config: SimulationConfig, seed: u64) -> ConfigResult<Self> {
        Self::with_noise(config, Box::new(RngNoise::seeded(seed)))
    }

    /// Create an engine drawing randomness from `noise`
    pub fn with_noise(config: SimulationConfig, noise: Box<dyn NoiseSource>) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Engine {
            history: HistoricalStore::new(config.retention),
            model: VariationModel::new(config.variability),
            noise,
            detector: AnomalyDetector::from_config(&config),
            classifier: StatusClassifier::from_config(&config),
            generator: InsightGenerator::from_config(&config),
            throttle: InsightThrottle::new(config.insight_cadence),
            buoys: BTreeMap::new(),
            anomaly_log: VecDeque::new(),
            insight_log: VecDeque::new(),
            stats: EngineStats::default(),
            config,
        })
    }

    /// Builder-style fleet registration
    pub fn with_buoys(mut self, buoys: impl IntoIterator<Item = Buoy>) -> Self {
        for buoy in buoys {
            self.upsert_buoy(buoy);
        }
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn history(&self) -> &HistoricalStore {
        &self.history
    }

    pub fn buoy(&self, id: BuoyId) -> Option<&Buoy> {
        self.buoys.get(&id)
    }

    /// Buoys in id order
    pub fn buoys(&self) -> impl Iterator<Item = &Buoy> {
        self.buoys.values()
    }

    pub fn buoy_count(&self) -> usize {
        self.buoys.len()
    }

    /// Cloned buoy set, in id order
    pub fn snapshot(&self) -> Vec<Buoy> {
        self.buoys.values().cloned().collect()
    }

    /// Add or replace a buoy. Its current finite readings become the values it
    /// reverts toward. Returns the replaced buoy.
    pub fn upsert_buoy(&mut self, buoy: Buoy) -> Option<Buoy> {
        self.model.anchor(buoy.id, &buoy.readings);
        self.buoys.insert(buoy.id, buoy)
    }

    /// Replace caller-owned attributes of a buoy
    pub fn update_buoy(&mut self, id: BuoyId, metadata: BuoyMetadata) -> Result<(), InputError> {
        let buoy = self.buoys.get_mut(&id).ok_or(InputError::UnknownBuoy(id))?;
        buoy.merge_metadata(metadata);
        Ok(())
    }

    /// Remove a buoy together with its history
    pub fn remove_buoy(&mut self, id: BuoyId) -> Option<Buoy> {
        let removed = self.buoys.remove(&id)?;
        self.history.forget(id);
        self.model.forget(id);
        Some(removed)
    }

    /// Replace the whole fleet. History is kept only for buoys still present.
    pub fn load(&mut self, buoys: impl IntoIterator<Item = Buoy>) {
        let previous: Vec<BuoyId> = self.buoys.keys().copied().collect();
        self.buoys.clear();
        for buoy in buoys {
            self.upsert_buoy(buoy);
        }
        for id in previous {
            if !self.buoys.contains_key(&id) {
                self.model.forget(id);
            }
        }
        let buoys = &self.buoys;
        self.history.retain_buoys(|id| buoys.contains_key(&id));
    }

    /// Swap in a new configuration. Buoys, history and anchors are kept;
    /// history is trimmed to the new retention policy.
    pub fn reconfigure(&mut self, config: SimulationConfig) -> ConfigResult<()> {
        config.validate()?;

        self.model.set_variability(config.variability);
        self.history.set_policy(config.retention);
        self.detector = AnomalyDetector::from_config(&config);
        self.classifier = StatusClassifier::from_config(&config);
        self.generator = InsightGenerator::from_config(&config);
        if config.insight_cadence != self.config.insight_cadence {
            self.throttle = InsightThrottle::new(config.insight_cadence);
        }
        trim(&mut self.anomaly_log, config.anomaly_log_capacity);
        trim(&mut self.insight_log, config.insight_log_capacity);

        info!(
            tick_interval = ?config.tick_interval,
            variability = config.variability,
            "engine reconfigured"
        );
        self.config = config;
        Ok(())
    }

    /// Newest `n` anomalies, oldest first
    pub fn recent_anomalies(&self, n: usize) -> Vec<Anomaly> {
        let start = self.anomaly_log.len().saturating_sub(n);
        self.anomaly_log.range(start..).cloned().collect()
    }

    /// Newest `n` insights, oldest first
    pub fn recent_insights(&self, n: usize) -> Vec<Insight> {
        let start = self.insight_log.len().saturating_sub(n);
        self.insight_log.range(start..).cloned().collect()
    }

    /// Advance every buoy by one tick at `now`
    pub fn tick(&mut self, now: Timestamp) -> TickOutcome {
        let started = Instant::now();
        let mut outcome = TickOutcome {
            tick: self.stats.ticks + 1,
            ..TickOutcome::default()
        };

        outcome.insights_admitted = self.throttle.admit(self.noise.as_mut());
        let mut budget = InsightBudget::new(self.config.max_insights_per_tick);

        for buoy in self.buoys.values_mut() {
            let id = buoy.id;

            // 1. Variation; faulty parameters keep their value and skip analysis
            let mut analysed = Readings::new();
            for parameter in Parameter::ALL {
                let next = buoy.reading(parameter).and_then(|current| {
                    self.model
                        .next(parameter, current, id, now, self.noise.as_mut())
                });
                match next {
                    Ok(value) => {
                        analysed.insert(parameter, value);
                    }
                    Err(error) => {
                        warn!(buoy = %id, %parameter, %error, "reading skipped");
                        outcome.faults.push(TickFault {
                            buoy: id,
                            parameter: Some(parameter),
                            error,
                            at: now,
                        });
                    }
                }
            }
            buoy.readings.extend(analysed.iter().map(|(p, v)| (*p, *v)));
            buoy.last_update = now;

            // 2. History
            self.history.append(id, Snapshot::new(now, analysed.clone()));
            let view = self.history.view(id);

            // 3. Anomalies, against the history preceding this reading
            let anomalies = if self.config.anomalies_enabled {
                self.detector.detect(id, &analysed, view.without_latest(), now)
            } else {
                Vec::new()
            };

            // 4. Alerts
            let mut alerts: BTreeSet<String> =
                self.classifier.threshold_alerts(&analysed).into_iter().collect();
            alerts.extend(
                anomalies
                    .iter()
                    .filter(|a| a.severity.is_alerting())
                    .map(|a| format!("{}: {}", a.subject, a.description)),
            );
            buoy.alerts = alerts;

            // 5. Status
            let status = self.classifier.classify(&analysed, buoy.alerts.len());
            if status != buoy.status {
                debug!(buoy = %id, from = %buoy.status, to = %status, "status changed");
                outcome.transitions.push(StatusTransition {
                    buoy: id,
                    from: buoy.status,
                    to: status,
                    at: now,
                });
                buoy.status = status;
            }
            outcome.anomalies.extend(anomalies);

            // 6. Insights
            if outcome.insights_admitted && !budget.is_spent() {
                outcome
                    .insights
                    .extend(self.generator.generate(id, &analysed, view, now, &mut budget));
            }
        }

        outcome.buoys = self.buoys.values().cloned().collect();

        push_bounded(
            &mut self.anomaly_log,
            &outcome.anomalies,
            self.config.anomaly_log_capacity,
        );
        push_bounded(
            &mut self.insight_log,
            &outcome.insights,
            self.config.insight_log_capacity,
        );

        self.stats.ticks += 1;
        self.stats.anomalies += outcome.anomalies.len() as u64;
        self.stats.insights += outcome.insights.len() as u64;
        self.stats.transitions += outcome.transitions.len() as u64;
        self.stats.faults += outcome.faults.len() as u64;
        self.stats.last_tick_duration = started.elapsed();

        debug!(
            tick = outcome.tick,
            buoys = outcome.buoys.len(),
            anomalies = outcome.anomalies.len(),
            insights = outcome.insights.len(),
            faults = outcome.faults.len(),
            "tick complete"
        );
        outcome
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("buoys", &self.buoys.len())
            .field("snapshots", &self.history.total_snapshots())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn push_bounded<T: Clone>(log: &mut VecDeque<T>, items: &[T], capacity: usize) {
    log.extend(items.iter().cloned());
    trim(log, capacity);
}

fn trim<T>(log: &mut VecDeque<T>, capacity: usize) {
    while log.len() > capacity {
        log.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use limnos_core::{baseline_readings, AnomalyKind, InsightCadence, Severity, Status};
    use limnos_model::SilentNoise;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn at(tick: i64) -> Timestamp {
        t0() + ChronoDuration::minutes(10 * tick)
    }

    fn silent(config: SimulationConfig) -> Engine {
        Engine::with_noise(config, Box::new(SilentNoise)).unwrap()
    }

    fn buoy(id: u64, readings: Readings) -> Buoy {
        Buoy::new(BuoyId::new(id), format!("Station {}", id), t0()).with_readings(readings)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = SimulationConfig {
            variability: 1.5,
            ..Default::default()
        };
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn test_tick_advances_every_buoy() {
        let mut engine = silent(SimulationConfig::default())
            .with_buoys((1..=3).map(|i| buoy(i, baseline_readings())));

        let outcome = engine.tick(at(1));
        assert_eq!(outcome.tick, 1);
        assert_eq!(outcome.buoys.len(), 3);
        assert!(outcome.faults.is_empty());
        for b in &outcome.buoys {
            assert_eq!(b.last_update, at(1));
            assert_eq!(b.status, Status::Good);
            assert_eq!(engine.history().len(b.id), 1);
        }
        assert_eq!(engine.stats().ticks, 1);
    }

    #[test]
    fn test_malformed_reading_is_skipped() {
        let mut readings = baseline_readings();
        readings.insert(Parameter::Ph, f64::NAN);
        readings.remove(&Parameter::Turbidity);
        let mut engine = silent(SimulationConfig::default()).with_buoys([buoy(1, readings)]);

        let outcome = engine.tick(at(1));
        assert_eq!(outcome.faults.len(), 2);
        let b = &outcome.buoys[0];
        assert!(b.readings[&Parameter::Ph].is_nan());
        assert!(!b.readings.contains_key(&Parameter::Turbidity));

        let snapshot = engine.history().view(b.id).latest().cloned().unwrap();
        assert_eq!(snapshot.value(Parameter::Ph), None);
        assert!(snapshot.value(Parameter::DissolvedOxygen).is_some());
        assert_eq!(engine.stats().faults, 2);
    }

    #[test]
    fn test_stratification_sets_alert_and_status() {
        let mut readings = baseline_readings();
        readings.insert(Parameter::DissolvedOxygen, 3.5);
        readings.insert(Parameter::Temperature, 27.0);
        let mut engine = silent(SimulationConfig::default()).with_buoys([buoy(1, readings)]);

        let outcome = engine.tick(at(1));
        assert!(outcome
            .anomalies
            .iter()
            .any(|a| a.kind == AnomalyKind::ThermalStratification && a.severity == Severity::High));

        let b = &outcome.buoys[0];
        // Oxygen critical breach plus the stratification anomaly
        assert_eq!(b.alerts.len(), 2);
        assert_eq!(b.status, Status::Critical);
        assert_eq!(outcome.transitions.len(), 1);
        assert_eq!(outcome.transitions[0].to, Status::Critical);
        assert_eq!(engine.recent_anomalies(10).len(), outcome.anomalies.len());
    }

    #[test]
    fn test_anomalies_can_be_disabled() {
        let mut readings = baseline_readings();
        readings.insert(Parameter::DissolvedOxygen, 3.5);
        readings.insert(Parameter::Temperature, 27.0);
        let config = SimulationConfig {
            anomalies_enabled: false,
            ..Default::default()
        };
        let mut engine = silent(config).with_buoys([buoy(1, readings)]);
        assert!(engine.tick(at(1)).anomalies.is_empty());
    }

    #[test]
    fn test_sudden_oxygen_drop_is_critical() {
        let config = SimulationConfig {
            variability: 0.0,
            ..Default::default()
        };
        let mut engine = silent(config).with_buoys([buoy(1, baseline_readings())]);
        for i in 1..=24 {
            engine.tick(at(i));
        }

        let mut dropped = engine.buoy(BuoyId::new(1)).cloned().unwrap();
        dropped.readings.insert(Parameter::DissolvedOxygen, 3.5);
        engine.upsert_buoy(dropped);
        engine.model.anchor(BuoyId::new(1), &baseline_readings());

        let outcome = engine.tick(at(25));
        let deviation = outcome
            .anomalies
            .iter()
            .find(|a| a.kind == AnomalyKind::StatisticalDeviation)
            .unwrap();
        assert_eq!(deviation.severity, Severity::Critical);
        assert!(deviation.likelihood <= 0.95);
    }

    #[test]
    fn test_insight_cap_is_global() {
        let mut readings = baseline_readings();
        readings.insert(Parameter::Phosphates, 0.6);
        readings.insert(Parameter::Temperature, 29.0);
        let config = SimulationConfig {
            insight_cadence: InsightCadence::EveryTick,
            max_insights_per_tick: 2,
            ..Default::default()
        };
        let mut engine = silent(config).with_buoys((1..=5).map(|i| buoy(i, readings.clone())));

        let outcome = engine.tick(at(1));
        assert!(outcome.insights_admitted);
        assert_eq!(outcome.insights.len(), 2);
        assert_eq!(outcome.insights[0].buoy, BuoyId::new(1));
        assert_eq!(outcome.insights[1].buoy, BuoyId::new(2));
    }

    #[test]
    fn test_throttle_gates_insights() {
        let mut readings = baseline_readings();
        readings.insert(Parameter::Phosphates, 0.6);
        readings.insert(Parameter::Temperature, 29.0);
        let mut engine = silent(SimulationConfig::default()).with_buoys([buoy(1, readings)]);

        let counts: Vec<usize> = (1..=6).map(|i| engine.tick(at(i)).insights.len()).collect();
        assert_eq!(counts, vec![0, 0, 1, 0, 0, 1]);
        assert_eq!(engine.recent_insights(10).len(), 2);
    }

    #[test]
    fn test_logs_are_bounded() {
        let mut readings = baseline_readings();
        readings.insert(Parameter::HyacinthCoverage, 70.0);
        let config = SimulationConfig {
            anomaly_log_capacity: 5,
            ..Default::default()
        };
        let mut engine = silent(config).with_buoys([buoy(1, readings)]);
        for i in 1..=10 {
            engine.tick(at(i));
        }
        assert_eq!(engine.recent_anomalies(100).len(), 5);
        assert_eq!(engine.recent_anomalies(2).len(), 2);
        assert!(engine.stats().anomalies >= 10);
    }

    #[test]
    fn test_metadata_update_keeps_simulated_state() {
        let mut engine = silent(SimulationConfig::default()).with_buoys([buoy(7, baseline_readings())]);
        engine.tick(at(1));
        let before = engine.buoy(BuoyId::new(7)).cloned().unwrap();

        engine
            .update_buoy(
                BuoyId::new(7),
                BuoyMetadata {
                    name: "Renamed".into(),
                    location: None,
                },
            )
            .unwrap();
        let after = engine.buoy(BuoyId::new(7)).unwrap();
        assert_eq!(after.metadata.name, "Renamed");
        assert_eq!(after.readings, before.readings);
        assert_eq!(
            engine.update_buoy(BuoyId::new(8), BuoyMetadata::default()),
            Err(InputError::UnknownBuoy(BuoyId::new(8)))
        );
    }

    #[test]
    fn test_remove_and_load() {
        let mut engine = silent(SimulationConfig::default())
            .with_buoys((1..=3).map(|i| buoy(i, baseline_readings())));
        engine.tick(at(1));

        assert!(engine.remove_buoy(BuoyId::new(1)).is_some());
        assert_eq!(engine.history().len(BuoyId::new(1)), 0);
        assert!(engine.remove_buoy(BuoyId::new(1)).is_none());

        engine.load([buoy(3, baseline_readings()), buoy(4, baseline_readings())]);
        assert_eq!(engine.buoy_count(), 2);
        assert_eq!(engine.history().len(BuoyId::new(2)), 0);
        assert_eq!(engine.history().len(BuoyId::new(3)), 1);
    }

    #[test]
    fn test_reconfigure() {
        let mut engine = silent(SimulationConfig::default()).with_buoys([buoy(1, baseline_readings())]);
        for i in 1..=10 {
            engine.tick(at(i));
        }

        let mut config = SimulationConfig::calm();
        config.retention.max_snapshots = 4;
        engine.reconfigure(config).unwrap();
        assert_eq!(engine.history().len(BuoyId::new(1)), 4);
        assert_eq!(engine.config().variability, 0.15);

        let bad = SimulationConfig {
            max_insights_per_tick: 0,
            ..Default::default()
        };
        assert!(engine.reconfigure(bad).is_err());
        assert_eq!(engine.config().variability, 0.15);
    }

    #[test]
    fn test_seeded_engines_agree() {
        let run = || {
            let mut engine = Engine::seeded(SimulationConfig::demo(), 42)
                .unwrap()
                .with_buoys((1..=2).map(|i| buoy(i, baseline_readings())));
            (1..=20).map(|i| engine.tick(at(i)).buoys).last().unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_outcome_serializes() {
        let mut engine = silent(SimulationConfig::default()).with_buoys([buoy(1, baseline_readings())]);
        let json = serde_json::to_value(engine.tick(at(1))).unwrap();
        assert_eq!(json["tick"], 1);
        assert_eq!(json["buoys"][0]["status"], "good");
    }
}
