//! Anomaly detection
//!
//! Three independent rule families run on every call; any number may fire:
//! 1. Statistical deviation from the recent per-parameter mean
//! 2. Cross-parameter correlations on current readings
//! 3. Hyacinth coverage thresholds and rapid growth
//!
//! `history` is the window preceding the current readings. Degenerate numerics
//! (zero baselines, NaN, infinities) never produce an anomaly.

use limnos_core::{
    Anomaly, AnomalyKind, AnomalySubject, BuoyId, Parameter, Readings, Severity, SimulationConfig,
    Timestamp,
};
use limnos_history::HistoryView;
use tracing::debug;

use crate::{mean, EPSILON};

/// Anomaly detector tunables
#[derive(Clone, Debug)]
pub struct AnomalyDetector {
    /// Snapshots required for, and averaged by, the deviation rule
    pub baseline_window: usize,
    /// Relative deviation above which an anomaly fires
    pub deviation_threshold: f64,
    /// Relative deviation above which the anomaly is critical
    pub critical_deviation: f64,
    pub max_deviation_likelihood: f64,
    /// Coverage at or above which a `High` anomaly fires
    pub coverage_high: f64,
    /// Coverage at or above which a `Critical` anomaly fires
    pub coverage_critical: f64,
    /// Snapshots averaged by the rapid-growth rule
    pub growth_window: usize,
    /// Coverage gain over the recent average that counts as rapid growth
    pub growth_jump: f64,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        AnomalyDetector {
            baseline_window: 24,
            deviation_threshold: 0.5,
            critical_deviation: 1.0,
            max_deviation_likelihood: 0.95,
            coverage_high: 35.0,
            coverage_critical: 60.0,
            growth_window: 6,
            growth_jump: 3.0,
        }
    }
}

/// Fraction of the mean below which a falling reading's base is floored
const FALLING_BASE_FLOOR: f64 = 0.05;

/// Relative deviation of `current` from `mean`.
///
/// Rises are measured against the mean, falls against the current reading, so a
/// halving scores the same as a doubling. `None` when the mean is degenerate.
pub fn relative_deviation(current: f64, mean: f64) -> Option<f64> {
    if !current.is_finite() || !mean.is_finite() || mean.abs() < EPSILON {
        return None;
    }
    let base = if current >= mean {
        mean.abs()
    } else {
        current.abs().max(mean.abs() * FALLING_BASE_FLOOR)
    };
    if base < EPSILON {
        return None;
    }
    let deviation = (current - mean).abs() / base;
    deviation.is_finite().then_some(deviation)
}

impl AnomalyDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detector whose coverage thresholds follow the configured threshold table
    pub fn from_config(config: &SimulationConfig) -> Self {
        let mut detector = Self::default();
        if let Some(pair) = config.threshold(Parameter::HyacinthCoverage) {
            detector.coverage_high = pair.warning;
            detector.coverage_critical = pair.critical;
        }
        detector
    }

    /// Run every rule family against `current`
    pub fn detect(
        &self,
        buoy: BuoyId,
        current: &Readings,
        history: HistoryView<'_>,
        now: Timestamp,
    ) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();
        self.statistical(buoy, current, history, now, &mut anomalies);
        self.correlations(buoy, current, now, &mut anomalies);
        self.coverage(buoy, current, history, now, &mut anomalies);
        for anomaly in &anomalies {
            debug!(
                buoy = %buoy,
                kind = ?anomaly.kind,
                severity = ?anomaly.severity,
                likelihood = anomaly.likelihood,
                "anomaly"
            );
        }
        anomalies
    }

    fn statistical(
        &self,
        buoy: BuoyId,
        current: &Readings,
        history: HistoryView<'_>,
        now: Timestamp,
        out: &mut Vec<Anomaly>,
    ) {
        if history.len() < self.baseline_window {
            return;
        }

        for (&parameter, &value) in current {
            let recent = history.values(parameter, self.baseline_window);
            if recent.len() < self.baseline_window {
                continue;
            }
            let Some(baseline) = mean(&recent) else {
                continue;
            };
            let Some(deviation) = relative_deviation(value, baseline) else {
                continue;
            };
            if deviation <= self.deviation_threshold {
                continue;
            }

            let severity = if deviation > self.critical_deviation {
                Severity::Critical
            } else {
                Severity::High
            };
            let direction = if value > baseline { "above" } else { "below" };
            out.push(Anomaly::new(
                buoy,
                AnomalySubject::Parameter(parameter),
                AnomalyKind::StatisticalDeviation,
                severity,
                format!(
                    "{} at {:.2}{} is {:.0}% {} its {}-sample mean of {:.2}",
                    parameter,
                    value,
                    parameter.unit(),
                    deviation * 100.0,
                    direction,
                    self.baseline_window,
                    baseline
                ),
                now,
                deviation.min(self.max_deviation_likelihood),
            ));
        }
    }

    fn correlations(&self, buoy: BuoyId, current: &Readings, now: Timestamp, out: &mut Vec<Anomaly>) {
        let oxygen = finite(current, Parameter::DissolvedOxygen);
        let temperature = finite(current, Parameter::Temperature);
        let ph = finite(current, Parameter::Ph);
        let phosphates = finite(current, Parameter::Phosphates);

        if let (Some(o2), Some(t)) = (oxygen, temperature) {
            if o2 < 4.0 && t > 25.0 {
                out.push(Anomaly::new(
                    buoy,
                    AnomalySubject::Correlation,
                    AnomalyKind::ThermalStratification,
                    Severity::High,
                    format!(
                        "Thermal stratification likely: oxygen {:.2} mg/L with water at {:.1} °C",
                        o2, t
                    ),
                    now,
                    0.85,
                ));
            }
        }

        if let (Some(ph), Some(p)) = (ph, phosphates) {
            if ph < 6.5 && p > 0.3 {
                out.push(Anomaly::new(
                    buoy,
                    AnomalySubject::Correlation,
                    AnomalyKind::Decomposition,
                    Severity::Medium,
                    format!(
                        "Organic decomposition suspected: pH {:.2} with phosphates at {:.2} mg/L",
                        ph, p
                    ),
                    now,
                    0.7,
                ));
            }
        }
    }

    fn coverage(
        &self,
        buoy: BuoyId,
        current: &Readings,
        history: HistoryView<'_>,
        now: Timestamp,
        out: &mut Vec<Anomaly>,
    ) {
        let Some(coverage) = finite(current, Parameter::HyacinthCoverage) else {
            return;
        };
        let subject = AnomalySubject::Parameter(Parameter::HyacinthCoverage);

        if coverage >= self.coverage_critical {
            out.push(Anomaly::new(
                buoy,
                subject,
                AnomalyKind::CoverageThreshold,
                Severity::Critical,
                format!("Hyacinth coverage at {:.1}% exceeds the critical level", coverage),
                now,
                1.0,
            ));
        } else if coverage >= self.coverage_high {
            out.push(Anomaly::new(
                buoy,
                subject,
                AnomalyKind::CoverageThreshold,
                Severity::High,
                format!("Hyacinth coverage at {:.1}% exceeds the warning level", coverage),
                now,
                0.9,
            ));
        }

        if history.len() < self.growth_window {
            return;
        }
        let recent = history.values(Parameter::HyacinthCoverage, self.growth_window);
        let Some(average) = mean(&recent) else {
            return;
        };
        let gain = coverage - average;
        if gain > self.growth_jump {
            out.push(Anomaly::new(
                buoy,
                subject,
                AnomalyKind::RapidGrowth,
                Severity::High,
                format!(
                    "Rapid hyacinth growth: {:.1}% now against a recent average of {:.1}% (+{:.1})",
                    coverage, average, gain
                ),
                now,
                0.85,
            ));
        }
    }
}

fn finite(readings: &Readings, parameter: Parameter) -> Option<f64> {
    readings.get(&parameter).copied().filter(|v| v.is_finite())
}
