//! Composite health scoring
//!
//! The score starts at 100. Each parameter past its warning threshold loses a
//! linear penalty per unit of excess; past its critical threshold a flat penalty
//! is added on top. Each active alert costs a flat amount. Pure: no history, no
//! side effects.

use std::collections::BTreeMap;

use limnos_core::{Parameter, Readings, SimulationConfig, Status, ThresholdPair};

/// Score a fully healthy buoy starts from
pub const MAX_SCORE: f64 = 100.0;

/// Below this score a buoy is critical
pub const CRITICAL_BELOW: f64 = 30.0;

/// Below this score a buoy is in warning
pub const WARNING_BELOW: f64 = 70.0;

/// Penalty weights for one parameter
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Penalty {
    /// Points lost per unit past the warning threshold
    pub per_unit: f64,
    /// Flat points lost past the critical threshold
    pub hard: f64,
}

impl Penalty {
    pub fn default_for(parameter: Parameter) -> Self {
        let (per_unit, hard) = match parameter {
            Parameter::DissolvedOxygen => (10.0, 30.0),
            Parameter::Temperature => (3.0, 20.0),
            Parameter::Ph => (15.0, 25.0),
            Parameter::Turbidity => (0.5, 15.0),
            Parameter::Phosphates => (50.0, 15.0),
            Parameter::HyacinthCoverage => (1.0, 30.0),
        };
        Penalty { per_unit, hard }
    }
}

/// Maps readings and alert counts to a health status
#[derive(Clone, Debug)]
pub struct StatusClassifier {
    thresholds: BTreeMap<Parameter, ThresholdPair>,
    penalties: BTreeMap<Parameter, Penalty>,
    /// Points lost per active alert
    pub alert_penalty: f64,
}

impl StatusClassifier {
    pub fn new(thresholds: BTreeMap<Parameter, ThresholdPair>) -> Self {
        StatusClassifier {
            thresholds,
            penalties: Parameter::ALL
                .iter()
                .map(|p| (*p, Penalty::default_for(*p)))
                .collect(),
            alert_penalty: 15.0,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.thresholds.clone())
    }

    pub fn with_penalty(mut self, parameter: Parameter, penalty: Penalty) -> Self {
        self.penalties.insert(parameter, penalty);
        self
    }

    /// Health score; 100 is perfect and heavy breaches can push it below zero.
    /// Non-finite readings and parameters without thresholds cost nothing.
    pub fn score(&self, readings: &Readings, active_alerts: usize) -> f64 {
        let mut score = MAX_SCORE;

        for (&parameter, &value) in readings {
            if !value.is_finite() {
                continue;
            }
            let (Some(pair), Some(penalty)) =
                (self.thresholds.get(&parameter), self.penalties.get(&parameter))
            else {
                continue;
            };

            score -= penalty.per_unit * pair.warning_excess(parameter, value);
            if pair.is_critical(parameter, value) {
                score -= penalty.hard;
            }
        }

        score - self.alert_penalty * active_alerts as f64
    }

    pub fn classify(&self, readings: &Readings, active_alerts: usize) -> Status {
        status_for_score(self.score(readings, active_alerts))
    }

    /// Alert strings for every critical threshold breach
    pub fn threshold_alerts(&self, readings: &Readings) -> Vec<String> {
        readings
            .iter()
            .filter(|(_, v)| v.is_finite())
            .filter_map(|(&parameter, &value)| {
                let pair = self.thresholds.get(&parameter)?;
                pair.is_critical(parameter, value).then(|| {
                    format!("{} critical: {:.2}{}", parameter, value, parameter.unit())
                })
            })
            .collect()
    }
}

/// Tri-state mapping of a score
pub fn status_for_score(score: f64) -> Status {
    if score < CRITICAL_BELOW {
        Status::Critical
    } else if score < WARNING_BELOW {
        Status::Warning
    } else {
        Status::Good
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use limnos_core::{baseline_readings, default_thresholds};
    use proptest::prelude::*;

    fn classifier() -> StatusClassifier {
        StatusClassifier::new(default_thresholds())
    }

    #[test]
    fn test_baseline_is_good() {
        let c = classifier();
        assert_eq!(c.score(&baseline_readings(), 0), MAX_SCORE);
        assert_eq!(c.classify(&baseline_readings(), 0), Status::Good);
    }

    #[test]
    fn test_alerts_compound() {
        let c = classifier();
        let readings = baseline_readings();
        assert_eq!(c.score(&readings, 2), MAX_SCORE - 30.0);
        // Exactly 70 is still good; one more alert tips it
        assert_eq!(c.classify(&readings, 2), Status::Good);
        assert_eq!(c.classify(&readings, 3), Status::Warning);
        assert_eq!(c.classify(&readings, 5), Status::Critical);
    }

    #[test]
    fn test_oxygen_hard_floor() {
        let c = classifier();
        let mut readings = baseline_readings();
        readings.insert(Parameter::DissolvedOxygen, 3.0);
        // 3 mg/L past the 6.0 warning floor, plus the critical flat penalty
        assert!((c.score(&readings, 0) - (100.0 - 30.0 - 30.0)).abs() < 1e-9);
        assert_eq!(c.classify(&readings, 0), Status::Warning);
        assert_eq!(c.classify(&readings, 1), Status::Critical);
    }

    #[test]
    fn test_pure_function() {
        let c = classifier();
        let mut readings = baseline_readings();
        readings.insert(Parameter::Turbidity, 70.0);
        assert_eq!(c.score(&readings, 1), c.score(&readings, 1));
        assert_eq!(c.classify(&readings, 1), c.classify(&readings, 1));
    }

    #[test]
    fn test_non_finite_costs_nothing() {
        let c = classifier();
        let mut readings = baseline_readings();
        readings.insert(Parameter::Ph, f64::NAN);
        assert_eq!(c.score(&readings, 0), MAX_SCORE);
    }

    #[test]
    fn test_threshold_alerts() {
        let c = classifier();
        let mut readings = baseline_readings();
        readings.insert(Parameter::DissolvedOxygen, 3.2);
        readings.insert(Parameter::HyacinthCoverage, 65.0);
        let alerts = c.threshold_alerts(&readings);
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().any(|a| a.starts_with("dissolved_oxygen critical")));
    }

    #[test]
    fn test_status_for_score() {
        assert_eq!(status_for_score(29.9), Status::Critical);
        assert_eq!(status_for_score(30.0), Status::Warning);
        assert_eq!(status_for_score(69.9), Status::Warning);
        assert_eq!(status_for_score(70.0), Status::Good);
    }

    proptest! {
        #[test]
        fn prop_score_decreases_past_warning(
            parameter in prop::sample::select(Parameter::ALL.to_vec()),
            step in 0.01f64..5.0,
            further in 0.01f64..5.0,
        ) {
            let c = classifier();
            let pair = default_thresholds()[&parameter];
            // Move `step` then `step + further` units past warning in the harmful direction
            let past = |d: f64| match parameter.polarity() {
                limnos_core::Polarity::LowerIsWorse => pair.warning - d,
                limnos_core::Polarity::HigherIsWorse => pair.warning + d,
                limnos_core::Polarity::AwayFrom(opt) => opt + pair.warning + d,
            };

            let mut near = baseline_readings();
            near.insert(parameter, past(step));
            let mut far = baseline_readings();
            far.insert(parameter, past(step + further));

            prop_assert!(c.score(&far, 0) < c.score(&near, 0));
        }
    }
}
