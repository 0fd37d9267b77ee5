//! Simulation configuration
//!
//! A `SimulationConfig` is validated once, when an engine is built from it, and is
//! immutable afterwards. Durations are written as humantime strings in JSON
//! documents (`"10s"`, `"7days"`).

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult, Parameter, Polarity};

/// Warning / critical threshold pair for one parameter, in the parameter's units.
/// For pH the values are distances from the optimum.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPair {
    pub warning: f64,
    pub critical: f64,
}

impl ThresholdPair {
    pub const fn new(warning: f64, critical: f64) -> Self {
        ThresholdPair { warning, critical }
    }

    /// Distance past the warning threshold in the harmful direction (0 if not breached)
    #[inline]
    pub fn warning_excess(&self, parameter: Parameter, value: f64) -> f64 {
        parameter.polarity().excess(value, self.warning).max(0.0)
    }

    #[inline]
    pub fn is_critical(&self, parameter: Parameter, value: f64) -> bool {
        parameter.polarity().excess(value, self.critical) > 0.0
    }

    #[inline]
    pub fn is_warning(&self, parameter: Parameter, value: f64) -> bool {
        parameter.polarity().excess(value, self.warning) > 0.0
    }

    fn check(&self, parameter: Parameter) -> ConfigResult<()> {
        let ordered = match parameter.polarity() {
            Polarity::LowerIsWorse => self.critical <= self.warning,
            Polarity::HigherIsWorse | Polarity::AwayFrom(_) => self.critical >= self.warning,
        };
        if ordered && self.warning.is_finite() && self.critical.is_finite() {
            Ok(())
        } else {
            Err(ConfigError::InvertedThreshold {
                parameter,
                warning: self.warning,
                critical: self.critical,
            })
        }
    }
}

/// Retention policy for per-buoy history
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Hard cap on snapshots per buoy
    pub max_snapshots: usize,
    /// Optional age cap, measured back from the newest snapshot
    #[serde(default, with = "crate::time::humantime_duration_opt")]
    pub max_age: Option<Duration>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        // 7 days at 6 samples per hour
        RetentionPolicy {
            max_snapshots: 7 * 24 * 6,
            max_age: Some(Duration::from_secs(7 * 24 * 3600)),
        }
    }
}

/// How often the insight stage runs
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InsightCadence {
    /// Every tick
    EveryTick,
    /// Every `period`-th tick
    EveryNthTick { period: u32 },
    /// Independently per tick with probability `p`, drawn from the engine's noise source
    Probability { p: f64 },
}

impl Default for InsightCadence {
    fn default() -> Self {
        InsightCadence::EveryNthTick { period: 3 }
    }
}

/// Simulation engine configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Wall-clock interval between ticks
    #[serde(with = "crate::time::humantime_duration")]
    pub tick_interval: Duration,
    /// Scaling of generated noise and pattern amplitude, in [0, 1]
    pub variability: f64,
    pub anomalies_enabled: bool,
    pub thresholds: BTreeMap<Parameter, ThresholdPair>,
    pub retention: RetentionPolicy,
    pub insight_cadence: InsightCadence,
    /// Global cap on insights per tick, across all buoys
    pub max_insights_per_tick: usize,
    pub anomaly_log_capacity: usize,
    pub insight_log_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            tick_interval: Duration::from_secs(10),
            variability: 0.5,
            anomalies_enabled: true,
            thresholds: default_thresholds(),
            retention: RetentionPolicy::default(),
            insight_cadence: InsightCadence::default(),
            max_insights_per_tick: 3,
            anomaly_log_capacity: 1000,
            insight_log_capacity: 200,
        }
    }
}

impl SimulationConfig {
    /// Fast, lively configuration for demos
    pub fn demo() -> Self {
        SimulationConfig {
            tick_interval: Duration::from_secs(2),
            variability: 0.8,
            insight_cadence: InsightCadence::EveryTick,
            ..Default::default()
        }
    }

    /// Low-variability configuration for soak runs
    pub fn calm() -> Self {
        SimulationConfig {
            variability: 0.15,
            insight_cadence: InsightCadence::EveryNthTick { period: 10 },
            ..Default::default()
        }
    }

    /// Parse and validate a JSON document; missing fields take defaults
    pub fn from_json(doc: &str) -> ConfigResult<Self> {
        let config: SimulationConfig =
            serde_json::from_str(doc).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn threshold(&self, parameter: Parameter) -> Option<&ThresholdPair> {
        self.thresholds.get(&parameter)
    }

    /// Reject configurations that indicate a programming error
    pub fn validate(&self) -> ConfigResult<()> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::NonPositiveTickInterval);
        }
        if !(0.0..=1.0).contains(&self.variability) {
            return Err(ConfigError::VariabilityOutOfRange(self.variability));
        }
        if self.thresholds.is_empty() {
            return Err(ConfigError::EmptyThresholds);
        }
        for (parameter, pair) in &self.thresholds {
            pair.check(*parameter)?;
        }
        if self.retention.max_snapshots == 0 {
            return Err(ConfigError::ZeroRetention);
        }
        if self.max_insights_per_tick == 0 {
            return Err(ConfigError::ZeroInsightCap);
        }
        match self.insight_cadence {
            InsightCadence::EveryNthTick { period: 0 } => return Err(ConfigError::ZeroCadence),
            InsightCadence::Probability { p } if !(0.0..=1.0).contains(&p) => {
                return Err(ConfigError::ProbabilityOutOfRange(p))
            }
            _ => {}
        }
        Ok(())
    }
}

/// Default threshold table
pub fn default_thresholds() -> BTreeMap<Parameter, ThresholdPair> {
    BTreeMap::from([
        (Parameter::DissolvedOxygen, ThresholdPair::new(6.0, 4.0)),
        (Parameter::Temperature, ThresholdPair::new(28.0, 32.0)),
        (Parameter::Ph, ThresholdPair::new(1.0, 2.0)),
        (Parameter::Turbidity, ThresholdPair::new(25.0, 50.0)),
        (Parameter::Phosphates, ThresholdPair::new(0.3, 0.6)),
        (Parameter::HyacinthCoverage, ThresholdPair::new(35.0, 60.0)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
        assert!(SimulationConfig::demo().validate().is_ok());
        assert!(SimulationConfig::calm().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_tick_interval() {
        let config = SimulationConfig {
            tick_interval: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveTickInterval));
    }

    #[test]
    fn test_rejects_empty_thresholds() {
        let config = SimulationConfig {
            thresholds: BTreeMap::new(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyThresholds));
    }

    #[test]
    fn test_rejects_inverted_threshold() {
        let mut config = SimulationConfig::default();
        // Oxygen critical floor above the warning floor
        config
            .thresholds
            .insert(Parameter::DissolvedOxygen, ThresholdPair::new(4.0, 6.0));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedThreshold { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_variability_and_cadence() {
        let config = SimulationConfig {
            variability: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SimulationConfig {
            insight_cadence: InsightCadence::EveryNthTick { period: 0 },
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroCadence));
    }

    #[test]
    fn test_from_json_with_humantime() {
        let doc = r#"{
            "tick_interval": "250ms",
            "variability": 0.3,
            "retention": { "max_snapshots": 144, "max_age": "1day" },
            "insight_cadence": { "mode": "probability", "p": 0.3 }
        }"#;
        let config = SimulationConfig::from_json(doc).unwrap();

        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.retention.max_snapshots, 144);
        assert_eq!(config.retention.max_age, Some(Duration::from_secs(86_400)));
        assert_eq!(config.insight_cadence, InsightCadence::Probability { p: 0.3 });
        // Unspecified fields fall back to defaults
        assert_eq!(config.thresholds, default_thresholds());
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(matches!(
            SimulationConfig::from_json(r#"{ "tick_interval": "soon" }"#),
            Err(ConfigError::Parse(_))
        ));
        assert_eq!(
            SimulationConfig::from_json(r#"{ "tick_interval": "0s" }"#),
            Err(ConfigError::NonPositiveTickInterval)
        );
    }

    #[test]
    fn test_threshold_excess() {
        let pair = ThresholdPair::new(6.0, 4.0);
        assert_eq!(pair.warning_excess(Parameter::DissolvedOxygen, 7.0), 0.0);
        assert!((pair.warning_excess(Parameter::DissolvedOxygen, 5.0) - 1.0).abs() < 1e-9);
        assert!(pair.is_critical(Parameter::DissolvedOxygen, 3.9));
        assert!(!pair.is_critical(Parameter::DissolvedOxygen, 4.1));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_variability_accepted_iff_unit(variability in -2.0f64..3.0) {
                let config = SimulationConfig { variability, ..Default::default() };
                prop_assert_eq!(config.validate().is_ok(), (0.0..=1.0).contains(&variability));
            }

            #[test]
            fn prop_probability_accepted_iff_unit(p in -2.0f64..3.0) {
                let config = SimulationConfig {
                    insight_cadence: InsightCadence::Probability { p },
                    ..Default::default()
                };
                match config.validate() {
                    Ok(()) => prop_assert!((0.0..=1.0).contains(&p)),
                    Err(e) => prop_assert_eq!(e, ConfigError::ProbabilityOutOfRange(p)),
                }
            }

            #[test]
            fn prop_non_finite_variability_rejected(variability in prop_oneof![
                Just(f64::NAN),
                Just(f64::INFINITY),
                Just(f64::NEG_INFINITY),
            ]) {
                let config = SimulationConfig { variability, ..Default::default() };
                prop_assert!(config.validate().is_err());
            }
        }
    }
}
