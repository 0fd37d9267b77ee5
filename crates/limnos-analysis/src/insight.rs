//! Predictive insights
//!
//! Rules run in priority order and stop as soon as the shared per-tick budget is
//! spent. The budget is global across buoys: the runtime creates one per tick and
//! threads it through every `generate` call.

use std::time::Duration;

use limnos_core::{BuoyId, Impact, Insight, InsightKind, Parameter, Readings, SimulationConfig, Timestamp};
use limnos_history::HistoryView;
use tracing::debug;

use crate::{std_dev, TrendAnalyzer, TrendDirection};

/// Rule identifiers, embedded in insight ids
pub const RULE_OXYGEN_DEPLETION: &str = "oxygen_depletion";
pub const RULE_BLOOM_RISK: &str = "bloom_risk";
pub const RULE_SENSOR_DRIFT: &str = "sensor_drift";

/// Insights still allowed this tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsightBudget {
    remaining: usize,
}

impl InsightBudget {
    pub fn new(cap: usize) -> Self {
        InsightBudget { remaining: cap }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    #[inline]
    pub fn is_spent(&self) -> bool {
        self.remaining == 0
    }

    /// Consume one slot; false when nothing is left
    pub fn take(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Rule-based insight generator
#[derive(Clone, Debug)]
pub struct InsightGenerator {
    trend: TrendAnalyzer,
    /// Oxygen level treated as critical when projecting depletion
    pub oxygen_floor: f64,
    /// Samples fitted by the depletion rule
    pub depletion_window: usize,
    /// Decline per sample that triggers a depletion warning
    pub depletion_rate: f64,
    /// Decline per sample above which action is required
    pub urgent_depletion_rate: f64,
    /// Time between history samples, used to turn samples into hours
    pub sample_interval: Duration,
    pub bloom_phosphates: f64,
    pub bloom_temperature: f64,
    /// Samples of turbidity inspected by the drift rule
    pub drift_window: usize,
    /// Turbidity standard deviation (NTU) that suggests a drifting sensor
    pub drift_std_dev: f64,
    pub drift_confidence: f64,
}

impl Default for InsightGenerator {
    fn default() -> Self {
        InsightGenerator {
            trend: TrendAnalyzer::default(),
            oxygen_floor: 4.0,
            depletion_window: 12,
            depletion_rate: 0.1,
            urgent_depletion_rate: 0.2,
            sample_interval: Duration::from_secs(3600),
            bloom_phosphates: 0.3,
            bloom_temperature: 24.0,
            drift_window: 24,
            drift_std_dev: 8.0,
            drift_confidence: 0.7,
        }
    }
}

impl InsightGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator whose oxygen floor follows the configured critical threshold
    /// and whose sample spacing is the tick interval
    pub fn from_config(config: &SimulationConfig) -> Self {
        let mut generator = Self {
            sample_interval: config.tick_interval,
            ..Self::default()
        };
        if let Some(pair) = config.threshold(Parameter::DissolvedOxygen) {
            generator.oxygen_floor = pair.critical;
        }
        generator
    }

    /// Apply every rule to one buoy, in priority order, within `budget`.
    /// `history` includes the current tick's snapshot.
    pub fn generate(
        &self,
        buoy: BuoyId,
        current: &Readings,
        history: HistoryView<'_>,
        now: Timestamp,
        budget: &mut InsightBudget,
    ) -> Vec<Insight> {
        let rules: [fn(&Self, BuoyId, &Readings, HistoryView<'_>, Timestamp) -> Option<Insight>; 3] = [
            Self::oxygen_depletion,
            Self::bloom_risk,
            Self::sensor_drift,
        ];

        let mut insights = Vec::new();
        for rule in rules {
            if budget.is_spent() {
                break;
            }
            if let Some(insight) = rule(self, buoy, current, history, now) {
                budget.take();
                debug!(buoy = %buoy, rule = insight.rule, confidence = insight.confidence, "insight");
                insights.push(insight);
            }
        }
        insights
    }

    fn oxygen_depletion(
        &self,
        buoy: BuoyId,
        current: &Readings,
        history: HistoryView<'_>,
        now: Timestamp,
    ) -> Option<Insight> {
        let oxygen = finite(current, Parameter::DissolvedOxygen)?;
        let values = history.values(Parameter::DissolvedOxygen, self.depletion_window);
        if values.len() < self.depletion_window {
            return None;
        }

        let trend = self.trend.fit(&values);
        if trend.direction != TrendDirection::Decreasing || trend.rate <= self.depletion_rate {
            return None;
        }

        let samples = ((oxygen - self.oxygen_floor) / trend.rate).max(0.0);
        let hours = samples * self.sample_interval.as_secs_f64() / 3600.0;
        let urgent = trend.rate > self.urgent_depletion_rate;
        let timeframe = if hours < 1.0 {
            "imminent".to_string()
        } else {
            format!("next {:.0} hours", hours.ceil())
        };

        Some(
            Insight::builder(buoy, RULE_OXYGEN_DEPLETION, InsightKind::Warning, now)
                .title("Dissolved oxygen depletion")
                .description(format!(
                    "Oxygen is falling {:.2} mg/L per reading from {:.2} mg/L; the critical floor of {:.1} mg/L is about {:.1} readings ({:.1} hours) away",
                    trend.rate, oxygen, self.oxygen_floor, samples, hours
                ))
                .confidence(trend.confidence)
                .timeframe(timeframe)
                .impact(if urgent { Impact::High } else { Impact::Medium })
                .action_required(urgent)
                .build(),
        )
    }

    fn bloom_risk(
        &self,
        buoy: BuoyId,
        current: &Readings,
        _history: HistoryView<'_>,
        now: Timestamp,
    ) -> Option<Insight> {
        let phosphates = finite(current, Parameter::Phosphates)?;
        let temperature = finite(current, Parameter::Temperature)?;
        if phosphates <= self.bloom_phosphates || temperature <= self.bloom_temperature {
            return None;
        }

        let risk = bloom_risk_score(
            phosphates - self.bloom_phosphates,
            temperature - self.bloom_temperature,
        );
        let impact = if risk > 60.0 {
            Impact::High
        } else if risk > 30.0 {
            Impact::Medium
        } else {
            Impact::Low
        };

        Some(
            Insight::builder(buoy, RULE_BLOOM_RISK, InsightKind::Forecast, now)
                .title("Algal bloom risk")
                .description(format!(
                    "Phosphates at {:.2} mg/L and water at {:.1} °C favour an algal bloom (risk score {:.0})",
                    phosphates, temperature, risk
                ))
                .confidence((risk / 100.0).min(0.9))
                .timeframe("24-72 hours")
                .impact(impact)
                .action_required(risk > 60.0)
                .build(),
        )
    }

    fn sensor_drift(
        &self,
        buoy: BuoyId,
        _current: &Readings,
        history: HistoryView<'_>,
        now: Timestamp,
    ) -> Option<Insight> {
        let values = history.values(Parameter::Turbidity, self.drift_window);
        if values.len() < self.drift_window {
            return None;
        }
        let spread = std_dev(&values)?;
        if spread <= self.drift_std_dev {
            return None;
        }

        Some(
            Insight::builder(buoy, RULE_SENSOR_DRIFT, InsightKind::Recommendation, now)
                .title("Turbidity sensor check")
                .description(format!(
                    "Turbidity varied by {:.1} NTU (std dev) over the last {} readings; recalibrate or clean the sensor",
                    spread, self.drift_window
                ))
                .confidence(self.drift_confidence)
                .timeframe("next maintenance visit")
                .impact(Impact::Low)
                .action_required(false)
                .build(),
        )
    }
}

/// Product of the nutrient excess (scaled to hundredths of mg/L) and temperature excess
#[inline]
pub fn bloom_risk_score(phosphate_excess: f64, temperature_excess: f64) -> f64 {
    (phosphate_excess * 100.0) * temperature_excess
}

fn finite(readings: &Readings, parameter: Parameter) -> Option<f64> {
    readings.get(&parameter).copied().filter(|v| v.is_finite())
}
