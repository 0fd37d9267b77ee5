//! Predictive insights

use std::fmt;

use serde::Serialize;

use crate::{unit_interval, BuoyId, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Warning,
    Recommendation,
    Forecast,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Impact::Low => "low",
            Impact::Medium => "medium",
            Impact::High => "high",
        })
    }
}

/// A predictive insight. Fire-and-forget: the engine does not deduplicate across ticks.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    /// `{buoy}:{rule}:{unix_millis}`
    pub id: String,
    pub buoy: BuoyId,
    pub kind: InsightKind,
    pub rule: &'static str,
    pub title: String,
    pub description: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub timeframe: String,
    pub impact: Impact,
    pub action_required: bool,
    pub timestamp: Timestamp,
}

impl Insight {
    /// Identifier unique per buoy, rule and timestamp
    pub fn make_id(buoy: BuoyId, rule: &str, timestamp: Timestamp) -> String {
        format!("{}:{}:{}", buoy, rule, timestamp.timestamp_millis())
    }

    /// Start building an insight for a rule
    pub fn builder(buoy: BuoyId, rule: &'static str, kind: InsightKind, timestamp: Timestamp) -> InsightBuilder {
        InsightBuilder {
            insight: Insight {
                id: Insight::make_id(buoy, rule, timestamp),
                buoy,
                kind,
                rule,
                title: String::new(),
                description: String::new(),
                confidence: 0.0,
                timeframe: String::new(),
                impact: Impact::Low,
                action_required: false,
                timestamp,
            },
        }
    }
}

/// Builder for [`Insight`]
pub struct InsightBuilder {
    insight: Insight,
}

impl InsightBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.insight.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.insight.description = description.into();
        self
    }

    /// Confidence is forced into [0, 1]
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.insight.confidence = unit_interval(confidence);
        self
    }

    pub fn timeframe(mut self, timeframe: impl Into<String>) -> Self {
        self.insight.timeframe = timeframe.into();
        self
    }

    pub fn impact(mut self, impact: Impact) -> Self {
        self.insight.impact = impact;
        self
    }

    pub fn action_required(mut self, required: bool) -> Self {
        self.insight.action_required = required;
        self
    }

    pub fn build(self) -> Insight {
        self.insight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_insight_id_embeds_buoy_rule_and_time() {
        let t = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let insight = Insight::builder(BuoyId::new(5), "bloom_risk", InsightKind::Forecast, t)
            .confidence(2.0)
            .build();

        assert_eq!(insight.id, "buoy-0005:bloom_risk:1700000000123");
        assert_eq!(insight.confidence, 1.0);
    }

    #[test]
    fn test_insight_serializes_camel_case() {
        let insight = Insight::builder(BuoyId::new(1), "sensor_drift", InsightKind::Recommendation, Utc::now())
            .action_required(true)
            .build();
        let value = serde_json::to_value(&insight).unwrap();
        assert_eq!(value["actionRequired"], true);
        assert_eq!(value["kind"], "recommendation");
    }
}
