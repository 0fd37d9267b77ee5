//! Anomaly records emitted by the analysis stage

use std::fmt;

use serde::{Serialize, Serializer};

use crate::{BuoyId, Parameter, Timestamp};

/// Anomaly severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Severities that raise an active alert on the buoy
    #[inline]
    pub fn is_alerting(self) -> bool {
        self >= Severity::High
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        })
    }
}

/// What an anomaly is about: one parameter, or a cross-parameter correlation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnomalySubject {
    Parameter(Parameter),
    Correlation,
}

impl AnomalySubject {
    pub fn name(self) -> &'static str {
        match self {
            AnomalySubject::Parameter(p) => p.name(),
            AnomalySubject::Correlation => "correlation",
        }
    }
}

impl fmt::Display for AnomalySubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for AnomalySubject {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.name())
    }
}

/// Rule family that produced an anomaly
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    StatisticalDeviation,
    ThermalStratification,
    Decomposition,
    CoverageThreshold,
    RapidGrowth,
}

/// A detected anomaly. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Anomaly {
    pub buoy: BuoyId,
    pub subject: AnomalySubject,
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub description: String,
    pub timestamp: Timestamp,
    /// Likelihood in [0, 1]
    pub likelihood: f64,
}

impl Anomaly {
    /// Create an anomaly; likelihood is forced into [0, 1] (NaN becomes 0)
    pub fn new(
        buoy: BuoyId,
        subject: AnomalySubject,
        kind: AnomalyKind,
        severity: Severity,
        description: impl Into<String>,
        timestamp: Timestamp,
        likelihood: f64,
    ) -> Self {
        Anomaly {
            buoy,
            subject,
            kind,
            severity,
            description: description.into(),
            timestamp,
            likelihood: unit_interval(likelihood),
        }
    }
}

/// Clamp into [0, 1], mapping NaN to 0
#[inline]
pub fn unit_interval(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_likelihood_is_clamped() {
        let a = Anomaly::new(
            BuoyId::new(1),
            AnomalySubject::Correlation,
            AnomalyKind::Decomposition,
            Severity::Medium,
            "test",
            Utc::now(),
            1.7,
        );
        assert_eq!(a.likelihood, 1.0);

        let b = Anomaly { likelihood: unit_interval(f64::NAN), ..a };
        assert_eq!(b.likelihood, 0.0);
    }

    #[test]
    fn test_subject_serializes_as_name() {
        let json = serde_json::to_string(&AnomalySubject::Correlation).unwrap();
        assert_eq!(json, "\"correlation\"");
        let json = serde_json::to_string(&AnomalySubject::Parameter(Parameter::Ph)).unwrap();
        assert_eq!(json, "\"ph\"");
    }

    #[test]
    fn test_alerting_severities() {
        assert!(!Severity::Medium.is_alerting());
        assert!(Severity::High.is_alerting());
        assert!(Severity::Critical.is_alerting());
    }
}
