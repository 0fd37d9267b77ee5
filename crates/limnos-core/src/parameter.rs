//! Parameter catalogue
//!
//! Each tracked water-quality parameter has a hard physical range, a unit, and a
//! polarity describing which direction of movement is harmful. The ranges here are
//! the single source of truth for clamping in the variation model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::InputError;

/// Tracked water-quality parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    /// Dissolved oxygen, mg/L, clamped to [0, 15]
    DissolvedOxygen,
    /// Water temperature, °C, clamped to [0, 40]
    Temperature,
    /// pH, clamped to [4, 11]
    Ph,
    /// Turbidity, NTU, clamped to [0, 100]
    Turbidity,
    /// Phosphates (nutrient load), mg/L, clamped to [0, 5]
    Phosphates,
    /// Water hyacinth surface coverage, %, clamped to [0, 100]
    HyacinthCoverage,
}

/// Which direction of movement is harmful for a parameter
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Polarity {
    /// Low values are harmful (e.g. oxygen)
    LowerIsWorse,
    /// High values are harmful (e.g. turbidity)
    HigherIsWorse,
    /// Distance from an optimum is harmful (e.g. pH around 7.5)
    AwayFrom(f64),
}

impl Polarity {
    /// Distance `value` lies past `threshold` in the harmful direction.
    /// Positive means the threshold is breached; zero or negative means it is not.
    /// For `AwayFrom`, `threshold` is a distance from the optimum.
    #[inline]
    pub fn excess(self, value: f64, threshold: f64) -> f64 {
        match self {
            Polarity::LowerIsWorse => threshold - value,
            Polarity::HigherIsWorse => value - threshold,
            Polarity::AwayFrom(optimum) => (value - optimum).abs() - threshold,
        }
    }
}

impl Parameter {
    /// Every tracked parameter, in canonical order
    pub const ALL: [Parameter; 6] = [
        Parameter::DissolvedOxygen,
        Parameter::Temperature,
        Parameter::Ph,
        Parameter::Turbidity,
        Parameter::Phosphates,
        Parameter::HyacinthCoverage,
    ];

    /// Canonical name used in serialized output and alert text
    pub fn name(self) -> &'static str {
        match self {
            Parameter::DissolvedOxygen => "dissolved_oxygen",
            Parameter::Temperature => "temperature",
            Parameter::Ph => "ph",
            Parameter::Turbidity => "turbidity",
            Parameter::Phosphates => "phosphates",
            Parameter::HyacinthCoverage => "hyacinth_coverage",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Parameter::DissolvedOxygen | Parameter::Phosphates => "mg/L",
            Parameter::Temperature => "°C",
            Parameter::Ph => "",
            Parameter::Turbidity => "NTU",
            Parameter::HyacinthCoverage => "%",
        }
    }

    /// Physically plausible range `(min, max)`
    pub fn range(self) -> (f64, f64) {
        match self {
            Parameter::DissolvedOxygen => (0.0, 15.0),
            Parameter::Temperature => (0.0, 40.0),
            Parameter::Ph => (4.0, 11.0),
            Parameter::Turbidity => (0.0, 100.0),
            Parameter::Phosphates => (0.0, 5.0),
            Parameter::HyacinthCoverage => (0.0, 100.0),
        }
    }

    /// Clamp a value into the physical range
    #[inline]
    pub fn clamp(self, value: f64) -> f64 {
        let (min, max) = self.range();
        value.clamp(min, max)
    }

    pub fn polarity(self) -> Polarity {
        match self {
            Parameter::DissolvedOxygen => Polarity::LowerIsWorse,
            Parameter::Ph => Polarity::AwayFrom(7.5),
            Parameter::Temperature
            | Parameter::Turbidity
            | Parameter::Phosphates
            | Parameter::HyacinthCoverage => Polarity::HigherIsWorse,
        }
    }

    /// Validate a raw reading for this parameter
    pub fn check(self, value: f64) -> Result<f64, InputError> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(InputError::NonFinite {
                parameter: self,
                value,
            })
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Parameter {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Parameter::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| InputError::UnknownParameter(s.to_string()))
    }
}
