//! Buoy entities and health status

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{BuoyId, InputError, Parameter, Timestamp};

/// Current readings of one buoy, keyed by parameter
pub type Readings = BTreeMap<Parameter, f64>;

/// Composite health status
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Good,
    Warning,
    Critical,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Good => "good",
            Status::Warning => "warning",
            Status::Critical => "critical",
        })
    }
}

/// Geographic position (WGS84 degrees)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Caller-owned attributes the simulation never touches
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BuoyMetadata {
    pub name: String,
    pub location: Option<GeoPoint>,
}

/// A monitored buoy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Buoy {
    pub id: BuoyId,
    #[serde(flatten)]
    pub metadata: BuoyMetadata,
    pub readings: Readings,
    pub status: Status,
    /// Active alert strings, recomputed every tick
    pub alerts: BTreeSet<String>,
    pub last_update: Timestamp,
}

impl Buoy {
    pub fn new(id: BuoyId, name: impl Into<String>, now: Timestamp) -> Self {
        Buoy {
            id,
            metadata: BuoyMetadata {
                name: name.into(),
                location: None,
            },
            readings: Readings::new(),
            status: Status::Good,
            alerts: BTreeSet::new(),
            last_update: now,
        }
    }

    pub fn with_location(mut self, lat: f64, lon: f64) -> Self {
        self.metadata.location = Some(GeoPoint { lat, lon });
        self
    }

    pub fn with_reading(mut self, parameter: Parameter, value: f64) -> Self {
        self.readings.insert(parameter, value);
        self
    }

    pub fn with_readings(mut self, readings: Readings) -> Self {
        self.readings = readings;
        self
    }

    /// Validated reading for a parameter
    pub fn reading(&self, parameter: Parameter) -> Result<f64, InputError> {
        let value = self
            .readings
            .get(&parameter)
            .copied()
            .ok_or(InputError::MissingParameter(parameter))?;
        parameter.check(value)
    }

    /// Replace caller-owned attributes, keeping simulated state intact
    pub fn merge_metadata(&mut self, metadata: BuoyMetadata) {
        self.metadata = metadata;
    }
}

/// Readings of a healthy, temperate lake in early summer
pub fn baseline_readings() -> Readings {
    Readings::from([
        (Parameter::DissolvedOxygen, 8.0),
        (Parameter::Temperature, 22.0),
        (Parameter::Ph, 7.4),
        (Parameter::Turbidity, 12.0),
        (Parameter::Phosphates, 0.12),
        (Parameter::HyacinthCoverage, 8.0),
    ])
}

/// Status change observed during a tick
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusTransition {
    pub buoy: BuoyId,
    pub from: Status,
    pub to: Status,
    pub at: Timestamp,
}
