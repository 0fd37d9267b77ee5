//! Tick snapshots and individual samples

use serde::Serialize;

use limnos_core::{BuoyId, Parameter, Readings, Timestamp};

/// All readings of one buoy at one tick
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    pub timestamp: Timestamp,
    pub readings: Readings,
}

impl Snapshot {
    pub fn new(timestamp: Timestamp, readings: Readings) -> Self {
        Snapshot { timestamp, readings }
    }

    #[inline]
    pub fn value(&self, parameter: Parameter) -> Option<f64> {
        self.readings.get(&parameter).copied()
    }

    /// Flatten into individual samples
    pub fn samples(&self, buoy: BuoyId) -> impl Iterator<Item = ParameterSample> + '_ {
        self.readings.iter().map(move |(parameter, value)| ParameterSample {
            buoy,
            parameter: *parameter,
            value: *value,
            timestamp: self.timestamp,
        })
    }
}

/// A single timestamped reading
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ParameterSample {
    pub buoy: BuoyId,
    pub parameter: Parameter,
    pub value: f64,
    pub timestamp: Timestamp,
}
