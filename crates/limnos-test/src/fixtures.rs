//! Fleet and history fixtures

use chrono::{Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use limnos_core::{baseline_readings, Buoy, BuoyId, Parameter, Readings, Timestamp};
use limnos_history::{HistoricalStore, Snapshot};

/// Fixed epoch for fixtures: midsummer, midnight UTC
pub fn epoch() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 6, 21, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Water body condition a fleet starts in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    Healthy,
    /// Nutrient-rich, warm water with spreading hyacinth
    Eutrophic,
    /// Oxygen-starved, stratified water
    Hypoxic,
}

impl Condition {
    /// Starting readings for this condition
    pub fn readings(self) -> Readings {
        let mut readings = baseline_readings();
        match self {
            Condition::Healthy => {}
            Condition::Eutrophic => {
                readings.insert(Parameter::Phosphates, 0.55);
                readings.insert(Parameter::Temperature, 28.5);
                readings.insert(Parameter::HyacinthCoverage, 38.0);
                readings.insert(Parameter::Turbidity, 30.0);
            }
            Condition::Hypoxic => {
                readings.insert(Parameter::DissolvedOxygen, 3.2);
                readings.insert(Parameter::Temperature, 27.0);
                readings.insert(Parameter::Ph, 6.3);
                readings.insert(Parameter::Phosphates, 0.4);
            }
        }
        readings
    }
}

/// Builds a fleet of buoys with small, seeded site-to-site differences
#[derive(Clone, Debug)]
pub struct FleetBuilder {
    count: u64,
    first_id: u64,
    condition: Condition,
    jitter: f64,
    seed: u64,
    at: Timestamp,
}

impl FleetBuilder {
    pub fn new(count: u64) -> Self {
        FleetBuilder {
            count,
            first_id: 1,
            condition: Condition::Healthy,
            jitter: 0.05,
            seed: 0,
            at: epoch(),
        }
    }

    pub fn healthy(count: u64) -> Self {
        Self::new(count)
    }

    pub fn eutrophic(count: u64) -> Self {
        Self::new(count).condition(Condition::Eutrophic)
    }

    pub fn hypoxic(count: u64) -> Self {
        Self::new(count).condition(Condition::Hypoxic)
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn first_id(mut self, id: u64) -> Self {
        self.first_id = id;
        self
    }

    /// Relative spread applied to each starting reading (0 for identical buoys)
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.max(0.0);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn at(mut self, at: Timestamp) -> Self {
        self.at = at;
        self
    }

    pub fn build(&self) -> Vec<Buoy> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..self.count)
            .map(|i| {
                let id = BuoyId::new(self.first_id + i);
                let readings = self
                    .condition
                    .readings()
                    .into_iter()
                    .map(|(p, v)| {
                        let spread = if self.jitter > 0.0 {
                            rng.gen_range(-self.jitter..self.jitter)
                        } else {
                            0.0
                        };
                        (p, p.clamp(v * (1.0 + spread)))
                    })
                    .collect();
                let lat = -1.0 + 0.01 * i as f64;
                Buoy::new(id, format!("Station {}", id.as_u64()), self.at)
                    .with_location(lat, 32.9)
                    .with_readings(readings)
            })
            .collect()
    }
}

/// Evenly spaced history for one parameter of one buoy
#[derive(Clone, Debug)]
pub struct SyntheticHistory {
    buoy: BuoyId,
    parameter: Parameter,
    values: Vec<f64>,
    spacing: Duration,
    end: Timestamp,
}

impl SyntheticHistory {
    pub fn new(buoy: BuoyId, parameter: Parameter) -> Self {
        SyntheticHistory {
            buoy,
            parameter,
            values: Vec::new(),
            spacing: Duration::minutes(10),
            end: epoch(),
        }
    }

    /// `n` copies of `value`
    pub fn constant(mut self, value: f64, n: usize) -> Self {
        self.values = vec![value; n];
        self
    }

    /// `n` values starting at `start`, changing by `step` each sample
    pub fn linear(mut self, start: f64, step: f64, n: usize) -> Self {
        self.values = (0..n).map(|i| start + step * i as f64).collect();
        self
    }

    /// `n` values alternating between `low` and `high`
    pub fn alternating(mut self, low: f64, high: f64, n: usize) -> Self {
        self.values = (0..n).map(|i| if i % 2 == 0 { low } else { high }).collect();
        self
    }

    pub fn values(mut self, values: Vec<f64>) -> Self {
        self.values = values;
        self
    }

    /// Timestamp of the newest sample
    pub fn ending_at(mut self, end: Timestamp) -> Self {
        self.end = end;
        self
    }

    pub fn spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }

    /// Snapshots, oldest first
    pub fn snapshots(&self) -> Vec<Snapshot> {
        let n = self.values.len();
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let back = self.spacing * (n - 1 - i) as i32;
                Snapshot::new(self.end - back, Readings::from([(self.parameter, *v)]))
            })
            .collect()
    }

    /// Append into an existing store
    pub fn fill(&self, store: &mut HistoricalStore) {
        for snapshot in self.snapshots() {
            store.append(self.buoy, snapshot);
        }
    }

    /// A fresh unbounded-age store holding only this history
    pub fn into_store(self) -> HistoricalStore {
        let mut store = HistoricalStore::with_capacity(self.values.len().max(1));
        self.fill(&mut store);
        store
    }
}
