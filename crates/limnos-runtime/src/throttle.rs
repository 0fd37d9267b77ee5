//! Insight throttle

use limnos_core::InsightCadence;
use limnos_model::NoiseSource;

/// Decides whether the insight stage runs on a given tick
#[derive(Clone, Debug)]
pub struct InsightThrottle {
    cadence: InsightCadence,
    ticks: u64,
}

impl InsightThrottle {
    pub fn new(cadence: InsightCadence) -> Self {
        InsightThrottle { cadence, ticks: 0 }
    }

    pub fn cadence(&self) -> InsightCadence {
        self.cadence
    }

    /// Ticks seen so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Called once per tick. `EveryNthTick` admits ticks N, 2N, 3N, ...
    pub fn admit(&mut self, noise: &mut dyn NoiseSource) -> bool {
        self.ticks += 1;
        match self.cadence {
            InsightCadence::EveryTick => true,
            InsightCadence::EveryNthTick { period } => {
                period > 0 && self.ticks % u64::from(period) == 0
            }
            InsightCadence::Probability { p } => noise.chance(p),
        }
    }
}
