//! Identity types for monitored entities

use std::fmt;

use serde::{Deserialize, Serialize};

/// Buoy identity - stable for the life of the deployment
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuoyId(pub u64);

impl BuoyId {
    pub const ZERO: BuoyId = BuoyId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        BuoyId(id)
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for BuoyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buoy({})", self.0)
    }
}

impl fmt::Display for BuoyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buoy-{:04}", self.0)
    }
}

impl From<u64> for BuoyId {
    fn from(id: u64) -> Self {
        BuoyId(id)
    }
}
