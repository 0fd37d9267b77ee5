//! LIMNOS Model - Sensor value evolution
//!
//! This crate advances one parameter reading per call:
//! - Deterministic drift toward a daily/seasonal target curve
//! - Random noise from an injectable source (seeded, silent or fixed)
//! - Asymmetric growth and sudden step increases for hyacinth coverage
//! - Clamping to each parameter's physical range

pub mod noise;
pub mod variation;

pub use noise::*;
pub use variation::*;
