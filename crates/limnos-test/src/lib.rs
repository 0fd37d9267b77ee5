//! LIMNOS Test Harness - Fixtures and deterministic scenarios
//!
//! This crate provides:
//! - Fleet fixtures (healthy, eutrophic, hypoxic)
//! - Synthetic histories for driving the analysis stage directly
//! - A scenario harness that ticks an engine on a fixed clock with seeded
//!   noise and checks fleet-wide invariants after every tick

pub mod fixtures;
pub mod scenario;

pub use fixtures::*;
pub use scenario::*;
