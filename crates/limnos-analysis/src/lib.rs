//! LIMNOS Analysis - Per-tick analysis of buoy readings
//!
//! This crate implements the analysis stages of a tick:
//! - Anomaly detection (statistical deviation, correlation, coverage thresholds)
//! - Linear trend fitting with R² confidence
//! - Composite health scoring and status classification
//! - Rule-based predictive insights under a per-tick budget

pub mod stats;
pub mod trend;
pub mod anomaly;
pub mod status;
pub mod insight;

pub use stats::*;
pub use trend::*;
pub use anomaly::*;
pub use status::*;
pub use insight::*;
