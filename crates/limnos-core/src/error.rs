//! Error types for the simulation engine
//!
//! Only configuration errors are ever returned to a caller synchronously.
//! Input errors are recorded per tick and skipped; they never halt a tick.

use thiserror::Error;

use crate::{BuoyId, Parameter};

/// Per-reading input errors, absorbed by the tick loop
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("Missing reading: {0}")]
    MissingParameter(Parameter),

    #[error("Non-finite reading for {parameter}: {value}")]
    NonFinite { parameter: Parameter, value: f64 },

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Unknown buoy: {0}")]
    UnknownBuoy(BuoyId),
}

/// Configuration errors, raised at construction time
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Tick interval must be positive")]
    NonPositiveTickInterval,

    #[error("Variability must be within [0, 1], got {0}")]
    VariabilityOutOfRange(f64),

    #[error("Threshold table is empty")]
    EmptyThresholds,

    #[error("Threshold for {parameter} is inverted: warning {warning}, critical {critical}")]
    InvertedThreshold {
        parameter: Parameter,
        warning: f64,
        critical: f64,
    },

    #[error("Retention capacity must be at least 1")]
    ZeroRetention,

    #[error("Insight cap must be at least 1")]
    ZeroInsightCap,

    #[error("Insight cadence period must be at least 1 tick")]
    ZeroCadence,

    #[error("Probability must be within [0, 1], got {0}")]
    ProbabilityOutOfRange(f64),

    #[error("Invalid configuration document: {0}")]
    Parse(String),
}

/// Result type for configuration
pub type ConfigResult<T> = Result<T, ConfigError>;
