//! LIMNOS Core - Fundamental types for the buoy simulation engine
//!
//! This crate defines the types shared by every stage of a tick:
//! - Identifiers (BuoyId)
//! - The parameter catalogue (physical ranges, polarity, canonical names)
//! - Buoy entities, readings and status
//! - Anomalies and insights emitted by the analysis stage
//! - Simulation configuration and its validation

pub mod id;
pub mod time;
pub mod parameter;
pub mod entity;
pub mod anomaly;
pub mod insight;
pub mod config;
pub mod error;

pub use id::*;
pub use time::*;
pub use parameter::*;
pub use entity::*;
pub use anomaly::*;
pub use insight::*;
pub use config::*;
pub use error::*;
