//! LIMNOS Runtime - Engine orchestration and the periodic tick loop
//!
//! Each tick runs these stages for every buoy, in id order:
//! 1. Advance every parameter through the variation model
//! 2. Append the tick snapshot to history
//! 3. Detect anomalies against the preceding history
//! 4. Recompute active alerts
//! 5. Classify health status and record transitions
//! 6. Generate insights, when the throttle admits the tick
//!
//! The scheduler drives ticks on a tokio interval and delivers the results to
//! caller-supplied callbacks.

pub mod throttle;
pub mod engine;
pub mod scheduler;
pub mod logging;

pub use throttle::*;
pub use engine::*;
pub use scheduler::*;
pub use logging::*;
