//! LIMNOS History - Per-buoy retention of tick snapshots
//!
//! Each buoy owns a FIFO ring of snapshots (all readings captured at one tick),
//! oldest first. The ring is bounded by count and optionally by age; appends past
//! the bound evict from the front. Reads borrow the ring and never copy it.

pub mod snapshot;
pub mod store;

pub use snapshot::*;
pub use store::*;
