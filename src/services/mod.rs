//! Services - occupancy business logic
//!
//! - `aggregation` - Applies an event to the ledger and updates statistics
//! - `query` - Read-only projections (status, history, daily/hourly stats)
//! - `occupancy` - Load → mutate → save orchestration per request
//! - `error` - Validation and storage error taxonomy

pub mod aggregation;
pub mod error;
pub mod occupancy;
pub mod query;

// Re-export commonly used types
pub use error::OccupancyError;
pub use occupancy::{ConfigPatch, OccupancyService};
