//! Domain models - the occupancy ledger and shared types
//!
//! - `ledger` - Ledger, Event, DayStat, HourStat (the persisted document)
//! - `types` - Action, SensorReading, timestamp helpers

pub mod ledger;
pub mod types;

pub use ledger::{DayStat, Event, HourStat, Ledger, RestaurantConfig, HISTORY_LIMIT};
pub use types::{Action, SensorReading};
