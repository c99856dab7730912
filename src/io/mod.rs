//! IO modules - external system interfaces
//!
//! - `ledger_store` - Whole-document JSON ledger persistence
//! - `http` - HTTP API (hyper)
//! - `sensor` - Last-value store for raw sensor board readings
//! - `prometheus` - Prometheus text exposition

pub mod http;
pub mod ledger_store;
pub mod prometheus;
pub mod sensor;

// Re-export commonly used types
pub use ledger_store::{FileLedgerStore, LedgerStore, MemoryLedgerStore, StoreError};
pub use sensor::{SensorBoard, SensorPayload};
