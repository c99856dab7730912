//! Raw sensor board interface
//!
//! The door board pushes its proximity, servo and LED state. Only the last
//! reading is kept, in memory; it is never written to the ledger.

use crate::domain::types::{iso_timestamp, SensorReading};
use chrono::Local;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::info;

/// Body of `POST /api/data`. Fields are passed through as-is; missing ones become null.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorPayload {
    #[serde(default)]
    pub prox_state: serde_json::Value,
    #[serde(default)]
    pub servo_position: serde_json::Value,
    #[serde(default)]
    pub led_state: serde_json::Value,
}

#[derive(Default)]
pub struct SensorBoard {
    last: RwLock<SensorReading>,
}

impl SensorBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the last reading, stamping it with the current server time
    pub fn record(&self, payload: SensorPayload) -> SensorReading {
        let reading = SensorReading {
            timestamp: iso_timestamp(&Local::now()),
            prox_state: payload.prox_state,
            servo_position: payload.servo_position,
            led_state: payload.led_state,
        };
        *self.last.write() = reading.clone();

        info!(
            prox_state = %reading.prox_state,
            servo_position = %reading.servo_position,
            led_state = %reading.led_state,
            "sensor_data_received"
        );
        reading
    }

    pub fn latest(&self) -> SensorReading {
        self.last.read().clone()
    }
}
