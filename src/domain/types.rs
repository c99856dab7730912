//! Shared types for the occupancy server

use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Kind of occupancy change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Enter,
    Exit,
    ManualSet,
    Reset,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

impl std::str::FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enter" => Ok(Action::Enter),
            "exit" => Ok(Action::Exit),
            "manual_set" => Ok(Action::ManualSet),
            "reset" => Ok(Action::Reset),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Enter => "enter",
            Action::Exit => "exit",
            Action::ManualSet => "manual_set",
            Action::Reset => "reset",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last raw reading pushed by the door sensor board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub timestamp: String,
    pub prox_state: serde_json::Value,
    pub servo_position: serde_json::Value,
    pub led_state: serde_json::Value,
}

impl Default for SensorReading {
    fn default() -> Self {
        Self {
            timestamp: iso_timestamp(&Local::now()),
            prox_state: serde_json::Value::from("LOW"),
            servo_position: serde_json::Value::from(0),
            led_state: serde_json::Value::from("OFF"),
        }
    }
}

/// UTC ISO-8601 with millisecond precision, e.g. `2024-03-15T11:30:00.000Z`
pub fn iso_timestamp(now: &DateTime<Local>) -> String {
    now.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Server-local calendar date key, e.g. `2024-03-15`
pub fn date_key(now: &DateTime<Local>) -> String {
    now.format("%Y-%m-%d").to_string()
}
