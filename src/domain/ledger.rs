//! Ledger data model - the single persisted document holding all occupancy state
//!
//! JSON field names are camelCase so the file stays readable by the dashboard
//! and by any tooling that already understands the ledger layout.

use crate::domain::types::Action;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of events kept in `Ledger::history` (oldest evicted first)
pub const HISTORY_LIMIT: usize = 1000;

/// Restaurant configuration owned by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantConfig {
    pub max_capacity: u32,
    pub name: String,
    /// Near-capacity alert threshold as a percentage (0-100)
    pub alert_threshold: u32,
}

impl Default for RestaurantConfig {
    fn default() -> Self {
        Self { max_capacity: 50, name: "Restaurant".to_string(), alert_threshold: 80 }
    }
}

/// A single occupancy change recorded in the history log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// UTC ISO-8601 timestamp
    pub timestamp: String,
    pub action: Action,
    /// Magnitude actually applied (not the requested one)
    pub count: u32,
    /// Visitor count after the event was applied
    pub current_visitors: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourStat {
    pub hour: u32,
    pub visits: u64,
    pub avg_visitors: u32,
}

impl HourStat {
    pub fn empty(hour: u32) -> Self {
        Self { hour, visits: 0, avg_visitors: 0 }
    }

    /// Fold a new visitor-count sample into the running average
    ///
    /// avg' = round((avg * (n - 1) + sample) / n), where n counts the new sample.
    pub fn record(&mut self, current_visitors: u32) {
        self.visits += 1;
        let n = self.visits as f64;
        let total = self.avg_visitors as f64 * (n - 1.0) + current_visitors as f64;
        self.avg_visitors = (total / n).round() as u32;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayStat {
    /// Calendar date `YYYY-MM-DD` in server-local time
    pub date: String,
    pub total_visits: u64,
    pub peak_visitors: u32,
    #[serde(default)]
    pub hourly_data: BTreeMap<u32, HourStat>,
}

impl DayStat {
    pub fn new(date: &str) -> Self {
        Self { date: date.to_string(), total_visits: 0, peak_visitors: 0, hourly_data: BTreeMap::new() }
    }
}

/// Root persisted object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    pub config: RestaurantConfig,
    pub current_visitors: u32,
    #[serde(default)]
    pub history: Vec<Event>,
    #[serde(default)]
    pub daily_stats: BTreeMap<String, DayStat>,
}

impl Ledger {
    /// Fresh ledger: zero visitors, empty history and statistics
    pub fn new(config: RestaurantConfig) -> Self {
        Self { config, current_visitors: 0, history: Vec::new(), daily_stats: BTreeMap::new() }
    }

    /// Append an event, evicting the oldest entries beyond `HISTORY_LIMIT`
    pub fn push_event(&mut self, event: Event) {
        self.history.push(event);
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
    }

    pub fn last_event(&self) -> Option<&Event> {
        self.history.last()
    }
}
