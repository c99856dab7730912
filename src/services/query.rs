//! Read-only projections over the ledger

use crate::domain::ledger::{DayStat, Event, HourStat, Ledger};
use serde::Serialize;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const DEFAULT_DAILY_DAYS: usize = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub current_visitors: u32,
    pub max_capacity: u32,
    pub occupancy_rate: u32,
    pub available_seats: u32,
    pub is_near_capacity: bool,
    pub restaurant_name: String,
    pub last_update: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryView {
    pub history: Vec<Event>,
    /// Events retained in the ledger (capped by the history limit)
    pub total: usize,
}

pub fn status(ledger: &Ledger) -> StatusView {
    let current = ledger.current_visitors;
    let max = ledger.config.max_capacity;

    let occupancy_rate =
        if max == 0 { 0 } else { (current as f64 / max as f64 * 100.0).round() as u32 };
    let near_capacity_at = max as f64 * ledger.config.alert_threshold as f64 / 100.0;

    StatusView {
        current_visitors: current,
        max_capacity: max,
        occupancy_rate,
        available_seats: max.saturating_sub(current),
        is_near_capacity: current as f64 >= near_capacity_at,
        restaurant_name: ledger.config.name.clone(),
        last_update: ledger.last_event().map(|e| e.timestamp.clone()),
    }
}

/// Last `limit` events in chronological order
pub fn history_window(ledger: &Ledger, limit: usize) -> HistoryView {
    let start = ledger.history.len().saturating_sub(limit);
    HistoryView { history: ledger.history[start..].to_vec(), total: ledger.history.len() }
}

/// Most recent `days` dates present in the ledger, ascending by date
pub fn daily_window(ledger: &Ledger, days: usize) -> Vec<DayStat> {
    // BTreeMap iterates keys in ascending order; ISO dates sort chronologically
    let skip = ledger.daily_stats.len().saturating_sub(days);
    ledger.daily_stats.values().skip(skip).cloned().collect()
}

/// Dense 24-slot hourly breakdown for `date`; hours without data are zero-filled
pub fn hourly_for(ledger: &Ledger, date: &str) -> Vec<HourStat> {
    let day = ledger.daily_stats.get(date);
    (0..24)
        .map(|hour| {
            day.and_then(|d| d.hourly_data.get(&hour))
                .cloned()
                .unwrap_or_else(|| HourStat::empty(hour))
        })
        .collect()
}

pub fn has_capacity(ledger: &Ledger) -> bool {
    ledger.current_visitors < ledger.config.max_capacity
}

/// Parse an optional positive count from a query string value, falling back to `default`
pub fn window_size(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|v| v.trim().parse::<usize>().ok()).filter(|&n| n > 0).unwrap_or(default)
}
