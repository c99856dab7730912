//! Aggregation engine - applies one occupancy event to the ledger
//!
//! Every event, whatever its action, goes through the same path:
//! 1. compute the new visitor count (clamped to `[0, max_capacity]`)
//! 2. append an `Event` carrying the magnitude actually applied
//! 3. trim history to `HISTORY_LIMIT`
//! 4. update the `DayStat` for the local date and the `HourStat` for the local hour
//!
//! Only `manual_set` validates its input; enter/exit silently saturate.

use crate::domain::ledger::{DayStat, Event, HourStat, Ledger};
use crate::domain::types::{date_key, iso_timestamp, Action};
use crate::services::error::OccupancyError;
use chrono::{DateTime, Local, Timelike};

/// Magnitude for enter/exit: unspecified or non-positive means one person
#[inline]
fn step_magnitude(magnitude: Option<i64>) -> i64 {
    match magnitude {
        Some(n) if n > 0 => n,
        _ => 1,
    }
}

/// Compute the visitor count an action would produce, without mutating anything
pub fn resolve_count(
    current: u32,
    max_capacity: u32,
    action: Action,
    magnitude: Option<i64>,
) -> Result<u32, OccupancyError> {
    let max = max_capacity as i64;
    let current = current as i64;

    let next = match action {
        Action::Enter => current.saturating_add(step_magnitude(magnitude)).clamp(0, max),
        Action::Exit => current.saturating_sub(step_magnitude(magnitude)).clamp(0, max),
        Action::ManualSet => {
            let target = magnitude.ok_or_else(|| OccupancyError::validation("count is required"))?;
            if !(0..=max).contains(&target) {
                return Err(OccupancyError::validation(format!(
                    "count must be between 0 and {max_capacity}"
                )));
            }
            target
        }
        Action::Reset => 0,
    };

    Ok(next as u32)
}

/// Apply an event at `now` and return the history record that was appended
pub fn apply_event(
    ledger: &mut Ledger,
    action: Action,
    magnitude: Option<i64>,
    now: DateTime<Local>,
) -> Result<Event, OccupancyError> {
    let previous = ledger.current_visitors;
    let current = resolve_count(previous, ledger.config.max_capacity, action, magnitude)?;

    let count = match action {
        Action::Reset => 0,
        _ => previous.abs_diff(current),
    };

    ledger.current_visitors = current;

    let event = Event { timestamp: iso_timestamp(&now), action, count, current_visitors: current };
    ledger.push_event(event.clone());

    record_stats(ledger, current, &now);

    Ok(event)
}

fn record_stats(ledger: &mut Ledger, current_visitors: u32, now: &DateTime<Local>) {
    let date = date_key(now);
    let hour = now.hour();

    let day = ledger.daily_stats.entry(date.clone()).or_insert_with(|| DayStat::new(&date));
    day.total_visits += 1;
    day.peak_visitors = day.peak_visitors.max(current_visitors);

    day.hourly_data.entry(hour).or_insert_with(|| HourStat::empty(hour)).record(current_visitors);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::{RestaurantConfig, HISTORY_LIMIT};
    use chrono::TimeZone;

    fn ledger_with_capacity(max_capacity: u32) -> Ledger {
        Ledger::new(RestaurantConfig { max_capacity, name: "Test".to_string(), alert_threshold: 80 })
    }

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 15, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_enter_on_fresh_ledger() {
        let mut ledger = ledger_with_capacity(100);
        let event = apply_event(&mut ledger, Action::Enter, Some(5), at(12, 0)).unwrap();

        assert_eq!(ledger.current_visitors, 5);
        assert_eq!(ledger.history.len(), 1);
        assert_eq!(event.count, 5);
        assert_eq!(event.action, Action::Enter);
        assert_eq!(event.current_visitors, 5);

        let day = &ledger.daily_stats["2024-03-15"];
        assert_eq!(day.date, "2024-03-15");
        assert_eq!(day.total_visits, 1);
        assert_eq!(day.peak_visitors, 5);
        assert_eq!(day.hourly_data[&12], HourStat { hour: 12, visits: 1, avg_visitors: 5 });
    }

    #[test]
    fn test_enter_clamps_and_logs_applied_delta() {
        let mut ledger = ledger_with_capacity(100);
        ledger.current_visitors = 98;

        let event = apply_event(&mut ledger, Action::Enter, Some(10), at(12, 0)).unwrap();
        assert_eq!(ledger.current_visitors, 100);
        assert_eq!(event.count, 2);
    }

    #[test]
    fn test_exit_saturates_at_zero() {
        let mut ledger = ledger_with_capacity(100);
        ledger.current_visitors = 3;

        let event = apply_event(&mut ledger, Action::Exit, Some(10), at(12, 0)).unwrap();
        assert_eq!(ledger.current_visitors, 0);
        assert_eq!(event.count, 3);

        // Exit on an empty room still logs, with zero applied
        let event = apply_event(&mut ledger, Action::Exit, None, at(12, 1)).unwrap();
        assert_eq!(event.count, 0);
        assert_eq!(ledger.history.len(), 2);
    }

    #[test]
    fn test_huge_magnitude_saturates_at_bounds() {
        let mut ledger = ledger_with_capacity(100);
        ledger.current_visitors = 5;

        let event = apply_event(&mut ledger, Action::Enter, Some(i64::MAX), at(12, 0)).unwrap();
        assert_eq!(ledger.current_visitors, 100);
        assert_eq!(event.count, 95);

        let event = apply_event(&mut ledger, Action::Exit, Some(i64::MAX), at(12, 1)).unwrap();
        assert_eq!(ledger.current_visitors, 0);
        assert_eq!(event.count, 100);
    }

    #[test]
    fn test_non_positive_magnitude_defaults_to_one() {
        let mut ledger = ledger_with_capacity(10);
        apply_event(&mut ledger, Action::Enter, None, at(9, 0)).unwrap();
        apply_event(&mut ledger, Action::Enter, Some(0), at(9, 1)).unwrap();
        apply_event(&mut ledger, Action::Enter, Some(-4), at(9, 2)).unwrap();
        assert_eq!(ledger.current_visitors, 3);

        apply_event(&mut ledger, Action::Exit, Some(-2), at(9, 3)).unwrap();
        assert_eq!(ledger.current_visitors, 2);
    }

    #[test]
    fn test_count_stays_within_capacity_for_any_sequence() {
        let mut ledger = ledger_with_capacity(7);
        let steps: [(Action, i64); 10] = [
            (Action::Enter, 3),
            (Action::Enter, 9),
            (Action::Exit, 2),
            (Action::Exit, 20),
            (Action::Enter, 1),
            (Action::Exit, 1),
            (Action::Exit, 1),
            (Action::Enter, 7),
            (Action::Enter, 7),
            (Action::Exit, 3),
        ];

        for (i, (action, n)) in steps.into_iter().enumerate() {
            apply_event(&mut ledger, action, Some(n), at(10, i as u32)).unwrap();
            assert!(ledger.current_visitors <= 7);
        }
    }

    #[test]
    fn test_manual_set_out_of_range_rejected_without_mutation() {
        let mut ledger = ledger_with_capacity(20);
        apply_event(&mut ledger, Action::Enter, Some(4), at(12, 0)).unwrap();
        let before = ledger.clone();

        let err = apply_event(&mut ledger, Action::ManualSet, Some(21), at(12, 5)).unwrap_err();
        assert!(err.is_validation());
        assert!(apply_event(&mut ledger, Action::ManualSet, Some(-1), at(12, 5)).is_err());
        assert!(apply_event(&mut ledger, Action::ManualSet, None, at(12, 5)).is_err());

        assert_eq!(ledger, before);
    }

    #[test]
    fn test_manual_set_logs_absolute_change() {
        let mut ledger = ledger_with_capacity(20);
        ledger.current_visitors = 15;

        let event = apply_event(&mut ledger, Action::ManualSet, Some(6), at(12, 0)).unwrap();
        assert_eq!(ledger.current_visitors, 6);
        assert_eq!(event.count, 9);
        assert_eq!(event.action, Action::ManualSet);

        // Boundaries are inclusive
        apply_event(&mut ledger, Action::ManualSet, Some(20), at(12, 1)).unwrap();
        assert_eq!(ledger.current_visitors, 20);
        apply_event(&mut ledger, Action::ManualSet, Some(0), at(12, 2)).unwrap();
        assert_eq!(ledger.current_visitors, 0);
    }

    #[test]
    fn test_reset_always_logs_zero() {
        let mut ledger = ledger_with_capacity(50);
        ledger.current_visitors = 37;

        let event = apply_event(&mut ledger, Action::Reset, Some(99), at(23, 59)).unwrap();
        assert_eq!(ledger.current_visitors, 0);
        assert_eq!(event.action, Action::Reset);
        assert_eq!(event.count, 0);
        assert_eq!(event.current_visitors, 0);

        // Reset flows through the same statistics path
        let day = &ledger.daily_stats["2024-03-15"];
        assert_eq!(day.total_visits, 1);
        assert_eq!(day.hourly_data[&23].visits, 1);
    }

    #[test]
    fn test_hourly_average_and_daily_peak() {
        let mut ledger = ledger_with_capacity(100);
        apply_event(&mut ledger, Action::Enter, Some(10), at(18, 0)).unwrap();
        apply_event(&mut ledger, Action::Enter, Some(10), at(18, 10)).unwrap();
        apply_event(&mut ledger, Action::Exit, Some(7), at(18, 20)).unwrap();
        apply_event(&mut ledger, Action::Exit, Some(13), at(19, 0)).unwrap();

        let day = &ledger.daily_stats["2024-03-15"];
        assert_eq!(day.total_visits, 4);
        assert_eq!(day.peak_visitors, 20);

        // samples 10, 20, 13: round(15) then round((15*2 + 13) / 3) = round(14.33)
        let hour18 = &day.hourly_data[&18];
        assert_eq!(hour18.visits, 3);
        assert_eq!(hour18.avg_visitors, 14);

        let hour19 = &day.hourly_data[&19];
        assert_eq!(hour19.visits, 1);
        assert_eq!(hour19.avg_visitors, 0);
    }

    #[test]
    fn test_events_on_different_days_get_separate_stats() {
        let mut ledger = ledger_with_capacity(100);
        apply_event(&mut ledger, Action::Enter, Some(2), at(12, 0)).unwrap();
        let next_day = Local.with_ymd_and_hms(2024, 3, 16, 12, 0, 0).unwrap();
        apply_event(&mut ledger, Action::Enter, Some(2), next_day).unwrap();

        assert_eq!(ledger.daily_stats.len(), 2);
        assert_eq!(ledger.daily_stats["2024-03-15"].peak_visitors, 2);
        assert_eq!(ledger.daily_stats["2024-03-16"].peak_visitors, 4);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut ledger = ledger_with_capacity(5000);
        for i in 0..(HISTORY_LIMIT + 10) {
            apply_event(&mut ledger, Action::Enter, Some(1), at(12, (i % 60) as u32)).unwrap();
        }

        assert_eq!(ledger.history.len(), HISTORY_LIMIT);
        // First surviving event is the 11th applied
        assert_eq!(ledger.history[0].current_visitors, 11);
        assert_eq!(ledger.daily_stats["2024-03-15"].total_visits, (HISTORY_LIMIT + 10) as u64);
    }
}
