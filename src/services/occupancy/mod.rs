//! Occupancy service - one load → mutate → save cycle per operation
//!
//! The service is the only caller of the aggregation engine and the ledger store.
//! Nothing is cached between calls; the store is the single source of truth.
//! Mutations run inside a single-writer section so two concurrent requests
//! cannot read the same ledger and overwrite each other's update.


use crate::domain::ledger::{DayStat, Event, HourStat, Ledger, RestaurantConfig};
use crate::domain::types::{date_key, iso_timestamp, Action};
use crate::infra::metrics::Metrics;
use crate::io::ledger_store::LedgerStore;
use crate::services::aggregation::apply_event;
use crate::services::error::OccupancyError;
use crate::services::query::{self, HistoryView, StatusView};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Source of "now" for event timestamps and the "today" of hourly stats
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Partial update for the ledger-owned restaurant config
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    pub max_capacity: Option<i64>,
    pub name: Option<String>,
    pub alert_threshold: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedEvent {
    pub action: Action,
    /// Requested magnitude (1-3); the ledger records what was actually applied
    pub count: u32,
    pub current_visitors: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthView {
    pub status: &'static str,
    pub timestamp: String,
    /// Seconds since the service was created
    pub uptime: f64,
}

pub struct OccupancyService {
    store: Arc<dyn LedgerStore>,
    metrics: Arc<Metrics>,
    clock: Clock,
    write_lock: Mutex<()>,
    started_at: Instant,
}

impl OccupancyService {
    pub fn new(store: Arc<dyn LedgerStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            metrics,
            clock: Arc::new(Local::now),
            write_lock: Mutex::new(()),
            started_at: Instant::now(),
        }
    }

    /// Replace the wall clock (tests pin dates and hours with this)
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Local> {
        (self.clock)()
    }

    fn load(&self) -> Result<Ledger, OccupancyError> {
        self.store.load().map_err(|e| {
            self.metrics.record_store_error();
            error!(error = %e, "ledger_load_failed");
            OccupancyError::Store(e)
        })
    }

    fn save(&self, ledger: &Ledger) -> Result<(), OccupancyError> {
        self.store.save(ledger).map_err(|e| {
            self.metrics.record_store_error();
            error!(error = %e, "ledger_save_failed");
            OccupancyError::Store(e)
        })
    }

    /// Run `f` against a freshly loaded ledger and persist the result.
    ///
    /// If `f` fails nothing is saved.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Ledger, DateTime<Local>) -> Result<T, OccupancyError>,
    ) -> Result<T, OccupancyError> {
        let _guard = self.write_lock.lock();
        let mut ledger = self.load()?;
        let out = f(&mut ledger, self.now()).inspect_err(|e| {
            if e.is_validation() {
                self.metrics.record_validation_rejection();
                warn!(reason = %e, "request_rejected");
            }
        })?;
        self.save(&ledger)?;
        self.metrics.set_restaurant(&ledger.config.name);
        Ok(out)
    }

    fn apply(&self, action: Action, count: Option<i64>) -> Result<Event, OccupancyError> {
        let (event, max_capacity) = self.mutate(|ledger, now| {
            let event = apply_event(ledger, action, count, now)?;
            Ok((event, ledger.config.max_capacity))
        })?;

        self.metrics.record_event(action, event.current_visitors, max_capacity);
        info!(
            action = %action,
            requested = ?count,
            applied = %event.count,
            current_visitors = %event.current_visitors,
            "visitors_updated"
        );
        Ok(event)
    }

    pub fn status(&self) -> Result<StatusView, OccupancyError> {
        Ok(query::status(&self.load()?))
    }

    /// Enter or exit by `count` people (default 1), saturating at the bounds
    pub fn update_visitors(&self, action: Action, count: Option<i64>) -> Result<Event, OccupancyError> {
        if !matches!(action, Action::Enter | Action::Exit) {
            self.metrics.record_validation_rejection();
            return Err(OccupancyError::validation("action must be 'enter' or 'exit'"));
        }
        self.apply(action, count)
    }

    /// Set the count to an absolute value in `[0, max_capacity]`
    pub fn set_visitors(&self, count: Option<i64>) -> Result<Event, OccupancyError> {
        self.apply(Action::ManualSet, count)
    }

    pub fn reset(&self) -> Result<Event, OccupancyError> {
        self.apply(Action::Reset, None)
    }

    pub fn history(&self, limit: usize) -> Result<HistoryView, OccupancyError> {
        Ok(query::history_window(&self.load()?, limit))
    }

    pub fn daily_stats(&self, days: usize) -> Result<Vec<DayStat>, OccupancyError> {
        Ok(query::daily_window(&self.load()?, days))
    }

    /// 24 dense hourly slots for the current local date
    pub fn hourly_stats(&self) -> Result<Vec<HourStat>, OccupancyError> {
        let ledger = self.load()?;
        Ok(query::hourly_for(&ledger, &date_key(&self.now())))
    }

    pub fn capacity_check(&self) -> Result<bool, OccupancyError> {
        Ok(query::has_capacity(&self.load()?))
    }

    /// Apply a partial config update. All fields are validated before any is applied.
    pub fn update_config(&self, patch: ConfigPatch) -> Result<RestaurantConfig, OccupancyError> {
        let (config, current_visitors) = self.mutate(|ledger, _now| {
            let mut config = ledger.config.clone();

            if let Some(max_capacity) = patch.max_capacity {
                if !(1..=u32::MAX as i64).contains(&max_capacity) {
                    return Err(OccupancyError::validation("maxCapacity must be a positive integer"));
                }
                config.max_capacity = max_capacity as u32;
            }
            if let Some(threshold) = patch.alert_threshold {
                if !(0..=100).contains(&threshold) {
                    return Err(OccupancyError::validation("alertThreshold must be between 0 and 100"));
                }
                config.alert_threshold = threshold as u32;
            }
            if let Some(name) = patch.name {
                let name = name.trim();
                if name.is_empty() {
                    return Err(OccupancyError::validation("name must not be empty"));
                }
                config.name = name.to_string();
            }

            // A lowered capacity must not leave the room over-full
            if ledger.current_visitors > config.max_capacity {
                warn!(
                    current_visitors = %ledger.current_visitors,
                    max_capacity = %config.max_capacity,
                    "visitors_clamped_to_new_capacity"
                );
                ledger.current_visitors = config.max_capacity;
            }

            ledger.config = config.clone();
            Ok((config, ledger.current_visitors))
        })?;

        self.metrics.set_occupancy(current_visitors, config.max_capacity);

        info!(
            name = %config.name,
            max_capacity = %config.max_capacity,
            alert_threshold = %config.alert_threshold,
            "config_updated"
        );
        Ok(config)
    }

    /// Random enter/exit of 1-3 people, through the normal event path
    pub fn simulate(&self) -> Result<SimulatedEvent, OccupancyError> {
        self.simulate_with(&mut rand::thread_rng())
    }

    pub fn simulate_with<R: Rng>(&self, rng: &mut R) -> Result<SimulatedEvent, OccupancyError> {
        let action = if rng.gen_bool(0.5) { Action::Enter } else { Action::Exit };
        let count: u32 = rng.gen_range(1..=3);

        let event = self.update_visitors(action, Some(count as i64))?;
        Ok(SimulatedEvent { action, count, current_visitors: event.current_visitors })
    }

    pub fn health(&self) -> HealthView {
        HealthView {
            status: "ok",
            timestamp: iso_timestamp(&self.now()),
            uptime: self.started_at.elapsed().as_secs_f64(),
        }
    }
}
