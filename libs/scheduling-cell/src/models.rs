// libs/scheduling-cell/src/models.rs
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::time_format::hhmm;

// ==============================================================================
// SERVICE CATALOG
// ==============================================================================

/// A bookable treatment. Names are the unique key used everywhere else.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Service {
    pub name: &'static str,
    /// Appointment type id on the external scheduler.
    pub external_id: u32,
    pub duration_minutes: u32,
}

// ==============================================================================
// SLOTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Slot {
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub datetime: NaiveDateTime,
}

/// Result of one availability query. An empty `slots` with no `error` means the
/// day is simply full; `error` is set when the scheduler could not be asked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotLookup {
    pub date: NaiveDate,
    pub service_name: String,
    pub slots: Vec<Slot>,
    pub error: Option<String>,
}

impl SlotLookup {
    pub fn found(date: NaiveDate, service_name: &str, slots: Vec<Slot>) -> Self {
        Self {
            date,
            service_name: service_name.to_string(),
            slots,
            error: None,
        }
    }

    pub fn failed(date: NaiveDate, service_name: &str, error: impl Into<String>) -> Self {
        Self {
            date,
            service_name: service_name.to_string(),
            slots: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    pub fn contains_time(&self, time: NaiveTime) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.time == time)
    }
}

// ==============================================================================
// CALENDAR
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateRejection {
    #[error("{0} is in the past")]
    Past(NaiveDate),

    #[error("{0} falls on a weekend")]
    Weekend(NaiveDate),

    #[error("{date} is beyond the booking window (latest {latest})")]
    BeyondHorizon { date: NaiveDate, latest: NaiveDate },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub bookable: bool,
    pub is_today: bool,
}

/// One month laid out Sunday-first; `None` cells pad the first week.
#[derive(Debug, Clone, Serialize)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub cells: Vec<Option<CalendarDay>>,
}

impl MonthGrid {
    pub fn days(&self) -> impl Iterator<Item = &CalendarDay> {
        self.cells.iter().flatten()
    }

    pub fn bookable_days(&self) -> impl Iterator<Item = &CalendarDay> {
        self.days().filter(|day| day.bookable)
    }
}

// ==============================================================================
// SCHEDULER WIRE FORMAT
// ==============================================================================

/// Slot as reported by the scheduler. `datetime` may carry a UTC offset
/// (`2024-06-03T09:00:00-0700`); the clinic-local wall clock is what we keep.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SchedulerSlot {
    pub time: Option<String>,
    pub datetime: String,
}
