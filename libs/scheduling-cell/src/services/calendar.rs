// libs/scheduling-cell/src/services/calendar.rs
use chrono::{Datelike, Local, Months, NaiveDate, NaiveDateTime, Weekday};
use tracing::debug;

use shared_config::DEFAULT_BOOKING_HORIZON_MONTHS;
use shared_models::error::AppError;

use crate::models::{CalendarDay, DateRejection, MonthGrid};

/// Wall-clock time at the clinic. Appointment dates and times are stored in
/// this zone without an offset.
pub fn clinic_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// The clinic's current calendar date.
pub fn clinic_today() -> NaiveDate {
    clinic_now().date()
}

/// Which days a patient may book: not in the past, not on a weekend, and no
/// further out than the booking horizon.
#[derive(Debug, Clone, Copy)]
pub struct BookingCalendar {
    horizon_months: u32,
}

impl Default for BookingCalendar {
    fn default() -> Self {
        Self::new(DEFAULT_BOOKING_HORIZON_MONTHS)
    }
}

impl BookingCalendar {
    pub fn new(horizon_months: u32) -> Self {
        Self { horizon_months }
    }

    pub fn horizon_months(&self) -> u32 {
        self.horizon_months
    }

    /// Last bookable calendar date counted from `today`.
    pub fn latest_bookable(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_add_months(Months::new(self.horizon_months))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn check_date(&self, date: NaiveDate, today: NaiveDate) -> Result<(), DateRejection> {
        if date < today {
            return Err(DateRejection::Past(date));
        }

        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return Err(DateRejection::Weekend(date));
        }

        let latest = self.latest_bookable(today);
        if date > latest {
            return Err(DateRejection::BeyondHorizon { date, latest });
        }

        Ok(())
    }

    pub fn is_bookable(&self, date: NaiveDate, today: NaiveDate) -> bool {
        self.check_date(date, today).is_ok()
    }

    /// Lay out `month` of `year` Sunday-first, flagging each day bookable or not.
    pub fn month_grid(&self, year: i32, month: u32, today: NaiveDate) -> Result<MonthGrid, AppError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| AppError::ValidationError(format!("Invalid month {}-{}", year, month)))?;
        let next_month = first
            .checked_add_months(Months::new(1))
            .ok_or_else(|| AppError::ValidationError(format!("Month {}-{} is out of range", year, month)))?;

        let leading_blanks = first.weekday().num_days_from_sunday() as usize;
        let mut cells: Vec<Option<CalendarDay>> = vec![None; leading_blanks];

        cells.extend(first.iter_days().take_while(|day| *day < next_month).map(|date| {
            Some(CalendarDay {
                date,
                bookable: self.is_bookable(date, today),
                is_today: date == today,
            })
        }));

        debug!("Built month grid for {}-{:02} with {} leading blanks", year, month, leading_blanks);

        Ok(MonthGrid { year, month, cells })
    }
}
