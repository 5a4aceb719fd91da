// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Injectable time source. Policy evaluation compares whole dates, so the
//! trait exposes both the instant and its UTC calendar day.

use chrono::{DateTime, NaiveDate, Utc};

/// Source of "now" for every eligibility comparison in the engine.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;

    /// Current UTC calendar day. Gate dates are compared at day granularity.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a fixed instant. Used by tests and rehearsal runs that
/// evaluate "what would happen on day X".
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Pins the clock to midnight UTC on the given day.
    pub fn at_date(date: NaiveDate) -> Self {
        FixedClock(
            date.and_hms_opt(0, 0, 0)
                .expect("midnight exists on every calendar day")
                .and_utc(),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_reports_the_pinned_day() {
        let day = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        let clock = FixedClock::at_date(day);
        assert_eq!(clock.today(), day);
        assert_eq!(clock.now().date_naive(), day);
    }
}
