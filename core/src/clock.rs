//! Ledger clock: the only source of "now" and "today" for the core.
//!
//! Settlements stamp `created_at`/`resolved_at` and investment start dates
//! from the clock they are given. Tests drive a ManualClock so accrual
//! windows can be crossed without waiting.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Mutex;

pub trait LedgerClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar day in UTC. Accrual keys use this.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl LedgerClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Midnight UTC on `date`.
    pub fn at_date(date: NaiveDate) -> Self {
        Self::new(date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance_days(&self, days: i64) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += Duration::days(days);
    }
}

impl LedgerClock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_whole_days() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 30).unwrap();
        let clock = ManualClock::at_date(start);
        assert_eq!(clock.today(), start);
        clock.advance_days(3);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 2, 2).unwrap());
    }
}
