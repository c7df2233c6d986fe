//! Scheduled job trait and report.
//!
//! RULE: Every off-request-path process implements LedgerJob.
//! `Ledger::run_scheduled_jobs` calls run() on each registered job
//! in registration order, once per scheduling period.
//! Jobs must be safe to re-run for the same date.

use crate::{coordinator::TransactionCoordinator, error::LedgerResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

pub trait LedgerJob: Send {
    /// Unique stable name for this job.
    fn name(&self) -> &'static str;

    /// Run one period.
    ///
    /// - `as_of`: the calendar day being processed
    /// - `now`:   wall-clock stamp for rows written
    fn run(
        &self,
        coordinator: &mut TransactionCoordinator,
        as_of: NaiveDate,
        now: DateTime<Utc>,
    ) -> LedgerResult<JobReport>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct JobReport {
    pub job: &'static str,
    pub as_of: NaiveDate,
    /// Records examined.
    pub processed: usize,
    /// Records that changed a balance or status.
    pub applied: usize,
}
