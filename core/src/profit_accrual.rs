//! ProfitAccrualEngine: daily crediting of plan profit to investors.
//!
//! One pass walks every active investment in id order, a page at a time.
//! Each page is its own unit of work, so a crash mid-run leaves whole
//! pages either fully applied or untouched; re-running picks up where the
//! profit_accrual primary key says it left off.
//!
//! An investment earns for day `d` when start_date < d <= end_date.
//! Reaching end_date completes it in the same unit of work that credits
//! its final day.

use crate::{
    coordinator::TransactionCoordinator,
    error::LedgerResult,
    event::{LedgerEvent, NewActivity},
    job::{JobReport, LedgerJob},
    model::Investment,
    store::LedgerTx,
    types::{format_minor, InvestmentId, Poisha},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AccrualReport {
    pub as_of: Option<NaiveDate>,
    pub scanned: usize,
    pub credited: usize,
    pub already_accrued: usize,
    pub not_yet_due: usize,
    pub completed: usize,
    pub credited_bdt: Poisha,
    pub batches: usize,
}

impl AccrualReport {
    fn absorb(&mut self, other: AccrualReport) {
        self.scanned += other.scanned;
        self.credited += other.credited;
        self.already_accrued += other.already_accrued;
        self.not_yet_due += other.not_yet_due;
        self.completed += other.completed;
        self.credited_bdt += other.credited_bdt;
    }
}

#[derive(Debug, Clone)]
pub struct ProfitAccrualEngine {
    batch_size: usize,
}

impl ProfitAccrualEngine {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn run(
        &self,
        coordinator: &mut TransactionCoordinator,
        as_of: NaiveDate,
        now: DateTime<Utc>,
    ) -> LedgerResult<AccrualReport> {
        let mut report = AccrualReport {
            as_of: Some(as_of),
            ..AccrualReport::default()
        };
        let mut cursor: InvestmentId = 0;

        loop {
            let (page, last_id) = coordinator.run("accrue_batch", |tx| {
                let investments = tx.active_investments_after(cursor, self.batch_size)?;
                let last_id = investments.last().map(|inv| inv.id);
                let mut page = AccrualReport::default();
                for investment in &investments {
                    accrue_one(tx, investment, as_of, now, &mut page)?;
                }
                Ok((page, last_id))
            })?;

            let Some(last_id) = last_id else { break };
            let full_page = page.scanned == self.batch_size;
            report.absorb(page);
            report.batches += 1;
            log::debug!("accrual batch {} done, cursor={last_id}", report.batches);
            if !full_page {
                break;
            }
            cursor = last_id;
        }

        log::info!(
            "accrual {as_of}: scanned={} credited={} skipped={} completed={} bdt={}",
            report.scanned,
            report.credited,
            report.already_accrued,
            report.completed,
            format_minor(report.credited_bdt)
        );
        Ok(report)
    }
}

fn accrue_one(
    tx: &LedgerTx<'_>,
    investment: &Investment,
    as_of: NaiveDate,
    now: DateTime<Utc>,
    report: &mut AccrualReport,
) -> LedgerResult<()> {
    report.scanned += 1;

    if as_of <= investment.start_date {
        report.not_yet_due += 1;
        return Ok(());
    }

    if as_of <= investment.end_date {
        let amount = investment.daily_profit_bdt;
        if tx.insert_accrual(investment.id, as_of, investment.user_id, amount, now)? {
            tx.credit_profit(investment.user_id, amount)?;
            let event = LedgerEvent::ProfitAccrued {
                investment_id: investment.id,
                accrual_date: as_of,
                amount_bdt: amount,
            };
            tx.append_activity(
                &NewActivity {
                    user_id: investment.user_id,
                    event: &event,
                    idempotency_key: None,
                    entity_id: Some(investment.id),
                },
                now,
            )?;
            report.credited += 1;
            report.credited_bdt += amount;
        } else {
            report.already_accrued += 1;
        }
    }

    // Past end_date without crediting: a missed final day is not back-filled.
    if as_of >= investment.end_date && tx.complete_investment(investment.id, now)? {
        let event = LedgerEvent::InvestmentCompleted {
            investment_id: investment.id,
            as_of,
        };
        tx.append_activity(
            &NewActivity {
                user_id: investment.user_id,
                event: &event,
                idempotency_key: None,
                entity_id: Some(investment.id),
            },
            now,
        )?;
        report.completed += 1;
    }
    Ok(())
}

impl LedgerJob for ProfitAccrualEngine {
    fn name(&self) -> &'static str {
        "profit_accrual"
    }

    fn run(
        &self,
        coordinator: &mut TransactionCoordinator,
        as_of: NaiveDate,
        now: DateTime<Utc>,
    ) -> LedgerResult<JobReport> {
        let report = ProfitAccrualEngine::run(self, coordinator, as_of, now)?;
        Ok(JobReport {
            job: self.name(),
            as_of,
            processed: report.scanned,
            applied: report.credited + report.completed,
        })
    }
}
