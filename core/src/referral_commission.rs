//! ReferralCommissionEngine: credits up to two levels of referrers a
//! share of a newly settled investment.
//!
//! Runs in its own unit of work after the investment commits. The
//! commission(source_investment_id, level) unique key makes it idempotent:
//! a row already there means that level was paid, and re-running is a
//! no-op. Rates are snapshotted when the engine is called and written on
//! each row; later rate changes never touch existing rows.

use crate::{
    config::CommissionRates,
    coordinator::TransactionCoordinator,
    error::{LedgerError, LedgerResult},
    event::{LedgerEvent, NewActivity},
    job::{JobReport, LedgerJob},
    model::{Commission, CommissionStatus},
    types::{format_minor, Cents, InvestmentId, Poisha},
};
use chrono::{DateTime, NaiveDate, Utc};

/// Commission for `investment_usd` at `rate` poisha per USD, floored.
pub fn commission_amount(investment_usd: Cents, rate_poisha_per_usd: Poisha) -> Poisha {
    investment_usd * rate_poisha_per_usd / 100
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommissionOutcome {
    pub credited: Vec<Commission>,
    pub already_paid: usize,
}

impl CommissionOutcome {
    pub fn total_bdt(&self) -> Poisha {
        self.credited.iter().map(|c| c.amount_bdt).sum()
    }
}

#[derive(Debug, Clone)]
pub struct ReferralCommissionEngine {
    rates: CommissionRates,
}

impl ReferralCommissionEngine {
    pub fn new(rates: CommissionRates) -> Self {
        Self { rates }
    }

    pub fn rates(&self) -> CommissionRates {
        self.rates
    }

    /// Applies to commissions credited from now on.
    pub fn set_rates(&mut self, rates: CommissionRates) {
        self.rates = rates;
    }

    pub fn credit(
        &self,
        coordinator: &mut TransactionCoordinator,
        investment_id: InvestmentId,
        now: DateTime<Utc>,
    ) -> LedgerResult<CommissionOutcome> {
        let rates = self.rates;

        let outcome = coordinator.run("credit_commission", |tx| {
            let investment = tx.investment(investment_id)?.ok_or(LedgerError::NotFound {
                entity: "investment",
                id: investment_id,
            })?;

            let mut outcome = CommissionOutcome::default();
            let chain = [(1u8, investment.referrer_l1), (2u8, investment.referrer_l2)];

            for (level, beneficiary) in chain {
                let Some(beneficiary) = beneficiary else { continue };
                let rate = rates.for_level(level);
                let amount = commission_amount(investment.investment_usd, rate);

                let Some(commission) =
                    tx.insert_commission(beneficiary, investment_id, level, rate, amount, now)?
                else {
                    outcome.already_paid += 1;
                    continue;
                };

                tx.credit_commission(beneficiary, amount)?;
                let event = LedgerEvent::CommissionCredited {
                    source_investment_id: investment_id,
                    level,
                    rate_poisha_per_usd: rate,
                    amount_bdt: amount,
                };
                tx.append_activity(
                    &NewActivity {
                        user_id: beneficiary,
                        event: &event,
                        idempotency_key: None,
                        entity_id: Some(commission.id),
                    },
                    now,
                )?;
                outcome.credited.push(commission);
            }

            if investment.commission_status == CommissionStatus::Pending {
                tx.set_commission_status(investment_id, CommissionStatus::Paid)?;
            }
            Ok(outcome)
        })?;

        if !outcome.credited.is_empty() {
            log::info!(
                "commission credited: investment={investment_id} levels={} bdt={}",
                outcome.credited.len(),
                format_minor(outcome.total_bdt())
            );
        }
        Ok(outcome)
    }

    /// Re-run crediting for every investment whose post-commit crediting
    /// did not finish. Returns (pending found, investments completed).
    pub fn retry_pending(
        &self,
        coordinator: &mut TransactionCoordinator,
        now: DateTime<Utc>,
    ) -> LedgerResult<(usize, usize)> {
        let pending = coordinator.read(|tx| tx.investments_with_pending_commission())?;
        let mut completed = 0;
        for investment_id in &pending {
            match self.credit(coordinator, *investment_id, now) {
                Ok(_) => completed += 1,
                Err(err) if err.is_retryable() => {
                    log::warn!("commission retry for investment {investment_id} failed: {err}");
                }
                Err(err) => return Err(err),
            }
        }
        Ok((pending.len(), completed))
    }
}

impl LedgerJob for ReferralCommissionEngine {
    fn name(&self) -> &'static str {
        "commission_retry"
    }

    fn run(
        &self,
        coordinator: &mut TransactionCoordinator,
        as_of: NaiveDate,
        now: DateTime<Utc>,
    ) -> LedgerResult<JobReport> {
        let (processed, applied) = self.retry_pending(coordinator, now)?;
        Ok(JobReport {
            job: self.name(),
            as_of,
            processed,
            applied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_rates_match_percent_of_converted_investment() {
        // 10% and 5% of 60 USD at 110 BDT/USD.
        assert_eq!(commission_amount(60_00, 11_00), 660_00);
        assert_eq!(commission_amount(60_00, 5_50), 330_00);
    }

    #[test]
    fn commission_amount_floors_fractional_poisha() {
        assert_eq!(commission_amount(1, 5_50), 5);
        assert_eq!(commission_amount(0, 11_00), 0);
    }
}
