//! InvestmentSettlement: moves a plan's cost from spendable USD into an
//! active stake.
//!
//! One unit of work:
//!   1. Guarded UPDATE: balance_usd -= cost, total_invested_usd += cost
//!      (the same statement reads back referred_by).
//!   2. Insert the Investment with the plan's daily profit copied in.
//!   3. Append the ActivityLog entry carrying the idempotency key.
//!
//! Referral commission is credited by the caller after commit.

use crate::{
    coordinator::TransactionCoordinator,
    error::{LedgerError, LedgerResult},
    event::{LedgerEvent, NewActivity},
    idempotency::{prior_entity, Settled},
    model::{Identity, Investment},
    plan::PlanCatalog,
    store::NewInvestment,
    types::{format_minor, Currency, PlanId, UserId},
};
use chrono::{DateTime, Days, Utc};

const EVENT_TYPE: &str = "investment_settled";

pub struct InvestmentSettlement {
    plans: PlanCatalog,
}

impl InvestmentSettlement {
    pub fn new(plans: PlanCatalog) -> Self {
        Self { plans }
    }

    pub fn plans_mut(&mut self) -> &mut PlanCatalog {
        &mut self.plans
    }

    pub fn settle(
        &self,
        coordinator: &mut TransactionCoordinator,
        identity: &Identity,
        plan_id: PlanId,
        idempotency_key: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<Settled<Investment>> {
        let user_id = identity.user_id;

        let settled = coordinator.run("invest", |tx| {
            if let Some(id) = prior_entity(tx, user_id, idempotency_key, EVENT_TYPE)? {
                let investment = tx
                    .investment(id)?
                    .ok_or(LedgerError::NotFound { entity: "investment", id })?;
                return Ok(Settled::replayed(investment));
            }

            // Plan terms are read once, here, and copied onto the row.
            let plan = self
                .plans
                .get(plan_id)
                .ok_or(LedgerError::PlanNotFound { plan_id })?;

            let Some(referrer_l1) = tx.debit_usd_for_investment(user_id, plan.cost_usd)? else {
                return Err(if tx.user_exists(user_id)? {
                    LedgerError::InsufficientBalance {
                        user_id,
                        currency: Currency::Usd,
                        requested: plan.cost_usd,
                    }
                } else {
                    LedgerError::NotFound { entity: "user", id: user_id }
                });
            };
            let referrer_l2 = match referrer_l1 {
                Some(l1) => level_two_referrer(tx.referred_by(l1)?.flatten(), user_id),
                None => None,
            };

            let start_date = now.date_naive();
            let end_date = start_date
                .checked_add_days(Days::new(u64::from(plan.duration_days)))
                .ok_or_else(|| {
                    LedgerError::Other(anyhow::anyhow!(
                        "plan {plan_id} duration overflows from {start_date}"
                    ))
                })?;

            let investment = tx.insert_investment(
                &NewInvestment {
                    user_id,
                    plan_id,
                    investment_usd: plan.cost_usd,
                    daily_profit_bdt: plan.daily_profit_bdt,
                    duration_days: plan.duration_days,
                    start_date,
                    end_date,
                    referrer_l1,
                    referrer_l2,
                },
                now,
            )?;

            let event = LedgerEvent::InvestmentSettled {
                investment_id: investment.id,
                plan_id,
                amount_usd: investment.investment_usd,
                daily_profit_bdt: investment.daily_profit_bdt,
            };
            tx.append_activity(
                &NewActivity {
                    user_id,
                    event: &event,
                    idempotency_key: Some(idempotency_key),
                    entity_id: Some(investment.id),
                },
                now,
            )?;

            Ok(Settled::fresh(investment))
        })?;

        if settled.replayed {
            log::debug!(
                "invest replay: user={user_id} key={idempotency_key} investment={}",
                settled.value.id
            );
        } else {
            log::info!(
                "investment settled: id={} user={user_id} plan={plan_id} usd={}",
                settled.value.id,
                format_minor(settled.value.investment_usd)
            );
        }
        Ok(settled)
    }
}

/// A level-2 referrer equal to the investor closes a cycle; drop it.
fn level_two_referrer(candidate: Option<UserId>, investor: UserId) -> Option<UserId> {
    candidate.filter(|&id| id != investor)
}
