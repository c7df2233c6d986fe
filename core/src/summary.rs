//! Read models: the dashboard summary and the per-user reconciliation.
//!
//! Both run inside one read transaction so every figure comes from the
//! same snapshot.

use crate::{
    error::{LedgerError, LedgerResult},
    model::{FinancialSummary, Reconciliation, RequestStatus},
    store::LedgerTx,
    types::{Currency, UserId},
};
use chrono::NaiveDate;

pub fn financial_summary(
    tx: &LedgerTx<'_>,
    user_id: UserId,
    today: NaiveDate,
) -> LedgerResult<FinancialSummary> {
    let user = tx
        .user(user_id)?
        .ok_or(LedgerError::NotFound { entity: "user", id: user_id })?;

    Ok(FinancialSummary {
        user_id,
        balance_usd: user.balance_usd,
        balance_bdt: user.balance_bdt,
        active_investment_usd: tx.active_investment_usd(user_id)?,
        pending_withdrawal_bdt: tx.withdrawal_total(user_id, RequestStatus::Pending)?,
        today_profit_bdt: tx.profit_on(user_id, today)?,
        total_commission_bdt: user.total_commission_bdt,
        total_invested_usd: user.total_invested_usd,
        total_earned_bdt: user.total_earned_bdt,
        referral_count: user.referral_count,
    })
}

/// Stored balances next to the same figures rebuilt from history.
pub fn reconcile(tx: &LedgerTx<'_>, user_id: UserId) -> LedgerResult<Reconciliation> {
    let user = tx
        .user(user_id)?
        .ok_or(LedgerError::NotFound { entity: "user", id: user_id })?;

    let invested = tx.total_investment_usd(user_id)?;
    let profit = tx.total_profit(user_id)?;
    let commission = tx.total_commission(user_id)?;
    // Pending withdrawals are already reserved out of the balance.
    let withdrawn = tx.withdrawal_total(user_id, RequestStatus::Pending)?
        + tx.withdrawal_total(user_id, RequestStatus::Approved)?;

    let derived_usd =
        tx.adjustment_total(user_id, Currency::Usd)? + tx.approved_deposit_usd(user_id)? - invested;
    let derived_bdt = tx.adjustment_total(user_id, Currency::Bdt)? + profit + commission - withdrawn;

    let reconciliation = Reconciliation {
        user_id,
        stored_balance_usd: user.balance_usd,
        derived_balance_usd: derived_usd,
        stored_balance_bdt: user.balance_bdt,
        derived_balance_bdt: derived_bdt,
        stored_total_invested_usd: user.total_invested_usd,
        derived_total_invested_usd: invested,
        stored_total_earned_bdt: user.total_earned_bdt,
        derived_total_earned_bdt: profit,
        stored_total_commission_bdt: user.total_commission_bdt,
        derived_total_commission_bdt: commission,
    };
    if !reconciliation.is_balanced() {
        log::error!("reconciliation mismatch for user {user_id}: {reconciliation:?}");
    }
    Ok(reconciliation)
}
