//! Ledger events: the payloads written to the ActivityLog.
//!
//! RULE: every balance-affecting write appends exactly one event for
//! each user whose balance it touched, inside the same unit of work.

use crate::{
    model::{RequestStatus, WithdrawalMethod},
    types::{Cents, Currency, DepositId, InvestmentId, PlanId, Poisha, UserId, WithdrawalId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    // ── Accounts ───────────────────────────────────
    UserRegistered {
        user_id: UserId,
        referred_by: Option<UserId>,
    },
    BalanceAdjusted {
        currency: Currency,
        amount: i64,
        reason: String,
        admin_id: UserId,
    },

    // ── Investment settlement ──────────────────────
    InvestmentSettled {
        investment_id: InvestmentId,
        plan_id: PlanId,
        amount_usd: Cents,
        daily_profit_bdt: Poisha,
    },
    InvestmentCompleted {
        investment_id: InvestmentId,
        as_of: NaiveDate,
    },

    // ── Withdrawal settlement ──────────────────────
    WithdrawalRequested {
        withdrawal_id: WithdrawalId,
        amount_bdt: Poisha,
        method: WithdrawalMethod,
    },
    WithdrawalResolved {
        withdrawal_id: WithdrawalId,
        status: RequestStatus,
        refunded_bdt: Poisha,
    },

    // ── Deposit settlement ─────────────────────────
    DepositRequested {
        deposit_id: DepositId,
        amount_usd: Cents,
    },
    DepositResolved {
        deposit_id: DepositId,
        status: RequestStatus,
        credited_usd: Cents,
    },

    // ── Scheduled crediting ────────────────────────
    ProfitAccrued {
        investment_id: InvestmentId,
        accrual_date: NaiveDate,
        amount_bdt: Poisha,
    },
    CommissionCredited {
        source_investment_id: InvestmentId,
        level: u8,
        rate_poisha_per_usd: Poisha,
        amount_bdt: Poisha,
    },
}

impl LedgerEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::UserRegistered { .. } => "user_registered",
            Self::BalanceAdjusted { .. } => "balance_adjusted",
            Self::InvestmentSettled { .. } => "investment_settled",
            Self::InvestmentCompleted { .. } => "investment_completed",
            Self::WithdrawalRequested { .. } => "withdrawal_requested",
            Self::WithdrawalResolved { .. } => "withdrawal_resolved",
            Self::DepositRequested { .. } => "deposit_requested",
            Self::DepositResolved { .. } => "deposit_resolved",
            Self::ProfitAccrued { .. } => "profit_accrued",
            Self::CommissionCredited { .. } => "commission_credited",
        }
    }
}

/// An activity row about to be appended.
#[derive(Debug, Clone)]
pub struct NewActivity<'a> {
    pub user_id: UserId,
    pub event: &'a LedgerEvent,
    pub idempotency_key: Option<&'a str>,
    pub entity_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_tagged_with_type_name() {
        let event = LedgerEvent::InvestmentSettled {
            investment_id: 7,
            plan_id: 2,
            amount_usd: 60_00,
            daily_profit_bdt: 250_00,
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.type_name());
        assert_eq!(json["amount_usd"], 6000);
    }
}
