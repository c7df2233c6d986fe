//! Typed requests accepted by the ledger.
//!
//! Shape checks (non-empty keys, positive amounts, non-blank strings)
//! happen in `validate()` before any store access. Business checks
//! (ranges, balances, plan existence) belong to the settlements.

use crate::{
    error::{LedgerError, LedgerResult},
    model::{ResolveAction, WithdrawalMethod},
    types::{Cents, Currency, DepositId, PlanId, Poisha, UserId, WithdrawalId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const MAX_KEY_LEN: usize = 128;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvestRequest {
    pub plan_id: PlanId,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WithdrawalRequest {
    pub amount_bdt: Poisha,
    pub method: WithdrawalMethod,
    pub account_number: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DepositRequest {
    pub amount_usd: Cents,
    pub tx_hash: String,
    pub idempotency_key: String,
}

/// Everything the runner's IPC loop can ask for.
/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum LedgerRequest {
    // ── Accounts ──────────────────────────────────
    RegisterUser {
        #[serde(default)]
        referral_code: Option<String>,
    },
    AdjustBalance {
        user_id: UserId,
        currency: Currency,
        amount: i64,
        reason: String,
    },

    // ── Settlement ────────────────────────────────
    Invest(InvestRequest),
    RequestWithdrawal(WithdrawalRequest),
    ResolveWithdrawal {
        withdrawal_id: WithdrawalId,
        action: ResolveAction,
    },
    RequestDeposit(DepositRequest),
    ResolveDeposit {
        deposit_id: DepositId,
        action: ResolveAction,
    },

    // ── Reads ─────────────────────────────────────
    Summary,
    Reconcile {
        user_id: UserId,
    },
    Investments,
    Withdrawals,
    Commissions,
    Activity {
        #[serde(default = "default_limit")]
        limit: usize,
    },
    PendingWithdrawals {
        #[serde(default = "default_limit")]
        limit: usize,
    },

    // ── Jobs ──────────────────────────────────────
    Accrue {
        as_of: NaiveDate,
    },
    RetryCommissions,
    RunScheduledJobs {
        as_of: NaiveDate,
    },
}

fn default_limit() -> usize {
    50
}

impl LedgerRequest {
    pub fn validate(&self) -> LedgerResult<()> {
        match self {
            Self::Invest(req) => req.validate(),
            Self::RequestWithdrawal(req) => req.validate(),
            Self::RequestDeposit(req) => req.validate(),
            Self::AdjustBalance { amount, reason, .. } => {
                if *amount == 0 {
                    return Err(LedgerError::Validation("adjustment amount must be non-zero".into()));
                }
                non_blank("reason", reason)
            }
            Self::RegisterUser { referral_code: Some(code) } => non_blank("referral_code", code),
            Self::Activity { limit } | Self::PendingWithdrawals { limit } if *limit == 0 => {
                Err(LedgerError::Validation("limit must be positive".into()))
            }
            _ => Ok(()),
        }
    }
}

impl InvestRequest {
    pub fn validate(&self) -> LedgerResult<()> {
        idempotency_key(&self.idempotency_key)
    }
}

impl WithdrawalRequest {
    pub fn validate(&self) -> LedgerResult<()> {
        idempotency_key(&self.idempotency_key)?;
        positive("amount_bdt", self.amount_bdt)?;
        non_blank("account_number", &self.account_number)
    }
}

impl DepositRequest {
    pub fn validate(&self) -> LedgerResult<()> {
        idempotency_key(&self.idempotency_key)?;
        positive("amount_usd", self.amount_usd)?;
        non_blank("tx_hash", &self.tx_hash)
    }
}

fn idempotency_key(key: &str) -> LedgerResult<()> {
    non_blank("idempotency_key", key)?;
    if key.len() > MAX_KEY_LEN {
        return Err(LedgerError::Validation(format!(
            "idempotency_key longer than {MAX_KEY_LEN} bytes"
        )));
    }
    Ok(())
}

fn positive(field: &str, amount: i64) -> LedgerResult<()> {
    if amount <= 0 {
        return Err(LedgerError::Validation(format!("{field} must be positive")));
    }
    Ok(())
}

fn non_blank(field: &str, value: &str) -> LedgerResult<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}
