//! Ledger records. `User` carries the canonical balances; every other
//! record is a historical fact and never the source of a current balance.

use crate::types::{
    Cents, Currency, DepositId, InvestmentId, PlanId, Poisha, UserId, WithdrawalId,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

/// Authenticated caller, supplied per request by the auth layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

impl Identity {
    pub fn user(user_id: UserId) -> Self {
        Self { user_id, role: Role::User }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self { user_id, role: Role::Admin }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub referral_code: String,
    pub referred_by: Option<UserId>,
    pub referral_count: i64,
    pub balance_usd: Cents,
    pub balance_bdt: Poisha,
    pub total_invested_usd: Cents,
    pub total_deposited_usd: Cents,
    pub total_earned_bdt: Poisha,
    pub total_commission_bdt: Poisha,
    pub total_withdrawn_bdt: Poisha,
    pub created_at: DateTime<Utc>,
}

// ── Investment ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentStatus {
    Active,
    Completed,
}

impl InvestmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    /// No referrer at settlement time.
    None,
    Pending,
    Paid,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Investment {
    pub id: InvestmentId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub investment_usd: Cents,
    /// Copied from the plan at settlement.
    pub daily_profit_bdt: Poisha,
    pub duration_days: u32,
    pub status: InvestmentStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Referral chain as read at settlement.
    pub referrer_l1: Option<UserId>,
    pub referrer_l2: Option<UserId>,
    pub commission_status: CommissionStatus,
    pub created_at: DateTime<Utc>,
}

// ── Withdrawal ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalMethod {
    Bkash,
    Bep20,
}

impl WithdrawalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bkash => "bkash",
            Self::Bep20 => "bep20",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bkash" => Some(Self::Bkash),
            "bep20" => Some(Self::Bep20),
            _ => None,
        }
    }
}

/// Shared lifecycle of withdrawals and deposits:
/// pending → approved | rejected, both terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolveAction {
    Approve,
    Reject,
}

impl ResolveAction {
    pub fn target_status(&self) -> RequestStatus {
        match self {
            Self::Approve => RequestStatus::Approved,
            Self::Reject => RequestStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Withdrawal {
    pub id: WithdrawalId,
    pub user_id: UserId,
    pub amount_bdt: Poisha,
    pub fee_bdt: Poisha,
    pub net_amount_bdt: Poisha,
    pub method: WithdrawalMethod,
    pub account_number: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

// ── Deposit ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deposit {
    pub id: DepositId,
    pub user_id: UserId,
    pub amount_usd: Cents,
    pub tx_hash: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

// ── Accrual / commission / adjustments ─────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfitAccrual {
    pub investment_id: InvestmentId,
    pub accrual_date: NaiveDate,
    pub amount_bdt: Poisha,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Commission {
    pub id: i64,
    pub beneficiary_user_id: UserId,
    pub source_investment_id: InvestmentId,
    pub level: u8,
    /// Rate in force when this row was written.
    pub rate_poisha_per_usd: Poisha,
    pub amount_bdt: Poisha,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceAdjustment {
    pub id: i64,
    pub user_id: UserId,
    pub currency: Currency,
    pub amount: i64,
    pub reason: String,
    pub admin_id: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityEntry {
    pub id: i64,
    pub user_id: UserId,
    pub event_type: String,
    pub idempotency_key: Option<String>,
    pub entity_id: Option<i64>,
    pub correlation_id: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

// ── Read models ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinancialSummary {
    pub user_id: UserId,
    pub balance_usd: Cents,
    pub balance_bdt: Poisha,
    pub active_investment_usd: Cents,
    pub pending_withdrawal_bdt: Poisha,
    pub today_profit_bdt: Poisha,
    pub total_commission_bdt: Poisha,
    pub total_invested_usd: Cents,
    pub total_earned_bdt: Poisha,
    pub referral_count: i64,
}

/// Balances recomputed from history next to the stored ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reconciliation {
    pub user_id: UserId,
    pub stored_balance_usd: Cents,
    pub derived_balance_usd: Cents,
    pub stored_balance_bdt: Poisha,
    pub derived_balance_bdt: Poisha,
    pub stored_total_invested_usd: Cents,
    pub derived_total_invested_usd: Cents,
    pub stored_total_earned_bdt: Poisha,
    pub derived_total_earned_bdt: Poisha,
    pub stored_total_commission_bdt: Poisha,
    pub derived_total_commission_bdt: Poisha,
}

impl Reconciliation {
    pub fn is_balanced(&self) -> bool {
        self.stored_balance_usd == self.derived_balance_usd
            && self.stored_balance_bdt == self.derived_balance_bdt
            && self.stored_total_invested_usd == self.derived_total_invested_usd
            && self.stored_total_earned_bdt == self.derived_total_earned_bdt
            && self.stored_total_commission_bdt == self.derived_total_commission_bdt
    }
}
