//! Ledger & settlement core: balances, investments, withdrawals,
//! deposits, daily profit accrual and referral commission.

pub mod adjustment;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod deposit_settlement;
pub mod error;
pub mod event;
pub mod idempotency;
pub mod investment_settlement;
pub mod job;
pub mod ledger;
pub mod model;
pub mod plan;
pub mod profit_accrual;
pub mod referral_commission;
pub mod registration;
pub mod request;
pub mod store;
pub mod summary;
pub mod types;
pub mod withdrawal_settlement;
