use crate::types::{Currency, PlanId, UserId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Plan {plan_id} not found")]
    PlanNotFound { plan_id: PlanId },

    #[error("Insufficient {} balance for user {user_id}: requested {requested}", currency.as_str())]
    InsufficientBalance {
        user_id: UserId,
        currency: Currency,
        requested: i64,
    },

    #[error("Amount {amount} outside allowed range [{min}, {max}]")]
    AmountOutOfRange { amount: i64, min: i64, max: i64 },

    #[error("Invalid {method} account: {reason}")]
    InvalidAccount { method: String, reason: String },

    #[error("Deposit transaction {tx_hash} already recorded")]
    DuplicateDeposit { tx_hash: String },

    #[error("{entity} {id} already resolved")]
    AlreadyResolved { entity: &'static str, id: i64 },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Operation requires an admin identity")]
    Forbidden,

    #[error("Idempotency key '{key}' was already used for {original}")]
    IdempotencyKeyReused { key: String, original: String },

    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Error taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    BusinessRule,
    Conflict,
    Storage,
    Internal,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::PlanNotFound { .. }
            | Self::InsufficientBalance { .. }
            | Self::AmountOutOfRange { .. }
            | Self::InvalidAccount { .. }
            | Self::DuplicateDeposit { .. }
            | Self::NotFound { .. }
            | Self::Forbidden => ErrorKind::BusinessRule,
            Self::AlreadyResolved { .. } | Self::IdempotencyKeyReused { .. } => ErrorKind::Conflict,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Serialization(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to hand back to a caller. Storage and internal
    /// failures never expose their cause.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Storage => "temporary storage failure, retry with the same idempotency key".into(),
            ErrorKind::Internal => "internal error".into(),
            _ => self.to_string(),
        }
    }

    /// True when no state was persisted and a retry may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
