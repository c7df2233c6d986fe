//! Idempotency-key handling shared by the request-path settlements.
//!
//! A retried request carries the key of the original. The first thing a
//! settlement does inside its unit of work is look the key up in the
//! ActivityLog; a hit returns the entity the original request created.

use serde::Serialize;

use crate::{
    error::{LedgerError, LedgerResult},
    store::LedgerTx,
    types::UserId,
};

/// Result of a settlement plus whether it was served from a prior commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settled<T> {
    pub value: T,
    pub replayed: bool,
}

impl<T> Settled<T> {
    pub fn fresh(value: T) -> Self {
        Self { value, replayed: false }
    }

    pub fn replayed(value: T) -> Self {
        Self { value, replayed: true }
    }
}

/// Entity id committed under `key`, if the key was seen before.
/// A key reused for a different kind of request is a conflict.
pub fn prior_entity(
    tx: &LedgerTx<'_>,
    user_id: UserId,
    key: &str,
    event_type: &str,
) -> LedgerResult<Option<i64>> {
    let Some(entry) = tx.activity_by_key(user_id, key)? else {
        return Ok(None);
    };
    if entry.event_type != event_type {
        return Err(LedgerError::IdempotencyKeyReused {
            key: key.to_string(),
            original: entry.event_type,
        });
    }
    entry.entity_id.map(Some).ok_or_else(|| {
        LedgerError::Other(anyhow::anyhow!(
            "activity {} for key '{key}' has no entity id",
            entry.id
        ))
    })
}
