//! Manual balance adjustments by an administrator.
//!
//! Signed amounts: positive credits, negative debits. A debit goes through
//! the same guarded UPDATE as every other debit and never drives a balance
//! below zero. The adjustment row plus its activity entry are the audit
//! trail reconciliation reads back.

use crate::{
    coordinator::TransactionCoordinator,
    error::{LedgerError, LedgerResult},
    event::{LedgerEvent, NewActivity},
    model::{BalanceAdjustment, Identity},
    types::{format_minor, Currency, UserId},
};
use chrono::{DateTime, Utc};

pub fn adjust_balance(
    coordinator: &mut TransactionCoordinator,
    admin: &Identity,
    user_id: UserId,
    currency: Currency,
    amount: i64,
    reason: &str,
    now: DateTime<Utc>,
) -> LedgerResult<BalanceAdjustment> {
    if !admin.is_admin() {
        return Err(LedgerError::Forbidden);
    }
    if amount == 0 {
        return Err(LedgerError::Validation("adjustment amount must be non-zero".into()));
    }
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(LedgerError::Validation("adjustment reason must not be empty".into()));
    }

    let adjustment = coordinator.run("adjust_balance", |tx| {
        if !tx.adjust_balance(user_id, currency, amount)? {
            return Err(if tx.user_exists(user_id)? {
                LedgerError::InsufficientBalance {
                    user_id,
                    currency,
                    requested: amount.saturating_neg(),
                }
            } else {
                LedgerError::NotFound { entity: "user", id: user_id }
            });
        }

        let adjustment = tx.insert_adjustment(user_id, currency, amount, reason, admin.user_id, now)?;
        let event = LedgerEvent::BalanceAdjusted {
            currency,
            amount,
            reason: reason.to_string(),
            admin_id: admin.user_id,
        };
        tx.append_activity(
            &NewActivity {
                user_id,
                event: &event,
                idempotency_key: None,
                entity_id: Some(adjustment.id),
            },
            now,
        )?;
        Ok(adjustment)
    })?;

    log::info!(
        "balance adjusted: user={user_id} {} {} by admin {} ({reason})",
        currency.as_str(),
        format_minor(amount),
        admin.user_id
    );
    Ok(adjustment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{registration::register_user, store::LedgerStore};

    fn coordinator() -> TransactionCoordinator {
        let store = LedgerStore::in_memory().unwrap();
        store.migrate().unwrap();
        TransactionCoordinator::new(store)
    }

    #[test]
    fn most_negative_amount_is_refused_without_overflow() {
        let mut coordinator = coordinator();
        let now = Utc::now();
        let user = register_user(&mut coordinator, None, now).unwrap();

        let err = adjust_balance(
            &mut coordinator,
            &Identity::admin(9_000),
            user.id,
            Currency::Usd,
            i64::MIN,
            "clawback",
            now,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance { requested: i64::MAX, .. }
        ));
    }

    #[test]
    fn non_admin_cannot_adjust() {
        let mut coordinator = coordinator();
        let now = Utc::now();
        let user = register_user(&mut coordinator, None, now).unwrap();

        let err = adjust_balance(
            &mut coordinator,
            &Identity::user(user.id),
            user.id,
            Currency::Bdt,
            100_00,
            "bonus",
            now,
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden));
    }
}
