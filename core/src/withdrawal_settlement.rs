//! WithdrawalSettlement: reserves BDT for a payout request and drives
//! its approve/reject lifecycle.
//!
//! State machine (no other edges):
//!   pending → approved   (terminal, funds already left at request time)
//!   pending → rejected   (terminal, funds credited back)
//!
//! Who wins an approve/reject race is decided by the conditional UPDATE's
//! row count; the loser gets AlreadyResolved.

use crate::{
    config::WithdrawalConfig,
    coordinator::TransactionCoordinator,
    error::{LedgerError, LedgerResult},
    event::{LedgerEvent, NewActivity},
    idempotency::{prior_entity, Settled},
    model::{Identity, RequestStatus, ResolveAction, Withdrawal, WithdrawalMethod},
    request::WithdrawalRequest,
    store::NewWithdrawal,
    types::{format_minor, Currency, Poisha, WithdrawalId},
};
use chrono::{DateTime, Utc};

const EVENT_TYPE: &str = "withdrawal_requested";

pub struct WithdrawalSettlement {
    config: WithdrawalConfig,
    bep20_fee_bdt: Poisha,
}

impl WithdrawalSettlement {
    pub fn new(config: WithdrawalConfig, bep20_fee_bdt: Poisha) -> Self {
        Self { config, bep20_fee_bdt }
    }

    pub fn fee_for(&self, method: WithdrawalMethod) -> Poisha {
        match method {
            WithdrawalMethod::Bkash => self.config.bkash_fee_bdt,
            WithdrawalMethod::Bep20 => self.bep20_fee_bdt,
        }
    }

    /// Reject out-of-range amounts and malformed accounts before any
    /// store access. Returns the normalized account number.
    pub fn validate(
        &self,
        amount_bdt: Poisha,
        method: WithdrawalMethod,
        account_number: &str,
    ) -> LedgerResult<String> {
        if amount_bdt < self.config.min_bdt || amount_bdt > self.config.max_bdt {
            return Err(LedgerError::AmountOutOfRange {
                amount: amount_bdt,
                min: self.config.min_bdt,
                max: self.config.max_bdt,
            });
        }
        normalize_account(method, account_number)
    }

    pub fn request(
        &self,
        coordinator: &mut TransactionCoordinator,
        identity: &Identity,
        request: &WithdrawalRequest,
        now: DateTime<Utc>,
    ) -> LedgerResult<Settled<Withdrawal>> {
        let WithdrawalRequest {
            amount_bdt,
            method,
            ref account_number,
            ref idempotency_key,
        } = *request;
        let idempotency_key = idempotency_key.as_str();
        let account_number = self.validate(amount_bdt, method, account_number)?;
        let fee_bdt = self.fee_for(method);
        let user_id = identity.user_id;

        let settled = coordinator.run("request_withdrawal", |tx| {
            if let Some(id) = prior_entity(tx, user_id, idempotency_key, EVENT_TYPE)? {
                let withdrawal = tx
                    .withdrawal(id)?
                    .ok_or(LedgerError::NotFound { entity: "withdrawal", id })?;
                return Ok(Settled::replayed(withdrawal));
            }

            // Reserve now, so two pending requests cannot spend the same taka.
            if !tx.debit_bdt(user_id, amount_bdt)? {
                return Err(if tx.user_exists(user_id)? {
                    LedgerError::InsufficientBalance {
                        user_id,
                        currency: Currency::Bdt,
                        requested: amount_bdt,
                    }
                } else {
                    LedgerError::NotFound { entity: "user", id: user_id }
                });
            }

            let withdrawal = tx.insert_withdrawal(
                &NewWithdrawal {
                    user_id,
                    amount_bdt,
                    fee_bdt,
                    method,
                    account_number: &account_number,
                },
                now,
            )?;

            let event = LedgerEvent::WithdrawalRequested {
                withdrawal_id: withdrawal.id,
                amount_bdt,
                method,
            };
            tx.append_activity(
                &NewActivity {
                    user_id,
                    event: &event,
                    idempotency_key: Some(idempotency_key),
                    entity_id: Some(withdrawal.id),
                },
                now,
            )?;

            Ok(Settled::fresh(withdrawal))
        })?;

        if settled.replayed {
            log::debug!(
                "withdrawal replay: user={user_id} key={idempotency_key} withdrawal={}",
                settled.value.id
            );
        } else {
            log::info!(
                "withdrawal requested: id={} user={user_id} bdt={} method={}",
                settled.value.id,
                format_minor(amount_bdt),
                method.as_str()
            );
        }
        Ok(settled)
    }

    pub fn resolve(
        &self,
        coordinator: &mut TransactionCoordinator,
        admin: &Identity,
        withdrawal_id: WithdrawalId,
        action: ResolveAction,
        now: DateTime<Utc>,
    ) -> LedgerResult<Withdrawal> {
        if !admin.is_admin() {
            return Err(LedgerError::Forbidden);
        }
        let target = action.target_status();

        let withdrawal = coordinator.run("resolve_withdrawal", |tx| {
            let Some(withdrawal) = tx.resolve_withdrawal(withdrawal_id, target, now)? else {
                return Err(match tx.withdrawal(withdrawal_id)? {
                    Some(_) => LedgerError::AlreadyResolved {
                        entity: "withdrawal",
                        id: withdrawal_id,
                    },
                    None => LedgerError::NotFound {
                        entity: "withdrawal",
                        id: withdrawal_id,
                    },
                });
            };

            let refunded_bdt = match target {
                RequestStatus::Rejected => {
                    tx.credit_bdt(withdrawal.user_id, withdrawal.amount_bdt)?;
                    withdrawal.amount_bdt
                }
                _ => {
                    tx.record_withdrawn(withdrawal.user_id, withdrawal.amount_bdt)?;
                    0
                }
            };

            let event = LedgerEvent::WithdrawalResolved {
                withdrawal_id,
                status: target,
                refunded_bdt,
            };
            tx.append_activity(
                &NewActivity {
                    user_id: withdrawal.user_id,
                    event: &event,
                    idempotency_key: None,
                    entity_id: Some(withdrawal_id),
                },
                now,
            )?;
            Ok(withdrawal)
        })?;

        log::info!(
            "withdrawal {} {} by admin {}",
            withdrawal_id,
            target.as_str(),
            admin.user_id
        );
        Ok(withdrawal)
    }
}

/// BEP20: `0x` + 40 hex digits.
/// bKash: optional `+88`/`88` prefix, then `01[3-9]` + 8 digits;
/// stored in the 11-digit local form.
pub fn normalize_account(method: WithdrawalMethod, raw: &str) -> LedgerResult<String> {
    let account = raw.trim();
    let invalid = |reason: &str| LedgerError::InvalidAccount {
        method: method.as_str().to_string(),
        reason: reason.to_string(),
    };

    match method {
        WithdrawalMethod::Bep20 => {
            let Some(hex) = account.strip_prefix("0x") else {
                return Err(invalid("address must start with 0x"));
            };
            if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid("address must be 0x followed by 40 hex characters"));
            }
            Ok(account.to_string())
        }
        WithdrawalMethod::Bkash => {
            let local = account
                .strip_prefix("+88")
                .or_else(|| account.strip_prefix("88"))
                .unwrap_or(account);
            let bytes = local.as_bytes();
            let well_formed = bytes.len() == 11
                && bytes.iter().all(u8::is_ascii_digit)
                && bytes[0] == b'0'
                && bytes[1] == b'1'
                && (b'3'..=b'9').contains(&bytes[2]);
            if !well_formed {
                return Err(invalid("expected an 11-digit mobile number like 01XXXXXXXXX"));
            }
            Ok(local.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bep20_accepts_mixed_case_hex() {
        let addr = "0x2269ce1f94e6e2ab5ac933adae12e37ceba2a5cf";
        assert_eq!(normalize_account(WithdrawalMethod::Bep20, addr).unwrap(), addr);
        let upper = "0x2269CE1F94E6E2AB5AC933ADAE12E37CEBA2A5CF";
        assert!(normalize_account(WithdrawalMethod::Bep20, upper).is_ok());
    }

    #[test]
    fn bep20_rejects_wrong_length_or_prefix() {
        assert!(normalize_account(WithdrawalMethod::Bep20, "0x1234").is_err());
        assert!(normalize_account(
            WithdrawalMethod::Bep20,
            "2269ce1f94e6e2ab5ac933adae12e37ceba2a5cf00"
        )
        .is_err());
        assert!(normalize_account(
            WithdrawalMethod::Bep20,
            "0xZZ69ce1f94e6e2ab5ac933adae12e37ceba2a5cf"
        )
        .is_err());
    }

    #[test]
    fn bkash_normalizes_country_prefix() {
        assert_eq!(
            normalize_account(WithdrawalMethod::Bkash, "01712345678").unwrap(),
            "01712345678"
        );
        assert_eq!(
            normalize_account(WithdrawalMethod::Bkash, "+8801712345678").unwrap(),
            "01712345678"
        );
        assert_eq!(
            normalize_account(WithdrawalMethod::Bkash, "8801912345678").unwrap(),
            "01912345678"
        );
    }

    #[test]
    fn bkash_rejects_bad_operator_and_length() {
        assert!(normalize_account(WithdrawalMethod::Bkash, "01212345678").is_err());
        assert!(normalize_account(WithdrawalMethod::Bkash, "0171234567").is_err());
        assert!(normalize_account(WithdrawalMethod::Bkash, "0171234567a").is_err());
    }

    #[test]
    fn amount_range_is_checked_before_account() {
        let settlement = WithdrawalSettlement::new(
            WithdrawalConfig {
                min_bdt: 500_00,
                max_bdt: 25_000_00,
                bkash_fee_bdt: 10_00,
                bep20_fee_usd: 1_00,
            },
            110_00,
        );
        let err = settlement
            .validate(499_99, WithdrawalMethod::Bkash, "not-a-number")
            .unwrap_err();
        assert!(matches!(err, LedgerError::AmountOutOfRange { .. }));
        assert!(settlement
            .validate(25_000_00, WithdrawalMethod::Bkash, "01712345678")
            .is_ok());
        assert_eq!(settlement.fee_for(WithdrawalMethod::Bep20), 110_00);
    }
}
