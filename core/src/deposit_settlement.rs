//! DepositSettlement: USDT (BEP20) deposit claims credited to balance_usd
//! once an admin confirms the transfer.
//!
//! Same lifecycle as withdrawals: pending → approved | rejected. Nothing
//! moves at request time; approval credits balance_usd and
//! total_deposited_usd in the same unit of work that flips the status.

use crate::{
    config::DepositConfig,
    coordinator::TransactionCoordinator,
    error::{LedgerError, LedgerResult},
    event::{LedgerEvent, NewActivity},
    idempotency::{prior_entity, Settled},
    model::{Deposit, Identity, RequestStatus, ResolveAction},
    request::DepositRequest,
    types::{format_minor, DepositId},
};
use chrono::{DateTime, Utc};

const EVENT_TYPE: &str = "deposit_requested";

pub struct DepositSettlement {
    config: DepositConfig,
}

impl DepositSettlement {
    pub fn new(config: DepositConfig) -> Self {
        Self { config }
    }

    pub fn request(
        &self,
        coordinator: &mut TransactionCoordinator,
        identity: &Identity,
        request: &DepositRequest,
        now: DateTime<Utc>,
    ) -> LedgerResult<Settled<Deposit>> {
        if request.amount_usd < self.config.min_usd {
            return Err(LedgerError::AmountOutOfRange {
                amount: request.amount_usd,
                min: self.config.min_usd,
                max: i64::MAX,
            });
        }
        let tx_hash = request.tx_hash.trim();
        let key = request.idempotency_key.as_str();
        let user_id = identity.user_id;

        let settled = coordinator.run("request_deposit", |tx| {
            if let Some(id) = prior_entity(tx, user_id, key, EVENT_TYPE)? {
                let deposit = tx
                    .deposit(id)?
                    .ok_or(LedgerError::NotFound { entity: "deposit", id })?;
                return Ok(Settled::replayed(deposit));
            }
            if !tx.user_exists(user_id)? {
                return Err(LedgerError::NotFound { entity: "user", id: user_id });
            }

            let deposit = tx
                .insert_deposit(user_id, request.amount_usd, tx_hash, now)?
                .ok_or_else(|| LedgerError::DuplicateDeposit {
                    tx_hash: tx_hash.to_string(),
                })?;

            let event = LedgerEvent::DepositRequested {
                deposit_id: deposit.id,
                amount_usd: deposit.amount_usd,
            };
            tx.append_activity(
                &NewActivity {
                    user_id,
                    event: &event,
                    idempotency_key: Some(key),
                    entity_id: Some(deposit.id),
                },
                now,
            )?;
            Ok(Settled::fresh(deposit))
        })?;

        if !settled.replayed {
            log::info!(
                "deposit requested: id={} user={user_id} usd={}",
                settled.value.id,
                format_minor(settled.value.amount_usd)
            );
        }
        Ok(settled)
    }

    pub fn resolve(
        &self,
        coordinator: &mut TransactionCoordinator,
        admin: &Identity,
        deposit_id: DepositId,
        action: ResolveAction,
        now: DateTime<Utc>,
    ) -> LedgerResult<Deposit> {
        if !admin.is_admin() {
            return Err(LedgerError::Forbidden);
        }
        let target = action.target_status();

        let deposit = coordinator.run("resolve_deposit", |tx| {
            let Some(deposit) = tx.resolve_deposit(deposit_id, target, now)? else {
                return Err(match tx.deposit(deposit_id)? {
                    Some(_) => LedgerError::AlreadyResolved { entity: "deposit", id: deposit_id },
                    None => LedgerError::NotFound { entity: "deposit", id: deposit_id },
                });
            };

            let credited_usd = if target == RequestStatus::Approved {
                tx.credit_deposit(deposit.user_id, deposit.amount_usd)?;
                deposit.amount_usd
            } else {
                0
            };

            let event = LedgerEvent::DepositResolved {
                deposit_id,
                status: target,
                credited_usd,
            };
            tx.append_activity(
                &NewActivity {
                    user_id: deposit.user_id,
                    event: &event,
                    idempotency_key: None,
                    entity_id: Some(deposit_id),
                },
                now,
            )?;
            Ok(deposit)
        })?;

        log::info!("deposit {deposit_id} {} by admin {}", target.as_str(), admin.user_id);
        Ok(deposit)
    }
}
