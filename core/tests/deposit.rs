//! Integration tests for deposit settlement.

use chrono::NaiveDate;
use ledger_core::{
    clock::{LedgerClock, ManualClock},
    config::LedgerConfig,
    error::LedgerError,
    ledger::Ledger,
    model::{Identity, RequestStatus, ResolveAction, Role},
    request::DepositRequest,
};
use std::sync::Arc;

const ADMIN: Identity = Identity {
    user_id: 9_000,
    role: Role::Admin,
};

fn build() -> Ledger {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = Arc::new(ManualClock::at_date(
        NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
    ));
    Ledger::in_memory(LedgerConfig::default_test(), clock as Arc<dyn LedgerClock>)
        .expect("in-memory ledger")
}

fn deposit(amount_usd: i64, tx_hash: &str, key: &str) -> DepositRequest {
    DepositRequest {
        amount_usd,
        tx_hash: tx_hash.into(),
        idempotency_key: key.into(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn approved_deposit_credits_usd() {
    let mut ledger = build();
    let alice = Identity::user(ledger.register_user(None).unwrap().id);

    let d = ledger
        .request_deposit(&alice, &deposit(50_00, "0xfeed01", "d-1"))
        .unwrap()
        .value;
    assert_eq!(d.status, RequestStatus::Pending);
    assert_eq!(ledger.user(alice.user_id).unwrap().balance_usd, 0);

    let approved = ledger.resolve_deposit(&ADMIN, d.id, ResolveAction::Approve).unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);

    let user = ledger.user(alice.user_id).unwrap();
    assert_eq!(user.balance_usd, 50_00);
    assert_eq!(user.total_deposited_usd, 50_00);

    let err = ledger
        .resolve_deposit(&ADMIN, d.id, ResolveAction::Reject)
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyResolved { entity: "deposit", .. }));
    assert_eq!(ledger.user(alice.user_id).unwrap().balance_usd, 50_00);
}

#[test]
fn rejected_deposit_credits_nothing() {
    let mut ledger = build();
    let alice = Identity::user(ledger.register_user(None).unwrap().id);

    let d = ledger
        .request_deposit(&alice, &deposit(20_00, "0xfeed02", "d-1"))
        .unwrap()
        .value;
    ledger.resolve_deposit(&ADMIN, d.id, ResolveAction::Reject).unwrap();
    assert_eq!(ledger.user(alice.user_id).unwrap().balance_usd, 0);
}

#[test]
fn tx_hash_is_claimed_once() {
    let mut ledger = build();
    let alice = Identity::user(ledger.register_user(None).unwrap().id);
    let bob = Identity::user(ledger.register_user(None).unwrap().id);

    ledger
        .request_deposit(&alice, &deposit(20_00, "0xsame", "a-1"))
        .unwrap();
    let err = ledger
        .request_deposit(&bob, &deposit(20_00, " 0xsame ", "b-1"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateDeposit { .. }), "got {err:?}");
}

#[test]
fn same_key_returns_original_deposit() {
    let mut ledger = build();
    let alice = Identity::user(ledger.register_user(None).unwrap().id);

    let first = ledger
        .request_deposit(&alice, &deposit(20_00, "0xabc", "d-1"))
        .unwrap();
    let again = ledger
        .request_deposit(&alice, &deposit(20_00, "0xabc", "d-1"))
        .unwrap();
    assert!(again.replayed);
    assert_eq!(first.value.id, again.value.id);
    assert_eq!(ledger.deposits_for(alice.user_id).unwrap().len(), 1);
}

#[test]
fn deposit_below_minimum_is_rejected() {
    let mut ledger = build();
    let alice = Identity::user(ledger.register_user(None).unwrap().id);

    let err = ledger
        .request_deposit(&alice, &deposit(9_99, "0xsmall", "d-1"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::AmountOutOfRange { amount: 9_99, min: 10_00, .. }));
}

#[test]
fn only_admins_resolve_deposits() {
    let mut ledger = build();
    let alice = Identity::user(ledger.register_user(None).unwrap().id);
    let d = ledger
        .request_deposit(&alice, &deposit(20_00, "0xself", "d-1"))
        .unwrap()
        .value;

    let err = ledger
        .resolve_deposit(&alice, d.id, ResolveAction::Approve)
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden));
    assert_eq!(ledger.user(alice.user_id).unwrap().balance_usd, 0);
}
