//! Integration tests for investment settlement.
//!
//! Covers:
//! 1. A settled investment debits USD and copies the plan's terms
//! 2. A second investment the balance cannot cover fails cleanly
//! 3. Retrying with the same idempotency key returns the original
//! 4. Reusing a key for a different kind of request is a conflict
//! 5. Plan edits only affect investments made afterwards

use chrono::NaiveDate;
use ledger_core::{
    clock::{LedgerClock, ManualClock},
    config::LedgerConfig,
    error::{ErrorKind, LedgerError},
    ledger::Ledger,
    model::{Identity, InvestmentStatus, Role, WithdrawalMethod},
    plan::Plan,
    request::{InvestRequest, WithdrawalRequest},
    types::Currency,
};
use std::sync::Arc;

const ADMIN: Identity = Identity {
    user_id: 9_000,
    role: Role::Admin,
};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
}

fn build() -> (Ledger, Arc<ManualClock>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = Arc::new(ManualClock::at_date(start()));
    let ledger = Ledger::in_memory(
        LedgerConfig::default_test(),
        Arc::clone(&clock) as Arc<dyn LedgerClock>,
    )
    .expect("in-memory ledger");
    (ledger, clock)
}

fn funded_user(ledger: &mut Ledger, usd: i64) -> Identity {
    let user = ledger.register_user(None).unwrap();
    if usd > 0 {
        ledger
            .adjust_balance(&ADMIN, user.id, Currency::Usd, usd, "test funding")
            .unwrap();
    }
    Identity::user(user.id)
}

fn invest(plan_id: i64, key: &str) -> InvestRequest {
    InvestRequest {
        plan_id,
        idempotency_key: key.into(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: settlement debits USD and snapshots plan terms
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn investment_debits_usd_and_copies_plan_terms() {
    let (mut ledger, _clock) = build();
    let alice = funded_user(&mut ledger, 100_00);

    let settled = ledger.invest(&alice, &invest(2, "inv-1")).unwrap();
    assert!(!settled.replayed);
    let inv = settled.value;
    assert_eq!(inv.investment_usd, 60_00);
    assert_eq!(inv.daily_profit_bdt, 250_00);
    assert_eq!(inv.duration_days, 30);
    assert_eq!(inv.status, InvestmentStatus::Active);
    assert_eq!(inv.start_date, start());
    assert_eq!(inv.end_date, NaiveDate::from_ymd_opt(2026, 1, 31).unwrap());

    let user = ledger.user(alice.user_id).unwrap();
    assert_eq!(user.balance_usd, 40_00);
    assert_eq!(user.total_invested_usd, 60_00);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: insufficient balance leaves nothing behind
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn second_investment_beyond_balance_is_rejected() {
    let (mut ledger, _clock) = build();
    let alice = funded_user(&mut ledger, 100_00);

    ledger.invest(&alice, &invest(2, "inv-1")).unwrap();
    let err = ledger.invest(&alice, &invest(2, "inv-2")).unwrap_err();
    assert!(
        matches!(err, LedgerError::InsufficientBalance { currency: Currency::Usd, requested: 60_00, .. }),
        "got {err:?}"
    );
    assert_eq!(err.kind(), ErrorKind::BusinessRule);

    assert_eq!(ledger.user(alice.user_id).unwrap().balance_usd, 40_00);
    assert_eq!(ledger.investments_for(alice.user_id).unwrap().len(), 1);
}

#[test]
fn unknown_plan_is_rejected_without_debit() {
    let (mut ledger, _clock) = build();
    let alice = funded_user(&mut ledger, 100_00);

    let err = ledger.invest(&alice, &invest(42, "inv-x")).unwrap_err();
    assert!(matches!(err, LedgerError::PlanNotFound { plan_id: 42 }));
    assert_eq!(ledger.user(alice.user_id).unwrap().balance_usd, 100_00);
}

#[test]
fn unknown_user_is_not_found() {
    let (mut ledger, _clock) = build();
    let err = ledger
        .invest(&Identity::user(777), &invest(1, "ghost"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "user", id: 777 }));
}

#[test]
fn empty_idempotency_key_is_a_validation_error() {
    let (mut ledger, _clock) = build();
    let alice = funded_user(&mut ledger, 100_00);
    let err = ledger.invest(&alice, &invest(1, "")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: idempotent replay
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn same_key_settles_once() {
    let (mut ledger, _clock) = build();
    let alice = funded_user(&mut ledger, 100_00);

    let first = ledger.invest(&alice, &invest(1, "retry-me")).unwrap();
    let second = ledger.invest(&alice, &invest(1, "retry-me")).unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.value.id, second.value.id);
    assert_eq!(ledger.user(alice.user_id).unwrap().balance_usd, 90_00);
    assert_eq!(ledger.investments_for(alice.user_id).unwrap().len(), 1);
}

#[test]
fn keys_are_scoped_per_user() {
    let (mut ledger, _clock) = build();
    let alice = funded_user(&mut ledger, 100_00);
    let bob = funded_user(&mut ledger, 100_00);

    ledger.invest(&alice, &invest(1, "shared")).unwrap();
    let bobs = ledger.invest(&bob, &invest(1, "shared")).unwrap();
    assert!(!bobs.replayed);
    assert_eq!(ledger.user(bob.user_id).unwrap().balance_usd, 90_00);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: key reuse across request kinds
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn key_reused_for_withdrawal_is_a_conflict() {
    let (mut ledger, _clock) = build();
    let alice = funded_user(&mut ledger, 100_00);
    ledger
        .adjust_balance(&ADMIN, alice.user_id, Currency::Bdt, 1_000_00, "test funding")
        .unwrap();

    ledger.invest(&alice, &invest(1, "k")).unwrap();
    let err = ledger
        .request_withdrawal(
            &alice,
            &WithdrawalRequest {
                amount_bdt: 600_00,
                method: WithdrawalMethod::Bkash,
                account_number: "01712345678".into(),
                idempotency_key: "k".into(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::IdempotencyKeyReused { .. }), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(ledger.user(alice.user_id).unwrap().balance_bdt, 1_000_00);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: plan edits are not retroactive
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn plan_edit_applies_to_new_investments_only() {
    let (mut ledger, clock) = build();
    let alice = funded_user(&mut ledger, 100_00);

    let before = ledger.invest(&alice, &invest(1, "before")).unwrap().value;
    ledger
        .update_plan(
            &ADMIN,
            Plan {
                id: 1,
                name: "Starter".into(),
                cost_usd: 10_00,
                daily_profit_bdt: 100_00,
                duration_days: 30,
            },
        )
        .unwrap();
    let after = ledger.invest(&alice, &invest(1, "after")).unwrap().value;

    assert_eq!(before.daily_profit_bdt, 70_00);
    assert_eq!(after.daily_profit_bdt, 100_00);

    clock.advance_days(1);
    let report = ledger.accrue_daily_profits(clock.today()).unwrap();
    assert_eq!(report.credited, 2);
    assert_eq!(report.credited_bdt, 170_00);
}

#[test]
fn plan_edit_requires_admin() {
    let (mut ledger, _clock) = build();
    let alice = funded_user(&mut ledger, 0);
    let err = ledger
        .update_plan(
            &alice,
            Plan {
                id: 1,
                name: "Starter".into(),
                cost_usd: 1_00,
                daily_profit_bdt: 1_000_00,
                duration_days: 30,
            },
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden));
}
