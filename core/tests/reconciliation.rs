//! Integration tests for the read models and JSON request dispatch.
//!
//! A full lifecycle (deposit, invest, accrue, withdraw, reject, adjust)
//! must leave stored balances equal to the ones rebuilt from history.

use chrono::{Days, NaiveDate};
use ledger_core::{
    clock::{LedgerClock, ManualClock},
    config::LedgerConfig,
    error::{ErrorKind, LedgerError},
    ledger::Ledger,
    model::{Identity, ResolveAction, Role, WithdrawalMethod},
    request::{DepositRequest, InvestRequest, LedgerRequest, WithdrawalRequest},
    types::Currency,
};
use std::sync::Arc;

const ADMIN: Identity = Identity {
    user_id: 9_000,
    role: Role::Admin,
};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()
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

// ─────────────────────────────────────────────────────────────────────────────
// Full lifecycle reconciles
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn lifecycle_reconciles() {
    let (mut ledger, clock) = build();
    let referrer = ledger.register_user(None).unwrap();
    let user = ledger.register_user(Some(&referrer.referral_code)).unwrap();
    let me = Identity::user(user.id);

    let deposit = ledger
        .request_deposit(
            &me,
            &DepositRequest {
                amount_usd: 150_00,
                tx_hash: "0xlifecycle".into(),
                idempotency_key: "dep".into(),
            },
        )
        .unwrap()
        .value;
    ledger.resolve_deposit(&ADMIN, deposit.id, ResolveAction::Approve).unwrap();

    ledger
        .invest(&me, &InvestRequest { plan_id: 3, idempotency_key: "inv".into() })
        .unwrap();

    for _ in 0..10 {
        clock.advance_days(1);
        ledger.run_scheduled_jobs(clock.today()).unwrap();
    }
    // 10 days at 400 BDT
    assert_eq!(ledger.user(user.id).unwrap().balance_bdt, 4_000_00);

    let withdraw = |key: &str| WithdrawalRequest {
        amount_bdt: 1_000_00,
        method: WithdrawalMethod::Bkash,
        account_number: "01912345678".into(),
        idempotency_key: key.into(),
    };
    let approved = ledger.request_withdrawal(&me, &withdraw("w-1")).unwrap().value;
    let rejected = ledger.request_withdrawal(&me, &withdraw("w-2")).unwrap().value;
    ledger.request_withdrawal(&me, &withdraw("w-3")).unwrap();
    ledger.resolve_withdrawal(&ADMIN, approved.id, ResolveAction::Approve).unwrap();
    ledger.resolve_withdrawal(&ADMIN, rejected.id, ResolveAction::Reject).unwrap();

    ledger
        .adjust_balance(&ADMIN, user.id, Currency::Bdt, -500_00, "chargeback")
        .unwrap();
    ledger
        .adjust_balance(&ADMIN, user.id, Currency::Usd, 5_00, "promo")
        .unwrap();

    let summary = ledger.get_financial_summary(user.id).unwrap();
    assert_eq!(summary.balance_usd, 55_00);
    assert_eq!(summary.balance_bdt, 4_000_00 - 2_000_00 - 500_00);
    assert_eq!(summary.pending_withdrawal_bdt, 1_000_00);
    assert_eq!(summary.active_investment_usd, 100_00);
    assert_eq!(summary.today_profit_bdt, 400_00);

    let recon = ledger.reconcile(user.id).unwrap();
    assert!(recon.is_balanced(), "{recon:?}");
    assert!(ledger.reconcile(referrer.id).unwrap().is_balanced());

    let activity = ledger.activity_for(user.id, 100).unwrap();
    assert!(activity.windows(2).all(|w| w[0].id > w[1].id), "newest first");
    assert!(activity.iter().any(|a| a.event_type == "balance_adjusted"));
    assert_eq!(
        activity.iter().filter(|a| a.event_type == "profit_accrued").count(),
        10
    );
}

#[test]
fn debit_adjustment_cannot_overdraw() {
    let (mut ledger, _clock) = build();
    let user = ledger.register_user(None).unwrap();
    ledger
        .adjust_balance(&ADMIN, user.id, Currency::Bdt, 100_00, "bonus")
        .unwrap();

    let err = ledger
        .adjust_balance(&ADMIN, user.id, Currency::Bdt, -100_01, "chargeback")
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    assert_eq!(ledger.user(user.id).unwrap().balance_bdt, 100_00);

    let err = ledger
        .adjust_balance(&Identity::user(user.id), user.id, Currency::Bdt, 1_00, "self")
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden));
}

#[test]
fn summary_for_unknown_user_is_not_found() {
    let (mut ledger, _clock) = build();
    let err = ledger.get_financial_summary(31337).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "user", .. }));
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON dispatch
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn dispatch_runs_typed_requests() {
    let (mut ledger, _clock) = build();
    let registered = ledger
        .handle(&ADMIN, serde_json::from_str(r#"{"cmd":"register_user"}"#).unwrap())
        .unwrap();
    let user_id = registered["id"].as_i64().unwrap();
    let me = Identity::user(user_id);

    ledger
        .handle(
            &ADMIN,
            LedgerRequest::AdjustBalance {
                user_id,
                currency: Currency::Usd,
                amount: 10_00,
                reason: "seed".into(),
            },
        )
        .unwrap();
    let invested = ledger
        .handle(
            &me,
            serde_json::from_str(r#"{"cmd":"invest","plan_id":1,"idempotency_key":"j-1"}"#).unwrap(),
        )
        .unwrap();
    assert_eq!(invested["replayed"], false);
    assert_eq!(invested["value"]["investment_usd"], 10_00);

    let summary = ledger.handle(&me, LedgerRequest::Summary).unwrap();
    assert_eq!(summary["balance_usd"], 0);

    let as_of = start().checked_add_days(Days::new(1)).unwrap();
    let err = ledger
        .handle(&me, LedgerRequest::Accrue { as_of })
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden));

    let report = ledger.handle(&ADMIN, LedgerRequest::Accrue { as_of }).unwrap();
    assert_eq!(report["credited"], 1);
}

#[test]
fn dispatch_rejects_invalid_shapes_before_touching_state() {
    let (mut ledger, _clock) = build();
    let user = ledger.register_user(None).unwrap();
    let me = Identity::user(user.id);

    let err = ledger
        .handle(
            &me,
            LedgerRequest::RequestWithdrawal(WithdrawalRequest {
                amount_bdt: -5,
                method: WithdrawalMethod::Bkash,
                account_number: "01712345678".into(),
                idempotency_key: "neg".into(),
            }),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = ledger
        .handle(&me, LedgerRequest::Reconcile { user_id: user.id + 1 })
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden));
}
