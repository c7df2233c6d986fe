//! The ledger facade: the one entry point callers hold.
//!
//! JOB ORDER (fixed, never reordered):
//!   1. Profit accrual
//!   2. Commission retry
//!
//! RULES:
//!   - Every balance-affecting operation runs through the
//!     TransactionCoordinator as one unit of work.
//!   - "Now" comes from the injected LedgerClock, never from Utc::now().
//!   - Referral commission is credited after the investment commits, in
//!     its own unit of work; a failure there never undoes the investment.

use crate::{
    adjustment,
    clock::{LedgerClock, SystemClock},
    config::{CommissionRates, LedgerConfig},
    coordinator::TransactionCoordinator,
    deposit_settlement::DepositSettlement,
    error::{LedgerError, LedgerResult},
    idempotency::Settled,
    investment_settlement::InvestmentSettlement,
    job::{JobReport, LedgerJob},
    model::{
        ActivityEntry, BalanceAdjustment, Commission, CommissionStatus, Deposit, FinancialSummary,
        Identity, Investment, ProfitAccrual, Reconciliation, ResolveAction, User, Withdrawal,
    },
    plan::Plan,
    profit_accrual::{AccrualReport, ProfitAccrualEngine},
    referral_commission::{CommissionOutcome, ReferralCommissionEngine},
    registration,
    request::{DepositRequest, InvestRequest, LedgerRequest, WithdrawalRequest},
    store::LedgerStore,
    summary,
    types::{Currency, DepositId, InvestmentId, UserId, WithdrawalId},
    withdrawal_settlement::WithdrawalSettlement,
};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::{sync::Arc, time::Duration};

pub struct Ledger {
    coordinator: TransactionCoordinator,
    config: LedgerConfig,
    clock: Arc<dyn LedgerClock>,
    investments: InvestmentSettlement,
    withdrawals: WithdrawalSettlement,
    deposits: DepositSettlement,
    accrual: ProfitAccrualEngine,
    commission: ReferralCommissionEngine,
}

impl Ledger {
    /// Wire a ledger over an already-migrated store.
    pub fn new(store: LedgerStore, config: LedgerConfig, clock: Arc<dyn LedgerClock>) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(store),
            investments: InvestmentSettlement::new(config.plans.clone()),
            withdrawals: WithdrawalSettlement::new(config.withdrawal.clone(), config.bep20_fee_bdt()),
            deposits: DepositSettlement::new(config.deposit.clone()),
            accrual: ProfitAccrualEngine::new(config.accrual.batch_size),
            commission: ReferralCommissionEngine::new(config.commission),
            config,
            clock,
        }
    }

    /// Open (creating if needed) the database at `path` and migrate it.
    pub fn open(path: &str, config: LedgerConfig) -> LedgerResult<Self> {
        let store = LedgerStore::open(path, Duration::from_millis(config.store.busy_timeout_ms))?;
        store.migrate()?;
        Ok(Self::new(store, config, Arc::new(SystemClock)))
    }

    /// Fresh in-memory ledger (used in tests).
    pub fn in_memory(config: LedgerConfig, clock: Arc<dyn LedgerClock>) -> LedgerResult<Self> {
        let store = LedgerStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(store, config, clock))
    }

    /// A second ledger on its own connection to the same database file,
    /// for use from another thread.
    pub fn worker(&self) -> LedgerResult<Self> {
        let store = self.coordinator.store().reopen()?;
        Ok(Self::new(store, self.config.clone(), Arc::clone(&self.clock)))
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn LedgerClock {
        self.clock.as_ref()
    }

    // ── Accounts ──────────────────────────────────────────────────

    pub fn register_user(&mut self, referral_code: Option<&str>) -> LedgerResult<User> {
        registration::register_user(&mut self.coordinator, referral_code, self.clock.now())
    }

    pub fn adjust_balance(
        &mut self,
        admin: &Identity,
        user_id: UserId,
        currency: Currency,
        amount: i64,
        reason: &str,
    ) -> LedgerResult<BalanceAdjustment> {
        adjustment::adjust_balance(
            &mut self.coordinator,
            admin,
            user_id,
            currency,
            amount,
            reason,
            self.clock.now(),
        )
    }

    // ── Settlement ────────────────────────────────────────────────

    pub fn invest(
        &mut self,
        identity: &Identity,
        request: &InvestRequest,
    ) -> LedgerResult<Settled<Investment>> {
        request.validate()?;
        let now = self.clock.now();
        let mut settled = self.investments.settle(
            &mut self.coordinator,
            identity,
            request.plan_id,
            &request.idempotency_key,
            now,
        )?;

        if settled.value.commission_status == CommissionStatus::Pending {
            // Left pending on failure; the commission retry job picks it up.
            match self.commission.credit(&mut self.coordinator, settled.value.id, now) {
                Ok(_) => settled.value.commission_status = CommissionStatus::Paid,
                Err(err) => log::warn!(
                    "commission for investment {} not credited: {err}",
                    settled.value.id
                ),
            }
        }
        Ok(settled)
    }

    pub fn request_withdrawal(
        &mut self,
        identity: &Identity,
        request: &WithdrawalRequest,
    ) -> LedgerResult<Settled<Withdrawal>> {
        request.validate()?;
        let now = self.clock.now();
        self.withdrawals.request(&mut self.coordinator, identity, request, now)
    }

    pub fn resolve_withdrawal(
        &mut self,
        admin: &Identity,
        withdrawal_id: WithdrawalId,
        action: ResolveAction,
    ) -> LedgerResult<Withdrawal> {
        let now = self.clock.now();
        self.withdrawals
            .resolve(&mut self.coordinator, admin, withdrawal_id, action, now)
    }

    pub fn request_deposit(
        &mut self,
        identity: &Identity,
        request: &DepositRequest,
    ) -> LedgerResult<Settled<Deposit>> {
        request.validate()?;
        let now = self.clock.now();
        self.deposits.request(&mut self.coordinator, identity, request, now)
    }

    pub fn resolve_deposit(
        &mut self,
        admin: &Identity,
        deposit_id: DepositId,
        action: ResolveAction,
    ) -> LedgerResult<Deposit> {
        let now = self.clock.now();
        self.deposits
            .resolve(&mut self.coordinator, admin, deposit_id, action, now)
    }

    // ── Reads ─────────────────────────────────────────────────────

    pub fn get_financial_summary(&mut self, user_id: UserId) -> LedgerResult<FinancialSummary> {
        let today = self.clock.today();
        self.coordinator
            .read(|tx| summary::financial_summary(tx, user_id, today))
    }

    pub fn reconcile(&mut self, user_id: UserId) -> LedgerResult<Reconciliation> {
        self.coordinator.read(|tx| summary::reconcile(tx, user_id))
    }

    pub fn investments_for(&mut self, user_id: UserId) -> LedgerResult<Vec<Investment>> {
        self.coordinator.read(|tx| tx.investments_for_user(user_id))
    }

    pub fn withdrawals_for(&mut self, user_id: UserId) -> LedgerResult<Vec<Withdrawal>> {
        self.coordinator.read(|tx| tx.withdrawals_for_user(user_id))
    }

    pub fn deposits_for(&mut self, user_id: UserId) -> LedgerResult<Vec<Deposit>> {
        self.coordinator.read(|tx| tx.deposits_for_user(user_id))
    }

    pub fn accruals_for(&mut self, investment_id: InvestmentId) -> LedgerResult<Vec<ProfitAccrual>> {
        self.coordinator.read(|tx| tx.accruals_for_investment(investment_id))
    }

    pub fn commissions_for(&mut self, user_id: UserId) -> LedgerResult<Vec<Commission>> {
        self.coordinator.read(|tx| tx.commissions_for_user(user_id))
    }

    /// Newest first.
    pub fn activity_for(&mut self, user_id: UserId, limit: usize) -> LedgerResult<Vec<ActivityEntry>> {
        self.coordinator.read(|tx| tx.activity_for_user(user_id, limit))
    }

    /// Oldest first, the order an admin queue works through them.
    pub fn pending_withdrawals(
        &mut self,
        admin: &Identity,
        limit: usize,
    ) -> LedgerResult<Vec<Withdrawal>> {
        require_admin(admin)?;
        self.coordinator.read(|tx| tx.pending_withdrawals(limit))
    }

    pub fn user(&mut self, user_id: UserId) -> LedgerResult<User> {
        self.coordinator.read(|tx| tx.require_user(user_id))
    }

    // ── Jobs ──────────────────────────────────────────────────────

    pub fn accrue_daily_profits(&mut self, as_of: NaiveDate) -> LedgerResult<AccrualReport> {
        let now = self.clock.now();
        self.accrual.run(&mut self.coordinator, as_of, now)
    }

    pub fn credit_referral_commissions(
        &mut self,
        investment_id: InvestmentId,
    ) -> LedgerResult<CommissionOutcome> {
        let now = self.clock.now();
        self.commission.credit(&mut self.coordinator, investment_id, now)
    }

    /// Returns (pending found, investments completed).
    pub fn retry_pending_commissions(&mut self) -> LedgerResult<(usize, usize)> {
        let now = self.clock.now();
        self.commission.retry_pending(&mut self.coordinator, now)
    }

    /// Run every scheduled job for `as_of`, in job order.
    pub fn run_scheduled_jobs(&mut self, as_of: NaiveDate) -> LedgerResult<Vec<JobReport>> {
        let now = self.clock.now();
        let jobs: [&dyn LedgerJob; 2] = [&self.accrual, &self.commission];
        let mut reports = Vec::with_capacity(jobs.len());
        for job in jobs {
            let report = job.run(&mut self.coordinator, as_of, now)?;
            log::debug!(
                "job {} for {as_of}: processed={} applied={}",
                report.job,
                report.processed,
                report.applied
            );
            reports.push(report);
        }
        Ok(reports)
    }

    // ── Admin configuration ───────────────────────────────────────

    /// New rates apply to commissions credited from now on.
    pub fn set_commission_rates(&mut self, admin: &Identity, rates: CommissionRates) -> LedgerResult<()> {
        require_admin(admin)?;
        if rates.level1_poisha_per_usd < 0 || rates.level2_poisha_per_usd < 0 {
            return Err(LedgerError::Validation("commission rates must be non-negative".into()));
        }
        self.config.commission = rates;
        self.commission.set_rates(rates);
        log::info!("commission rates changed by admin {}: {rates:?}", admin.user_id);
        Ok(())
    }

    /// Replace a plan's terms for future investments only.
    pub fn update_plan(&mut self, admin: &Identity, plan: Plan) -> LedgerResult<()> {
        require_admin(admin)?;
        if plan.cost_usd <= 0 || plan.daily_profit_bdt < 0 || plan.duration_days == 0 {
            return Err(LedgerError::Validation(format!("plan {} has invalid terms", plan.id)));
        }
        log::info!("plan {} updated by admin {}", plan.id, admin.user_id);
        self.config.plans.upsert(plan.clone());
        self.investments.plans_mut().upsert(plan);
        Ok(())
    }

    // ── Request dispatch ──────────────────────────────────────────

    /// Validate and execute one typed request, returning its result as JSON.
    pub fn handle(&mut self, identity: &Identity, request: LedgerRequest) -> LedgerResult<Value> {
        request.validate()?;
        match request {
            LedgerRequest::RegisterUser { referral_code } => {
                to_json(self.register_user(referral_code.as_deref())?)
            }
            LedgerRequest::AdjustBalance {
                user_id,
                currency,
                amount,
                reason,
            } => to_json(self.adjust_balance(identity, user_id, currency, amount, &reason)?),
            LedgerRequest::Invest(req) => to_json(self.invest(identity, &req)?),
            LedgerRequest::RequestWithdrawal(req) => to_json(self.request_withdrawal(identity, &req)?),
            LedgerRequest::ResolveWithdrawal { withdrawal_id, action } => {
                to_json(self.resolve_withdrawal(identity, withdrawal_id, action)?)
            }
            LedgerRequest::RequestDeposit(req) => to_json(self.request_deposit(identity, &req)?),
            LedgerRequest::ResolveDeposit { deposit_id, action } => {
                to_json(self.resolve_deposit(identity, deposit_id, action)?)
            }
            LedgerRequest::Summary => to_json(self.get_financial_summary(identity.user_id)?),
            LedgerRequest::Reconcile { user_id } => {
                if user_id != identity.user_id {
                    require_admin(identity)?;
                }
                to_json(self.reconcile(user_id)?)
            }
            LedgerRequest::Investments => to_json(self.investments_for(identity.user_id)?),
            LedgerRequest::Withdrawals => to_json(self.withdrawals_for(identity.user_id)?),
            LedgerRequest::Commissions => to_json(self.commissions_for(identity.user_id)?),
            LedgerRequest::Activity { limit } => to_json(self.activity_for(identity.user_id, limit)?),
            LedgerRequest::PendingWithdrawals { limit } => {
                to_json(self.pending_withdrawals(identity, limit)?)
            }
            LedgerRequest::Accrue { as_of } => {
                require_admin(identity)?;
                to_json(self.accrue_daily_profits(as_of)?)
            }
            LedgerRequest::RetryCommissions => {
                require_admin(identity)?;
                let (pending, completed) = self.retry_pending_commissions()?;
                Ok(serde_json::json!({ "pending": pending, "completed": completed }))
            }
            LedgerRequest::RunScheduledJobs { as_of } => {
                require_admin(identity)?;
                to_json(self.run_scheduled_jobs(as_of)?)
            }
        }
    }
}

fn require_admin(identity: &Identity) -> LedgerResult<()> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(LedgerError::Forbidden)
    }
}

fn to_json<T: Serialize>(value: T) -> LedgerResult<Value> {
    Ok(serde_json::to_value(value)?)
}
