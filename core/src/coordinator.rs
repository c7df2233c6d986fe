//! TransactionCoordinator: runs one logical unit of work as a single
//! all-or-nothing SQLite transaction.
//!
//! RULES:
//!   - Writes begin IMMEDIATE, so concurrent writers queue on the
//!     database lock (bounded by the busy timeout) instead of failing on
//!     a read-to-write upgrade.
//!   - Any Err from the unit of work, or from commit, rolls back every
//!     write it made.
//!   - Nothing inside a unit of work waits on the network.

use crate::{
    error::LedgerResult,
    store::{LedgerStore, LedgerTx},
};
use rusqlite::TransactionBehavior;
use uuid::Uuid;

pub struct TransactionCoordinator {
    store: LedgerStore,
}

impl TransactionCoordinator {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Execute `work` atomically. `label` names the unit in logs.
    pub fn run<T, F>(&mut self, label: &str, work: F) -> LedgerResult<T>
    where
        F: FnOnce(&LedgerTx<'_>) -> LedgerResult<T>,
    {
        self.execute(label, TransactionBehavior::Immediate, work)
    }

    /// Execute read-only `work` against one consistent snapshot.
    pub fn read<T, F>(&mut self, work: F) -> LedgerResult<T>
    where
        F: FnOnce(&LedgerTx<'_>) -> LedgerResult<T>,
    {
        self.execute("read", TransactionBehavior::Deferred, work)
    }

    fn execute<T, F>(
        &mut self,
        label: &str,
        behavior: TransactionBehavior,
        work: F,
    ) -> LedgerResult<T>
    where
        F: FnOnce(&LedgerTx<'_>) -> LedgerResult<T>,
    {
        let correlation_id = Uuid::new_v4().to_string();
        let tx = self
            .store
            .connection_mut()
            .transaction_with_behavior(behavior)?;

        let outcome = work(&LedgerTx::new(&tx, &correlation_id));

        match outcome {
            Ok(value) => {
                tx.commit()?;
                log::trace!("{label} [{correlation_id}] committed");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    log::error!("{label} [{correlation_id}] rollback failed: {rollback_err}");
                }
                log::debug!("{label} [{correlation_id}] rolled back: {err}");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use chrono::Utc;

    fn coordinator() -> TransactionCoordinator {
        let store = LedgerStore::in_memory().unwrap();
        store.migrate().unwrap();
        TransactionCoordinator::new(store)
    }

    #[test]
    fn failed_unit_of_work_leaves_no_writes() {
        let mut coordinator = coordinator();
        let user = coordinator
            .run("seed", |tx| tx.insert_user("AAAA0001", None, Utc::now()))
            .unwrap();

        let result: LedgerResult<()> = coordinator.run("partial", |tx| {
            tx.credit_profit(user.id, 500_00)?;
            Err(LedgerError::Validation("abort after write".into()))
        });
        assert!(result.is_err());

        let reloaded = coordinator.read(|tx| tx.require_user(user.id)).unwrap();
        assert_eq!(reloaded.balance_bdt, 0);
        assert_eq!(reloaded.total_earned_bdt, 0);
    }

    #[test]
    fn committed_unit_of_work_is_visible() {
        let mut coordinator = coordinator();
        let user = coordinator
            .run("seed", |tx| tx.insert_user("AAAA0002", None, Utc::now()))
            .unwrap();
        coordinator
            .run("credit", |tx| tx.credit_profit(user.id, 70_00))
            .unwrap();
        let reloaded = coordinator.read(|tx| tx.require_user(user.id)).unwrap();
        assert_eq!(reloaded.balance_bdt, 70_00);
    }

    #[test]
    fn guarded_debit_never_drives_balance_negative() {
        let mut coordinator = coordinator();
        let user = coordinator
            .run("seed", |tx| tx.insert_user("AAAA0003", None, Utc::now()))
            .unwrap();
        let debited = coordinator.run("debit", |tx| tx.debit_bdt(user.id, 1)).unwrap();
        assert!(!debited);
    }
}
