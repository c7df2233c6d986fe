//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! Components receive a `LedgerTx` from the TransactionCoordinator and call
//! its methods: they never execute SQL directly.
//!
//! Every balance debit is a single conditional UPDATE
//! (`... WHERE balance >= :amount`). Zero rows affected means the guard
//! failed; no balance is ever read first and written back.

use crate::{
    error::LedgerResult,
    model::{CommissionStatus, InvestmentStatus, RequestStatus, WithdrawalMethod},
    types::Currency,
};
use rusqlite::{
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
    Connection, ToSql,
};
use std::time::Duration;

mod account;
mod accrual;
mod activity;
mod commission;
mod deposit;
mod investment;
mod withdrawal;

pub use investment::NewInvestment;
pub use withdrawal::NewWithdrawal;

pub struct LedgerStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
    busy_timeout: Duration,
}

impl LedgerStore {
    pub fn open(path: &str, busy_timeout: Duration) -> LedgerResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(busy_timeout)?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
            busy_timeout,
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> LedgerResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: None,
            busy_timeout: Duration::ZERO,
        })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new in-memory database (isolated).
    /// For file-based databases, this opens the same file.
    pub fn reopen(&self) -> LedgerResult<Self> {
        match &self.path {
            Some(p) => Self::open(p, self.busy_timeout),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order. Safe to run repeatedly.
    pub fn migrate(&self) -> LedgerResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_investments.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_withdrawals_deposits.sql"))?;
        Ok(())
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

/// Handle to one open unit of work. Only the TransactionCoordinator
/// creates these; everything written through it commits or rolls back
/// together.
pub struct LedgerTx<'a> {
    conn: &'a Connection,
    correlation_id: &'a str,
}

impl<'a> LedgerTx<'a> {
    pub(crate) fn new(conn: &'a Connection, correlation_id: &'a str) -> Self {
        Self { conn, correlation_id }
    }

    /// Identifier shared by every activity row this unit of work writes.
    pub fn correlation_id(&self) -> &str {
        self.correlation_id
    }
}

// ── Text-backed enums ──────────────────────────────────────────────

macro_rules! text_enum_sql {
    ($($ty:ty),* $(,)?) => {$(
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let s = value.as_str()?;
                <$ty>::parse(s).ok_or_else(|| {
                    FromSqlError::Other(format!("unknown {} '{s}'", stringify!($ty)).into())
                })
            }
        }
    )*};
}

text_enum_sql!(
    InvestmentStatus,
    CommissionStatus,
    RequestStatus,
    WithdrawalMethod,
    Currency,
);
