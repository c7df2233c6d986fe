use super::LedgerTx;
use crate::{
    error::LedgerResult,
    model::{Deposit, RequestStatus},
    types::{Cents, DepositId, UserId},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

const DEPOSIT_COLUMNS: &str = "id, user_id, amount_usd, tx_hash, status, created_at, resolved_at";

fn deposit_from_row(row: &Row<'_>) -> rusqlite::Result<Deposit> {
    Ok(Deposit {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        amount_usd: row.get("amount_usd")?,
        tx_hash: row.get("tx_hash")?,
        status: row.get("status")?,
        created_at: row.get("created_at")?,
        resolved_at: row.get("resolved_at")?,
    })
}

impl LedgerTx<'_> {
    // ── Deposits ──────────────────────────────────────────────────

    /// None when `tx_hash` was already claimed by any deposit.
    pub fn insert_deposit(
        &self,
        user_id: UserId,
        amount_usd: Cents,
        tx_hash: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<Option<Deposit>> {
        let deposit = self
            .conn
            .query_row(
                &format!(
                    "INSERT INTO deposits (user_id, amount_usd, tx_hash, status, created_at)
                     VALUES (?1, ?2, ?3, 'pending', ?4)
                     ON CONFLICT (tx_hash) DO NOTHING
                     RETURNING {DEPOSIT_COLUMNS}"
                ),
                params![user_id, amount_usd, tx_hash, now],
                deposit_from_row,
            )
            .optional()?;
        Ok(deposit)
    }

    pub fn deposit(&self, id: DepositId) -> LedgerResult<Option<Deposit>> {
        let deposit = self
            .conn
            .query_row(
                &format!("SELECT {DEPOSIT_COLUMNS} FROM deposits WHERE id = ?1"),
                params![id],
                deposit_from_row,
            )
            .optional()?;
        Ok(deposit)
    }

    /// Same row-count guard as withdrawals.
    pub fn resolve_deposit(
        &self,
        id: DepositId,
        status: RequestStatus,
        now: DateTime<Utc>,
    ) -> LedgerResult<Option<Deposit>> {
        let deposit = self
            .conn
            .query_row(
                &format!(
                    "UPDATE deposits SET status = ?2, resolved_at = ?3
                     WHERE id = ?1 AND status = 'pending'
                     RETURNING {DEPOSIT_COLUMNS}"
                ),
                params![id, status, now],
                deposit_from_row,
            )
            .optional()?;
        Ok(deposit)
    }

    pub fn deposits_for_user(&self, user_id: UserId) -> LedgerResult<Vec<Deposit>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEPOSIT_COLUMNS} FROM deposits WHERE user_id = ?1 ORDER BY id ASC"
        ))?;
        let rows = stmt
            .query_map(params![user_id], deposit_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn approved_deposit_usd(&self, user_id: UserId) -> LedgerResult<Cents> {
        let total: Cents = self.conn.query_row(
            "SELECT COALESCE(SUM(amount_usd), 0) FROM deposits
             WHERE user_id = ?1 AND status = 'approved'",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
