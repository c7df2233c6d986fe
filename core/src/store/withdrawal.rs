use super::LedgerTx;
use crate::{
    error::LedgerResult,
    model::{RequestStatus, Withdrawal, WithdrawalMethod},
    types::{Poisha, UserId, WithdrawalId},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

const WITHDRAWAL_COLUMNS: &str = "id, user_id, amount_bdt, fee_bdt, net_amount_bdt, method,
     account_number, status, created_at, resolved_at";

fn withdrawal_from_row(row: &Row<'_>) -> rusqlite::Result<Withdrawal> {
    Ok(Withdrawal {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        amount_bdt: row.get("amount_bdt")?,
        fee_bdt: row.get("fee_bdt")?,
        net_amount_bdt: row.get("net_amount_bdt")?,
        method: row.get("method")?,
        account_number: row.get("account_number")?,
        status: row.get("status")?,
        created_at: row.get("created_at")?,
        resolved_at: row.get("resolved_at")?,
    })
}

#[derive(Debug, Clone)]
pub struct NewWithdrawal<'a> {
    pub user_id: UserId,
    pub amount_bdt: Poisha,
    pub fee_bdt: Poisha,
    pub method: WithdrawalMethod,
    pub account_number: &'a str,
}

impl LedgerTx<'_> {
    // ── Withdrawals ───────────────────────────────────────────────

    pub fn insert_withdrawal(
        &self,
        new: &NewWithdrawal<'_>,
        now: DateTime<Utc>,
    ) -> LedgerResult<Withdrawal> {
        let withdrawal = self.conn.query_row(
            &format!(
                "INSERT INTO withdrawals (
                    user_id, amount_bdt, fee_bdt, net_amount_bdt, method,
                    account_number, status, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7)
                 RETURNING {WITHDRAWAL_COLUMNS}"
            ),
            params![
                new.user_id,
                new.amount_bdt,
                new.fee_bdt,
                new.amount_bdt - new.fee_bdt,
                new.method,
                new.account_number,
                now,
            ],
            withdrawal_from_row,
        )?;
        Ok(withdrawal)
    }

    pub fn withdrawal(&self, id: WithdrawalId) -> LedgerResult<Option<Withdrawal>> {
        let withdrawal = self
            .conn
            .query_row(
                &format!("SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals WHERE id = ?1"),
                params![id],
                withdrawal_from_row,
            )
            .optional()?;
        Ok(withdrawal)
    }

    /// pending → `status`, decided by row count alone. Returns the resolved
    /// row, or None when it was not pending (or does not exist).
    pub fn resolve_withdrawal(
        &self,
        id: WithdrawalId,
        status: RequestStatus,
        now: DateTime<Utc>,
    ) -> LedgerResult<Option<Withdrawal>> {
        let withdrawal = self
            .conn
            .query_row(
                &format!(
                    "UPDATE withdrawals SET status = ?2, resolved_at = ?3
                     WHERE id = ?1 AND status = 'pending'
                     RETURNING {WITHDRAWAL_COLUMNS}"
                ),
                params![id, status, now],
                withdrawal_from_row,
            )
            .optional()?;
        Ok(withdrawal)
    }

    pub fn withdrawals_for_user(&self, user_id: UserId) -> LedgerResult<Vec<Withdrawal>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals
             WHERE user_id = ?1 ORDER BY id ASC"
        ))?;
        let rows = stmt
            .query_map(params![user_id], withdrawal_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn pending_withdrawals(&self, limit: usize) -> LedgerResult<Vec<Withdrawal>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals
             WHERE status = 'pending' ORDER BY id ASC LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(params![limit as i64], withdrawal_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn withdrawal_total(&self, user_id: UserId, status: RequestStatus) -> LedgerResult<Poisha> {
        let total: Poisha = self.conn.query_row(
            "SELECT COALESCE(SUM(amount_bdt), 0) FROM withdrawals
             WHERE user_id = ?1 AND status = ?2",
            params![user_id, status],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
