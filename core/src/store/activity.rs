use super::LedgerTx;
use crate::{
    error::LedgerResult,
    event::NewActivity,
    model::{ActivityEntry, BalanceAdjustment},
    types::{Currency, UserId},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

const ACTIVITY_COLUMNS: &str =
    "id, user_id, event_type, idempotency_key, entity_id, correlation_id, payload, created_at";

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityEntry> {
    Ok(ActivityEntry {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        event_type: row.get("event_type")?,
        idempotency_key: row.get("idempotency_key")?,
        entity_id: row.get("entity_id")?,
        correlation_id: row.get("correlation_id")?,
        payload: row.get("payload")?,
        created_at: row.get("created_at")?,
    })
}

impl LedgerTx<'_> {
    // ── Activity log ──────────────────────────────────────────────

    pub fn append_activity(&self, entry: &NewActivity<'_>, now: DateTime<Utc>) -> LedgerResult<i64> {
        let payload = serde_json::to_string(entry.event)?;
        self.conn.execute(
            "INSERT INTO activity_log (
                user_id, event_type, idempotency_key, entity_id, correlation_id, payload, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.user_id,
                entry.event.type_name(),
                entry.idempotency_key,
                entry.entity_id,
                self.correlation_id,
                payload,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// The entry a previous request with the same key committed, if any.
    pub fn activity_by_key(&self, user_id: UserId, key: &str) -> LedgerResult<Option<ActivityEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!(
                    "SELECT {ACTIVITY_COLUMNS} FROM activity_log
                     WHERE user_id = ?1 AND idempotency_key = ?2"
                ),
                params![user_id, key],
                activity_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// Most recent first.
    pub fn activity_for_user(&self, user_id: UserId, limit: usize) -> LedgerResult<Vec<ActivityEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activity_log
             WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], activity_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Manual adjustments ────────────────────────────────────────

    pub fn insert_adjustment(
        &self,
        user_id: UserId,
        currency: Currency,
        amount: i64,
        reason: &str,
        admin_id: UserId,
        now: DateTime<Utc>,
    ) -> LedgerResult<BalanceAdjustment> {
        let adjustment = self.conn.query_row(
            "INSERT INTO balance_adjustment (user_id, currency, amount, reason, admin_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING id, user_id, currency, amount, reason, admin_id, created_at",
            params![user_id, currency, amount, reason, admin_id, now],
            |row| {
                Ok(BalanceAdjustment {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    currency: row.get(2)?,
                    amount: row.get(3)?,
                    reason: row.get(4)?,
                    admin_id: row.get(5)?,
                    created_at: row.get(6)?,
                })
            },
        )?;
        Ok(adjustment)
    }

    pub fn adjustment_total(&self, user_id: UserId, currency: Currency) -> LedgerResult<i64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM balance_adjustment
             WHERE user_id = ?1 AND currency = ?2",
            params![user_id, currency],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
