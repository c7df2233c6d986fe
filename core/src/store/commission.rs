use super::LedgerTx;
use crate::{
    error::LedgerResult,
    model::Commission,
    types::{InvestmentId, Poisha, UserId},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

const COMMISSION_COLUMNS: &str =
    "id, beneficiary_user_id, source_investment_id, level, rate_poisha_per_usd, amount_bdt, created_at";

fn commission_from_row(row: &Row<'_>) -> rusqlite::Result<Commission> {
    Ok(Commission {
        id: row.get("id")?,
        beneficiary_user_id: row.get("beneficiary_user_id")?,
        source_investment_id: row.get("source_investment_id")?,
        level: row.get("level")?,
        rate_poisha_per_usd: row.get("rate_poisha_per_usd")?,
        amount_bdt: row.get("amount_bdt")?,
        created_at: row.get("created_at")?,
    })
}

impl LedgerTx<'_> {
    // ── Referral commission ───────────────────────────────────────

    /// Write the (investment, level) commission row. None when that level
    /// was already paid for this investment.
    pub fn insert_commission(
        &self,
        beneficiary: UserId,
        source_investment_id: InvestmentId,
        level: u8,
        rate_poisha_per_usd: Poisha,
        amount: Poisha,
        now: DateTime<Utc>,
    ) -> LedgerResult<Option<Commission>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "INSERT INTO commission (
                        beneficiary_user_id, source_investment_id, level,
                        rate_poisha_per_usd, amount_bdt, created_at
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT (source_investment_id, level) DO NOTHING
                     RETURNING {COMMISSION_COLUMNS}"
                ),
                params![beneficiary, source_investment_id, level, rate_poisha_per_usd, amount, now],
                commission_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn commissions_for_user(&self, user_id: UserId) -> LedgerResult<Vec<Commission>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMMISSION_COLUMNS} FROM commission
             WHERE beneficiary_user_id = ?1 ORDER BY id ASC"
        ))?;
        let rows = stmt
            .query_map(params![user_id], commission_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn total_commission(&self, user_id: UserId) -> LedgerResult<Poisha> {
        let total: Poisha = self.conn.query_row(
            "SELECT COALESCE(SUM(amount_bdt), 0) FROM commission WHERE beneficiary_user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
