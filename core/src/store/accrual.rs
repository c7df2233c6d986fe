use super::LedgerTx;
use crate::{
    error::LedgerResult,
    model::ProfitAccrual,
    types::{InvestmentId, Poisha, UserId},
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;

impl LedgerTx<'_> {
    // ── Profit accrual ────────────────────────────────────────────

    /// Claim the (investment, date) slot. False when the slot was already
    /// taken by this run or an earlier one.
    pub fn insert_accrual(
        &self,
        investment_id: InvestmentId,
        accrual_date: NaiveDate,
        user_id: UserId,
        amount: Poisha,
        now: DateTime<Utc>,
    ) -> LedgerResult<bool> {
        let changed = self.conn.execute(
            "INSERT INTO profit_accrual (investment_id, accrual_date, user_id, amount_bdt, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (investment_id, accrual_date) DO NOTHING",
            params![investment_id, accrual_date, user_id, amount, now],
        )?;
        Ok(changed == 1)
    }

    pub fn accruals_for_investment(
        &self,
        investment_id: InvestmentId,
    ) -> LedgerResult<Vec<ProfitAccrual>> {
        let mut stmt = self.conn.prepare(
            "SELECT investment_id, accrual_date, amount_bdt FROM profit_accrual
             WHERE investment_id = ?1 ORDER BY accrual_date ASC",
        )?;
        let rows = stmt
            .query_map(params![investment_id], |row| {
                Ok(ProfitAccrual {
                    investment_id: row.get(0)?,
                    accrual_date: row.get(1)?,
                    amount_bdt: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn profit_on(&self, user_id: UserId, date: NaiveDate) -> LedgerResult<Poisha> {
        let total: Poisha = self.conn.query_row(
            "SELECT COALESCE(SUM(amount_bdt), 0) FROM profit_accrual
             WHERE user_id = ?1 AND accrual_date = ?2",
            params![user_id, date],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    pub fn total_profit(&self, user_id: UserId) -> LedgerResult<Poisha> {
        let total: Poisha = self.conn.query_row(
            "SELECT COALESCE(SUM(amount_bdt), 0) FROM profit_accrual WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
