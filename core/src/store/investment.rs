use super::LedgerTx;
use crate::{
    error::LedgerResult,
    model::{CommissionStatus, Investment, InvestmentStatus},
    types::{Cents, InvestmentId, PlanId, Poisha, UserId},
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

const INVESTMENT_COLUMNS: &str = "id, user_id, plan_id, investment_usd, daily_profit_bdt, duration_days,
     status, start_date, end_date, referrer_l1, referrer_l2, commission_status, created_at";

fn investment_from_row(row: &Row<'_>) -> rusqlite::Result<Investment> {
    Ok(Investment {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        plan_id: row.get("plan_id")?,
        investment_usd: row.get("investment_usd")?,
        daily_profit_bdt: row.get("daily_profit_bdt")?,
        duration_days: row.get("duration_days")?,
        status: row.get("status")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        referrer_l1: row.get("referrer_l1")?,
        referrer_l2: row.get("referrer_l2")?,
        commission_status: row.get("commission_status")?,
        created_at: row.get("created_at")?,
    })
}

#[derive(Debug, Clone)]
pub struct NewInvestment {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub investment_usd: Cents,
    pub daily_profit_bdt: Poisha,
    pub duration_days: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub referrer_l1: Option<UserId>,
    pub referrer_l2: Option<UserId>,
}

impl LedgerTx<'_> {
    // ── Investments ───────────────────────────────────────────────

    pub fn insert_investment(
        &self,
        new: &NewInvestment,
        now: DateTime<Utc>,
    ) -> LedgerResult<Investment> {
        let commission_status = if new.referrer_l1.is_some() {
            CommissionStatus::Pending
        } else {
            CommissionStatus::None
        };
        let investment = self.conn.query_row(
            &format!(
                "INSERT INTO investments (
                    user_id, plan_id, investment_usd, daily_profit_bdt, duration_days, status,
                    start_date, end_date, referrer_l1, referrer_l2, commission_status, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 RETURNING {INVESTMENT_COLUMNS}"
            ),
            params![
                new.user_id,
                new.plan_id,
                new.investment_usd,
                new.daily_profit_bdt,
                new.duration_days,
                InvestmentStatus::Active,
                new.start_date,
                new.end_date,
                new.referrer_l1,
                new.referrer_l2,
                commission_status,
                now,
            ],
            investment_from_row,
        )?;
        Ok(investment)
    }

    pub fn investment(&self, id: InvestmentId) -> LedgerResult<Option<Investment>> {
        let investment = self
            .conn
            .query_row(
                &format!("SELECT {INVESTMENT_COLUMNS} FROM investments WHERE id = ?1"),
                params![id],
                investment_from_row,
            )
            .optional()?;
        Ok(investment)
    }

    pub fn investments_for_user(&self, user_id: UserId) -> LedgerResult<Vec<Investment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {INVESTMENT_COLUMNS} FROM investments
             WHERE user_id = ?1 ORDER BY id ASC"
        ))?;
        let rows = stmt
            .query_map(params![user_id], investment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Next page of active investments with id > `after`, keyset-paginated
    /// so each accrual chunk is its own short transaction.
    pub fn active_investments_after(
        &self,
        after: InvestmentId,
        limit: usize,
    ) -> LedgerResult<Vec<Investment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {INVESTMENT_COLUMNS} FROM investments
             WHERE status = 'active' AND id > ?1
             ORDER BY id ASC LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![after, limit as i64], investment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// active → completed. False if it was already completed.
    pub fn complete_investment(&self, id: InvestmentId, now: DateTime<Utc>) -> LedgerResult<bool> {
        let changed = self.conn.execute(
            "UPDATE investments SET status = 'completed', completed_at = ?2
             WHERE id = ?1 AND status = 'active'",
            params![id, now],
        )?;
        Ok(changed == 1)
    }

    pub fn set_commission_status(
        &self,
        id: InvestmentId,
        status: CommissionStatus,
    ) -> LedgerResult<()> {
        self.conn.execute(
            "UPDATE investments SET commission_status = ?2 WHERE id = ?1",
            params![id, status],
        )?;
        Ok(())
    }

    pub fn investments_with_pending_commission(&self) -> LedgerResult<Vec<InvestmentId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM investments WHERE commission_status = 'pending' ORDER BY id ASC",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn active_investment_usd(&self, user_id: UserId) -> LedgerResult<Cents> {
        let total: Cents = self.conn.query_row(
            "SELECT COALESCE(SUM(investment_usd), 0) FROM investments
             WHERE user_id = ?1 AND status = 'active'",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    pub fn total_investment_usd(&self, user_id: UserId) -> LedgerResult<Cents> {
        let total: Cents = self.conn.query_row(
            "SELECT COALESCE(SUM(investment_usd), 0) FROM investments WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
