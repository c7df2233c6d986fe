use super::LedgerTx;
use crate::{
    error::{LedgerError, LedgerResult},
    model::User,
    types::{Cents, Currency, Poisha, UserId},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

const USER_COLUMNS: &str = "id, referral_code, referred_by, referral_count, balance_usd, balance_bdt,
     total_invested_usd, total_deposited_usd, total_earned_bdt, total_commission_bdt,
     total_withdrawn_bdt, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        referral_code: row.get("referral_code")?,
        referred_by: row.get("referred_by")?,
        referral_count: row.get("referral_count")?,
        balance_usd: row.get("balance_usd")?,
        balance_bdt: row.get("balance_bdt")?,
        total_invested_usd: row.get("total_invested_usd")?,
        total_deposited_usd: row.get("total_deposited_usd")?,
        total_earned_bdt: row.get("total_earned_bdt")?,
        total_commission_bdt: row.get("total_commission_bdt")?,
        total_withdrawn_bdt: row.get("total_withdrawn_bdt")?,
        created_at: row.get("created_at")?,
    })
}

fn balance_column(currency: Currency) -> &'static str {
    match currency {
        Currency::Usd => "balance_usd",
        Currency::Bdt => "balance_bdt",
    }
}

impl LedgerTx<'_> {
    // ── Users ─────────────────────────────────────────────────────

    pub fn insert_user(
        &self,
        referral_code: &str,
        referred_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> LedgerResult<User> {
        let user = self.conn.query_row(
            &format!(
                "INSERT INTO users (referral_code, referred_by, created_at)
                 VALUES (?1, ?2, ?3)
                 RETURNING {USER_COLUMNS}"
            ),
            params![referral_code, referred_by, now],
            user_from_row,
        )?;
        Ok(user)
    }

    pub fn user(&self, user_id: UserId) -> LedgerResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![user_id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn require_user(&self, user_id: UserId) -> LedgerResult<User> {
        self.user(user_id)?.ok_or(LedgerError::NotFound {
            entity: "user",
            id: user_id,
        })
    }

    pub fn user_exists(&self, user_id: UserId) -> LedgerResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM users WHERE id = ?1", params![user_id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn user_id_by_referral_code(&self, code: &str) -> LedgerResult<Option<UserId>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM users WHERE referral_code = ?1",
                params![code],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn referral_code_taken(&self, code: &str) -> LedgerResult<bool> {
        Ok(self.user_id_by_referral_code(code)?.is_some())
    }

    /// Who referred `user_id`. Outer None: no such user.
    pub fn referred_by(&self, user_id: UserId) -> LedgerResult<Option<Option<UserId>>> {
        let referrer = self
            .conn
            .query_row(
                "SELECT referred_by FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get::<_, Option<UserId>>(0),
            )
            .optional()?;
        Ok(referrer)
    }

    pub fn increment_referral_count(&self, user_id: UserId) -> LedgerResult<()> {
        self.conn.execute(
            "UPDATE users SET referral_count = referral_count + 1 WHERE id = ?1",
            params![user_id],
        )?;
        Ok(())
    }

    // ── Guarded debits ────────────────────────────────────────────

    /// Move `cost` from spendable USD into the invested total.
    /// Returns the user's `referred_by` as read by the same statement,
    /// or None when the balance guard (or the user) did not match.
    pub fn debit_usd_for_investment(
        &self,
        user_id: UserId,
        cost: Cents,
    ) -> LedgerResult<Option<Option<UserId>>> {
        let referrer = self
            .conn
            .query_row(
                "UPDATE users
                 SET balance_usd = balance_usd - ?2,
                     total_invested_usd = total_invested_usd + ?2
                 WHERE id = ?1 AND balance_usd >= ?2
                 RETURNING referred_by",
                params![user_id, cost],
                |row| row.get::<_, Option<UserId>>(0),
            )
            .optional()?;
        Ok(referrer)
    }

    /// Reserve BDT for a payout. False when the guard did not match.
    pub fn debit_bdt(&self, user_id: UserId, amount: Poisha) -> LedgerResult<bool> {
        let changed = self.conn.execute(
            "UPDATE users SET balance_bdt = balance_bdt - ?2
             WHERE id = ?1 AND balance_bdt >= ?2",
            params![user_id, amount],
        )?;
        Ok(changed == 1)
    }

    /// Signed adjustment; a negative delta is guarded like any debit.
    pub fn adjust_balance(
        &self,
        user_id: UserId,
        currency: Currency,
        delta: i64,
    ) -> LedgerResult<bool> {
        let column = balance_column(currency);
        let changed = self.conn.execute(
            &format!(
                "UPDATE users SET {column} = {column} + ?2
                 WHERE id = ?1 AND {column} + ?2 >= 0"
            ),
            params![user_id, delta],
        )?;
        Ok(changed == 1)
    }

    // ── Credits ───────────────────────────────────────────────────

    pub fn credit_bdt(&self, user_id: UserId, amount: Poisha) -> LedgerResult<()> {
        self.expect_one_user(
            user_id,
            self.conn.execute(
                "UPDATE users SET balance_bdt = balance_bdt + ?2 WHERE id = ?1",
                params![user_id, amount],
            )?,
        )
    }

    pub fn credit_profit(&self, user_id: UserId, amount: Poisha) -> LedgerResult<()> {
        self.expect_one_user(
            user_id,
            self.conn.execute(
                "UPDATE users
                 SET balance_bdt = balance_bdt + ?2,
                     total_earned_bdt = total_earned_bdt + ?2
                 WHERE id = ?1",
                params![user_id, amount],
            )?,
        )
    }

    pub fn credit_commission(&self, user_id: UserId, amount: Poisha) -> LedgerResult<()> {
        self.expect_one_user(
            user_id,
            self.conn.execute(
                "UPDATE users
                 SET balance_bdt = balance_bdt + ?2,
                     total_commission_bdt = total_commission_bdt + ?2
                 WHERE id = ?1",
                params![user_id, amount],
            )?,
        )
    }

    pub fn credit_deposit(&self, user_id: UserId, amount: Cents) -> LedgerResult<()> {
        self.expect_one_user(
            user_id,
            self.conn.execute(
                "UPDATE users
                 SET balance_usd = balance_usd + ?2,
                     total_deposited_usd = total_deposited_usd + ?2
                 WHERE id = ?1",
                params![user_id, amount],
            )?,
        )
    }

    /// Count an approved payout. The balance already left at request time.
    pub fn record_withdrawn(&self, user_id: UserId, amount: Poisha) -> LedgerResult<()> {
        self.expect_one_user(
            user_id,
            self.conn.execute(
                "UPDATE users SET total_withdrawn_bdt = total_withdrawn_bdt + ?2 WHERE id = ?1",
                params![user_id, amount],
            )?,
        )
    }

    fn expect_one_user(&self, user_id: UserId, changed: usize) -> LedgerResult<()> {
        if changed == 1 {
            Ok(())
        } else {
            Err(LedgerError::NotFound {
                entity: "user",
                id: user_id,
            })
        }
    }
}
