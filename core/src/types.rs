//! Shared primitive types used across the entire ledger.

use serde::{Deserialize, Serialize};

/// US dollar amount in cents. Balances never use floating point.
pub type Cents = i64;

/// Bangladeshi taka amount in poisha (1/100 BDT).
pub type Poisha = i64;

pub type UserId = i64;
pub type InvestmentId = i64;
pub type WithdrawalId = i64;
pub type DepositId = i64;
pub type PlanId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    Usd,
    Bdt,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Usd => "usd",
            Self::Bdt => "bdt",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "usd" => Some(Self::Usd),
            "bdt" => Some(Self::Bdt),
            _ => None,
        }
    }
}

/// Convert a major-unit amount from configuration into minor units.
/// Only used at load time; rounding happens once, here.
pub fn to_minor(major: f64) -> i64 {
    (major * 100.0).round() as i64
}

/// Render minor units as a major-unit string for logs and reports.
pub fn format_minor(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
