use crate::{
    plan::{Plan, PlanCatalog},
    types::{to_minor, Cents, Poisha},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalConfig {
    pub min_bdt: Poisha,
    pub max_bdt: Poisha,
    pub bkash_fee_bdt: Poisha,
    pub bep20_fee_usd: Cents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositConfig {
    pub min_usd: Cents,
}

/// Commission rates in poisha credited per whole USD invested.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommissionRates {
    pub level1_poisha_per_usd: Poisha,
    pub level2_poisha_per_usd: Poisha,
}

impl CommissionRates {
    pub fn for_level(&self, level: u8) -> Poisha {
        match level {
            1 => self.level1_poisha_per_usd,
            2 => self.level2_poisha_per_usd,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccrualConfig {
    /// Investments credited per transaction.
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub busy_timeout_ms: u64,
}

// ── On-disk shapes (major units) ───────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct LedgerFile {
    usd_to_bdt_rate: f64,
    withdrawal: WithdrawalFile,
    deposit: DepositFile,
    commission: CommissionFile,
    accrual: AccrualConfig,
    store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct WithdrawalFile {
    min_bdt: f64,
    max_bdt: f64,
    bkash_fee_bdt: f64,
    bep20_fee_usd: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct DepositFile {
    min_usd: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct CommissionFile {
    /// [level 1, level 2], BDT per USD invested.
    level_rates_bdt_per_usd: [f64; 2],
}

#[derive(Debug, Clone, Deserialize)]
struct PlanEntry {
    id: i64,
    name: String,
    cost_usd: f64,
    daily_profit_bdt: f64,
    duration_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct PlansFile {
    plans: Vec<PlanEntry>,
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// BDT per USD, which is also poisha per cent.
    pub usd_to_bdt_rate: f64,
    pub withdrawal: WithdrawalConfig,
    pub deposit: DepositConfig,
    pub commission: CommissionRates,
    pub accrual: AccrualConfig,
    pub store: StoreConfig,
    pub plans: PlanCatalog,
}

impl LedgerConfig {
    /// Load from the data/ directory.
    /// In tests, use LedgerConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let ledger_path = format!("{data_dir}/ledger.json");
        let ledger_content = std::fs::read_to_string(&ledger_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {ledger_path}: {e}"))?;
        let file: LedgerFile = serde_json::from_str(&ledger_content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {ledger_path}: {e}"))?;

        let plans_path = format!("{data_dir}/plans.json");
        let plans_content = std::fs::read_to_string(&plans_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {plans_path}: {e}"))?;
        let plans_file: PlansFile = serde_json::from_str(&plans_content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {plans_path}: {e}"))?;

        let plans = plans_file
            .plans
            .into_iter()
            .map(|p| Plan {
                id: p.id,
                name: p.name,
                cost_usd: to_minor(p.cost_usd),
                daily_profit_bdt: to_minor(p.daily_profit_bdt),
                duration_days: p.duration_days,
            })
            .collect::<Vec<_>>();

        let config = Self {
            usd_to_bdt_rate: file.usd_to_bdt_rate,
            withdrawal: WithdrawalConfig {
                min_bdt: to_minor(file.withdrawal.min_bdt),
                max_bdt: to_minor(file.withdrawal.max_bdt),
                bkash_fee_bdt: to_minor(file.withdrawal.bkash_fee_bdt),
                bep20_fee_usd: to_minor(file.withdrawal.bep20_fee_usd),
            },
            deposit: DepositConfig {
                min_usd: to_minor(file.deposit.min_usd),
            },
            commission: CommissionRates {
                level1_poisha_per_usd: to_minor(file.commission.level_rates_bdt_per_usd[0]),
                level2_poisha_per_usd: to_minor(file.commission.level_rates_bdt_per_usd[1]),
            },
            accrual: file.accrual,
            store: file.store,
            plans: PlanCatalog::new(plans),
        };
        config.validate()?;
        Ok(config)
    }

    /// Source defaults: 110 BDT/USD, 500–25,000 BDT withdrawals,
    /// 10% / 5% referral commission.
    pub fn default_test() -> Self {
        Self {
            usd_to_bdt_rate: 110.0,
            withdrawal: WithdrawalConfig {
                min_bdt: 500_00,
                max_bdt: 25_000_00,
                bkash_fee_bdt: 10_00,
                bep20_fee_usd: 1_00,
            },
            deposit: DepositConfig { min_usd: 10_00 },
            commission: CommissionRates {
                level1_poisha_per_usd: 11_00,
                level2_poisha_per_usd: 5_50,
            },
            accrual: AccrualConfig { batch_size: 50 },
            store: StoreConfig { busy_timeout_ms: 5_000 },
            plans: PlanCatalog::new(vec![
                Plan {
                    id: 1,
                    name: "Starter".into(),
                    cost_usd: 10_00,
                    daily_profit_bdt: 70_00,
                    duration_days: 30,
                },
                Plan {
                    id: 2,
                    name: "Growth".into(),
                    cost_usd: 60_00,
                    daily_profit_bdt: 250_00,
                    duration_days: 30,
                },
                Plan {
                    id: 3,
                    name: "Premium".into(),
                    cost_usd: 100_00,
                    daily_profit_bdt: 400_00,
                    duration_days: 30,
                },
            ]),
        }
    }

    /// BDT fee charged on a BEP20 payout, converted at the configured rate.
    pub fn bep20_fee_bdt(&self) -> Poisha {
        (self.withdrawal.bep20_fee_usd as f64 * self.usd_to_bdt_rate).round() as Poisha
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.withdrawal.min_bdt <= 0 || self.withdrawal.min_bdt > self.withdrawal.max_bdt {
            anyhow::bail!(
                "withdrawal range invalid: min {} max {}",
                self.withdrawal.min_bdt,
                self.withdrawal.max_bdt
            );
        }
        let fees = [self.withdrawal.bkash_fee_bdt, self.bep20_fee_bdt()];
        if fees.iter().any(|&fee| fee < 0 || fee >= self.withdrawal.min_bdt) {
            anyhow::bail!("withdrawal fees must be non-negative and below min_bdt");
        }
        if self.accrual.batch_size == 0 {
            anyhow::bail!("accrual.batch_size must be positive");
        }
        if self.commission.level1_poisha_per_usd < 0 || self.commission.level2_poisha_per_usd < 0 {
            anyhow::bail!("commission rates must be non-negative");
        }
        if self.plans.is_empty() {
            anyhow::bail!("plan catalog is empty");
        }
        for plan in self.plans.iter() {
            if plan.cost_usd <= 0 || plan.daily_profit_bdt < 0 || plan.duration_days == 0 {
                anyhow::bail!("plan {} has invalid terms", plan.id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_test_config_is_valid() {
        let config = LedgerConfig::default_test();
        config.validate().unwrap();
        assert_eq!(config.bep20_fee_bdt(), 110_00);
    }

    #[test]
    fn repository_data_dir_loads() {
        let data_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../data");
        let config = LedgerConfig::load(data_dir).expect("load data/");
        assert_eq!(config.withdrawal.min_bdt, 500_00);
        assert_eq!(config.commission.level1_poisha_per_usd, 11_00);
        assert_eq!(config.commission.level2_poisha_per_usd, 5_50);
        assert!(config.plans.get(1).is_some());
    }

    #[test]
    fn missing_data_dir_names_the_file() {
        let err = LedgerConfig::load("/nonexistent-ledger-data").unwrap_err();
        assert!(err.to_string().contains("ledger.json"));
    }

    #[test]
    fn fee_at_or_above_minimum_is_rejected() {
        let mut config = LedgerConfig::default_test();
        config.withdrawal.bkash_fee_bdt = config.withdrawal.min_bdt;
        assert!(config.validate().is_err());
    }
}
