//! Static investment plan catalog. Read-only to the core.

use crate::types::{Cents, PlanId, Poisha};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub cost_usd: Cents,
    pub daily_profit_bdt: Poisha,
    pub duration_days: u32,
}

#[derive(Debug, Clone, Default)]
pub struct PlanCatalog {
    plans: BTreeMap<PlanId, Plan>,
}

impl PlanCatalog {
    pub fn new(plans: Vec<Plan>) -> Self {
        Self {
            plans: plans.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    pub fn get(&self, id: PlanId) -> Option<&Plan> {
        self.plans.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plan> {
        self.plans.values()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Replace a plan's terms. Existing investments keep the terms
    /// they copied at settlement.
    pub fn upsert(&mut self, plan: Plan) {
        self.plans.insert(plan.id, plan);
    }
}
