//! Plan policy table.
//!
//! A plan decides how many devices a license may be bound to and how long it
//! stays valid. The table is explicit configuration; nothing here guesses a
//! device limit from the plan name.
//!
//! # Configuration
//!
//! Plans are defined in `config.toml`:
//!
//! ```toml
//! [plans.home]
//! max_devices = 1
//! validity_days = 365
//!
//! [plans.family]
//! max_devices = 5
//! validity_days = 365
//! ```
//!
//! When no plans are configured the table contains only `home`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::{LicenseError, LicenseResult};
use crate::license::MAX_VALIDITY_DAYS;
use crate::license_key::is_valid_plan_id;

/// Name of the plan present in every default table.
pub const DEFAULT_PLAN: &str = "home";

/// Limits attached to a single plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanPolicy {
    /// Maximum number of devices the license may be bound to
    pub max_devices: u32,
    /// Days between issuance and expiry
    pub validity_days: u32,
}

impl Default for PlanPolicy {
    fn default() -> Self {
        Self {
            max_devices: 1,
            validity_days: 365,
        }
    }
}

/// Plan identifier → policy mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanTable {
    plans: HashMap<String, PlanPolicy>,
}

impl Default for PlanTable {
    fn default() -> Self {
        let mut plans = HashMap::new();
        plans.insert(DEFAULT_PLAN.to_string(), PlanPolicy::default());
        Self { plans }
    }
}

impl PlanTable {
    /// Build a table from configured plans, falling back to the default table
    /// when none are configured.
    pub fn new(plans: HashMap<String, PlanPolicy>) -> Self {
        if plans.is_empty() {
            Self::default()
        } else {
            Self { plans }
        }
    }

    /// Look up the policy for `plan`.
    pub fn resolve(&self, plan: &str) -> LicenseResult<&PlanPolicy> {
        self.plans
            .get(plan)
            .ok_or_else(|| LicenseError::UnknownPlan(plan.to_string()))
    }

    pub fn contains(&self, plan: &str) -> bool {
        self.plans.contains_key(plan)
    }

    /// All configured plan identifiers, sorted.
    pub fn plan_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.plans.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Reject plans that could never produce a usable license: identifiers
    /// the key issuer cannot embed, and out-of-range limits.
    pub fn validate(&self) -> LicenseResult<()> {
        for (id, policy) in &self.plans {
            if !is_valid_plan_id(id) {
                return Err(LicenseError::ConfigError(format!(
                    "plan id '{id}' must match [a-z][a-z0-9_]{{0,31}}"
                )));
            }
            if policy.max_devices == 0 {
                return Err(LicenseError::ConfigError(format!(
                    "plans.{id}.max_devices must be at least 1"
                )));
            }
            if policy.validity_days == 0 {
                return Err(LicenseError::ConfigError(format!(
                    "plans.{id}.validity_days must be at least 1"
                )));
            }
            if policy.validity_days > MAX_VALIDITY_DAYS {
                return Err(LicenseError::ConfigError(format!(
                    "plans.{id}.validity_days must be at most {MAX_VALIDITY_DAYS}"
                )));
            }
        }
        Ok(())
    }
}
