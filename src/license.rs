//! License record data model.

use chrono::{Duration, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{LicenseError, LicenseResult};
use crate::plans::PlanTable;

/// Longest validity window accepted for a single license (100 years).
pub const MAX_VALIDITY_DAYS: u32 = 36_500;

/// Lifecycle state of a license.
///
/// Issuance always produces `Active`; the other states are set by systems
/// that manage licenses after they are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Suspended,
    Expired,
    Revoked,
}

impl LicenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Active => "active",
            LicenseStatus::Suspended => "suspended",
            LicenseStatus::Expired => "expired",
            LicenseStatus::Revoked => "revoked",
        }
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseStatus {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LicenseStatus::Active),
            "suspended" => Ok(LicenseStatus::Suspended),
            "expired" => Ok(LicenseStatus::Expired),
            "revoked" => Ok(LicenseStatus::Revoked),
            other => Err(LicenseError::InvalidRequest(format!(
                "unknown license status '{other}'"
            ))),
        }
    }
}

/// A row of the `customer_licenses` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub license_key: String,
    pub plan: String,
    pub status: LicenseStatus,
    pub max_devices: u32,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub customer_email: String,
}

impl LicenseRecord {
    /// Assemble a freshly issued, active record.
    ///
    /// `now` is truncated to microseconds so the stored timestamps read back
    /// identically from every supported backend.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if the expiry falls outside the representable range.
    pub fn issue(
        license_key: String,
        request: &LicenseRequest,
        now: NaiveDateTime,
    ) -> LicenseResult<Self> {
        let created_at = now.trunc_subsecs(6);
        let expires_at = Duration::try_days(i64::from(request.validity_days))
            .and_then(|window| created_at.checked_add_signed(window))
            .ok_or_else(|| {
                LicenseError::InvalidRequest(format!(
                    "validity_days {} puts the expiry out of range",
                    request.validity_days
                ))
            })?;

        Ok(Self {
            license_key,
            plan: request.plan.clone(),
            status: LicenseStatus::Active,
            max_devices: request.max_devices,
            created_at,
            expires_at,
            customer_email: request.customer_email.clone(),
        })
    }

    /// Length of the validity window.
    pub fn validity(&self) -> Duration {
        self.expires_at - self.created_at
    }
}

/// Parameters for issuing one license.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseRequest {
    pub plan: String,
    pub customer_email: String,
    pub validity_days: u32,
    pub max_devices: u32,
}

impl LicenseRequest {
    pub fn new(
        plan: impl Into<String>,
        customer_email: impl Into<String>,
        validity_days: u32,
        max_devices: u32,
    ) -> Self {
        Self {
            plan: plan.into(),
            customer_email: customer_email.into(),
            validity_days,
            max_devices,
        }
    }

    /// Build a request whose limits come from the plan table.
    ///
    /// # Errors
    ///
    /// `UnknownPlan` if the plan is not in `plans`.
    pub fn for_plan(
        plans: &PlanTable,
        plan: &str,
        customer_email: impl Into<String>,
    ) -> LicenseResult<Self> {
        let policy = plans.resolve(plan)?;
        Ok(Self::new(
            plan,
            customer_email,
            policy.validity_days,
            policy.max_devices,
        ))
    }

    pub fn with_validity_days(mut self, days: u32) -> Self {
        self.validity_days = days;
        self
    }

    pub fn with_max_devices(mut self, max_devices: u32) -> Self {
        self.max_devices = max_devices;
        self
    }

    /// Check the limits that keep `expires_at > created_at` and the device
    /// limit usable.
    pub fn validate(&self) -> LicenseResult<()> {
        if self.plan.trim().is_empty() {
            return Err(LicenseError::InvalidRequest("plan cannot be empty".to_string()));
        }
        if self.customer_email.trim().is_empty() {
            return Err(LicenseError::InvalidRequest(
                "customer_email cannot be empty".to_string(),
            ));
        }
        if self.validity_days == 0 {
            return Err(LicenseError::InvalidRequest(
                "validity_days must be at least 1".to_string(),
            ));
        }
        if self.validity_days > MAX_VALIDITY_DAYS {
            return Err(LicenseError::InvalidRequest(format!(
                "validity_days must be at most {MAX_VALIDITY_DAYS}, got {}",
                self.validity_days
            )));
        }
        if self.max_devices == 0 {
            return Err(LicenseError::InvalidRequest(
                "max_devices must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
