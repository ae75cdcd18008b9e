//! License issuer - issue a license key and record it in the licensing database
//!
//! One run does three things: generate a signed key for a plan, compute the
//! validity window, and insert a single `customer_licenses` row.
//!
//! # Features
//!
//! - `sqlite` - SQLite license store. Enabled by default.
//! - `postgres` - PostgreSQL license store.
//!
//! # Example
//!
//! ```rust,ignore
//! use license_issuer::config::IssuerConfig;
//! use license_issuer::issuance::run_issuance;
//! use license_issuer::license::LicenseRequest;
//!
//! let config = IssuerConfig::load()?;
//! let request = LicenseRequest::for_plan(&config.plan_table(), "home", "test@test.com")?;
//! let record = run_issuance(&config, &request).await?;
//! println!("{}", record.license_key);
//! ```

pub mod cli;
pub mod config;
pub mod database;
pub mod errors;
pub mod issuance;
pub mod license;
pub mod license_key;
pub mod logging;
pub mod plans;

pub use errors::{LicenseError, LicenseResult, PersistenceError};
