//! Issuing a license and recording it.
//!
//! [`create_license`] is the whole operation: issue a key, compute the
//! validity window, insert one record. [`create_license_and_close`] releases
//! the store afterwards, and [`run_issuance`] adds the construction of the
//! issuer and the connection.

use chrono::Utc;
use tracing::Instrument;

use crate::config::IssuerConfig;
use crate::database::Database;
use crate::errors::LicenseResult;
use crate::license::{LicenseRecord, LicenseRequest};
use crate::license_key::{HmacKeyIssuer, KeyIssuer};
use crate::logging::{issuance_span, log_license_event, LicenseEvent};

/// Issue a key for `request.plan` and persist an active license record.
///
/// Issuer and store failures are returned unchanged. Nothing is retried, and
/// the insert is all-or-nothing.
pub async fn create_license<I>(
    issuer: &I,
    db: &Database,
    request: &LicenseRequest,
) -> LicenseResult<LicenseRecord>
where
    I: KeyIssuer + ?Sized,
{
    request.validate()?;

    let license_key = issuer.issue(&request.plan)?;
    log_license_event(LicenseEvent::Issued, Some(&license_key), None);

    let record = LicenseRecord::issue(license_key, request, Utc::now().naive_utc())?;
    db.insert_license(&record).await?;

    let details = format!(
        "max_devices={} expires_at={}",
        record.max_devices, record.expires_at
    );
    log_license_event(LicenseEvent::Persisted, Some(&record.license_key), Some(&details));

    Ok(record)
}

/// Run one issuance against the store described by `config`.
///
/// The issuer is built first, so missing signing material fails before any
/// connection is opened. Once opened, the store is closed before this returns,
/// whether issuance succeeded or not.
pub async fn run_issuance(
    config: &IssuerConfig,
    request: &LicenseRequest,
) -> LicenseResult<LicenseRecord> {
    let span = issuance_span(&request.plan);

    async {
        let outcome = issue_with_store(config, request).await;

        if let Err(e) = &outcome {
            log_license_event(LicenseEvent::Rejected, None, Some(&e.to_string()));
        }

        outcome
    }
    .instrument(span)
    .await
}

async fn issue_with_store(
    config: &IssuerConfig,
    request: &LicenseRequest,
) -> LicenseResult<LicenseRecord> {
    let issuer = HmacKeyIssuer::new(&config.issuer)?;
    let db = Database::connect(&config.database).await?;

    create_license_and_close(&issuer, &db, request).await
}

/// [`create_license`], then close `db` on success and failure alike.
///
/// `db` cannot be used afterwards; clones share the same closed pool.
pub async fn create_license_and_close<I>(
    issuer: &I,
    db: &Database,
    request: &LicenseRequest,
) -> LicenseResult<LicenseRecord>
where
    I: KeyIssuer + ?Sized,
{
    let outcome = create_license(issuer, db, request).await;
    db.close().await;
    outcome
}
