//! Log output for the issuer.
//!
//! Logs go to stderr so that stdout carries only the issuance report.
//! License lifecycle events are logged as structured `tracing` events inside
//! an `issuance` span that carries a per-run id.

use tracing::{info, info_span, warn, Level, Span};
use uuid::Uuid;

use crate::config::LoggingConfig;

/// License issuance event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseEvent {
    /// A key was generated
    Issued,
    /// The record was committed to the store
    Persisted,
    /// Issuance failed and nothing was committed
    Rejected,
}

impl std::fmt::Display for LicenseEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LicenseEvent::Issued => "issued",
            LicenseEvent::Persisted => "persisted",
            LicenseEvent::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install the global subscriber.
///
/// Does nothing when logging is disabled. Calling it again after a subscriber
/// is installed is harmless.
pub fn init_logging(config: &LoggingConfig) {
    if !config.enabled {
        return;
    }

    let _ = tracing_subscriber::fmt()
        .with_max_level(parse_level(&config.level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Generate a new unique run id.
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping a single issuance run.
pub fn issuance_span(plan: &str) -> Span {
    info_span!("issuance", run_id = %generate_run_id(), plan = %plan)
}

/// Log a license lifecycle event.
///
/// # Arguments
///
/// * `event` - The type of license event
/// * `license_key` - The license key, if one was generated
/// * `details` - Optional additional details about the event
pub fn log_license_event(event: LicenseEvent, license_key: Option<&str>, details: Option<&str>) {
    let key = license_key.unwrap_or("-");

    match event {
        LicenseEvent::Rejected => {
            if let Some(d) = details {
                warn!(event = %event, license_key = %key, reason = %d, "License event occurred");
            } else {
                warn!(event = %event, license_key = %key, "License event occurred");
            }
        }
        _ => {
            if let Some(d) = details {
                info!(event = %event, license_key = %key, details = %d, "License event occurred");
            } else {
                info!(event = %event, license_key = %key, "License event occurred");
            }
        }
    }
}
