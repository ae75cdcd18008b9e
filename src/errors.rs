//! Error types for license issuance.
//!
//! Every failure is fatal for a single issuance run: nothing here is retried,
//! the operator re-runs the tool once the cause is fixed.

use thiserror::Error;

/// Failures raised by the license store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The store rejected the insert because the key is already recorded.
    #[error("license key already exists: {0}")]
    DuplicateKey(String),

    /// The store could not be reached or refused the connection.
    #[error("license store unavailable: {0}")]
    Unavailable(String),

    /// Any other database failure.
    #[error("database error: {0}")]
    Query(String),
}

/// Top-level error for issuing and recording a license.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Missing or invalid configuration, including absent signing material.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The key issuer could not produce a key.
    #[error("key generation failed: {0}")]
    GenerationError(String),

    #[error("persistence failure: {0}")]
    PersistenceError(#[from] PersistenceError),

    /// The plan is not present in the plan table.
    #[error("unknown plan: {0}")]
    UnknownPlan(String),

    #[error("invalid license request: {0}")]
    InvalidRequest(String),
}

impl LicenseError {
    /// Process exit status reported for this error.
    ///
    /// - `2` configuration or usage problems
    /// - `3` key generation
    /// - `4` persistence
    pub fn exit_code(&self) -> u8 {
        match self {
            LicenseError::ConfigError(_)
            | LicenseError::UnknownPlan(_)
            | LicenseError::InvalidRequest(_) => 2,
            LicenseError::GenerationError(_) => 3,
            LicenseError::PersistenceError(_) => 4,
        }
    }
}

/// Convenience result alias used throughout the crate.
pub type LicenseResult<T> = Result<T, LicenseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_non_zero_and_grouped() {
        assert_eq!(LicenseError::ConfigError("x".into()).exit_code(), 2);
        assert_eq!(LicenseError::UnknownPlan("pro".into()).exit_code(), 2);
        assert_eq!(LicenseError::InvalidRequest("x".into()).exit_code(), 2);
        assert_eq!(LicenseError::GenerationError("x".into()).exit_code(), 3);
        assert_eq!(
            LicenseError::from(PersistenceError::DuplicateKey("K".into())).exit_code(),
            4
        );
    }

    #[test]
    fn persistence_error_display_is_nested() {
        let err = LicenseError::from(PersistenceError::DuplicateKey("LIC-HOME-AAAA".into()));
        let msg = err.to_string();
        assert!(msg.contains("persistence failure"));
        assert!(msg.contains("LIC-HOME-AAAA"));
    }
}
