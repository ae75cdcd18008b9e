//! Configuration for the license issuer.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! The loaded [`IssuerConfig`] is an explicit value handed to the key issuer
//! and the store. Nothing reads the environment after loading.
//!
//! # Environment Variables
//!
//! - `LICENSE_SECRET_KEY` - Secret material used to sign issued keys
//! - `ISSUER_KEY_PREFIX` - License key prefix
//! - `ISSUER_DATABASE_TYPE` - Database type (`sqlite` or `postgres`)
//! - `ISSUER_DATABASE_URL` - Database connection URL
//! - `ISSUER_LOGGING_ENABLED` - Enable log output
//! - `ISSUER_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use config::Config;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fmt;

use crate::errors::{LicenseError, LicenseResult};
use crate::plans::{PlanPolicy, PlanTable};

/// Environment variable carrying the signing secret.
pub const SECRET_KEY_ENV: &str = "LICENSE_SECRET_KEY";

/// Default configuration file name (extension is resolved by the `config` crate).
pub const DEFAULT_CONFIG_FILE: &str = "config";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// Key issuer configuration
    pub issuer: KeyConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Plan policy table
    pub plans: HashMap<String, PlanPolicy>,
}

/// Key issuer configuration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Secret material used to derive the key check segment
    pub secret: String,
    /// Prefix for generated license keys (e.g., "LIC" -> "LIC-HOME-XXXX-...")
    pub key_prefix: String,
    /// Number of random segments in the license key
    pub key_segments: u8,
    /// Characters per segment
    pub key_segment_length: u8,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            key_prefix: "LIC".to_string(),
            key_segments: 4,
            key_segment_length: 4,
        }
    }
}

// The secret never reaches log output.
impl fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyConfig")
            .field(
                "secret",
                &if self.secret.is_empty() {
                    "<unset>"
                } else {
                    "<redacted>"
                },
            )
            .field("key_prefix", &self.key_prefix)
            .field("key_segments", &self.key_segments)
            .field("key_segment_length", &self.key_segment_length)
            .finish()
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database type: "sqlite" or "postgres"
    pub db_type: String,
    /// SQLite connection URL
    pub sqlite_url: String,
    /// PostgreSQL connection URL
    pub postgres_url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            sqlite_url: "sqlite://licenses.db".to_string(),
            postgres_url: "postgres://localhost/licenses".to_string(),
        }
    }
}

impl DatabaseConfig {
    /// URL for the selected database type.
    pub fn url(&self) -> &str {
        match self.db_type.as_str() {
            "postgres" => &self.postgres_url,
            _ => &self.sqlite_url,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
        }
    }
}

fn config_err(e: config::ConfigError) -> LicenseError {
    LicenseError::ConfigError(e.to_string())
}

impl IssuerConfig {
    /// Load configuration from `config.toml` (optional) and the environment.
    pub fn load() -> LicenseResult<Self> {
        Self::load_from_file(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from the named file (optional) and the environment,
    /// then validate it.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. The configuration file
    /// 3. Environment variables
    pub fn load_from_file(file: &str) -> LicenseResult<Self> {
        let builder = Config::builder()
            // Start with defaults
            .set_default("issuer.secret", "")
            .map_err(config_err)?
            .set_default("issuer.key_prefix", "LIC")
            .map_err(config_err)?
            .set_default("issuer.key_segments", 4)
            .map_err(config_err)?
            .set_default("issuer.key_segment_length", 4)
            .map_err(config_err)?
            .set_default("database.db_type", "sqlite")
            .map_err(config_err)?
            .set_default("database.sqlite_url", "sqlite://licenses.db")
            .map_err(config_err)?
            .set_default("database.postgres_url", "postgres://localhost/licenses")
            .map_err(config_err)?
            .set_default("logging.enabled", true)
            .map_err(config_err)?
            .set_default("logging.level", "info")
            .map_err(config_err)?
            // Load from config file (optional)
            .add_source(config::File::with_name(file).required(false))
            // Override with environment variables
            .set_override_option("issuer.secret", env::var(SECRET_KEY_ENV).ok())
            .map_err(config_err)?
            .set_override_option("issuer.key_prefix", env::var("ISSUER_KEY_PREFIX").ok())
            .map_err(config_err)?
            .set_override_option("database.db_type", env::var("ISSUER_DATABASE_TYPE").ok())
            .map_err(config_err)?
            .set_override_option(
                "database.sqlite_url",
                env::var("ISSUER_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("sqlite")),
            )
            .map_err(config_err)?
            .set_override_option(
                "database.postgres_url",
                env::var("ISSUER_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("postgres")),
            )
            .map_err(config_err)?
            .set_override_option(
                "logging.enabled",
                env::var("ISSUER_LOGGING_ENABLED")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(config_err)?
            .set_override_option("logging.level", env::var("ISSUER_LOG_LEVEL").ok())
            .map_err(config_err)?;

        let settings = builder
            .build()
            .map_err(|e| LicenseError::ConfigError(format!("failed to build config: {e}")))?;

        let config: IssuerConfig = settings
            .try_deserialize()
            .map_err(|e| LicenseError::ConfigError(format!("failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// The signing secret is not checked here; the key issuer refuses to be
    /// constructed without it.
    pub fn validate(&self) -> LicenseResult<()> {
        match self.database.db_type.as_str() {
            "sqlite" | "postgres" => {}
            other => {
                return Err(LicenseError::ConfigError(format!(
                    "database.db_type must be 'sqlite' or 'postgres', got '{other}'"
                )));
            }
        }

        let prefix = &self.issuer.key_prefix;
        if prefix.is_empty() {
            return Err(LicenseError::ConfigError(
                "issuer.key_prefix cannot be empty".to_string(),
            ));
        }
        if !prefix
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(LicenseError::ConfigError(format!(
                "issuer.key_prefix must be uppercase alphanumeric, got '{prefix}'"
            )));
        }
        if self.issuer.key_segments == 0 {
            return Err(LicenseError::ConfigError(
                "issuer.key_segments must be greater than 0".to_string(),
            ));
        }
        if self.issuer.key_segment_length == 0 {
            return Err(LicenseError::ConfigError(
                "issuer.key_segment_length must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(LicenseError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        self.plan_table().validate()
    }

    /// The plan policy table described by this configuration.
    pub fn plan_table(&self) -> PlanTable {
        PlanTable::new(self.plans.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = IssuerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database.url(), "sqlite://licenses.db");
        assert!(config.plan_table().contains("home"));
    }

    #[test]
    fn rejects_unknown_database_type() {
        let mut config = IssuerConfig::default();
        config.database.db_type = "mysql".to_string();
        assert!(matches!(
            config.validate(),
            Err(LicenseError::ConfigError(msg)) if msg.contains("db_type")
        ));
    }

    #[test]
    fn rejects_lowercase_prefix() {
        let mut config = IssuerConfig::default();
        config.issuer.key_prefix = "lic".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_segments() {
        let mut config = IssuerConfig::default();
        config.issuer.key_segments = 0;
        assert!(config.validate().is_err());

        let mut config = IssuerConfig::default();
        config.issuer.key_segment_length = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_log_level() {
        let mut config = IssuerConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn postgres_url_selected_by_type() {
        let mut config = IssuerConfig::default();
        config.database.db_type = "postgres".to_string();
        assert_eq!(config.database.url(), "postgres://localhost/licenses");
    }

    #[test]
    fn debug_output_redacts_secret() {
        let key = KeyConfig {
            secret: "super-secret-material".to_string(),
            ..KeyConfig::default()
        };
        let debug = format!("{key:?}");
        assert!(!debug.contains("super-secret-material"));
        assert!(debug.contains("<redacted>"));
    }
}
