use std::env;

use serial_test::serial;

use license_issuer::config::{IssuerConfig, SECRET_KEY_ENV};
use license_issuer::errors::LicenseError;
use license_issuer::license_key::{HmacKeyIssuer, KeyIssuer};

const ISSUER_VARS: &[&str] = &[
    SECRET_KEY_ENV,
    "ISSUER_KEY_PREFIX",
    "ISSUER_DATABASE_TYPE",
    "ISSUER_DATABASE_URL",
    "ISSUER_LOGGING_ENABLED",
    "ISSUER_LOG_LEVEL",
];

fn clear_issuer_env() {
    for var in ISSUER_VARS {
        env::remove_var(var);
    }
}

/// Name of a config file that does not exist, so only defaults and env apply.
const NO_FILE: &str = "license-issuer-tests-no-such-config";

#[test]
#[serial]
fn defaults_apply_without_file_or_env() {
    clear_issuer_env();

    let config = IssuerConfig::load_from_file(NO_FILE).expect("defaults should load");

    assert!(config.issuer.secret.is_empty());
    assert_eq!(config.issuer.key_prefix, "LIC");
    assert_eq!(config.database.db_type, "sqlite");
    assert_eq!(config.database.url(), "sqlite://licenses.db");
    assert_eq!(config.logging.level, "info");

    let home = *config.plan_table().resolve("home").unwrap();
    assert_eq!(home.max_devices, 1);
    assert_eq!(home.validity_days, 365);
}

#[test]
#[serial]
fn environment_overrides_defaults() {
    clear_issuer_env();
    env::set_var(SECRET_KEY_ENV, "env-provided-secret-material-0123456789abcdef");
    env::set_var("ISSUER_KEY_PREFIX", "NV");
    env::set_var("ISSUER_DATABASE_URL", "sqlite://from-env.db");
    env::set_var("ISSUER_LOG_LEVEL", "debug");
    env::set_var("ISSUER_LOGGING_ENABLED", "false");

    let config = IssuerConfig::load_from_file(NO_FILE).expect("config should load");
    clear_issuer_env();

    assert_eq!(config.issuer.key_prefix, "NV");
    assert_eq!(config.database.sqlite_url, "sqlite://from-env.db");
    assert_eq!(config.logging.level, "debug");
    assert!(!config.logging.enabled);

    let issuer = HmacKeyIssuer::new(&config.issuer).expect("secret from env should be usable");
    assert!(issuer.issue("home").unwrap().starts_with("NV-HOME-"));
}

#[test]
#[serial]
fn postgres_url_only_overrides_postgres_setting() {
    clear_issuer_env();
    env::set_var("ISSUER_DATABASE_TYPE", "postgres");
    env::set_var("ISSUER_DATABASE_URL", "postgres://db.internal/licensing");

    let config = IssuerConfig::load_from_file(NO_FILE).expect("config should load");
    clear_issuer_env();

    assert_eq!(config.database.url(), "postgres://db.internal/licensing");
    assert_eq!(config.database.sqlite_url, "sqlite://licenses.db");
}

#[test]
#[serial]
fn invalid_environment_value_fails_validation() {
    clear_issuer_env();
    env::set_var("ISSUER_DATABASE_TYPE", "oracle");

    let result = IssuerConfig::load_from_file(NO_FILE);
    clear_issuer_env();

    assert!(matches!(result, Err(LicenseError::ConfigError(_))));
}

#[test]
#[serial]
fn missing_secret_fails_issuer_construction() {
    clear_issuer_env();

    let config = IssuerConfig::load_from_file(NO_FILE).expect("defaults should load");
    let err = HmacKeyIssuer::new(&config.issuer).unwrap_err();

    assert!(matches!(err, LicenseError::ConfigError(msg) if msg.contains(SECRET_KEY_ENV)));
}

#[test]
#[serial]
fn plan_id_that_cannot_be_embedded_in_a_key_fails_loading() {
    clear_issuer_env();
    let path = env::temp_dir().join(format!("issuer-plans-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(
        &path,
        "[plans.pro-plus]\nmax_devices = 3\nvalidity_days = 365\n",
    )
    .expect("config file should be writable");

    let result = IssuerConfig::load_from_file(path.to_str().unwrap());
    let _ = std::fs::remove_file(&path);

    assert!(
        matches!(result, Err(LicenseError::ConfigError(ref msg)) if msg.contains("pro-plus")),
        "unexpected result: {result:?}"
    );
}

#[test]
#[serial]
fn valid_plan_table_loads_from_file() {
    clear_issuer_env();
    let path = env::temp_dir().join(format!("issuer-plans-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(
        &path,
        "[plans.family]\nmax_devices = 5\nvalidity_days = 30\n",
    )
    .expect("config file should be writable");

    let result = IssuerConfig::load_from_file(path.to_str().unwrap());
    let _ = std::fs::remove_file(&path);

    let plans = result.expect("config should load").plan_table();
    assert_eq!(plans.plan_ids(), vec!["family"]);
    assert_eq!(plans.resolve("family").unwrap().max_devices, 5);
}
