//! License store over SQLite and Postgres.
//!
//! Records live in the `customer_licenses` table (see
//! `docs/customer_licenses.sql`). The table is expected to exist; this crate
//! never creates or alters it.

use chrono::NaiveDateTime;
use sqlx::FromRow;
use tracing::{debug, error};

#[cfg(any(feature = "sqlite", feature = "postgres"))]
use sqlx::query;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
use sqlx::query_as;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
use sqlx::query_scalar;

#[cfg(feature = "sqlite")]
use sqlx::sqlite::SqlitePoolOptions;
#[cfg(feature = "sqlite")]
use sqlx::SqlitePool;

#[cfg(feature = "postgres")]
use sqlx::postgres::PgPoolOptions;
#[cfg(feature = "postgres")]
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::errors::{LicenseError, LicenseResult, PersistenceError};
use crate::license::{LicenseRecord, LicenseStatus};

/// Raw row as stored; converted into [`LicenseRecord`] after reading.
#[derive(Debug, Clone, FromRow)]
struct LicenseRow {
    license_key: String,
    plan: String,
    status: String,
    max_devices: i64,
    created_at: NaiveDateTime,
    expires_at: NaiveDateTime,
    customer_email: String,
}

impl TryFrom<LicenseRow> for LicenseRecord {
    type Error = LicenseError;

    fn try_from(row: LicenseRow) -> Result<Self, Self::Error> {
        let status: LicenseStatus = row.status.parse().map_err(|_| {
            PersistenceError::Query(format!(
                "license {} has unknown status '{}'",
                row.license_key, row.status
            ))
        })?;
        let max_devices = u32::try_from(row.max_devices).map_err(|_| {
            PersistenceError::Query(format!(
                "license {} has out-of-range max_devices {}",
                row.license_key, row.max_devices
            ))
        })?;

        Ok(LicenseRecord {
            license_key: row.license_key,
            plan: row.plan,
            status,
            max_devices,
            created_at: row.created_at,
            expires_at: row.expires_at,
            customer_email: row.customer_email,
        })
    }
}

/// Map a driver error onto the persistence taxonomy.
fn persistence_error(op: &str, license_key: &str, e: sqlx::Error) -> PersistenceError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PersistenceError::DuplicateKey(license_key.to_string())
        }
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => PersistenceError::Unavailable(format!("{op}: {e}")),
        other => PersistenceError::Query(format!("{op}: {other}")),
    }
}

/// Unified database abstraction over SQLite and Postgres.
///
/// Available variants depend on enabled features:
/// - `sqlite` feature enables `Database::SQLite`
/// - `postgres` feature enables `Database::Postgres`
#[derive(Debug, Clone)]
pub enum Database {
    #[cfg(feature = "sqlite")]
    SQLite(SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
}

impl Database {
    /// Open the store described by `config`.
    ///
    /// The pool holds a single connection; issuance performs exactly one write.
    pub async fn connect(config: &DatabaseConfig) -> LicenseResult<Self> {
        match config.db_type.as_str() {
            #[cfg(feature = "sqlite")]
            "sqlite" => {
                let pool = SqlitePoolOptions::new()
                    .max_connections(1)
                    .connect(&config.sqlite_url)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to SQLite: {e}");
                        PersistenceError::Unavailable(format!("failed to connect to SQLite: {e}"))
                    })?;

                debug!(url = %config.sqlite_url, "Connected to SQLite license store");
                Ok(Database::SQLite(pool))
            }
            #[cfg(not(feature = "sqlite"))]
            "sqlite" => Err(LicenseError::ConfigError(
                "SQLite support not compiled in. Enable the 'sqlite' feature.".to_string(),
            )),
            #[cfg(feature = "postgres")]
            "postgres" => {
                let pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect(&config.postgres_url)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to PostgreSQL: {e}");
                        PersistenceError::Unavailable(format!(
                            "failed to connect to PostgreSQL: {e}"
                        ))
                    })?;

                debug!("Connected to PostgreSQL license store");
                Ok(Database::Postgres(pool))
            }
            #[cfg(not(feature = "postgres"))]
            "postgres" => Err(LicenseError::ConfigError(
                "PostgreSQL support not compiled in. Enable the 'postgres' feature.".to_string(),
            )),
            other => Err(LicenseError::ConfigError(format!(
                "unsupported database type: {other}"
            ))),
        }
    }

    /// Backend name, for log output.
    pub fn db_type(&self) -> &'static str {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            Database::Postgres(_) => "postgres",
        }
    }

    /// Insert a new license record.
    ///
    /// The insert runs in its own transaction: it is committed on success and
    /// rolled back when the transaction is dropped on any error path. An
    /// existing `license_key` is never overwritten.
    ///
    /// Returns:
    /// - `Ok(())` once committed
    /// - `Err(PersistenceError::DuplicateKey)` if the key is already stored
    /// - `Err(PersistenceError::Unavailable | Query)` on other DB failures
    pub async fn insert_license(&self, record: &LicenseRecord) -> LicenseResult<()> {
        let key = record.license_key.as_str();
        let max_devices = i64::from(record.max_devices);

        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                let mut tx = pool.begin().await.map_err(|e| {
                    error!("SQLite begin failed: {e}");
                    persistence_error("begin transaction", key, e)
                })?;

                query(
                    r#"
                    INSERT INTO customer_licenses (
                        license_key,
                        plan,
                        status,
                        max_devices,
                        created_at,
                        expires_at,
                        customer_email
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&record.license_key)
                .bind(&record.plan)
                .bind(record.status.as_str())
                .bind(max_devices)
                .bind(record.created_at)
                .bind(record.expires_at)
                .bind(&record.customer_email)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    error!("SQLite insert_license failed: {e}");
                    persistence_error("insert license", key, e)
                })?;

                tx.commit().await.map_err(|e| {
                    error!("SQLite commit failed: {e}");
                    persistence_error("commit", key, e)
                })?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                let mut tx = pool.begin().await.map_err(|e| {
                    error!("Postgres begin failed: {e}");
                    persistence_error("begin transaction", key, e)
                })?;

                query(
                    r#"
                    INSERT INTO customer_licenses (
                        license_key,
                        plan,
                        status,
                        max_devices,
                        created_at,
                        expires_at,
                        customer_email
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(&record.license_key)
                .bind(&record.plan)
                .bind(record.status.as_str())
                .bind(max_devices)
                .bind(record.created_at)
                .bind(record.expires_at)
                .bind(&record.customer_email)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    error!("Postgres insert_license failed: {e}");
                    persistence_error("insert license", key, e)
                })?;

                tx.commit().await.map_err(|e| {
                    error!("Postgres commit failed: {e}");
                    persistence_error("commit", key, e)
                })?;
            }
        }

        Ok(())
    }

    /// Fetch a license by its key.
    ///
    /// Returns:
    /// - `Ok(Some(LicenseRecord))` if found
    /// - `Ok(None)` if not found
    /// - `Err(PersistenceError)` on DB failure
    pub async fn get_license_by_key(&self, license_key: &str) -> LicenseResult<Option<LicenseRecord>> {
        let row = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, LicenseRow>(
                "SELECT license_key, plan, status, max_devices, created_at, expires_at, customer_email \
                 FROM customer_licenses WHERE license_key = ?",
            )
            .bind(license_key)
            .fetch_optional(pool)
            .await
            .map_err(|e| {
                error!("SQLite get_license_by_key failed: {e}");
                persistence_error("get license", license_key, e)
            })?,
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, LicenseRow>(
                "SELECT license_key, plan, status, max_devices, created_at, expires_at, customer_email \
                 FROM customer_licenses WHERE license_key = $1",
            )
            .bind(license_key)
            .fetch_optional(pool)
            .await
            .map_err(|e| {
                error!("Postgres get_license_by_key failed: {e}");
                persistence_error("get license", license_key, e)
            })?,
        };

        row.map(LicenseRecord::try_from).transpose()
    }

    /// Number of rows stored under `license_key` (0 or 1 while the unique
    /// constraint holds).
    pub async fn count_licenses_by_key(&self, license_key: &str) -> LicenseResult<i64> {
        let count = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM customer_licenses WHERE license_key = ?",
            )
            .bind(license_key)
            .fetch_one(pool)
            .await
            .map_err(|e| {
                error!("SQLite count_licenses_by_key failed: {e}");
                persistence_error("count licenses", license_key, e)
            })?,
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM customer_licenses WHERE license_key = $1",
            )
            .bind(license_key)
            .fetch_one(pool)
            .await
            .map_err(|e| {
                error!("Postgres count_licenses_by_key failed: {e}");
                persistence_error("count licenses", license_key, e)
            })?,
        };

        Ok(count)
    }

    /// Close every connection held by the store. Closing twice is a no-op.
    pub async fn close(&self) {
        if self.is_closed() {
            return;
        }
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => pool.close().await,
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => pool.close().await,
        }
        debug!(store = self.db_type(), "License store closed");
    }

    pub fn is_closed(&self) -> bool {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => pool.is_closed(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => pool.is_closed(),
        }
    }
}
