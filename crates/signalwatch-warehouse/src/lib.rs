//! # Signalwatch Warehouse
//!
//! DuckDB-based storage for the two pieces of durable state signalwatch owns:
//!
//! - the persisted instrument catalog (`catalog_cache`, one row per cache key)
//! - registered accounts and their verification state (`accounts`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use signalwatch_warehouse::{CatalogEntryRecord, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!
//!     warehouse.store_catalog_entry(&CatalogEntryRecord {
//!         cache_key: "crypto_symbols".to_string(),
//!         symbols: vec!["ETH".to_string(), "SOL".to_string()],
//!         fetched_at_unix: 1_700_000_000,
//!     })?;
//!
//!     let entry = warehouse.load_catalog_entry("crypto_symbols")?;
//!     println!("{entry:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Consistency
//!
//! Every write runs under a single writer lock inside a transaction. A catalog
//! entry is replaced by one upsert, so readers observe either the previous or
//! the new symbol list. Account confirmation is a conditional update keyed on
//! the pending token, which makes a second confirmation of the same token a
//! no-op rather than a lost update.
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `catalog_cache` | Symbol list and fetch time per cache key |
//! | `accounts` | Accounts with verification token and channel id |
//! | `schema_migrations` | Applied migration versions |

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use ::duckdb::{Connection, OptionalExt, ToSql};
use thiserror::Error;

pub use duckdb::{DuckDbConnectionManager, PooledConnection};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Stored JSON could not be encoded or decoded.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Insert rejected because a unique column already holds the value.
    #[error("{field} is already in use")]
    Conflict { field: UniqueField },
}

/// Account columns that must be unique across rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Phone,
    VerificationToken,
}

impl UniqueField {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::VerificationToken => "verification_token",
        }
    }
}

impl std::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for signalwatch data.
    pub signalwatch_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let signalwatch_home = resolve_signalwatch_home();
        let db_path = signalwatch_home.join("cache").join("warehouse.duckdb");
        Self {
            signalwatch_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// Persisted catalog snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntryRecord {
    pub cache_key: String,
    pub symbols: Vec<String>,
    /// Fetch completion time, seconds since the Unix epoch.
    pub fetched_at_unix: i64,
}

/// Row values for a freshly registered account.
#[derive(Debug, Clone)]
pub struct NewAccountRecord {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub verification_token: String,
}

/// A stored account row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub verification_token: Option<String>,
    pub external_channel_id: Option<String>,
}

const ACCOUNT_COLUMNS: &str =
    "id, name, email, phone, password_hash, verification_token, external_channel_id";

/// Main warehouse interface for catalog and account persistence.
pub struct Warehouse {
    config: Option<WarehouseConfig>,
    manager: DuckDbConnectionManager,
    write_lock: Mutex<()>,
}

impl Warehouse {
    /// Open the warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open the warehouse file described by `config`, creating parent
    /// directories and applying migrations.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self {
            config: Some(config),
            manager,
            write_lock: Mutex::new(()),
        };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Open a throwaway in-memory warehouse.
    pub fn open_in_memory() -> Result<Self, WarehouseError> {
        let warehouse = Self {
            config: None,
            manager: DuckDbConnectionManager::open_in_memory(2)?,
            write_lock: Mutex::new(()),
        };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Apply pending schema migrations.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let _guard = self.writer();
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Path to the database file, `None` when in memory.
    pub fn db_path(&self) -> Option<&Path> {
        self.manager.db_path()
    }

    /// Configuration the warehouse was opened with, `None` when in memory.
    pub fn config(&self) -> Option<&WarehouseConfig> {
        self.config.as_ref()
    }

    /// Load the catalog entry stored under `cache_key`.
    pub fn load_catalog_entry(
        &self,
        cache_key: &str,
    ) -> Result<Option<CatalogEntryRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let row: Option<(String, i64)> = connection
            .query_row(
                "SELECT symbols_json, fetched_at_unix FROM catalog_cache WHERE cache_key = ?",
                [cache_key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((symbols_json, fetched_at_unix)) = row else {
            return Ok(None);
        };

        Ok(Some(CatalogEntryRecord {
            cache_key: cache_key.to_string(),
            symbols: serde_json::from_str(&symbols_json)?,
            fetched_at_unix,
        }))
    }

    /// Replace the catalog entry for `record.cache_key` in a single upsert.
    pub fn store_catalog_entry(&self, record: &CatalogEntryRecord) -> Result<(), WarehouseError> {
        let symbols_json = serde_json::to_string(&record.symbols)?;

        let _guard = self.writer();
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 3] = [&record.cache_key, &symbols_json, &record.fetched_at_unix];
        connection.execute(
            "INSERT OR REPLACE INTO catalog_cache \
             (cache_key, symbols_json, fetched_at_unix, updated_at) \
             VALUES (?, ?, ?, CURRENT_TIMESTAMP)",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Whether an account already uses `email`.
    pub fn email_exists(&self, email: &str) -> Result<bool, WarehouseError> {
        let connection = self.manager.acquire()?;
        column_value_exists(&connection, UniqueField::Email, email)
    }

    /// Whether an account already uses `phone`.
    pub fn phone_exists(&self, phone: &str) -> Result<bool, WarehouseError> {
        let connection = self.manager.acquire()?;
        column_value_exists(&connection, UniqueField::Phone, phone)
    }

    /// Whether `token` is currently held by a pending account.
    pub fn pending_token_exists(&self, token: &str) -> Result<bool, WarehouseError> {
        let connection = self.manager.acquire()?;
        column_value_exists(&connection, UniqueField::VerificationToken, token)
    }

    /// Insert a new pending account.
    ///
    /// Uniqueness of email, phone and verification token is checked inside the
    /// same writer-locked transaction as the insert, so two concurrent inserts
    /// can never both claim one token.
    pub fn insert_account(&self, account: &NewAccountRecord) -> Result<AccountRecord, WarehouseError> {
        let _guard = self.writer();
        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<AccountRecord, WarehouseError> {
            for (field, value) in [
                (UniqueField::Email, account.email.as_str()),
                (UniqueField::Phone, account.phone.as_str()),
                (UniqueField::VerificationToken, account.verification_token.as_str()),
            ] {
                if column_value_exists(&connection, field, value)? {
                    return Err(WarehouseError::Conflict { field });
                }
            }

            let params: [&dyn ToSql; 5] = [
                &account.name,
                &account.email,
                &account.phone,
                &account.password_hash,
                &account.verification_token,
            ];
            let id: i64 = connection.query_row(
                "INSERT INTO accounts (name, email, phone, password_hash, verification_token) \
                 VALUES (?, ?, ?, ?, ?) RETURNING id",
                params.as_slice(),
                |row| row.get(0),
            )?;

            Ok(AccountRecord {
                id,
                name: account.name.clone(),
                email: account.email.clone(),
                phone: account.phone.clone(),
                password_hash: account.password_hash.clone(),
                verification_token: Some(account.verification_token.clone()),
                external_channel_id: None,
            })
        })();

        finalize_transaction(&connection, result)
    }

    /// Find an account by id.
    pub fn find_account(&self, id: i64) -> Result<Option<AccountRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?");
        let account = connection
            .query_row(sql.as_str(), [id], |row| {
                Ok(AccountRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    phone: row.get(3)?,
                    password_hash: row.get(4)?,
                    verification_token: row.get(5)?,
                    external_channel_id: row.get(6)?,
                })
            })
            .optional()?;
        Ok(account)
    }

    /// Attach `external_channel_id` to the pending account holding `token` and
    /// clear the token, as one conditional update.
    ///
    /// Returns the confirmed account id, or `None` when no pending account
    /// holds the token.
    pub fn confirm_account(
        &self,
        token: &str,
        external_channel_id: &str,
    ) -> Result<Option<i64>, WarehouseError> {
        let _guard = self.writer();
        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<Option<i64>, WarehouseError> {
            let params: [&dyn ToSql; 2] = [&external_channel_id, &token];
            let mut statement = connection.prepare(
                "UPDATE accounts \
                 SET external_channel_id = ?, verification_token = NULL \
                 WHERE verification_token = ? AND external_channel_id IS NULL \
                 RETURNING id",
            )?;
            let mut ids = statement.query_map(params.as_slice(), |row| row.get::<_, i64>(0))?;
            match ids.next() {
                Some(id) => Ok(Some(id?)),
                None => Ok(None),
            }
        })();

        finalize_transaction(&connection, result)
    }

    fn writer(&self) -> MutexGuard<'_, ()> {
        match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn column_value_exists(
    connection: &Connection,
    field: UniqueField,
    value: &str,
) -> Result<bool, WarehouseError> {
    // Column names come from the closed `UniqueField` set, never from input.
    let sql = format!(
        "SELECT COUNT(*) FROM accounts WHERE {column} = ?",
        column = field.as_str()
    );
    let count: i64 = connection.query_row(sql.as_str(), [value], |row| row.get(0))?;
    Ok(count > 0)
}

/// Commit the transaction on success, roll back on error.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

/// Resolve the signalwatch home directory from environment variables.
fn resolve_signalwatch_home() -> PathBuf {
    if let Some(path) = env::var_os("SIGNALWATCH_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".signalwatch");
    }

    PathBuf::from(".signalwatch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pending(email: &str, phone: &str, token: &str) -> NewAccountRecord {
        NewAccountRecord {
            name: "Test".to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            password_hash: "hash".to_string(),
            verification_token: token.to_string(),
        }
    }

    #[test]
    fn initializes_tables_on_disk() {
        let temp = tempdir().expect("tempdir");
        let signalwatch_home = temp.path().join("signalwatch-home");
        let db_path = signalwatch_home.join("cache").join("warehouse.duckdb");

        let warehouse = Warehouse::open(WarehouseConfig {
            signalwatch_home,
            db_path: db_path.clone(),
            max_pool_size: 2,
        })
        .expect("warehouse open");

        assert_eq!(warehouse.db_path(), Some(db_path.as_path()));
        assert!(warehouse.load_catalog_entry("missing").expect("load").is_none());
    }

    #[test]
    fn catalog_entry_upsert_replaces_previous_row() {
        let warehouse = Warehouse::open_in_memory().expect("warehouse");
        let first = CatalogEntryRecord {
            cache_key: "crypto_symbols".to_string(),
            symbols: vec!["ETH".to_string()],
            fetched_at_unix: 100,
        };
        let second = CatalogEntryRecord {
            symbols: vec!["ADA".to_string(), "SOL".to_string()],
            fetched_at_unix: 200,
            ..first.clone()
        };

        warehouse.store_catalog_entry(&first).expect("store first");
        warehouse.store_catalog_entry(&second).expect("store second");

        let loaded = warehouse
            .load_catalog_entry("crypto_symbols")
            .expect("load")
            .expect("entry present");
        assert_eq!(loaded, second);
    }

    #[test]
    fn insert_account_rejects_duplicate_unique_columns() {
        let warehouse = Warehouse::open_in_memory().expect("warehouse");
        let created = warehouse
            .insert_account(&pending("a@x.com", "+15551234567", "w11111111"))
            .expect("insert");
        assert!(created.id > 0);

        let error = warehouse
            .insert_account(&pending("a@x.com", "+15550000000", "w22222222"))
            .expect_err("duplicate email");
        assert!(matches!(
            error,
            WarehouseError::Conflict {
                field: UniqueField::Email
            }
        ));

        let error = warehouse
            .insert_account(&pending("b@x.com", "+15550000000", "w11111111"))
            .expect_err("duplicate token");
        assert!(matches!(
            error,
            WarehouseError::Conflict {
                field: UniqueField::VerificationToken
            }
        ));
    }

    #[test]
    fn confirm_account_is_single_use() {
        let warehouse = Warehouse::open_in_memory().expect("warehouse");
        let created = warehouse
            .insert_account(&pending("a@x.com", "+15551234567", "w12345678"))
            .expect("insert");

        let confirmed = warehouse
            .confirm_account("w12345678", "6058842416")
            .expect("confirm");
        assert_eq!(confirmed, Some(created.id));

        let again = warehouse
            .confirm_account("w12345678", "999")
            .expect("second confirm");
        assert_eq!(again, None);

        let stored = warehouse
            .find_account(created.id)
            .expect("find")
            .expect("account present");
        assert_eq!(stored.verification_token, None);
        assert_eq!(stored.external_channel_id.as_deref(), Some("6058842416"));
        assert!(!warehouse.pending_token_exists("w12345678").expect("check"));
    }
}
