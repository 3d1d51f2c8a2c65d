//! Persistent credential record store.
//!
//! One SQLite table, `accounts`, holds the per-user saved accounts. The
//! IMAP host/port are resolved once when a record is created and stored
//! with it; records are never updated in place - edits are delete+re-add.
//!
//! # Example
//!
//! ```no_run
//! use otp_panel::store::{AccountStore, NewAccount};
//!
//! # async fn example() -> otp_panel::Result<()> {
//! let store = AccountStore::open("data/otp-panel.db").await?;
//!
//! let account = store
//!     .insert(NewAccount {
//!         user_id: 42,
//!         email: "user@firstmail.ltd".into(),
//!         mail_password: "mailpass".into(),
//!         username: "someuser".into(),
//!         service_password: "svcpass".into(),
//!         country: None,
//!         auth: None,
//!         imap_host: "imap.firstmail.ltd".into(),
//!         imap_port: 993,
//!     })
//!     .await?;
//!
//! println!("saved record #{}", account.id);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::debug;

/// A saved account record.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    /// Store-assigned unique id, stable once assigned.
    pub id: i64,
    /// The owning chat user.
    pub user_id: i64,
    /// Mailbox address.
    pub email: String,
    /// Mailbox password.
    pub mail_password: String,
    /// Third-party service username.
    pub username: String,
    /// Third-party service password.
    pub service_password: String,
    /// Optional country tag.
    pub country: Option<String>,
    /// Optional auxiliary auth secret. Stored and displayed, never used
    /// for IMAP authentication.
    pub auth: Option<String>,
    /// IMAP host resolved at creation time.
    pub imap_host: String,
    /// IMAP port resolved at creation time.
    pub imap_port: u16,
    /// Unix timestamp of record creation.
    pub created_at: i64,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("mail_password", &"[REDACTED]")
            .field("username", &self.username)
            .field("service_password", &"[REDACTED]")
            .field("imap_host", &self.imap_host)
            .field("imap_port", &self.imap_port)
            .finish_non_exhaustive()
    }
}

/// Fields for a record about to be inserted.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// The owning chat user.
    pub user_id: i64,
    /// Mailbox address.
    pub email: String,
    /// Mailbox password.
    pub mail_password: String,
    /// Third-party service username.
    pub username: String,
    /// Third-party service password.
    pub service_password: String,
    /// Optional country tag.
    pub country: Option<String>,
    /// Optional auxiliary auth secret.
    pub auth: Option<String>,
    /// IMAP host, resolved by the caller before insertion.
    pub imap_host: String,
    /// IMAP port, resolved by the caller before insertion.
    pub imap_port: u16,
}

/// SQLite-backed store of account records.
#[derive(Debug, Clone)]
pub struct AccountStore {
    pool: SqlitePool,
}

impl AccountStore {
    /// Opens (creating if needed) the store at the given path and runs
    /// the schema migration.
    ///
    /// The containing directory is created if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the
    /// database cannot be opened or migrated.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::Settings {
                    message: format!("cannot create data directory {}: {e}", parent.display()),
                })?;
            }
        }

        let url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|source| Error::Storage {
                context: "opening database",
                source,
            })?;

        let store = Self { pool };
        store.migrate().await?;

        debug!(path = %path.display(), "Account store ready");

        Ok(store)
    }

    /// Opens an in-memory store, for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn open_in_memory() -> Result<Self> {
        // One connection only: each sqlite in-memory connection is its own
        // database, so a wider pool would shear the schema apart.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|source| Error::Storage {
                context: "opening in-memory database",
                source,
            })?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    // Column names are fixed by existing deployed databases; the Rust
    // field names are the readable ones.
    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                email TEXT NOT NULL,
                passmail TEXT NOT NULL,
                username TEXT NOT NULL,
                tiktok_password TEXT NOT NULL,
                country TEXT,
                auth TEXT,
                imap_host TEXT NOT NULL,
                imap_port INTEGER NOT NULL DEFAULT 993,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|source| Error::Storage {
            context: "running migrations",
            source,
        })?;

        Ok(())
    }

    /// Inserts a record and returns it with its assigned id.
    pub async fn insert(&self, new: NewAccount) -> Result<Account> {
        let created_at = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO accounts
                (user_id, email, passmail, username, tiktok_password,
                 country, auth, imap_host, imap_port, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);
            "#,
        )
        .bind(new.user_id)
        .bind(&new.email)
        .bind(&new.mail_password)
        .bind(&new.username)
        .bind(&new.service_password)
        .bind(&new.country)
        .bind(&new.auth)
        .bind(&new.imap_host)
        .bind(i64::from(new.imap_port))
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|source| Error::Storage {
            context: "inserting account",
            source,
        })?;

        Ok(Account {
            id: result.last_insert_rowid(),
            user_id: new.user_id,
            email: new.email,
            mail_password: new.mail_password,
            username: new.username,
            service_password: new.service_password,
            country: new.country,
            auth: new.auth,
            imap_host: new.imap_host,
            imap_port: new.imap_port,
            created_at,
        })
    }

    /// Loads one record by id. Returns `None` if the id is unknown.
    pub async fn get(&self, id: i64) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, email, passmail, username, tiktok_password,
                   country, auth, imap_host, imap_port, created_at
            FROM accounts
            WHERE id = ?1;
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|source| Error::Storage {
            context: "loading account",
            source,
        })?;

        Ok(row.map(|row| account_from_row(&row)))
    }

    /// Lists all records owned by a user, oldest first (insertion order).
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, email, passmail, username, tiktok_password,
                   country, auth, imap_host, imap_port, created_at
            FROM accounts
            WHERE user_id = ?1
            ORDER BY id ASC;
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|source| Error::Storage {
            context: "listing accounts",
            source,
        })?;

        Ok(rows.iter().map(account_from_row).collect())
    }

    /// Counts the records owned by a user.
    pub async fn count_for_user(&self, user_id: i64) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) FROM accounts WHERE user_id = ?1;")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|source| Error::Storage {
                context: "counting accounts",
                source,
            })?;

        Ok(row.get::<i64, _>(0) as u64)
    }

    /// Deletes one record by id. Returns `true` if a row was removed.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?1;")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|source| Error::Storage {
                context: "deleting account",
                source,
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes every record owned by a user. Returns the number removed.
    ///
    /// Other users' records are untouched.
    pub async fn delete_all_for(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM accounts WHERE user_id = ?1;")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|source| Error::Storage {
                context: "deleting user accounts",
                source,
            })?;

        Ok(result.rows_affected())
    }
}

fn account_from_row(row: &sqlx::sqlite::SqliteRow) -> Account {
    Account {
        id: row.get(0),
        user_id: row.get(1),
        email: row.get(2),
        mail_password: row.get(3),
        username: row.get(4),
        service_password: row.get(5),
        country: row.get(6),
        auth: row.get(7),
        imap_host: row.get(8),
        imap_port: row.get::<i64, _>(9) as u16,
        created_at: row.get(10),
    }
}
