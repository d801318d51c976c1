//! Local SQLite persistence with connection pooling and migrations
//!
//! This module is organized by collaborator:
//! - `receipts` - raw receipt records and the change feed (`ReceiptStore`)
//! - `identity` - users, alias profiles and the signed-in session
//!   (`IdentityProvider`)
//!
//! Records are stored as JSON text exactly as produced, so the normalizer
//! sees the same loosely shaped data a hosted backend would return.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tokio::sync::broadcast;
use tracing::info;

use crate::error::Result;
use crate::models::ChangeEvent;

mod identity;
mod receipts;

pub use identity::{email_alias, DEFAULT_ALIAS_DOMAIN, MIN_PASSWORD_LEN};
#[cfg(any(test, feature = "test-utils"))]
pub(crate) use receipts::merge_patch;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Buffered change events per subscriber before it starts lagging
const CHANGE_FEED_CAPACITY: usize = 256;

/// Database wrapper with connection pooling
///
/// Clones share the pool and the change feed.
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
    /// Domain appended to bare aliases at sign-up
    alias_domain: String,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Database {
    /// Open (or create) the database at `path` and run migrations
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });
        let pool = Pool::builder().max_size(10).build(manager)?;
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);

        let db = Self {
            pool,
            db_path: path.to_string(),
            alias_domain: DEFAULT_ALIAS_DOMAIN.to_string(),
            changes,
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Use `domain` for aliases given without one
    pub fn with_alias_domain(mut self, domain: impl Into<String>) -> Self {
        self.alias_domain = domain.into();
        self
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` so every pooled
    /// connection sees the same data.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "slip_test_{}_{}.db",
            std::process::id(),
            id
        ));

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path.to_string_lossy())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Publish a change; having no subscribers is not an error
    pub(crate) fn notify(&self, event: ChangeEvent) {
        let _ = self.changes.send(event);
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Accounts
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash TEXT NOT NULL,                  -- argon2 PHC string
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- One profile per user, carrying the receipt alias
            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                email_alias TEXT NOT NULL UNIQUE COLLATE NOCASE,
                full_name TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- The signed-in session (at most one row)
            CREATE TABLE IF NOT EXISTS session (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                signed_in_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Receipts as loosely shaped JSON records
            CREATE TABLE IF NOT EXISTS receipts (
                id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                record TEXT NOT NULL,                         -- JSON object
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (user_id, id)
            );

            CREATE INDEX IF NOT EXISTS idx_receipts_user_created ON receipts(user_id, created_at);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
