//! # Basket Database Handle
//!
//! Opens the SQLite file behind the basket and hands out transactions and
//! repositories.
//!
//! ## Connection Use
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig::new("basket.db").busy_timeout(..)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config) ─── WAL, foreign keys, migrations               │
//! │       │                                                                 │
//! │       ├── begin()     ──► DbTransaction (pins one pooled connection     │
//! │       │                   until commit / rollback / drop)               │
//! │       ├── carts()     ──► CartRepository (every call takes the tx)      │
//! │       └── inventory() ──► InventoryRepository (reads on any free        │
//! │                           connection, sees committed prices only)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking
//! SQLite allows one writer at a time. A writer that cannot get the lock
//! waits up to `busy_timeout` and then fails with SQLITE_BUSY, surfaced as
//! the transient [`DbError::Busy`]. In WAL mode a transaction whose read
//! snapshot went stale fails immediately with the same error.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::cart::CartRepository;
use crate::repository::inventory::InventoryRepository;

/// An open SQLite transaction borrowed from the pool.
///
/// Dropping it without calling `commit` rolls it back.
pub type DbTransaction = Transaction<'static, Sqlite>;

const IN_MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// How to open the basket database.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("./basket.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_millis(250));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,

    /// Pool size. Each open cart transaction holds one connection and its
    /// price lookups need another, so keep this above the expected number
    /// of concurrent cart operations.
    pub max_connections: u32,

    /// How long `begin()` and pooled reads wait for a free connection.
    pub acquire_timeout: Duration,

    /// How long a writer waits on the SQLite write lock.
    pub busy_timeout: Duration,

    /// Apply embedded migrations when opening.
    pub run_migrations: bool,
}

impl DbConfig {
    /// File-backed database; the file is created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 8,
            acquire_timeout: Duration::from_secs(10),
            busy_timeout: Duration::from_secs(1),
            run_migrations: true,
        }
    }

    /// Private in-memory database for tests.
    ///
    /// Limited to one connection (each `:memory:` connection would be a
    /// separate database). While a transaction is open, pool-level reads
    /// such as [`InventoryRepository`] lookups wait for it to finish.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            ..DbConfig::new(IN_MEMORY)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::new().in_memory(true)
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the basket database. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            max_connections = config.max_connections,
            "Opening basket database"
        );

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(config.connect_options())
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await?;
        info!("Basket schema up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Starts a transaction on a dedicated connection.
    ///
    /// Every cart repository call takes the returned handle; nothing is
    /// visible to other connections until `commit`.
    pub async fn begin(&self) -> DbResult<DbTransaction> {
        let tx = self.pool.begin().await?;
        debug!("Transaction started");
        Ok(tx)
    }

    pub fn carts(&self) -> CartRepository {
        CartRepository::new(self.pool.clone())
    }

    pub fn inventory(&self) -> InventoryRepository {
        InventoryRepository::new(self.pool.clone())
    }

    /// Waits for open connections to be returned, then closes them.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Basket database closed");
    }

    /// `true` if a trivial query succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        db.close().await;
        assert!(!db.health_check().await);
    }

    #[test]
    fn test_builder() {
        let config = DbConfig::new("/tmp/basket-test.db")
            .max_connections(16)
            .acquire_timeout(Duration::from_secs(2))
            .busy_timeout(Duration::from_millis(50))
            .run_migrations(false);

        assert_eq!(config.max_connections, 16);
        assert_eq!(config.acquire_timeout, Duration::from_secs(2));
        assert_eq!(config.busy_timeout, Duration::from_millis(50));
        assert!(!config.run_migrations);
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        {
            let mut tx = db.begin().await.unwrap();
            sqlx::query(
                "INSERT INTO inventory (inventory_ref, name, retail_price, created_at, updated_at)
                 VALUES ('SKU-1', 'Test', '1.00', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
            )
            .execute(&mut *tx)
            .await
            .unwrap();
        }

        assert_eq!(db.inventory().count().await.unwrap(), 0);
    }
}
