//! # Database Migrations
//!
//! Embedded SQL migrations for the basket schema.
//!
//! ## Migration Files
//! ```text
//! migrations/sqlite/
//! ├── 001_inventory.sql   # inventory prices (read-only to carts)
//! └── 002_carts.sql       # carts, cart_items, owner uniqueness
//! ```
//!
//! Never modify an applied migration; add the next numbered file instead.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Migrations embedded at compile time from `migrations/sqlite`.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations.
///
/// Each migration runs in its own transaction and is recorded in
/// `_sqlx_migrations`, so calling this repeatedly is a no-op.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns `(total_migrations, applied_migrations)` for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;

    Ok((total, applied as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_all_migrations_applied() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let (total, applied) = migration_status(db.pool()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(applied, total);

        // Second run is a no-op
        run_migrations(db.pool()).await.unwrap();
        let (_, applied_again) = migration_status(db.pool()).await.unwrap();
        assert_eq!(applied_again, applied);
    }
}
