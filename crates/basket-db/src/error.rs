//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ├── transient (Busy, Conflict, PoolExhausted) → retried          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CartError (basket-cart) ← "cart temporarily unavailable"             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::error::ErrorKind;
use thiserror::Error;

/// SQLite primary result code for SQLITE_BUSY.
const SQLITE_BUSY: &str = "5";
/// SQLite primary result code for SQLITE_LOCKED.
const SQLITE_LOCKED: &str = "6";
/// SQLITE_BUSY_SNAPSHOT: a WAL read snapshot went stale before upgrading to write.
const SQLITE_BUSY_SNAPSHOT: &str = "517";

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Second cart for the same session or user
    /// - Duplicate (cart, inventory_ref, fulfillment_type) line
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (owner exclusivity, positive quantity).
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// Optimistic version check failed.
    ///
    /// ## When This Occurs
    /// Another transaction wrote the same cart row after it was read.
    #[error("Cart {cart_id} was modified concurrently (expected version {expected})")]
    Conflict { cart_id: String, expected: i64 },

    /// SQLite could not take the lock it needed.
    #[error("Database busy: {0}")]
    Busy(String),

    /// A stored value could not be turned back into a domain type.
    #[error("Corrupt row in {table}: {reason}")]
    Decode { table: String, reason: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Conflict error for a stale cart version.
    pub fn conflict(cart_id: impl Into<String>, expected: i64) -> Self {
        DbError::Conflict {
            cart_id: cart_id.into(),
            expected,
        }
    }

    /// Creates a Decode error.
    pub fn decode(table: impl Into<String>, reason: impl Into<String>) -> Self {
        DbError::Decode {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the whole transaction from scratch may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::Conflict { .. } | DbError::Busy(_) | DbError::PoolExhausted
        )
    }
}

/// Maps sqlx errors onto the basket's categories.
///
/// ```text
/// SQLITE_BUSY / _LOCKED / _BUSY_SNAPSHOT  → Busy          (transient)
/// PoolTimedOut                            → PoolExhausted (transient)
/// UNIQUE / FOREIGN KEY / CHECK            → *Violation
/// RowNotFound                             → NotFound
/// anything else                           → QueryFailed / Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => classify(db_err.as_ref()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),
            sqlx::Error::RowNotFound => DbError::not_found("Row", "unknown"),
            other => DbError::Internal(other.to_string()),
        }
    }
}

fn classify(db_err: &dyn sqlx::error::DatabaseError) -> DbError {
    let message = db_err.message().to_string();

    let busy = matches!(
        db_err.code().as_deref(),
        Some(SQLITE_BUSY | SQLITE_LOCKED | SQLITE_BUSY_SNAPSHOT)
    );
    if busy || message.contains("database is locked") {
        return DbError::Busy(message);
    }

    match db_err.kind() {
        ErrorKind::UniqueViolation => DbError::UniqueViolation {
            // "UNIQUE constraint failed: carts.user_id"
            field: message
                .rsplit(": ")
                .next()
                .unwrap_or("unknown")
                .to_string(),
            value: "unknown".to_string(),
        },
        ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message },
        ErrorKind::CheckViolation => DbError::CheckViolation { message },
        _ => DbError::QueryFailed(message),
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DbError::conflict("c1", 3).is_transient());
        assert!(DbError::Busy("database is locked".into()).is_transient());
        assert!(DbError::PoolExhausted.is_transient());

        assert!(!DbError::not_found("Cart", "c1").is_transient());
        assert!(!DbError::QueryFailed("syntax".into()).is_transient());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[test]
    fn test_conflict_message() {
        assert_eq!(
            DbError::conflict("c1", 4).to_string(),
            "Cart c1 was modified concurrently (expected version 4)"
        );
    }
}
