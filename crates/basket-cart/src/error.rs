//! # Cart Errors
//!
//! Error taxonomy for cart operations.
//!
//! ## Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Rejected before storage     InvalidOwnerKey, Validation, CartTooLarge │
//! │  Retried by the service      Contention                                │
//! │  Retries exhausted           ConcurrencyConflict { attempts }          │
//! │  Fatal for the operation     PersistenceFailure, PriceLookupFailed,    │
//! │                              CartNotFound                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Whatever the variant, the transaction that produced it was rolled back.
//! Callers should present every error as "cart temporarily unavailable".

use thiserror::Error;

use basket_core::{CoreError, ValidationError};
use basket_db::DbError;

/// Cart operation errors.
#[derive(Debug, Error)]
pub enum CartError {
    /// Neither or both of session id / user id, or the wrong pair for a merge.
    #[error("Invalid owner key: {reason}")]
    InvalidOwnerKey { reason: String },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A new line would exceed the per-cart line limit.
    #[error("Cart cannot hold more than {max} lines")]
    CartTooLarge { max: usize },

    #[error("Cart not found: {cart}")]
    CartNotFound { cart: String },

    /// The price collaborator failed (not merely "unknown reference").
    #[error("Price lookup failed for {inventory_ref}: {reason}")]
    PriceLookupFailed {
        inventory_ref: String,
        reason: String,
    },

    /// One attempt lost a race: stale version or lock contention.
    #[error("Concurrent modification: {0}")]
    Contention(String),

    /// Every retry attempt lost a race.
    #[error("Cart temporarily unavailable after {attempts} attempts")]
    ConcurrencyConflict { attempts: u32 },

    /// Store unreachable or write rejected.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl CartError {
    pub fn invalid_owner(reason: impl Into<String>) -> Self {
        CartError::InvalidOwnerKey {
            reason: reason.into(),
        }
    }

    pub fn not_found(cart: impl Into<String>) -> Self {
        CartError::CartNotFound { cart: cart.into() }
    }

    /// Whether the whole transaction should be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, CartError::Contention(_))
    }
}

impl From<DbError> for CartError {
    fn from(err: DbError) -> Self {
        match err {
            e if e.is_transient() => CartError::Contention(e.to_string()),
            DbError::NotFound { entity, id } if entity == "Cart" => {
                CartError::CartNotFound { cart: id }
            }
            e => CartError::PersistenceFailure(e.to_string()),
        }
    }
}

impl From<CoreError> for CartError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidOwnerKey { reason } => CartError::InvalidOwnerKey { reason },
            CoreError::CartTooLarge { max } => CartError::CartTooLarge { max },
            CoreError::Validation(v) => CartError::Validation(v),
        }
    }
}

/// Result type for cart operations.
pub type CartResult<T> = Result<T, CartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_errors_map_by_transience() {
        let err: CartError = DbError::conflict("c1", 2).into();
        assert!(matches!(err, CartError::Contention(_)));
        assert!(err.is_transient());

        let err: CartError = DbError::Busy("database is locked".into()).into();
        assert!(err.is_transient());

        let err: CartError = DbError::QueryFailed("disk I/O error".into()).into();
        assert!(matches!(err, CartError::PersistenceFailure(_)));
        assert!(!err.is_transient());

        let err: CartError = DbError::not_found("Cart", "c9").into();
        assert!(matches!(err, CartError::CartNotFound { cart } if cart == "c9"));
    }

    #[test]
    fn test_core_errors_map() {
        let err: CartError = CoreError::invalid_owner("neither").into();
        assert!(matches!(err, CartError::InvalidOwnerKey { .. }));

        let err: CartError = CoreError::CartTooLarge { max: 100 }.into();
        assert!(matches!(err, CartError::CartTooLarge { max: 100 }));
    }

    #[test]
    fn test_exhausted_is_not_retried_again() {
        assert!(!CartError::ConcurrencyConflict { attempts: 4 }.is_transient());
    }
}
