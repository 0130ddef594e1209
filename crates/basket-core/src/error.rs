//! # Error Types
//!
//! Domain-specific error types for basket-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  basket-core errors (this file)                                        │
//! │  ├── CoreError        - Owner key and domain rule violations           │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  basket-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  basket-cart errors (separate crate)                                   │
//! │  └── CartError        - What the storefront sees                       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CartError ← DbError               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pricing engine never returns an error: it is a total function over
//! well-typed input.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The caller's identity is neither a session nor a user, or is both.
    ///
    /// ## When This Occurs
    /// - Request carries no session id and no user id
    /// - Request carries both (identity resolver bug)
    /// - A merge is asked to run with two session keys or two user keys
    ///
    /// Rejected before any storage is touched.
    #[error("Invalid owner key: {reason}")]
    InvalidOwnerKey { reason: String },

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidOwnerKey error.
    pub fn invalid_owner(reason: impl Into<String>) -> Self {
        CoreError::InvalidOwnerKey {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before business logic runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., bad decimal, bad characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::invalid_owner("both session and user present");
        assert_eq!(
            err.to_string(),
            "Invalid owner key: both session and user present"
        );

        let err = CoreError::CartTooLarge { max: 100 };
        assert_eq!(err.to_string(), "Cart cannot have more than 100 lines");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "inventory_ref".to_string(),
        };
        assert_eq!(err.to_string(), "inventory_ref is required");

        let err = ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: 999,
        };
        assert_eq!(err.to_string(), "quantity must be between 1 and 999");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "user_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
