//! # Validation Module
//!
//! Input validation for cart operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Storefront                                                   │
//! │  └── Form checks, immediate user feedback                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: CartService (Rust)                                           │
//! │  └── THIS MODULE: quantity, inventory ref, owner id rules              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity > 0), CHECK exactly one owner column              │
//! │  └── UNIQUE (cart_id, inventory_ref, fulfillment_type)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use basket_core::validation::{validate_inventory_ref, validate_quantity};
//!
//! assert!(validate_inventory_ref("SKU-1001").is_ok());
//! assert!(validate_quantity(5).is_ok());
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::{MAX_CART_LINES, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_INVENTORY_REF_LEN: usize = 64;
const MAX_OWNER_ID_LEN: usize = 128;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an inventory reference.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// Surrounding whitespace is ignored; the trimmed reference is returned and
/// is the form that must be stored and looked up.
pub fn validate_inventory_ref(inventory_ref: &str) -> ValidationResult<&str> {
    let inventory_ref = inventory_ref.trim();

    if inventory_ref.is_empty() {
        return Err(ValidationError::Required {
            field: "inventory_ref".to_string(),
        });
    }

    if inventory_ref.len() > MAX_INVENTORY_REF_LEN {
        return Err(ValidationError::TooLong {
            field: "inventory_ref".to_string(),
            max: MAX_INVENTORY_REF_LEN,
        });
    }

    if !inventory_ref
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "inventory_ref".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(inventory_ref)
}

/// Validates a session or user identifier.
pub fn validate_owner_id(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_OWNER_ID_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_OWNER_ID_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity (1..=999).
pub fn validate_quantity(quantity: u32) -> ValidationResult<()> {
    if quantity == 0 || quantity > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: i64::from(MAX_ITEM_QUANTITY),
        });
    }

    Ok(())
}

/// Checks that adding a new line keeps the cart within [`MAX_CART_LINES`].
pub fn ensure_line_capacity(current_lines: usize) -> CoreResult<()> {
    if current_lines >= MAX_CART_LINES {
        return Err(CoreError::CartTooLarge {
            max: MAX_CART_LINES,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
