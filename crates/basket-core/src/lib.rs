//! # basket-core: Pure Business Logic for the Storefront Basket
//!
//! This crate holds the cart rules that must never drift: how a cart is
//! priced, who may own it, and what a valid line looks like. It has zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Basket Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Storefront (catalog, login, checkout UI)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ get_cart / on_authenticated            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          basket-cart (CartService, CartMergeEngine)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ basket-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │ validation│  │   │
//! │  │   │ OwnerKey  │  │   Money   │  │ compute_  │  │   rules   │  │   │
//! │  │   │ CartItem  │  │  VatRate  │  │  totals   │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  basket-db (Database Layer)                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (OwnerKey, Cart, CartItem, TotalsBreakdown)
//! - [`money`] - Decimal money and the VAT rate
//! - [`pricing`] - The one and only cart pricing formula
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use basket_core::money::{Money, VatRate};
//! use basket_core::pricing::{compute_totals, PricingConfig};
//! use basket_core::types::{FulfillmentType, PricedLine};
//!
//! let lines = [PricedLine::new(Money::from_minor(1200), 2, FulfillmentType::ForDelivery)];
//! let config = PricingConfig::new(VatRate::from_bps(2000), Money::from_minor(500));
//!
//! let totals = compute_totals(&lines, &config);
//! assert_eq!(totals.total_price_with_vat, Money::from_minor(3000));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use money::{Money, VatRate};
pub use pricing::{compute_totals, PricingConfig};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart.
///
/// Only checked when a mutation would create a new line; a login merge
/// may exceed it because it must conserve quantities.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line.
pub const MAX_ITEM_QUANTITY: u32 = 999;
