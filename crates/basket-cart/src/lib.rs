//! # basket-cart: Cart Orchestration for the Storefront Basket
//!
//! Owns every cart transaction: lazy creation, line mutations, login merge
//! and the totals recompute that ends each of them.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Basket Crate Graph                               │
//! │                                                                         │
//! │   web layer / basket-demo                                               │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  ┌───────────────────────────────────────────────────────────────┐     │
//! │  │                  basket-cart (THIS CRATE)                     │     │
//! │  │                                                               │     │
//! │  │  CartService ─► RetryPolicy ─► CartStore::run_in_transaction  │     │
//! │  │       │                              │                        │     │
//! │  │       ├─ CartMergeEngine             ├─ SqliteCartStore ──────┼──► basket-db
//! │  │       ├─ CartPricer ─► PriceLookup   └─ MemoryCartStore       │     │
//! │  │       └─ IdentityResolver                                     │     │
//! │  └───────────────────────────────────────────────────────────────┘     │
//! │          │                                                              │
//! │          ▼                                                              │
//! │   basket-core (Money, Cart, compute_totals, validation)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`service`] - The façade: get, mutate, login
//! - [`merge`] - Anonymous-to-account cart merge
//! - [`store`] - Transaction contract and its SQLite / in-memory adapters
//! - [`pricer`] - Price lookup + totals recompute inside a transaction
//! - [`lookup`] - Price collaborator trait
//! - [`identity`] - Request identity to owner key
//! - [`retry`] - Bounded exponential backoff
//! - [`config`] - Environment configuration
//! - [`error`] - Cart error taxonomy

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod identity;
pub mod lookup;
pub mod merge;
pub mod pricer;
pub mod retry;
pub mod service;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{CartConfig, ConfigError};
pub use error::{CartError, CartResult};
pub use identity::{IdentityResolver, RequestIdentity, SessionOrUserResolver, StrictResolver};
pub use lookup::{PriceLookup, StaticPriceTable};
pub use merge::{CartMergeEngine, MergeOutcome};
pub use pricer::{CartPricer, PricedCart};
pub use retry::RetryPolicy;
pub use service::CartService;
pub use store::{CartStore, CartTransaction, MemoryCartStore, SqliteCartStore};
