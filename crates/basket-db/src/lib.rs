//! # basket-db: Database Layer for the Storefront Basket
//!
//! SQLite persistence for carts, cart items and inventory prices, using sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Basket Data Flow                                 │
//! │                                                                         │
//! │  CartService / CartMergeEngine (basket-cart)                           │
//! │       │  begin() → Transaction                                         │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     basket-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ CartRepo (tx) │    │ 001_inventory│  │   │
//! │  │   │ SqlitePool    │◄───│ InventoryRepo │    │ 002_carts    │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Cart and inventory repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use basket_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("basket.db")).await?;
//!
//! let mut tx = db.begin().await?;
//! let cart = db.carts().find_by_owner(&mut tx, &owner).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, DbTransaction};

pub use repository::cart::CartRepository;
pub use repository::inventory::{InventoryItem, InventoryRepository};
