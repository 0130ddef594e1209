//! # Repository Module
//!
//! Database repository implementations for the basket.
//!
//! ## Two Access Styles
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CartRepository (transaction-scoped)                                   │
//! │  ├── find_by_owner(&mut tx, owner)                                     │
//! │  ├── items_for(&mut tx, cart_id)                                       │
//! │  ├── create_cart / upsert_item / reassign_owner / delete_cart          │
//! │  └── persist_totals(&mut tx, cart_id, expected_version, totals)        │
//! │       │                                                                 │
//! │       │  every cart-row write checks and bumps `version`               │
//! │       ▼                                                                 │
//! │  InventoryRepository (pool-scoped, read-mostly)                        │
//! │  ├── get_price(inventory_ref)                                          │
//! │  ├── upsert(item)                                                      │
//! │  └── count()                                                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`cart::CartRepository`] - Carts and cart lines
//! - [`inventory::InventoryRepository`] - Inventory prices

pub mod cart;
pub mod inventory;
