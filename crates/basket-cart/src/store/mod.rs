//! # Cart Store Contract
//!
//! Persistence abstraction the merge engine and service run against.
//!
//! ## Transaction Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  store.run_in_transaction(|tx| Box::pin(async move {                   │
//! │      let cart = tx.find_by_owner(&owner).await?;   ─┐                  │
//! │      tx.upsert_item(...).await?;                    │ one unit of work │
//! │      tx.persist_totals(...).await?;                ─┘                  │
//! │      Ok(cart)                                                          │
//! │  }))                                                                    │
//! │       │                                                                 │
//! │       ├── Ok  → commit                                                  │
//! │       └── Err → rollback (nothing observable)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The callback receives the transaction by `&mut` and returns a boxed
//! future borrowing it, so it may only capture owned data (clones, `Arc`s).
//!
//! ## Implementations
//! - [`SqliteCartStore`] - `basket-db` repositories, optimistic versions
//! - [`MemoryCartStore`] - single async mutex, fault injection for tests

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::warn;

use crate::error::CartResult;
use basket_core::{Cart, CartItem, FulfillmentType, OwnerKey, TotalsBreakdown};

pub mod memory;
pub mod sqlite;

pub use memory::{FailPoint, FaultKind, MemoryCartStore, MemoryTransaction};
pub use sqlite::{SqliteCartStore, SqliteCartTransaction};

/// Operations available inside one cart transaction.
///
/// Dropping a transaction without `commit` discards its writes.
#[async_trait]
pub trait CartTransaction: Send {
    /// The cart owned by `owner`, with its lines.
    async fn find_by_owner(&mut self, owner: &OwnerKey) -> CartResult<Option<Cart>>;

    /// Current lines of a cart as seen by this transaction.
    async fn items(&mut self, cart_id: &str) -> CartResult<Vec<CartItem>>;

    /// Creates an empty cart. Fails if `owner` already has one.
    async fn create_cart(&mut self, owner: &OwnerKey) -> CartResult<Cart>;

    /// Adds `quantity_delta` to a line, inserting it if missing and
    /// deleting it when the result drops to zero or below.
    async fn upsert_item(
        &mut self,
        cart_id: &str,
        inventory_ref: &str,
        fulfillment_type: FulfillmentType,
        quantity_delta: i64,
    ) -> CartResult<Option<CartItem>>;

    async fn reassign_owner(&mut self, cart_id: &str, new_owner: &OwnerKey) -> CartResult<()>;

    /// Deletes a cart and its lines.
    async fn delete_cart(&mut self, cart_id: &str) -> CartResult<()>;

    async fn persist_totals(&mut self, cart_id: &str, totals: &TotalsBreakdown) -> CartResult<()>;

    async fn commit(self) -> CartResult<()>;

    async fn rollback(self) -> CartResult<()>;
}

/// Source of cart transactions.
#[async_trait]
pub trait CartStore: Send + Sync + 'static {
    type Tx: CartTransaction;

    async fn begin(&self) -> CartResult<Self::Tx>;

    /// Runs `f` in a fresh transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err`.
    /// A failed commit is returned as the operation's error.
    async fn run_in_transaction<T, F>(&self, f: F) -> CartResult<T>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut Self::Tx) -> BoxFuture<'t, CartResult<T>> + Send + 'static,
    {
        let mut tx = self.begin().await?;

        match f(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}
