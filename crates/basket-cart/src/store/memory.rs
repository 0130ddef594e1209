//! # In-Memory Cart Store
//!
//! A [`CartStore`] held entirely in process memory.
//!
//! ## Isolation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  begin()  ──► lock Arc<Mutex<Shared>> (held for the whole transaction) │
//! │               working = shared.carts.clone()                           │
//! │                                                                         │
//! │  tx ops   ──► read/write `working` only                                │
//! │                                                                         │
//! │  commit() ──► shared.carts = working, unlock                           │
//! │  rollback / drop ──► working discarded, unlock                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transactions are fully serialized, so they never conflict with each other.
//! Contention and hard failures can be injected per operation with
//! [`MemoryCartStore::inject_fault`].

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::{CartStore, CartTransaction};
use crate::error::{CartError, CartResult};
use basket_core::{Cart, CartItem, FulfillmentType, OwnerKey, TotalsBreakdown};

// =============================================================================
// Fault Injection
// =============================================================================

/// Store operation a fault can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    CreateCart,
    UpsertItem,
    ReassignOwner,
    DeleteCart,
    PersistTotals,
    Commit,
}

/// What an injected fault looks like to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// [`CartError::Contention`], retried by the service.
    Contention,
    /// [`CartError::PersistenceFailure`], fatal.
    Persistence,
}

#[derive(Debug, Clone)]
struct Fault {
    point: FailPoint,
    kind: FaultKind,
    remaining: u32,
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Default)]
struct Shared {
    carts: HashMap<String, Cart>,
    /// Lives outside the working copy so a consumed fault stays consumed
    /// even when the transaction rolls back.
    faults: Vec<Fault>,
}

/// In-memory [`CartStore`].
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryCartStore {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `times` calls of `point` fail with `kind`.
    pub async fn inject_fault(&self, point: FailPoint, kind: FaultKind, times: u32) {
        self.shared.lock().await.faults.push(Fault {
            point,
            kind,
            remaining: times,
        });
    }

    /// Committed carts, for assertions.
    pub async fn snapshot(&self) -> Vec<Cart> {
        let shared = self.shared.lock().await;
        let mut carts: Vec<Cart> = shared.carts.values().cloned().collect();
        carts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        carts
    }

    pub async fn cart_count(&self) -> usize {
        self.shared.lock().await.carts.len()
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> CartResult<MemoryTransaction> {
        let guard = Arc::clone(&self.shared).lock_owned().await;
        let working = guard.carts.clone();

        Ok(MemoryTransaction { guard, working })
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// An open [`MemoryCartStore`] transaction; holds the store lock.
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<Shared>,
    working: HashMap<String, Cart>,
}

impl MemoryTransaction {
    fn trip(&mut self, point: FailPoint) -> CartResult<()> {
        let Some(fault) = self
            .guard
            .faults
            .iter_mut()
            .find(|f| f.point == point && f.remaining > 0)
        else {
            return Ok(());
        };

        fault.remaining -= 1;
        debug!(?point, kind = ?fault.kind, "Injected fault");

        Err(match fault.kind {
            FaultKind::Contention => CartError::Contention(format!("injected at {:?}", point)),
            FaultKind::Persistence => {
                CartError::PersistenceFailure(format!("injected at {:?}", point))
            }
        })
    }

    fn cart_mut(&mut self, cart_id: &str) -> CartResult<&mut Cart> {
        self.working
            .get_mut(cart_id)
            .ok_or_else(|| CartError::not_found(cart_id))
    }

    fn touch(cart: &mut Cart) {
        cart.version += 1;
        cart.updated_at = Utc::now();
    }
}

#[async_trait]
impl CartTransaction for MemoryTransaction {
    async fn find_by_owner(&mut self, owner: &OwnerKey) -> CartResult<Option<Cart>> {
        Ok(self.working.values().find(|c| &c.owner == owner).cloned())
    }

    async fn items(&mut self, cart_id: &str) -> CartResult<Vec<CartItem>> {
        self.working
            .get(cart_id)
            .map(|c| c.items.clone())
            .ok_or_else(|| CartError::not_found(cart_id))
    }

    async fn create_cart(&mut self, owner: &OwnerKey) -> CartResult<Cart> {
        self.trip(FailPoint::CreateCart)?;

        if self.working.values().any(|c| &c.owner == owner) {
            return Err(CartError::Contention(format!("{} already has a cart", owner)));
        }

        let now = Utc::now();
        let cart = Cart {
            id: Uuid::new_v4().to_string(),
            owner: owner.clone(),
            items: Vec::new(),
            totals: TotalsBreakdown::zero(),
            version: 0,
            created_at: now,
            updated_at: now,
        };

        self.working.insert(cart.id.clone(), cart.clone());
        Ok(cart)
    }

    async fn upsert_item(
        &mut self,
        cart_id: &str,
        inventory_ref: &str,
        fulfillment_type: FulfillmentType,
        quantity_delta: i64,
    ) -> CartResult<Option<CartItem>> {
        self.trip(FailPoint::UpsertItem)?;
        let cart = self.cart_mut(cart_id)?;

        let position = cart
            .items
            .iter()
            .position(|i| i.matches(inventory_ref, fulfillment_type));

        match position {
            Some(index) => {
                let quantity = i64::from(cart.items[index].quantity) + quantity_delta;
                if quantity <= 0 {
                    cart.items.remove(index);
                    return Ok(None);
                }

                let quantity = u32::try_from(quantity).map_err(|_| {
                    CartError::PersistenceFailure(format!("quantity {} out of range", quantity))
                })?;
                cart.items[index].quantity = quantity;
                Ok(Some(cart.items[index].clone()))
            }

            None if quantity_delta <= 0 => Ok(None),

            None => {
                let quantity = u32::try_from(quantity_delta).map_err(|_| {
                    CartError::PersistenceFailure(format!(
                        "quantity {} out of range",
                        quantity_delta
                    ))
                })?;
                let item = CartItem {
                    id: Uuid::new_v4().to_string(),
                    cart_id: cart_id.to_string(),
                    inventory_ref: inventory_ref.to_string(),
                    fulfillment_type,
                    quantity,
                    created_at: Utc::now(),
                };
                cart.items.push(item.clone());
                Ok(Some(item))
            }
        }
    }

    async fn reassign_owner(&mut self, cart_id: &str, new_owner: &OwnerKey) -> CartResult<()> {
        self.trip(FailPoint::ReassignOwner)?;

        if self
            .working
            .values()
            .any(|c| &c.owner == new_owner && c.id != cart_id)
        {
            return Err(CartError::Contention(format!(
                "{} already has a cart",
                new_owner
            )));
        }

        let cart = self.cart_mut(cart_id)?;
        cart.owner = new_owner.clone();
        Self::touch(cart);
        Ok(())
    }

    async fn delete_cart(&mut self, cart_id: &str) -> CartResult<()> {
        self.trip(FailPoint::DeleteCart)?;

        self.working
            .remove(cart_id)
            .map(|_| ())
            .ok_or_else(|| CartError::not_found(cart_id))
    }

    async fn persist_totals(&mut self, cart_id: &str, totals: &TotalsBreakdown) -> CartResult<()> {
        self.trip(FailPoint::PersistTotals)?;

        let cart = self.cart_mut(cart_id)?;
        cart.totals = *totals;
        Self::touch(cart);
        Ok(())
    }

    async fn commit(mut self) -> CartResult<()> {
        self.trip(FailPoint::Commit)?;

        let MemoryTransaction { mut guard, working } = self;
        guard.carts = working;
        Ok(())
    }

    async fn rollback(self) -> CartResult<()> {
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_publishes_working_copy() {
        let store = MemoryCartStore::new();

        let mut tx = store.begin().await.unwrap();
        let cart = tx.create_cart(&OwnerKey::session("s")).await.unwrap();
        tx.upsert_item(&cart.id, "SKU-1", FulfillmentType::ForDelivery, 2)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let carts = store.snapshot().await;
        assert_eq!(carts.len(), 1);
        assert_eq!(carts[0].items[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_drop_discards_writes() {
        let store = MemoryCartStore::new();

        {
            let mut tx = store.begin().await.unwrap();
            tx.create_cart(&OwnerKey::session("s")).await.unwrap();
        }

        assert_eq!(store.cart_count().await, 0);
    }

    #[tokio::test]
    async fn test_run_in_transaction_rolls_back_on_error() {
        let store = MemoryCartStore::new();
        let owner = OwnerKey::session("s");

        let result: CartResult<()> = store
            .run_in_transaction(move |tx| {
                Box::pin(async move {
                    tx.create_cart(&owner).await?;
                    Err(CartError::PersistenceFailure("boom".into()))
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.cart_count().await, 0);
    }

    #[tokio::test]
    async fn test_fault_fires_once_then_clears() {
        let store = MemoryCartStore::new();
        store
            .inject_fault(FailPoint::CreateCart, FaultKind::Contention, 1)
            .await;

        let mut tx = store.begin().await.unwrap();
        let err = tx.create_cart(&OwnerKey::user("u")).await.unwrap_err();
        assert!(err.is_transient());
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.create_cart(&OwnerKey::user("u")).await.is_ok());
    }

    #[tokio::test]
    async fn test_upsert_to_zero_removes_line() {
        let store = MemoryCartStore::new();
        let mut tx = store.begin().await.unwrap();
        let cart = tx.create_cart(&OwnerKey::session("s")).await.unwrap();

        tx.upsert_item(&cart.id, "SKU-1", FulfillmentType::ForCollection, 3)
            .await
            .unwrap();
        let gone = tx
            .upsert_item(&cart.id, "SKU-1", FulfillmentType::ForCollection, -3)
            .await
            .unwrap();

        assert!(gone.is_none());
        assert!(tx.items(&cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_cart_per_owner() {
        let store = MemoryCartStore::new();
        let mut tx = store.begin().await.unwrap();
        let owner = OwnerKey::user("u");

        tx.create_cart(&owner).await.unwrap();
        assert!(tx.create_cart(&owner).await.is_err());

        let other = tx.create_cart(&OwnerKey::session("s")).await.unwrap();
        assert!(tx.reassign_owner(&other.id, &owner).await.is_err());
    }
}
