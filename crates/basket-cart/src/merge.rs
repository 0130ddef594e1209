//! # Cart Merge Engine
//!
//! Reconciles an anonymous cart into the shopper's account cart at login.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │                 ┌──────────────────────────────┐                        │
//! │                 │ Start: find anon + auth (tx) │                        │
//! │                 └──────────────┬───────────────┘                        │
//! │            ┌───────────────────┼─────────────────────┐                  │
//! │            ▼                   ▼                     ▼                  │
//! │     anon absent        anon, no auth           anon + auth              │
//! │   NoAnonymousCart    Promoted: reassign     Merged: sum overlapping     │
//! │     (no writes)       owner in place        lines, add the rest,        │
//! │                                             delete anon                 │
//! │                                 │                     │                 │
//! │                                 └──────────┬──────────┘                 │
//! │                                            ▼                            │
//! │                             recompute + persist totals                  │
//! │                                            ▼                            │
//! │                                         commit                          │
//! │                                                                         │
//! │   any error at any step ──► rollback, nothing observable                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Idempotence
//! The anonymous cart is deleted (or re-owned) in the same transaction as
//! the quantity updates, so a repeated login event finds no anonymous cart
//! and does nothing.
//!
//! The line limit is not applied here: a merge must conserve every unit.

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::error::{CartError, CartResult};
use crate::pricer::{CartPricer, PricedCart};
use crate::store::{CartStore, CartTransaction};
use basket_core::{OwnerKey, OwnerKind};

/// Result of one login merge.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum MergeOutcome {
    /// No anonymous cart: nothing to do.
    NoAnonymousCart,

    /// The anonymous cart now belongs to the user.
    Promoted { cart: PricedCart },

    /// The anonymous cart was folded into the user's cart and deleted.
    Merged {
        cart: PricedCart,
        /// Lines present on both sides whose quantities were summed.
        lines_merged: usize,
        /// Lines copied over from the anonymous cart.
        lines_added: usize,
    },
}

impl MergeOutcome {
    /// The user's cart after the merge, if one was touched.
    pub fn cart(&self) -> Option<&PricedCart> {
        match self {
            MergeOutcome::NoAnonymousCart => None,
            MergeOutcome::Promoted { cart } | MergeOutcome::Merged { cart, .. } => Some(cart),
        }
    }
}

/// Runs the login merge against a [`CartStore`].
#[derive(Debug)]
pub struct CartMergeEngine<S: CartStore> {
    store: Arc<S>,
    pricer: CartPricer,
}

impl<S: CartStore> Clone for CartMergeEngine<S> {
    fn clone(&self) -> Self {
        CartMergeEngine {
            store: Arc::clone(&self.store),
            pricer: self.pricer.clone(),
        }
    }
}

impl<S: CartStore> CartMergeEngine<S> {
    pub fn new(store: Arc<S>, pricer: CartPricer) -> Self {
        CartMergeEngine { store, pricer }
    }

    /// Merges `anonymous`'s cart into `authenticated`'s in one transaction.
    ///
    /// ## Returns
    /// * `Err(InvalidOwnerKey)` - keys are not one session and one user
    /// * `Err(Contention)` - lost a race; safe to call again
    /// * `Ok(outcome)` - committed
    pub async fn merge(
        &self,
        anonymous: &OwnerKey,
        authenticated: &OwnerKey,
    ) -> CartResult<MergeOutcome> {
        check_pair(anonymous, authenticated)?;

        let pricer = self.pricer.clone();
        let anonymous = anonymous.clone();
        let authenticated = authenticated.clone();

        let outcome = self
            .store
            .run_in_transaction(move |tx| {
                Box::pin(async move { merge_in(tx, &pricer, &anonymous, &authenticated).await })
            })
            .await?;

        log_outcome(&outcome);
        Ok(outcome)
    }
}

fn check_pair(anonymous: &OwnerKey, authenticated: &OwnerKey) -> CartResult<()> {
    match (anonymous.kind(), authenticated.kind()) {
        (OwnerKind::Session, OwnerKind::User) => Ok(()),
        _ => Err(CartError::invalid_owner(format!(
            "merge needs a session key and a user key, got {} and {}",
            anonymous, authenticated
        ))),
    }
}

/// The merge unit of work, inside an already open transaction.
pub async fn merge_in<Tx: CartTransaction>(
    tx: &mut Tx,
    pricer: &CartPricer,
    anonymous: &OwnerKey,
    authenticated: &OwnerKey,
) -> CartResult<MergeOutcome> {
    check_pair(anonymous, authenticated)?;

    let Some(anon) = tx.find_by_owner(anonymous).await? else {
        return Ok(MergeOutcome::NoAnonymousCart);
    };

    let Some(auth) = tx.find_by_owner(authenticated).await? else {
        tx.reassign_owner(&anon.id, authenticated).await?;
        let cart = pricer.refresh(tx, &anon.id, authenticated).await?;
        return Ok(MergeOutcome::Promoted { cart });
    };

    let mut lines_merged = 0;
    let mut lines_added = 0;

    for item in &anon.items {
        if auth.find_item(&item.inventory_ref, item.fulfillment_type).is_some() {
            lines_merged += 1;
        } else {
            lines_added += 1;
        }

        tx.upsert_item(
            &auth.id,
            &item.inventory_ref,
            item.fulfillment_type,
            i64::from(item.quantity),
        )
        .await?;
    }

    tx.delete_cart(&anon.id).await?;

    let cart = pricer.refresh(tx, &auth.id, authenticated).await?;

    Ok(MergeOutcome::Merged {
        cart,
        lines_merged,
        lines_added,
    })
}

fn log_outcome(outcome: &MergeOutcome) {
    match outcome {
        MergeOutcome::NoAnonymousCart => info!("Login merge: no anonymous cart"),
        MergeOutcome::Promoted { cart } => info!(
            cart_id = %cart.cart.id,
            lines = cart.cart.items.len(),
            units = cart.cart.unit_count(),
            "Login merge: anonymous cart promoted"
        ),
        MergeOutcome::Merged {
            cart,
            lines_merged,
            lines_added,
        } => info!(
            cart_id = %cart.cart.id,
            lines_merged,
            lines_added,
            units = cart.cart.unit_count(),
            "Login merge: anonymous cart merged"
        ),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::StaticPriceTable;
    use crate::store::{FailPoint, FaultKind, MemoryCartStore};
    use basket_core::{Cart, FulfillmentType, LineKey, Money, PriceSnapshot, PricingConfig};
    use std::collections::HashMap;

    const COLLECT: FulfillmentType = FulfillmentType::ForCollection;
    const DELIVER: FulfillmentType = FulfillmentType::ForDelivery;

    fn engine(store: &MemoryCartStore) -> CartMergeEngine<MemoryCartStore> {
        let prices = StaticPriceTable::new()
            .with_price("X", PriceSnapshot::new(Money::from_minor(600), None))
            .with_price("Y", PriceSnapshot::new(Money::from_minor(1200), None))
            .with_price("Z", PriceSnapshot::new(Money::from_minor(250), None));
        CartMergeEngine::new(
            Arc::new(store.clone()),
            CartPricer::new(Arc::new(prices), PricingConfig::default()),
        )
    }

    async fn seed(
        store: &MemoryCartStore,
        owner: &OwnerKey,
        lines: &[(&str, FulfillmentType, i64)],
    ) {
        let mut tx = store.begin().await.unwrap();
        let cart = tx.create_cart(owner).await.unwrap();
        for (inventory_ref, fulfillment, qty) in lines {
            tx.upsert_item(&cart.id, inventory_ref, *fulfillment, *qty)
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();
    }

    fn quantities(cart: &Cart) -> HashMap<LineKey, u32> {
        cart.items.iter().map(|i| (i.key(), i.quantity)).collect()
    }

    fn session() -> OwnerKey {
        OwnerKey::session("sess-1")
    }

    fn user() -> OwnerKey {
        OwnerKey::user("user-1")
    }

    #[tokio::test]
    async fn test_no_anonymous_cart_is_noop() {
        let store = MemoryCartStore::new();
        seed(&store, &user(), &[("X", COLLECT, 1)]).await;
        let before = store.snapshot().await;

        let outcome = engine(&store).merge(&session(), &user()).await.unwrap();

        assert!(matches!(outcome, MergeOutcome::NoAnonymousCart));
        let after = store.snapshot().await;
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].version, before[0].version);
    }

    #[tokio::test]
    async fn test_promotion() {
        let store = MemoryCartStore::new();
        seed(&store, &session(), &[("X", COLLECT, 2)]).await;
        let anon_id = store.snapshot().await[0].id.clone();

        let outcome = engine(&store).merge(&session(), &user()).await.unwrap();

        let MergeOutcome::Promoted { cart } = outcome else {
            panic!("expected promotion");
        };
        assert_eq!(cart.cart.id, anon_id);

        let carts = store.snapshot().await;
        assert_eq!(carts.len(), 1);
        assert_eq!(carts[0].owner, user());
        assert_eq!(carts[0].owner.session_id(), None);
        assert_eq!(carts[0].items.len(), 1);
        assert_eq!(carts[0].items[0].quantity, 2);
        assert_eq!(carts[0].totals.collection_total_with_vat, Money::from_minor(1200));
    }

    #[tokio::test]
    async fn test_merge_with_overlap() {
        let store = MemoryCartStore::new();
        seed(&store, &session(), &[("X", COLLECT, 2)]).await;
        seed(&store, &user(), &[("X", COLLECT, 1), ("Y", DELIVER, 1)]).await;

        let outcome = engine(&store).merge(&session(), &user()).await.unwrap();

        let MergeOutcome::Merged {
            cart,
            lines_merged,
            lines_added,
        } = outcome
        else {
            panic!("expected merge");
        };
        assert_eq!(lines_merged, 1);
        assert_eq!(lines_added, 0);

        let q = quantities(&cart.cart);
        assert_eq!(q[&LineKey::new("X", COLLECT)], 3);
        assert_eq!(q[&LineKey::new("Y", DELIVER)], 1);

        // 3 × 6.00 collection + 12.00 delivery + 5.00 charge + 1.00 charge VAT
        assert_eq!(cart.cart.totals.total_price_with_vat, Money::from_minor(3600));

        let carts = store.snapshot().await;
        assert_eq!(carts.len(), 1);
        assert_eq!(carts[0].owner, user());
    }

    #[tokio::test]
    async fn test_merge_conserves_quantities() {
        let anon_lines = [
            ("X", COLLECT, 2),
            ("Y", DELIVER, 4),
            ("Z", COLLECT, 1),
            ("X", DELIVER, 5),
        ];
        let auth_lines = [("X", COLLECT, 3), ("Z", DELIVER, 2), ("Y", DELIVER, 1)];

        let store = MemoryCartStore::new();
        seed(&store, &session(), &anon_lines).await;
        seed(&store, &user(), &auth_lines).await;

        let outcome = engine(&store).merge(&session(), &user()).await.unwrap();
        let q = quantities(&outcome.cart().unwrap().cart);

        let mut expected: HashMap<LineKey, u32> = HashMap::new();
        for (inventory_ref, fulfillment, qty) in anon_lines.iter().chain(auth_lines.iter()) {
            *expected
                .entry(LineKey::new(*inventory_ref, *fulfillment))
                .or_default() += *qty as u32;
        }
        assert_eq!(q, expected);
        assert_eq!(
            outcome.cart().unwrap().cart.unit_count(),
            expected.values().map(|&n| u64::from(n)).sum::<u64>()
        );

        let MergeOutcome::Merged {
            lines_merged,
            lines_added,
            ..
        } = outcome
        else {
            panic!("expected merge");
        };
        assert_eq!(lines_merged, 2);
        assert_eq!(lines_added, 2);
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let store = MemoryCartStore::new();
        seed(&store, &session(), &[("X", COLLECT, 2)]).await;
        seed(&store, &user(), &[("X", COLLECT, 1)]).await;
        let engine = engine(&store);

        engine.merge(&session(), &user()).await.unwrap();
        let after_first = store.snapshot().await;

        let second = engine.merge(&session(), &user()).await.unwrap();
        assert!(matches!(second, MergeOutcome::NoAnonymousCart));

        let after_second = store.snapshot().await;
        assert_eq!(after_second.len(), 1);
        assert_eq!(after_second[0].owner, user());
        assert_eq!(after_second[0].version, after_first[0].version);
        assert_eq!(after_second[0].items[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_failed_delete_rolls_back_everything() {
        let store = MemoryCartStore::new();
        seed(&store, &session(), &[("X", COLLECT, 2), ("Z", COLLECT, 1)]).await;
        seed(&store, &user(), &[("X", COLLECT, 1)]).await;
        let before = store.snapshot().await;

        store
            .inject_fault(FailPoint::DeleteCart, FaultKind::Persistence, 1)
            .await;
        let err = engine(&store).merge(&session(), &user()).await.unwrap_err();
        assert!(matches!(err, CartError::PersistenceFailure(_)));

        let after = store.snapshot().await;
        assert_eq!(after.len(), 2);
        for (b, a) in before.iter().zip(after.iter()) {
            assert_eq!(a.owner, b.owner);
            assert_eq!(quantities(a), quantities(b));
            assert_eq!(a.version, b.version);
        }
    }

    #[tokio::test]
    async fn test_failed_promotion_totals_rolls_back_owner() {
        let store = MemoryCartStore::new();
        seed(&store, &session(), &[("X", COLLECT, 2)]).await;

        store
            .inject_fault(FailPoint::PersistTotals, FaultKind::Persistence, 1)
            .await;
        assert!(engine(&store).merge(&session(), &user()).await.is_err());

        let carts = store.snapshot().await;
        assert_eq!(carts.len(), 1);
        assert_eq!(carts[0].owner, session());
    }

    #[tokio::test]
    async fn test_rejects_wrong_key_pair() {
        let store = MemoryCartStore::new();
        let engine = engine(&store);

        for (a, b) in [
            (session(), OwnerKey::session("sess-2")),
            (user(), OwnerKey::user("user-2")),
            (user(), session()),
        ] {
            assert!(matches!(
                engine.merge(&a, &b).await,
                Err(CartError::InvalidOwnerKey { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_merge_ignores_line_limit() {
        let store = MemoryCartStore::new();
        let anon: Vec<(String, FulfillmentType, i64)> = (0..basket_core::MAX_CART_LINES)
            .map(|i| (format!("A{i}"), COLLECT, 1))
            .collect();
        let anon_refs: Vec<(&str, FulfillmentType, i64)> =
            anon.iter().map(|(r, f, q)| (r.as_str(), *f, *q)).collect();
        seed(&store, &session(), &anon_refs).await;
        seed(&store, &user(), &[("X", COLLECT, 1)]).await;

        let outcome = engine(&store).merge(&session(), &user()).await.unwrap();
        let cart = &outcome.cart().unwrap();

        assert_eq!(cart.cart.items.len(), basket_core::MAX_CART_LINES + 1);
        assert_eq!(cart.warnings.len(), basket_core::MAX_CART_LINES);
    }
}
