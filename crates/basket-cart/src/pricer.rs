//! # Cart Pricer
//!
//! Bridges stored cart lines, the price collaborator and the pure pricing
//! engine, then writes the result back in the same transaction.
//!
//! ## Refresh Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tx.items(cart_id)                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PriceLookup::price_of(ref) per line                                   │
//! │       ├── Some(price) → PricedLine(unit_price_with_vat, qty, kind)     │
//! │       ├── None        → PricedLine(0, qty, kind) + DataIntegrityWarning│
//! │       └── Err         → abort (transaction rolls back)                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  compute_totals(lines, config)                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tx.persist_totals(cart_id, totals) → reload cart                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use ts_rs::TS;

use crate::error::{CartError, CartResult};
use crate::lookup::PriceLookup;
use crate::store::CartTransaction;
use basket_core::{
    compute_totals, Cart, CartItem, DataIntegrityWarning, Money, OwnerKey, PricedLine,
    PricingConfig, TotalsBreakdown,
};

/// A cart with freshly computed totals and any pricing anomalies.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PricedCart {
    pub cart: Cart,
    /// Lines that could not be priced and contributed zero.
    pub warnings: Vec<DataIntegrityWarning>,
}

impl PricedCart {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Prices carts using the injected lookup and store-wide pricing config.
#[derive(Clone)]
pub struct CartPricer {
    lookup: Arc<dyn PriceLookup>,
    config: PricingConfig,
}

impl std::fmt::Debug for CartPricer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartPricer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CartPricer {
    pub fn new(lookup: Arc<dyn PriceLookup>, config: PricingConfig) -> Self {
        CartPricer { lookup, config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Computes totals for `items` without touching storage.
    pub async fn price(
        &self,
        items: &[CartItem],
    ) -> CartResult<(TotalsBreakdown, Vec<DataIntegrityWarning>)> {
        let mut lines = Vec::with_capacity(items.len());
        let mut warnings = Vec::new();

        for item in items {
            let unit_price = match self.lookup.price_of(&item.inventory_ref).await? {
                Some(price) => price.unit_price_with_vat(),
                None => {
                    let warning = DataIntegrityWarning {
                        cart_item_id: item.id.clone(),
                        inventory_ref: item.inventory_ref.clone(),
                        reason: "inventory reference has no price".to_string(),
                    };
                    warn!(
                        cart_id = %item.cart_id,
                        cart_item_id = %item.id,
                        inventory_ref = %item.inventory_ref,
                        "Unpriced cart line counted as zero"
                    );
                    warnings.push(warning);
                    Money::zero()
                }
            };

            lines.push(PricedLine::new(unit_price, item.quantity, item.fulfillment_type));
        }

        Ok((compute_totals(&lines, &self.config), warnings))
    }

    /// Recomputes and stores the totals of `cart_id`, returning the cart as
    /// `owner` now sees it.
    pub async fn refresh<Tx: CartTransaction>(
        &self,
        tx: &mut Tx,
        cart_id: &str,
        owner: &OwnerKey,
    ) -> CartResult<PricedCart> {
        let items = tx.items(cart_id).await?;
        let (totals, warnings) = self.price(&items).await?;

        tx.persist_totals(cart_id, &totals).await?;

        let cart = tx
            .find_by_owner(owner)
            .await?
            .filter(|c| c.id == cart_id)
            .ok_or_else(|| CartError::not_found(cart_id))?;

        Ok(PricedCart { cart, warnings })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::StaticPriceTable;
    use crate::store::{CartStore, MemoryCartStore};
    use async_trait::async_trait;
    use basket_core::{FulfillmentType, PriceSnapshot, VatRate};

    struct BrokenLookup;

    #[async_trait]
    impl PriceLookup for BrokenLookup {
        async fn price_of(&self, inventory_ref: &str) -> CartResult<Option<PriceSnapshot>> {
            Err(CartError::PriceLookupFailed {
                inventory_ref: inventory_ref.to_string(),
                reason: "timeout".to_string(),
            })
        }
    }

    fn config() -> PricingConfig {
        PricingConfig::new(VatRate::from_bps(2000), Money::from_minor(500))
    }

    #[tokio::test]
    async fn test_refresh_persists_totals() {
        let prices = StaticPriceTable::new()
            .with_price("SKU-1", PriceSnapshot::new(Money::from_minor(1200), None));
        let pricer = CartPricer::new(Arc::new(prices), config());
        let store = MemoryCartStore::new();
        let owner = OwnerKey::session("s");

        let mut tx = store.begin().await.unwrap();
        let cart = tx.create_cart(&owner).await.unwrap();
        tx.upsert_item(&cart.id, "SKU-1", FulfillmentType::ForDelivery, 2)
            .await
            .unwrap();
        let priced = pricer.refresh(&mut tx, &cart.id, &owner).await.unwrap();
        tx.commit().await.unwrap();

        assert!(!priced.has_warnings());
        assert_eq!(priced.cart.totals.total_price_with_vat, Money::from_minor(3000));
        assert_eq!(
            store.snapshot().await[0].totals.total_price_without_vat,
            Money::from_minor(2500)
        );
    }

    #[tokio::test]
    async fn test_missing_price_is_zero_with_warning() {
        let prices = StaticPriceTable::new()
            .with_price("SKU-1", PriceSnapshot::new(Money::from_minor(600), None));
        let pricer = CartPricer::new(Arc::new(prices), config());

        let item = |id: &str, inventory_ref: &str| CartItem {
            id: id.to_string(),
            cart_id: "c".to_string(),
            inventory_ref: inventory_ref.to_string(),
            fulfillment_type: FulfillmentType::ForCollection,
            quantity: 1,
            created_at: chrono::Utc::now(),
        };

        let (totals, warnings) = pricer
            .price(&[item("i1", "SKU-1"), item("i2", "GONE")])
            .await
            .unwrap();

        assert_eq!(totals.collection_total_with_vat, Money::from_minor(600));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].cart_item_id, "i2");
        assert_eq!(warnings[0].inventory_ref, "GONE");
    }

    #[tokio::test]
    async fn test_lookup_failure_aborts() {
        let pricer = CartPricer::new(Arc::new(BrokenLookup), config());
        let store = MemoryCartStore::new();
        let owner = OwnerKey::session("s");

        let mut tx = store.begin().await.unwrap();
        let cart = tx.create_cart(&owner).await.unwrap();
        tx.upsert_item(&cart.id, "SKU-1", FulfillmentType::ForDelivery, 1)
            .await
            .unwrap();

        let err = pricer.refresh(&mut tx, &cart.id, &owner).await.unwrap_err();
        assert!(matches!(err, CartError::PriceLookupFailed { .. }));
    }
}
