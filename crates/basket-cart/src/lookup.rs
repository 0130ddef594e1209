//! # Price Lookup
//!
//! Read-only collaborator resolving an inventory reference to its current
//! VAT-inclusive prices.
//!
//! `Ok(None)` means "unknown reference" and becomes a data-integrity
//! warning; `Err` means the collaborator itself failed and aborts the
//! transaction.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{CartError, CartResult};
use basket_core::PriceSnapshot;
use basket_db::InventoryRepository;

/// Resolves inventory references to prices.
#[async_trait]
pub trait PriceLookup: Send + Sync {
    async fn price_of(&self, inventory_ref: &str) -> CartResult<Option<PriceSnapshot>>;
}

#[async_trait]
impl PriceLookup for InventoryRepository {
    async fn price_of(&self, inventory_ref: &str) -> CartResult<Option<PriceSnapshot>> {
        self.get_price(inventory_ref)
            .await
            .map_err(|e| CartError::PriceLookupFailed {
                inventory_ref: inventory_ref.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Fixed price table held in memory.
///
/// ## Example
/// ```rust
/// use basket_cart::lookup::StaticPriceTable;
/// use basket_core::{Money, PriceSnapshot};
///
/// let prices = StaticPriceTable::new()
///     .with_price("SKU-1", PriceSnapshot::new(Money::from_minor(1200), None));
/// ```
#[derive(Debug, Default)]
pub struct StaticPriceTable {
    prices: RwLock<HashMap<String, PriceSnapshot>>,
}

impl StaticPriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set).
    pub fn with_price(mut self, inventory_ref: impl Into<String>, price: PriceSnapshot) -> Self {
        self.prices.get_mut().insert(inventory_ref.into(), price);
        self
    }

    pub async fn set(&self, inventory_ref: impl Into<String>, price: PriceSnapshot) {
        self.prices.write().await.insert(inventory_ref.into(), price);
    }

    pub async fn remove(&self, inventory_ref: &str) {
        self.prices.write().await.remove(inventory_ref);
    }
}

#[async_trait]
impl PriceLookup for StaticPriceTable {
    async fn price_of(&self, inventory_ref: &str) -> CartResult<Option<PriceSnapshot>> {
        Ok(self.prices.read().await.get(inventory_ref).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basket_core::Money;
    use basket_db::{Database, DbConfig, InventoryItem};

    #[tokio::test]
    async fn test_static_table() {
        let table = StaticPriceTable::new()
            .with_price("SKU-1", PriceSnapshot::new(Money::from_minor(500), None));

        assert_eq!(
            table.price_of("SKU-1").await.unwrap().unwrap().retail_price,
            Money::from_minor(500)
        );
        assert!(table.price_of("SKU-2").await.unwrap().is_none());

        table.remove("SKU-1").await;
        assert!(table.price_of("SKU-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inventory_repository_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.inventory()
            .upsert(&InventoryItem::new(
                "SKU-1",
                "Rake",
                Money::from_minor(1000),
                Some(Money::from_minor(700)),
            ))
            .await
            .unwrap();

        let price = db.inventory().price_of("SKU-1").await.unwrap().unwrap();
        assert_eq!(price.unit_price_with_vat(), Money::from_minor(700));
    }
}
