//! # SQLite Cart Store
//!
//! [`CartStore`] backed by the `basket-db` repositories.
//!
//! The transaction remembers the version of every cart it has read or
//! written and passes it to the repository's guarded writes. A cart changed
//! by someone else in between shows up as [`CartError::Contention`].

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use super::{CartStore, CartTransaction};
use crate::error::{CartError, CartResult};
use basket_core::{Cart, CartItem, FulfillmentType, OwnerKey, TotalsBreakdown};
use basket_db::{CartRepository, Database, DbError, DbTransaction};

/// SQLite-backed [`CartStore`].
#[derive(Debug, Clone)]
pub struct SqliteCartStore {
    db: Database,
}

impl SqliteCartStore {
    pub fn new(db: Database) -> Self {
        SqliteCartStore { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl CartStore for SqliteCartStore {
    type Tx = SqliteCartTransaction;

    async fn begin(&self) -> CartResult<SqliteCartTransaction> {
        let tx = self.db.begin().await?;

        Ok(SqliteCartTransaction {
            tx,
            carts: self.db.carts(),
            versions: HashMap::new(),
        })
    }
}

/// An open SQLite cart transaction.
pub struct SqliteCartTransaction {
    tx: DbTransaction,
    carts: CartRepository,
    /// Last known version per cart id.
    versions: HashMap<String, i64>,
}

impl SqliteCartTransaction {
    fn version_of(&self, cart_id: &str) -> CartResult<i64> {
        self.versions
            .get(cart_id)
            .copied()
            .ok_or_else(|| CartError::not_found(cart_id))
    }
}

#[async_trait]
impl CartTransaction for SqliteCartTransaction {
    async fn find_by_owner(&mut self, owner: &OwnerKey) -> CartResult<Option<Cart>> {
        let cart = self.carts.find_by_owner(&mut self.tx, owner).await?;

        if let Some(cart) = &cart {
            self.versions.insert(cart.id.clone(), cart.version);
        }
        Ok(cart)
    }

    async fn items(&mut self, cart_id: &str) -> CartResult<Vec<CartItem>> {
        Ok(self.carts.items_for(&mut self.tx, cart_id).await?)
    }

    async fn create_cart(&mut self, owner: &OwnerKey) -> CartResult<Cart> {
        let cart = self.carts.create_cart(&mut self.tx, owner).await?;
        self.versions.insert(cart.id.clone(), cart.version);
        Ok(cart)
    }

    async fn upsert_item(
        &mut self,
        cart_id: &str,
        inventory_ref: &str,
        fulfillment_type: FulfillmentType,
        quantity_delta: i64,
    ) -> CartResult<Option<CartItem>> {
        Ok(self
            .carts
            .upsert_item(
                &mut self.tx,
                cart_id,
                inventory_ref,
                fulfillment_type,
                quantity_delta,
            )
            .await?)
    }

    async fn reassign_owner(&mut self, cart_id: &str, new_owner: &OwnerKey) -> CartResult<()> {
        let expected = self.version_of(cart_id)?;

        let version = self
            .carts
            .reassign_owner(&mut self.tx, cart_id, expected, new_owner)
            .await
            .map_err(|e| match e {
                // The target owner already has a cart that this transaction did not see.
                DbError::UniqueViolation { .. } => CartError::Contention(e.to_string()),
                e => e.into(),
            })?;

        self.versions.insert(cart_id.to_string(), version);
        Ok(())
    }

    async fn delete_cart(&mut self, cart_id: &str) -> CartResult<()> {
        let expected = self.version_of(cart_id)?;
        self.carts.delete_cart(&mut self.tx, cart_id, expected).await?;
        self.versions.remove(cart_id);
        Ok(())
    }

    async fn persist_totals(&mut self, cart_id: &str, totals: &TotalsBreakdown) -> CartResult<()> {
        let expected = self.version_of(cart_id)?;
        let version = self
            .carts
            .persist_totals(&mut self.tx, cart_id, expected, totals)
            .await?;
        self.versions.insert(cart_id.to_string(), version);
        Ok(())
    }

    async fn commit(self) -> CartResult<()> {
        self.tx.commit().await.map_err(DbError::from)?;
        debug!("Cart transaction committed");
        Ok(())
    }

    async fn rollback(self) -> CartResult<()> {
        self.tx.rollback().await.map_err(DbError::from)?;
        debug!("Cart transaction rolled back");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use basket_db::DbConfig;

    async fn setup() -> (tempfile::TempDir, SqliteCartStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("basket.db")))
            .await
            .unwrap();
        (dir, SqliteCartStore::new(db))
    }

    #[tokio::test]
    async fn test_roundtrip_through_repository() {
        let (_dir, store) = setup().await;
        let owner = OwnerKey::session("s");

        let mut tx = store.begin().await.unwrap();
        let cart = tx.create_cart(&owner).await.unwrap();
        tx.upsert_item(&cart.id, "SKU-1", FulfillmentType::ForDelivery, 2)
            .await
            .unwrap();
        tx.persist_totals(&cart.id, &TotalsBreakdown::zero())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let loaded = tx.find_by_owner(&owner).await.unwrap().unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_write_to_unseen_cart_is_not_found() {
        let (_dir, store) = setup().await;

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .persist_totals("never-loaded", &TotalsBreakdown::zero())
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::CartNotFound { .. }));
    }

    #[tokio::test]
    async fn test_stale_version_is_contention() {
        let (_dir, store) = setup().await;
        let owner = OwnerKey::user("u");

        let mut tx = store.begin().await.unwrap();
        tx.create_cart(&owner).await.unwrap();
        tx.commit().await.unwrap();

        // First transaction reads version 0, then another writer commits
        let mut first = store.begin().await.unwrap();
        let cart = first.find_by_owner(&owner).await.unwrap().unwrap();
        first.rollback().await.unwrap();

        let mut second = store.begin().await.unwrap();
        second.find_by_owner(&owner).await.unwrap();
        second
            .persist_totals(&cart.id, &TotalsBreakdown::zero())
            .await
            .unwrap();
        second.commit().await.unwrap();

        // Replaying the first transaction's view against the new state
        let mut replay = store.begin().await.unwrap();
        replay.versions.insert(cart.id.clone(), cart.version);
        let err = replay
            .persist_totals(&cart.id, &TotalsBreakdown::zero())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let (_dir, store) = setup().await;

        let mut tx = store.begin().await.unwrap();
        tx.create_cart(&OwnerKey::session("s")).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.database().carts().count().await.unwrap(), 0);
    }
}
