//! # Inventory Repository
//!
//! Price lookups for purchasable inventory units.
//!
//! Carts never write here; the seed binary and back-office tooling do.
//! Prices are VAT-inclusive decimal strings.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::debug;

use crate::error::{DbError, DbResult};
use basket_core::{Money, PriceSnapshot};

/// An inventory unit with its current prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    pub inventory_ref: String,
    pub name: String,
    pub retail_price: Money,
    /// `None` or zero means no promotion.
    pub promotional_price: Option<Money>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// New item stamped with the current time.
    pub fn new(
        inventory_ref: impl Into<String>,
        name: impl Into<String>,
        retail_price: Money,
        promotional_price: Option<Money>,
    ) -> Self {
        let now = Utc::now();
        InventoryItem {
            inventory_ref: inventory_ref.into(),
            name: name.into(),
            retail_price,
            promotional_price,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn price_snapshot(&self) -> PriceSnapshot {
        PriceSnapshot::new(self.retail_price, self.promotional_price)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PriceRow {
    retail_price: String,
    promotional_price: Option<String>,
}

pub(crate) fn parse_money(table: &str, column: &str, raw: &str) -> DbResult<Money> {
    Money::from_str(raw)
        .map_err(|e| DbError::decode(table, format!("{} = '{}': {}", column, raw, e)))
}

/// Repository for inventory price operations.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Current prices for an inventory reference.
    ///
    /// ## Returns
    /// * `Ok(Some(snapshot))` - Reference exists
    /// * `Ok(None)` - Unknown reference
    /// * `Err(DbError::Decode)` - Stored price is not a decimal
    pub async fn get_price(&self, inventory_ref: &str) -> DbResult<Option<PriceSnapshot>> {
        let row: Option<PriceRow> = sqlx::query_as::<_, PriceRow>(
            r#"
            SELECT retail_price, promotional_price
            FROM inventory
            WHERE inventory_ref = ?1
            "#,
        )
        .bind(inventory_ref)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            debug!(inventory_ref = %inventory_ref, "No inventory row");
            return Ok(None);
        };

        let retail_price = parse_money("inventory", "retail_price", &row.retail_price)?;
        let promotional_price = row
            .promotional_price
            .as_deref()
            .map(|raw| parse_money("inventory", "promotional_price", raw))
            .transpose()?;

        Ok(Some(PriceSnapshot::new(retail_price, promotional_price)))
    }

    /// Inserts an item or replaces the name and prices of an existing one.
    pub async fn upsert(&self, item: &InventoryItem) -> DbResult<()> {
        debug!(inventory_ref = %item.inventory_ref, "Upserting inventory item");

        sqlx::query(
            r#"
            INSERT INTO inventory (
                inventory_ref, name, retail_price, promotional_price,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (inventory_ref) DO UPDATE SET
                name = excluded.name,
                retail_price = excluded.retail_price,
                promotional_price = excluded.promotional_price,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&item.inventory_ref)
        .bind(&item.name)
        .bind(item.retail_price.amount().to_string())
        .bind(item.promotional_price.map(|p| p.amount().to_string()))
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts inventory rows.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn setup() -> InventoryRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().inventory()
    }

    #[tokio::test]
    async fn test_unknown_reference_is_none() {
        let repo = setup().await;
        assert!(repo.get_price("NOPE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_and_get_price() {
        let repo = setup().await;
        repo.upsert(&InventoryItem::new(
            "SKU-1",
            "Garden Hose",
            Money::from_minor(1200),
            None,
        ))
        .await
        .unwrap();

        let price = repo.get_price("SKU-1").await.unwrap().unwrap();
        assert_eq!(price.retail_price, Money::from_minor(1200));
        assert_eq!(price.promotional_price, None);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_prices() {
        let repo = setup().await;
        let mut item = InventoryItem::new("SKU-1", "Rake", Money::from_minor(1000), None);
        repo.upsert(&item).await.unwrap();

        item.promotional_price = Some(Money::from_minor(750));
        repo.upsert(&item).await.unwrap();

        let price = repo.get_price("SKU-1").await.unwrap().unwrap();
        assert_eq!(price.unit_price_with_vat(), Money::from_minor(750));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_price_is_decode_error() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        sqlx::query(
            "INSERT INTO inventory (inventory_ref, name, retail_price, created_at, updated_at)
             VALUES ('BAD', 'Broken', 'twelve', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = db.inventory().get_price("BAD").await.unwrap_err();
        assert!(matches!(err, DbError::Decode { .. }));
    }
}
