//! # Cart Repository
//!
//! Transaction-scoped operations on carts and cart lines.
//!
//! ## Version Guard
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  find_by_owner ──► Cart { version: 4 }                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE carts SET ..., version = version + 1                           │
//! │  WHERE id = ?1 AND version = 4                                         │
//! │       │                                                                 │
//! │       ├── 1 row  → Ok(5)                                               │
//! │       ├── 0 rows, cart exists  → DbError::Conflict (retry)             │
//! │       └── 0 rows, cart missing → DbError::NotFound                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Line writes (`upsert_item`) do not touch the cart row; the caller always
//! finishes a unit of work with a guarded `persist_totals`, which is what
//! detects a concurrent writer.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::DbTransaction;
use crate::repository::inventory::parse_money;
use basket_core::{Cart, CartItem, FulfillmentType, OwnerKey, TotalsBreakdown};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: String,
    session_id: Option<String>,
    user_id: Option<String>,
    delivery_total_with_vat: String,
    delivery_total_without_vat: String,
    collection_total_with_vat: String,
    collection_total_without_vat: String,
    sub_total_with_vat: String,
    sub_total_without_vat: String,
    delivery_charge: String,
    delivery_vat: String,
    vat: String,
    total_price_with_vat: String,
    total_price_without_vat: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CartRow {
    fn owner(&self) -> DbResult<OwnerKey> {
        match (&self.session_id, &self.user_id) {
            (Some(session), None) => Ok(OwnerKey::session(session.clone())),
            (None, Some(user)) => Ok(OwnerKey::user(user.clone())),
            _ => Err(DbError::decode(
                "carts",
                format!("cart {} must have exactly one owner column", self.id),
            )),
        }
    }

    fn totals(&self) -> DbResult<TotalsBreakdown> {
        let m = |column: &str, raw: &str| parse_money("carts", column, raw);

        Ok(TotalsBreakdown {
            delivery_total_with_vat: m("delivery_total_with_vat", &self.delivery_total_with_vat)?,
            delivery_total_without_vat: m(
                "delivery_total_without_vat",
                &self.delivery_total_without_vat,
            )?,
            collection_total_with_vat: m(
                "collection_total_with_vat",
                &self.collection_total_with_vat,
            )?,
            collection_total_without_vat: m(
                "collection_total_without_vat",
                &self.collection_total_without_vat,
            )?,
            sub_total_with_vat: m("sub_total_with_vat", &self.sub_total_with_vat)?,
            sub_total_without_vat: m("sub_total_without_vat", &self.sub_total_without_vat)?,
            delivery_charge: m("delivery_charge", &self.delivery_charge)?,
            delivery_vat: m("delivery_vat", &self.delivery_vat)?,
            vat: m("vat", &self.vat)?,
            total_price_with_vat: m("total_price_with_vat", &self.total_price_with_vat)?,
            total_price_without_vat: m("total_price_without_vat", &self.total_price_without_vat)?,
        })
    }

    fn into_cart(self, items: Vec<CartItem>) -> DbResult<Cart> {
        let owner = self.owner()?;
        let totals = self.totals()?;

        Ok(Cart {
            id: self.id,
            owner,
            items,
            totals,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: String,
    cart_id: String,
    inventory_ref: String,
    fulfillment_type: FulfillmentType,
    quantity: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = DbError;

    fn try_from(row: CartItemRow) -> DbResult<Self> {
        let quantity = u32::try_from(row.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| {
                DbError::decode(
                    "cart_items",
                    format!("item {} has quantity {}", row.id, row.quantity),
                )
            })?;

        Ok(CartItem {
            id: row.id,
            cart_id: row.cart_id,
            inventory_ref: row.inventory_ref,
            fulfillment_type: row.fulfillment_type,
            quantity,
            created_at: row.created_at,
        })
    }
}

const SELECT_CART: &str = r#"
    SELECT
        id, session_id, user_id,
        delivery_total_with_vat, delivery_total_without_vat,
        collection_total_with_vat, collection_total_without_vat,
        sub_total_with_vat, sub_total_without_vat,
        delivery_charge, delivery_vat, vat,
        total_price_with_vat, total_price_without_vat,
        version, created_at, updated_at
    FROM carts
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for cart database operations.
///
/// All reads and writes go through a caller-owned [`DbTransaction`].
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Finds the cart owned by `owner`, with its lines.
    pub async fn find_by_owner(
        &self,
        tx: &mut DbTransaction,
        owner: &OwnerKey,
    ) -> DbResult<Option<Cart>> {
        let sql = match owner {
            OwnerKey::Session(_) => format!("{SELECT_CART} WHERE session_id = ?1"),
            OwnerKey::User(_) => format!("{SELECT_CART} WHERE user_id = ?1"),
        };

        let row: Option<CartRow> = sqlx::query_as::<_, CartRow>(&sql)
            .bind(owner.id())
            .fetch_optional(&mut **tx)
            .await?;

        let Some(row) = row else {
            debug!(owner = %owner, "No cart for owner");
            return Ok(None);
        };

        let items = self.items_for(tx, &row.id).await?;
        debug!(owner = %owner, cart_id = %row.id, lines = items.len(), "Loaded cart");

        row.into_cart(items).map(Some)
    }

    /// Lines of a cart, oldest first.
    pub async fn items_for(
        &self,
        tx: &mut DbTransaction,
        cart_id: &str,
    ) -> DbResult<Vec<CartItem>> {
        let rows: Vec<CartItemRow> = sqlx::query_as::<_, CartItemRow>(
            r#"
            SELECT id, cart_id, inventory_ref, fulfillment_type, quantity, created_at
            FROM cart_items
            WHERE cart_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(cart_id)
        .fetch_all(&mut **tx)
        .await?;

        rows.into_iter().map(CartItem::try_from).collect()
    }

    /// Creates an empty cart for `owner`.
    ///
    /// A concurrent creator winning the unique owner index surfaces as
    /// [`DbError::Conflict`], so a retry finds that cart instead.
    pub async fn create_cart(&self, tx: &mut DbTransaction, owner: &OwnerKey) -> DbResult<Cart> {
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

        debug!(cart_id = %cart.id, owner = %owner, "Creating cart");

        let result = sqlx::query(
            r#"
            INSERT INTO carts (id, session_id, user_id, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, 0, ?4, ?5)
            "#,
        )
        .bind(&cart.id)
        .bind(owner.session_id())
        .bind(owner.user_id())
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&mut **tx)
        .await;

        match result.map_err(DbError::from) {
            Ok(_) => Ok(cart),
            Err(DbError::UniqueViolation { .. }) => Err(DbError::conflict(owner.to_string(), 0)),
            Err(e) => Err(e),
        }
    }

    /// Adds `quantity_delta` to the line keyed by `(inventory_ref, fulfillment_type)`.
    ///
    /// ## Behavior
    /// - no line, delta > 0 → insert a new line
    /// - line exists → quantity += delta
    /// - resulting quantity ≤ 0 → line deleted
    ///
    /// ## Returns
    /// The line after the write, or `None` when it no longer exists.
    pub async fn upsert_item(
        &self,
        tx: &mut DbTransaction,
        cart_id: &str,
        inventory_ref: &str,
        fulfillment_type: FulfillmentType,
        quantity_delta: i64,
    ) -> DbResult<Option<CartItem>> {
        let existing: Option<CartItemRow> = sqlx::query_as::<_, CartItemRow>(
            r#"
            SELECT id, cart_id, inventory_ref, fulfillment_type, quantity, created_at
            FROM cart_items
            WHERE cart_id = ?1 AND inventory_ref = ?2 AND fulfillment_type = ?3
            "#,
        )
        .bind(cart_id)
        .bind(inventory_ref)
        .bind(fulfillment_type)
        .fetch_optional(&mut **tx)
        .await?;

        match existing {
            Some(row) => {
                let quantity = row.quantity + quantity_delta;

                if quantity <= 0 {
                    debug!(cart_id = %cart_id, item_id = %row.id, "Removing cart line");
                    sqlx::query("DELETE FROM cart_items WHERE id = ?1")
                        .bind(&row.id)
                        .execute(&mut **tx)
                        .await?;
                    return Ok(None);
                }

                debug!(cart_id = %cart_id, item_id = %row.id, quantity, "Updating cart line");
                sqlx::query("UPDATE cart_items SET quantity = ?2 WHERE id = ?1")
                    .bind(&row.id)
                    .bind(quantity)
                    .execute(&mut **tx)
                    .await?;

                CartItem::try_from(CartItemRow { quantity, ..row }).map(Some)
            }

            None if quantity_delta <= 0 => Ok(None),

            None => {
                let row = CartItemRow {
                    id: Uuid::new_v4().to_string(),
                    cart_id: cart_id.to_string(),
                    inventory_ref: inventory_ref.to_string(),
                    fulfillment_type,
                    quantity: quantity_delta,
                    created_at: Utc::now(),
                };

                debug!(cart_id = %cart_id, inventory_ref = %inventory_ref, "Inserting cart line");
                sqlx::query(
                    r#"
                    INSERT INTO cart_items (
                        id, cart_id, inventory_ref, fulfillment_type, quantity, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                )
                .bind(&row.id)
                .bind(&row.cart_id)
                .bind(&row.inventory_ref)
                .bind(row.fulfillment_type)
                .bind(row.quantity)
                .bind(row.created_at)
                .execute(&mut **tx)
                .await?;

                CartItem::try_from(row).map(Some)
            }
        }
    }

    /// Moves a cart to a new owner. Returns the bumped version.
    pub async fn reassign_owner(
        &self,
        tx: &mut DbTransaction,
        cart_id: &str,
        expected_version: i64,
        new_owner: &OwnerKey,
    ) -> DbResult<i64> {
        debug!(cart_id = %cart_id, new_owner = %new_owner, "Reassigning cart owner");

        let result = sqlx::query(
            r#"
            UPDATE carts SET
                session_id = ?3,
                user_id = ?4,
                version = version + 1,
                updated_at = ?5
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(cart_id)
        .bind(expected_version)
        .bind(new_owner.session_id())
        .bind(new_owner.user_id())
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        self.check_guarded_write(tx, cart_id, expected_version, result.rows_affected())
            .await?;
        Ok(expected_version + 1)
    }

    /// Deletes a cart; its lines go with it (ON DELETE CASCADE).
    pub async fn delete_cart(
        &self,
        tx: &mut DbTransaction,
        cart_id: &str,
        expected_version: i64,
    ) -> DbResult<()> {
        debug!(cart_id = %cart_id, "Deleting cart");

        let result = sqlx::query("DELETE FROM carts WHERE id = ?1 AND version = ?2")
            .bind(cart_id)
            .bind(expected_version)
            .execute(&mut **tx)
            .await?;

        self.check_guarded_write(tx, cart_id, expected_version, result.rows_affected())
            .await
    }

    /// Stores freshly computed totals. Returns the bumped version.
    ///
    /// Amounts are written unrounded.
    pub async fn persist_totals(
        &self,
        tx: &mut DbTransaction,
        cart_id: &str,
        expected_version: i64,
        totals: &TotalsBreakdown,
    ) -> DbResult<i64> {
        debug!(cart_id = %cart_id, total = %totals.total_price_with_vat, "Persisting totals");

        let s = |m: basket_core::Money| m.amount().to_string();

        let result = sqlx::query(
            r#"
            UPDATE carts SET
                delivery_total_with_vat = ?3,
                delivery_total_without_vat = ?4,
                collection_total_with_vat = ?5,
                collection_total_without_vat = ?6,
                sub_total_with_vat = ?7,
                sub_total_without_vat = ?8,
                delivery_charge = ?9,
                delivery_vat = ?10,
                vat = ?11,
                total_price_with_vat = ?12,
                total_price_without_vat = ?13,
                version = version + 1,
                updated_at = ?14
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(cart_id)
        .bind(expected_version)
        .bind(s(totals.delivery_total_with_vat))
        .bind(s(totals.delivery_total_without_vat))
        .bind(s(totals.collection_total_with_vat))
        .bind(s(totals.collection_total_without_vat))
        .bind(s(totals.sub_total_with_vat))
        .bind(s(totals.sub_total_without_vat))
        .bind(s(totals.delivery_charge))
        .bind(s(totals.delivery_vat))
        .bind(s(totals.vat))
        .bind(s(totals.total_price_with_vat))
        .bind(s(totals.total_price_without_vat))
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        self.check_guarded_write(tx, cart_id, expected_version, result.rows_affected())
            .await?;
        Ok(expected_version + 1)
    }

    /// Counts carts (diagnostics and tests).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM carts")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn check_guarded_write(
        &self,
        tx: &mut DbTransaction,
        cart_id: &str,
        expected_version: i64,
        rows_affected: u64,
    ) -> DbResult<()> {
        if rows_affected > 0 {
            return Ok(());
        }

        let exists: Option<i64> = sqlx::query_scalar("SELECT version FROM carts WHERE id = ?1")
            .bind(cart_id)
            .fetch_optional(&mut **tx)
            .await?;

        match exists {
            Some(_) => Err(DbError::conflict(cart_id, expected_version)),
            None => Err(DbError::not_found("Cart", cart_id)),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
