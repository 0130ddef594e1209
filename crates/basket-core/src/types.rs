//! # Domain Types
//!
//! Core domain types used throughout the basket.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Cart       │   │    CartItem     │   │  PriceSnapshot  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  cart_id (FK)   │   │  retail_price   │       │
//! │  │  owner          │   │  inventory_ref  │──►│  promotional_   │       │
//! │  │  totals         │   │  fulfillment    │   │    price        │       │
//! │  │  version        │   │  quantity       │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    OwnerKey     │   │ FulfillmentType │   │ TotalsBreakdown │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Session(id)    │   │  ForDelivery    │   │  sub-totals,    │       │
//! │  │  User(id)       │   │  ForCollection  │   │  VAT, delivery  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Line Identity
//! A cart never holds two lines with the same [`LineKey`]
//! (`inventory_ref` + `fulfillment_type`). Adding the same product for the
//! same fulfillment increases the quantity instead.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::validation::validate_owner_id;

// =============================================================================
// Owner Key
// =============================================================================

/// The identity a cart belongs to.
///
/// Exactly one of a session id (anonymous visitor) or a user id
/// (authenticated account). The enum makes "both" and "neither"
/// unrepresentable once constructed.
///
/// ## Serialization
/// ```json
/// { "sessionId": "c0ffee" }   or   { "userId": "42" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum OwnerKey {
    #[serde(rename = "sessionId")]
    Session(String),
    #[serde(rename = "userId")]
    User(String),
}

/// Which side of the owner key is populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    Session,
    User,
}

impl OwnerKey {
    /// Builds an owner key from the raw identity parts of a request.
    ///
    /// ## Rules
    /// - a blank value counts as absent
    /// - exactly one of `session_id` / `user_id` must be present
    /// - a present value must be at most 128 characters
    ///
    /// ## Example
    /// ```rust
    /// use basket_core::types::OwnerKey;
    ///
    /// assert!(OwnerKey::from_parts(Some("sess-1"), None).is_ok());
    /// assert!(OwnerKey::from_parts(None, None).is_err());
    /// assert!(OwnerKey::from_parts(Some("  "), None).is_err());
    /// assert!(OwnerKey::from_parts(Some("sess-1"), Some("42")).is_err());
    /// ```
    pub fn from_parts(session_id: Option<&str>, user_id: Option<&str>) -> CoreResult<Self> {
        fn present(value: Option<&str>) -> Option<&str> {
            value.map(str::trim).filter(|v| !v.is_empty())
        }

        match (present(session_id), present(user_id)) {
            (Some(session), None) => {
                validate_owner_id("session_id", session)?;
                Ok(OwnerKey::Session(session.to_string()))
            }
            (None, Some(user)) => {
                validate_owner_id("user_id", user)?;
                Ok(OwnerKey::User(user.to_string()))
            }
            (Some(_), Some(_)) => Err(CoreError::invalid_owner(
                "both session id and user id present",
            )),
            (None, None) => Err(CoreError::invalid_owner(
                "neither session id nor user id present",
            )),
        }
    }

    /// Anonymous owner key.
    pub fn session(id: impl Into<String>) -> Self {
        OwnerKey::Session(id.into())
    }

    /// Authenticated owner key.
    pub fn user(id: impl Into<String>) -> Self {
        OwnerKey::User(id.into())
    }

    /// Returns the session id for anonymous keys.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            OwnerKey::Session(id) => Some(id),
            OwnerKey::User(_) => None,
        }
    }

    /// Returns the user id for authenticated keys.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            OwnerKey::User(id) => Some(id),
            OwnerKey::Session(_) => None,
        }
    }

    pub fn kind(&self) -> OwnerKind {
        match self {
            OwnerKey::Session(_) => OwnerKind::Session,
            OwnerKey::User(_) => OwnerKind::User,
        }
    }

    /// Raw identifier regardless of kind.
    pub fn id(&self) -> &str {
        match self {
            OwnerKey::Session(id) | OwnerKey::User(id) => id,
        }
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerKey::Session(id) => write!(f, "session:{}", id),
            OwnerKey::User(id) => write!(f, "user:{}", id),
        }
    }
}

// =============================================================================
// Fulfillment Type
// =============================================================================

/// Whether a line is delivered or collected in store.
///
/// Any delivery line in a cart triggers the flat delivery charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum FulfillmentType {
    ForDelivery,
    ForCollection,
}

impl FulfillmentType {
    /// Wire/database spelling (`FOR_DELIVERY` / `FOR_COLLECTION`).
    pub const fn as_str(&self) -> &'static str {
        match self {
            FulfillmentType::ForDelivery => "FOR_DELIVERY",
            FulfillmentType::ForCollection => "FOR_COLLECTION",
        }
    }
}

impl fmt::Display for FulfillmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Line Key
// =============================================================================

/// Uniqueness key of a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    pub inventory_ref: String,
    pub fulfillment_type: FulfillmentType,
}

impl LineKey {
    pub fn new(inventory_ref: impl Into<String>, fulfillment_type: FulfillmentType) -> Self {
        LineKey {
            inventory_ref: inventory_ref.into(),
            fulfillment_type,
        }
    }
}

// =============================================================================
// Cart Item
// =============================================================================

/// One line of a cart.
///
/// Prices are not stored on the line; they are read from the inventory
/// at recompute time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartItem {
    pub id: String,
    pub cart_id: String,
    /// Purchasable unit; resolves to a [`PriceSnapshot`].
    pub inventory_ref: String,
    pub fulfillment_type: FulfillmentType,
    /// Always positive.
    pub quantity: u32,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CartItem {
    pub fn key(&self) -> LineKey {
        LineKey::new(self.inventory_ref.clone(), self.fulfillment_type)
    }

    pub fn matches(&self, inventory_ref: &str, fulfillment_type: FulfillmentType) -> bool {
        self.inventory_ref == inventory_ref && self.fulfillment_type == fulfillment_type
    }
}

// =============================================================================
// Cart
// =============================================================================

/// One shopping basket.
///
/// ## Invariants
/// - `owner` is exactly one session or one user
/// - `items` are unique by [`LineKey`]
/// - `totals` is always the output of [`crate::pricing::compute_totals`]
///   over the current items; never edited by hand
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Cart {
    pub id: String,
    #[serde(rename = "ownerKey")]
    pub owner: OwnerKey,
    pub items: Vec<CartItem>,
    #[serde(flatten)]
    pub totals: TotalsBreakdown,
    /// Optimistic concurrency counter, bumped on every cart-row write.
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Finds the line for a product/fulfillment pair.
    pub fn find_item(
        &self,
        inventory_ref: &str,
        fulfillment_type: FulfillmentType,
    ) -> Option<&CartItem> {
        self.items
            .iter()
            .find(|i| i.matches(inventory_ref, fulfillment_type))
    }

    /// Total units across all lines.
    pub fn unit_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// Prices
// =============================================================================

/// VAT-inclusive prices of an inventory unit, read at recompute time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PriceSnapshot {
    pub retail_price: Money,
    pub promotional_price: Option<Money>,
}

impl PriceSnapshot {
    pub fn new(retail_price: Money, promotional_price: Option<Money>) -> Self {
        PriceSnapshot {
            retail_price,
            promotional_price,
        }
    }

    /// The promotional price when it is set and above zero, else the retail price.
    ///
    /// ## Example
    /// ```rust
    /// use basket_core::money::Money;
    /// use basket_core::types::PriceSnapshot;
    ///
    /// let price = PriceSnapshot::new(Money::from_minor(1000), Some(Money::from_minor(700)));
    /// assert_eq!(price.unit_price_with_vat(), Money::from_minor(700));
    /// ```
    pub fn unit_price_with_vat(&self) -> Money {
        match self.promotional_price {
            Some(promo) if promo.is_positive() => promo,
            _ => self.retail_price,
        }
    }
}

/// One pricing engine input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub unit_price_with_vat: Money,
    pub quantity: u32,
    pub fulfillment_type: FulfillmentType,
}

impl PricedLine {
    pub fn new(
        unit_price_with_vat: Money,
        quantity: u32,
        fulfillment_type: FulfillmentType,
    ) -> Self {
        PricedLine {
            unit_price_with_vat,
            quantity,
            fulfillment_type,
        }
    }

    #[inline]
    pub fn line_total_with_vat(&self) -> Money {
        self.unit_price_with_vat.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Totals Breakdown
// =============================================================================

/// Every derived monetary field of a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TotalsBreakdown {
    pub delivery_total_with_vat: Money,
    pub delivery_total_without_vat: Money,
    pub collection_total_with_vat: Money,
    pub collection_total_without_vat: Money,
    pub sub_total_with_vat: Money,
    pub sub_total_without_vat: Money,
    pub delivery_charge: Money,
    /// VAT on the delivery charge.
    pub delivery_vat: Money,
    pub vat: Money,
    pub total_price_with_vat: Money,
    pub total_price_without_vat: Money,
}

impl TotalsBreakdown {
    /// All-zero totals (empty cart).
    pub fn zero() -> Self {
        TotalsBreakdown::default()
    }

    /// Every field rounded to pence, for presentation.
    pub fn rounded(&self) -> Self {
        TotalsBreakdown {
            delivery_total_with_vat: self.delivery_total_with_vat.rounded(),
            delivery_total_without_vat: self.delivery_total_without_vat.rounded(),
            collection_total_with_vat: self.collection_total_with_vat.rounded(),
            collection_total_without_vat: self.collection_total_without_vat.rounded(),
            sub_total_with_vat: self.sub_total_with_vat.rounded(),
            sub_total_without_vat: self.sub_total_without_vat.rounded(),
            delivery_charge: self.delivery_charge.rounded(),
            delivery_vat: self.delivery_vat.rounded(),
            vat: self.vat.rounded(),
            total_price_with_vat: self.total_price_with_vat.rounded(),
            total_price_without_vat: self.total_price_without_vat.rounded(),
        }
    }

    /// `sub_total_with_vat − sub_total_without_vat + delivery_vat == vat`
    /// within `epsilon`.
    pub fn vat_identity_holds(&self, epsilon: Decimal) -> bool {
        let expected = self.sub_total_with_vat - self.sub_total_without_vat + self.delivery_vat;
        (expected - self.vat).amount().abs() <= epsilon
    }
}

// =============================================================================
// Data Integrity Warning
// =============================================================================

/// A cart line whose inventory reference could not be priced.
///
/// The line contributes zero to the totals; the warning travels back to the
/// caller instead of failing the whole cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DataIntegrityWarning {
    pub cart_item_id: String,
    pub inventory_ref: String,
    pub reason: String,
}

impl fmt::Display for DataIntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cart item {} references {}: {}",
            self.cart_item_id, self.inventory_ref, self.reason
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_key_from_parts() {
        assert_eq!(
            OwnerKey::from_parts(Some("abc"), None).unwrap(),
            OwnerKey::session("abc")
        );
        assert_eq!(
            OwnerKey::from_parts(None, Some(" 42 ")).unwrap(),
            OwnerKey::user("42")
        );
    }

    #[test]
    fn test_owner_key_rejects_both_and_neither() {
        assert!(matches!(
            OwnerKey::from_parts(Some("abc"), Some("42")),
            Err(CoreError::InvalidOwnerKey { .. })
        ));
        assert!(matches!(
            OwnerKey::from_parts(None, None),
            Err(CoreError::InvalidOwnerKey { .. })
        ));
        assert!(matches!(
            OwnerKey::from_parts(Some("   "), None),
            Err(CoreError::InvalidOwnerKey { .. })
        ));
        assert!(matches!(
            OwnerKey::from_parts(Some(""), Some("")),
            Err(CoreError::InvalidOwnerKey { .. })
        ));
        assert_eq!(
            OwnerKey::from_parts(Some(" "), Some("42")).unwrap(),
            OwnerKey::user("42")
        );
        assert!(matches!(
            OwnerKey::from_parts(None, Some(&"x".repeat(129))),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_owner_key_accessors() {
        let key = OwnerKey::session("abc");
        assert_eq!(key.session_id(), Some("abc"));
        assert_eq!(key.user_id(), None);
        assert_eq!(key.kind(), OwnerKind::Session);
        assert_eq!(key.to_string(), "session:abc");
    }

    #[test]
    fn test_owner_key_serialization() {
        let json = serde_json::to_string(&OwnerKey::user("42")).unwrap();
        assert_eq!(json, r#"{"userId":"42"}"#);
    }

    #[test]
    fn test_fulfillment_type_serialization() {
        let json = serde_json::to_string(&FulfillmentType::ForDelivery).unwrap();
        assert_eq!(json, "\"FOR_DELIVERY\"");
        assert_eq!(FulfillmentType::ForCollection.as_str(), "FOR_COLLECTION");
    }

    #[test]
    fn test_promotional_override() {
        let price = PriceSnapshot::new(Money::from_minor(1000), Some(Money::from_minor(700)));
        assert_eq!(price.unit_price_with_vat(), Money::from_minor(700));
    }

    #[test]
    fn test_zero_promotion_falls_back_to_retail() {
        let price = PriceSnapshot::new(Money::from_minor(1000), Some(Money::zero()));
        assert_eq!(price.unit_price_with_vat(), Money::from_minor(1000));

        let price = PriceSnapshot::new(Money::from_minor(1000), None);
        assert_eq!(price.unit_price_with_vat(), Money::from_minor(1000));
    }

    #[test]
    fn test_totals_zero() {
        let totals = TotalsBreakdown::zero();
        assert!(totals.total_price_with_vat.is_zero());
        assert!(totals.vat_identity_holds(Decimal::ZERO));
    }
}
