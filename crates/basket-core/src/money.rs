//! # Money Module
//!
//! Provides the `Money` and `VatRate` types for handling monetary values.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE VAT-EXCLUSIVE PROBLEM                                              │
//! │                                                                         │
//! │  Shelf prices are VAT-inclusive. The VAT-exclusive figure is           │
//! │    amount / (1 + rate)   e.g.  £10.00 / 1.2 = £8.3333...              │
//! │                                                                         │
//! │  Integer pence would force a rounding step on every line and the       │
//! │  totals would drift each time the cart is recomputed.                  │
//! │                                                                         │
//! │  OUR SOLUTION: fixed-point Decimal, rounded only for display           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use basket_core::money::{Money, VatRate};
//!
//! let price = Money::from_minor(1200);          // £12.00
//! let line = price * 2;                         // £24.00
//! let net = line.without_vat(VatRate::from_bps(2000));
//! assert_eq!(net, Money::from_minor(2000));     // £20.00
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

/// Decimal places used when money is presented.
pub const PRESENTATION_DP: u32 = 2;

// =============================================================================
// Money Type
// =============================================================================

/// A VAT-inclusive or VAT-exclusive monetary amount in the store currency.
///
/// ## Design Decisions
/// - **Decimal, not f64**: repeated recomputation must give identical output
/// - **Unrounded internally**: [`Money::rounded`] is for presentation only
/// - **Single currency**: the basket has no multi-currency support
///
/// ## Where Money Flows
/// ```text
/// PriceSnapshot.retail_price ──► unit_price_with_vat ──► × quantity
///                                                          │
///              TotalsBreakdown ◄── compute_totals ◄────────┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(#[ts(type = "string")] Decimal);

impl Money {
    /// Creates Money from an exact decimal amount.
    #[inline]
    pub const fn from_decimal(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Creates Money from minor units (pence).
    ///
    /// ## Example
    /// ```rust
    /// use basket_core::money::Money;
    ///
    /// let price = Money::from_minor(1099); // £10.99
    /// assert_eq!(price.to_string(), "£10.99");
    /// ```
    #[inline]
    pub fn from_minor(minor: i64) -> Self {
        Money(Decimal::new(minor, PRESENTATION_DP))
    }

    /// Returns the exact, unrounded amount.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the value is strictly greater than zero.
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Checks if the value is below zero.
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Multiplies a unit price by a line quantity.
    #[inline]
    pub fn multiply_quantity(&self, qty: u32) -> Self {
        Money(self.0 * Decimal::from(qty))
    }

    /// Strips VAT from a VAT-inclusive amount: `amount / (1 + rate)`.
    ///
    /// The result is not rounded.
    ///
    /// ## Example
    /// ```rust
    /// use basket_core::money::{Money, VatRate};
    ///
    /// let gross = Money::from_minor(1000);
    /// let net = gross.without_vat(VatRate::from_bps(2000));
    /// assert_eq!(net.rounded(), Money::from_minor(833));
    /// ```
    pub fn without_vat(&self, rate: VatRate) -> Money {
        if rate.is_zero() {
            return *self;
        }
        Money(self.0 / (Decimal::ONE + rate.as_decimal()))
    }

    /// VAT charged on top of a VAT-exclusive amount: `amount × rate`.
    pub fn vat_on(&self, rate: VatRate) -> Money {
        Money(self.0 * rate.as_decimal())
    }

    /// Rounds to pence (half away from zero) for presentation.
    pub fn rounded(&self) -> Money {
        Money(
            self.0
                .round_dp_with_strategy(PRESENTATION_DP, RoundingStrategy::MidpointAwayFromZero),
        )
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows the rounded value, e.g. `£10.99`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self.rounded().0;
        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };
        write!(f, "{}£{:.2}", sign, rounded.abs())
    }
}

/// Parses a plain decimal string such as `"12.50"`.
impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Money)
            .map_err(|e| ValidationError::InvalidFormat {
                field: "amount".to_string(),
                reason: e.to_string(),
            })
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Multiplication by a line quantity.
impl Mul<u32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: u32) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// VAT Rate
// =============================================================================

/// VAT rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 2000 bps = 20% (UK standard rate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VatRate(u32);

impl VatRate {
    /// UK standard rate, 20%.
    pub const STANDARD: VatRate = VatRate(2000);

    /// Creates a VAT rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        VatRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a fraction, e.g. `0.2000` for 20%.
    #[inline]
    pub fn as_decimal(&self) -> Decimal {
        Decimal::new(i64::from(self.0), 4)
    }

    /// Zero VAT rate.
    #[inline]
    pub const fn zero() -> Self {
        VatRate(0)
    }

    /// Checks if VAT rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for VatRate {
    fn default() -> Self {
        VatRate::STANDARD
    }
}

impl fmt::Display for VatRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", (self.as_decimal() * Decimal::ONE_HUNDRED).normalize())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor() {
        let money = Money::from_minor(1099);
        assert_eq!(money.amount(), Decimal::new(1099, 2));
        assert!(money.is_positive());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_minor(1099)), "£10.99");
        assert_eq!(format!("{}", Money::from_minor(500)), "£5.00");
        assert_eq!(format!("{}", Money::from_minor(-550)), "-£5.50");
        assert_eq!(format!("{}", Money::zero()), "£0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);

        assert_eq!(a + b, Money::from_minor(1500));
        assert_eq!(a - b, Money::from_minor(500));
        assert_eq!(a * 3, Money::from_minor(3000));

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total, Money::from_minor(2000));
    }

    #[test]
    fn test_without_vat_is_exact_for_round_figures() {
        let gross = Money::from_minor(2400);
        assert_eq!(gross.without_vat(VatRate::from_bps(2000)), Money::from_minor(2000));
    }

    #[test]
    fn test_without_vat_is_not_rounded_internally() {
        let net = Money::from_minor(1000).without_vat(VatRate::from_bps(2000));
        assert_ne!(net, net.rounded());
        assert_eq!(net.rounded(), Money::from_minor(833));
    }

    #[test]
    fn test_zero_rate_leaves_amount_untouched() {
        let gross = Money::from_minor(999);
        assert_eq!(gross.without_vat(VatRate::zero()), gross);
        assert!(gross.vat_on(VatRate::zero()).is_zero());
    }

    #[test]
    fn test_vat_on() {
        let charge = Money::from_minor(500);
        assert_eq!(charge.vat_on(VatRate::from_bps(2000)), Money::from_minor(100));
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        let m = Money::from_decimal(Decimal::new(12345, 3)); // 12.345
        assert_eq!(m.rounded(), Money::from_minor(1235));
    }

    #[test]
    fn test_parse() {
        let m: Money = "12.50".parse().unwrap();
        assert_eq!(m, Money::from_minor(1250));
        assert!("twelve".parse::<Money>().is_err());
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Money::from_minor(1250)).unwrap();
        assert_eq!(json, "\"12.50\"");
    }

    #[test]
    fn test_vat_rate() {
        let rate = VatRate::from_bps(2000);
        assert_eq!(rate.as_decimal(), Decimal::new(2, 1));
        assert_eq!(rate.to_string(), "20%");
        assert_eq!(VatRate::default(), rate);
        assert_eq!(VatRate::default().bps(), 2000);
        assert!(VatRate::zero().is_zero());
    }
}
