//! # Pricing Engine
//!
//! The single implementation of the cart pricing formula. Every cart read,
//! mutation and login merge routes through [`compute_totals`]; nothing else
//! in the workspace adds up line prices.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lines ──► partition by fulfillment                                     │
//! │              │                         │                                │
//! │        delivery Σ price×qty     collection Σ price×qty   (VAT incl.)    │
//! │              │                         │                                │
//! │         ÷ (1 + rate)              ÷ (1 + rate)           (VAT excl.)    │
//! │              │                         │                                │
//! │              └──────────┬──────────────┘                                │
//! │                         ▼                                               │
//! │        any delivery line? ──► flat charge + charge × rate               │
//! │                         ▼                                               │
//! │                 TotalsBreakdown                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stored prices are VAT-inclusive; the delivery charge is VAT-exclusive and
//! is charged once per cart, not per line.

use serde::{Deserialize, Serialize};

use crate::money::{Money, VatRate};
use crate::types::{FulfillmentType, PricedLine, TotalsBreakdown};

/// Store-wide pricing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingConfig {
    pub vat_rate: VatRate,
    /// Applied once when the cart has at least one delivery line.
    pub flat_delivery_charge: Money,
}

impl PricingConfig {
    pub fn new(vat_rate: VatRate, flat_delivery_charge: Money) -> Self {
        PricingConfig {
            vat_rate,
            flat_delivery_charge,
        }
    }
}

impl Default for PricingConfig {
    /// 20% VAT, £5.00 delivery.
    fn default() -> Self {
        PricingConfig::new(VatRate::default(), Money::from_minor(500))
    }
}

/// Computes the full totals breakdown for a set of priced lines.
///
/// Pure and total: no I/O, no errors, an empty slice gives all-zero totals.
/// Presence of a delivery line (not its value) triggers the delivery
/// charge, so a zero-priced delivery line still incurs it.
///
/// ## Example
/// ```rust
/// use basket_core::money::{Money, VatRate};
/// use basket_core::pricing::{compute_totals, PricingConfig};
/// use basket_core::types::{FulfillmentType, PricedLine};
///
/// let config = PricingConfig::new(VatRate::default(), Money::from_minor(500));
/// let lines = [PricedLine::new(Money::from_minor(1200), 2, FulfillmentType::ForDelivery)];
///
/// let totals = compute_totals(&lines, &config);
/// assert_eq!(totals.vat, Money::from_minor(500));
/// assert_eq!(totals.total_price_without_vat, Money::from_minor(2500));
/// ```
pub fn compute_totals(lines: &[PricedLine], config: &PricingConfig) -> TotalsBreakdown {
    let rate = config.vat_rate;

    let mut delivery_total_with_vat = Money::zero();
    let mut collection_total_with_vat = Money::zero();
    let mut has_delivery_items = false;

    for line in lines {
        match line.fulfillment_type {
            FulfillmentType::ForDelivery => {
                has_delivery_items = true;
                delivery_total_with_vat += line.line_total_with_vat();
            }
            FulfillmentType::ForCollection => {
                collection_total_with_vat += line.line_total_with_vat();
            }
        }
    }

    let delivery_charge = if has_delivery_items {
        config.flat_delivery_charge
    } else {
        Money::zero()
    };
    let delivery_vat = delivery_charge.vat_on(rate);

    let delivery_total_without_vat = delivery_total_with_vat.without_vat(rate);
    let collection_total_without_vat = collection_total_with_vat.without_vat(rate);

    let sub_total_with_vat = delivery_total_with_vat + collection_total_with_vat;
    let sub_total_without_vat = delivery_total_without_vat + collection_total_without_vat;

    let vat = (sub_total_with_vat - sub_total_without_vat) + delivery_vat;

    TotalsBreakdown {
        delivery_total_with_vat,
        delivery_total_without_vat,
        collection_total_with_vat,
        collection_total_without_vat,
        sub_total_with_vat,
        sub_total_without_vat,
        delivery_charge,
        delivery_vat,
        vat,
        total_price_with_vat: sub_total_with_vat + delivery_charge + delivery_vat,
        total_price_without_vat: sub_total_without_vat + delivery_charge,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn uk() -> PricingConfig {
        PricingConfig::new(VatRate::default(), Money::from_minor(500))
    }

    fn line(pence: i64, qty: u32, fulfillment: FulfillmentType) -> PricedLine {
        PricedLine::new(Money::from_minor(pence), qty, fulfillment)
    }

    #[test]
    fn test_empty_cart_is_all_zero() {
        assert_eq!(compute_totals(&[], &uk()), TotalsBreakdown::zero());
    }

    #[test]
    fn test_single_delivery_line() {
        let totals = compute_totals(&[line(1200, 2, FulfillmentType::ForDelivery)], &uk());

        assert_eq!(totals.delivery_total_with_vat, Money::from_minor(2400));
        assert_eq!(totals.delivery_charge, Money::from_minor(500));
        assert_eq!(totals.delivery_vat, Money::from_minor(100));
        assert_eq!(totals.delivery_total_without_vat, Money::from_minor(2000));
        assert_eq!(totals.sub_total_with_vat, Money::from_minor(2400));
        assert_eq!(totals.sub_total_without_vat, Money::from_minor(2000));
        assert_eq!(totals.vat, Money::from_minor(500));
        assert_eq!(totals.total_price_with_vat, Money::from_minor(3000));
        assert_eq!(totals.total_price_without_vat, Money::from_minor(2500));
        assert!(totals.collection_total_with_vat.is_zero());
    }

    #[test]
    fn test_collection_only_has_no_delivery_charge() {
        let totals = compute_totals(&[line(600, 1, FulfillmentType::ForCollection)], &uk());

        assert!(totals.delivery_charge.is_zero());
        assert!(totals.delivery_vat.is_zero());
        assert_eq!(totals.collection_total_with_vat, Money::from_minor(600));
        assert_eq!(totals.collection_total_without_vat, Money::from_minor(500));
        assert_eq!(totals.vat, Money::from_minor(100));
        assert_eq!(totals.total_price_with_vat, Money::from_minor(600));
        assert_eq!(totals.total_price_without_vat, Money::from_minor(500));
    }

    #[test]
    fn test_delivery_charge_once_per_cart() {
        let lines = [
            line(1000, 1, FulfillmentType::ForDelivery),
            line(2000, 3, FulfillmentType::ForDelivery),
        ];
        let totals = compute_totals(&lines, &uk());
        assert_eq!(totals.delivery_charge, Money::from_minor(500));
    }

    #[test]
    fn test_zero_priced_delivery_line_still_charges_delivery() {
        let totals = compute_totals(&[line(0, 1, FulfillmentType::ForDelivery)], &uk());
        assert_eq!(totals.delivery_charge, Money::from_minor(500));
        assert_eq!(totals.total_price_with_vat, Money::from_minor(600));
    }

    #[test]
    fn test_mixed_cart() {
        let lines = [
            line(1200, 1, FulfillmentType::ForDelivery),
            line(600, 2, FulfillmentType::ForCollection),
        ];
        let totals = compute_totals(&lines, &uk());

        assert_eq!(totals.sub_total_with_vat, Money::from_minor(2400));
        assert_eq!(totals.sub_total_without_vat, Money::from_minor(2000));
        assert_eq!(totals.total_price_with_vat, Money::from_minor(3000));
    }

    #[test]
    fn test_deterministic() {
        let lines = [
            line(999, 3, FulfillmentType::ForDelivery),
            line(1, 7, FulfillmentType::ForCollection),
        ];
        assert_eq!(compute_totals(&lines, &uk()), compute_totals(&lines, &uk()));
    }

    #[test]
    fn test_vat_identity_on_awkward_prices() {
        let epsilon = Decimal::new(1, 20);
        for pence in [1_i64, 7, 333, 999, 1001, 123_457] {
            for qty in [1_u32, 2, 3, 17] {
                let lines = [
                    line(pence, qty, FulfillmentType::ForDelivery),
                    line(pence + 13, qty, FulfillmentType::ForCollection),
                ];
                let totals = compute_totals(&lines, &uk());
                assert!(totals.vat_identity_holds(epsilon), "{pence} x {qty}");
            }
        }
    }

    #[test]
    fn test_zero_vat_rate() {
        let config = PricingConfig::new(VatRate::zero(), Money::from_minor(500));
        let totals = compute_totals(&[line(1000, 1, FulfillmentType::ForDelivery)], &config);

        assert_eq!(totals.sub_total_without_vat, totals.sub_total_with_vat);
        assert!(totals.vat.is_zero());
        assert_eq!(totals.total_price_with_vat, Money::from_minor(1500));
    }
}
