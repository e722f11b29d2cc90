//! Order price arithmetic.
//!
//! All amounts are `Decimal` in Vietnamese đồng. Prices carry two decimal
//! places in the database but are whole numbers in practice.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Shipping fee rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRules {
    /// Fee charged when the subtotal is below the free-shipping threshold.
    pub flat_fee: Decimal,
    /// Subtotal at or above which shipping is free.
    pub free_threshold: Decimal,
}

impl Default for ShippingRules {
    fn default() -> Self {
        Self {
            flat_fee: Decimal::from(30_000),
            free_threshold: Decimal::from(500_000),
        }
    }
}

/// Price of `quantity` units at `unit_price`.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Sum of `(unit_price, quantity)` lines.
#[must_use]
pub fn subtotal<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    lines
        .into_iter()
        .map(|(price, qty)| line_total(price, qty))
        .sum()
}

/// Shipping fee for an order with the given subtotal.
///
/// An empty order ships for free.
#[must_use]
pub fn shipping_fee(subtotal: Decimal, rules: &ShippingRules) -> Decimal {
    if subtotal.is_zero() || subtotal >= rules.free_threshold {
        Decimal::ZERO
    } else {
        rules.flat_fee
    }
}

/// Final amount payable. Never below zero.
#[must_use]
pub fn order_total(subtotal: Decimal, shipping: Decimal, discount: Decimal) -> Decimal {
    (subtotal + shipping - discount).max(Decimal::ZERO)
}

/// Totals of an order or cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl Totals {
    /// Compute totals from line items, shipping rules and a discount.
    ///
    /// The discount is capped at the subtotal so it never pays for shipping.
    #[must_use]
    pub fn compute<I>(lines: I, rules: &ShippingRules, discount: Decimal) -> Self
    where
        I: IntoIterator<Item = (Decimal, i32)>,
    {
        let subtotal = subtotal(lines);
        let shipping_fee = shipping_fee(subtotal, rules);
        let discount = discount.clamp(Decimal::ZERO, subtotal);
        Self {
            subtotal,
            shipping_fee,
            discount,
            total: order_total(subtotal, shipping_fee, discount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[test]
    fn test_subtotal() {
        let lines = [(d(120_000), 2), (d(35_500), 1)];
        assert_eq!(subtotal(lines), d(275_500));
        assert_eq!(subtotal(Vec::<(Decimal, i32)>::new()), Decimal::ZERO);
    }

    #[test]
    fn test_shipping_fee_threshold() {
        let rules = ShippingRules::default();
        assert_eq!(shipping_fee(d(499_999), &rules), d(30_000));
        assert_eq!(shipping_fee(d(500_000), &rules), Decimal::ZERO);
        assert_eq!(shipping_fee(Decimal::ZERO, &rules), Decimal::ZERO);
    }

    #[test]
    fn test_order_total_never_negative() {
        assert_eq!(order_total(d(10_000), d(30_000), d(100_000)), Decimal::ZERO);
        assert_eq!(order_total(d(200_000), d(30_000), d(20_000)), d(210_000));
    }

    #[test]
    fn test_totals_caps_discount_at_subtotal() {
        let rules = ShippingRules::default();
        let totals = Totals::compute([(d(50_000), 1)], &rules, d(80_000));
        assert_eq!(totals.discount, d(50_000));
        assert_eq!(totals.shipping_fee, d(30_000));
        assert_eq!(totals.total, d(30_000));
    }
}
