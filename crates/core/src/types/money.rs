//! Money formatting and invoice arithmetic.
//!
//! All amounts are [`Decimal`] dollars. Rounding is always to cents, with
//! midpoints rounded away from zero (the way a cash register rounds).

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Sales tax applied to every invoice (13% HST).
pub const TAX_RATE: Decimal = Decimal::from_parts(13, 0, 0, false, 2);

/// Round an amount to cents, midpoint away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount as dollars with thousands separators, e.g. `$1,234.50`.
///
/// Negative amounts render as `-$12.00`.
#[must_use]
pub fn format_money(amount: Decimal) -> String {
    let rounded = round_money(amount);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let plain = format!("{:.2}", rounded.abs());
    let (whole, cents) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    if negative {
        format!("-${grouped}.{cents}")
    } else {
        format!("${grouped}.{cents}")
    }
}

/// One priced line on an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl InvoiceLine {
    /// Quantity times unit price, unrounded.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }
}

/// Computed totals for an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    /// Discount actually applied, after clamping to `[0, subtotal]`.
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl InvoiceTotals {
    /// Compute subtotal, discount, tax and total for a set of lines.
    ///
    /// The discount is taken off before tax. Tax and total are each rounded
    /// from the unrounded taxable amount, so `total` is
    /// `round((subtotal - discount) * 1.13)` rather than the sum of two
    /// rounded figures.
    #[must_use]
    pub fn compute(lines: &[InvoiceLine], discount: Decimal) -> Self {
        let subtotal: Decimal = lines.iter().map(InvoiceLine::amount).sum();
        let discount = discount.max(Decimal::ZERO).min(subtotal.max(Decimal::ZERO));
        let taxable = subtotal - discount;

        Self {
            subtotal: round_money(subtotal),
            discount: round_money(discount),
            tax: round_money(taxable * TAX_RATE),
            total: round_money(taxable * (Decimal::ONE + TAX_RATE)),
        }
    }

    /// Totals for a lead, where every requested part is a single unit at its
    /// sell price.
    #[must_use]
    pub fn for_sell_prices(prices: impl IntoIterator<Item = Decimal>, discount: Decimal) -> Self {
        let lines: Vec<InvoiceLine> = prices
            .into_iter()
            .map(|unit_price| InvoiceLine {
                description: String::new(),
                quantity: 1,
                unit_price,
            })
            .collect();
        Self::compute(&lines, discount)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(quantity: i32, price: &str) -> InvoiceLine {
        InvoiceLine {
            description: "Brake pads".to_string(),
            quantity,
            unit_price: d(price),
        }
    }

    #[test]
    fn test_tax_rate_is_thirteen_percent() {
        assert_eq!(TAX_RATE, d("0.13"));
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(d("0")), "$0.00");
        assert_eq!(format_money(d("5.5")), "$5.50");
        assert_eq!(format_money(d("999.999")), "$1,000.00");
        assert_eq!(format_money(d("1234.5")), "$1,234.50");
        assert_eq!(format_money(d("1234567.891")), "$1,234,567.89");
        assert_eq!(format_money(d("-12")), "-$12.00");
    }

    #[test]
    fn test_round_money_midpoint_away_from_zero() {
        assert_eq!(round_money(d("2.345")), d("2.35"));
        assert_eq!(round_money(d("2.344")), d("2.34"));
        assert_eq!(round_money(d("-2.345")), d("-2.35"));
    }

    #[test]
    fn test_compute_totals() {
        let lines = vec![line(2, "50.00"), line(1, "25.50")];
        let totals = InvoiceTotals::compute(&lines, d("10"));

        assert_eq!(totals.subtotal, d("125.50"));
        assert_eq!(totals.discount, d("10.00"));
        assert_eq!(totals.tax, d("15.02"));
        assert_eq!(totals.total, d("130.52"));
    }

    #[test]
    fn test_total_rounds_from_unrounded_taxable_amount() {
        // 0.05 * 1.13 = 0.0565 -> 0.06; tax 0.0065 -> 0.01
        let totals = InvoiceTotals::compute(&[line(1, "0.05")], Decimal::ZERO);
        assert_eq!(totals.total, d("0.06"));
        assert_eq!(totals.tax, d("0.01"));
    }

    #[test]
    fn test_discount_is_clamped() {
        let lines = vec![line(1, "40.00")];

        let over = InvoiceTotals::compute(&lines, d("100"));
        assert_eq!(over.discount, d("40.00"));
        assert_eq!(over.total, Decimal::ZERO);

        let negative = InvoiceTotals::compute(&lines, d("-5"));
        assert_eq!(negative.discount, Decimal::ZERO);
        assert_eq!(negative.total, d("45.20"));
    }

    #[test]
    fn test_empty_invoice() {
        let totals = InvoiceTotals::compute(&[], d("3"));
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.discount, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn test_lead_totals_from_sell_prices() {
        let totals = InvoiceTotals::for_sell_prices([d("120.00"), d("80.00")], d("20.00"));
        // (200 - 20) * 1.13
        assert_eq!(totals.total, d("203.40"));
        assert_eq!(totals.tax, d("23.40"));
    }
}
