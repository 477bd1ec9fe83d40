//! Currency amounts using decimal arithmetic.
//!
//! Amounts stay in [`Decimal`] from input to CRM payload. Floating point never
//! touches a price, so `0.1 + 0.2` style drift cannot show up on a deal.

use rust_decimal::Decimal;

/// Number of decimal places the CRM stores for currency fields.
pub const CURRENCY_SCALE: u32 = 2;

/// Extended price of a line: `unit_price × quantity`, rounded to cents.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: u32) -> Decimal {
    (unit_price * Decimal::from(quantity)).round_dp(CURRENCY_SCALE)
}

/// Sum a sequence of amounts, rounded to cents.
#[must_use]
pub fn sum_amounts(amounts: impl IntoIterator<Item = Decimal>) -> Decimal {
    amounts
        .into_iter()
        .fold(Decimal::ZERO, |acc, amount| acc + amount)
        .round_dp(CURRENCY_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(Decimal::new(1000, 2), 5), Decimal::new(5000, 2));
        assert_eq!(line_total(Decimal::new(1999, 2), 3), Decimal::new(5997, 2));
    }

    #[test]
    fn test_line_total_rounds_to_cents() {
        // 3 x 0.335 = 1.005 -> banker's rounding to 1.00
        assert_eq!(line_total(Decimal::new(335, 3), 3), Decimal::new(100, 2));
    }

    #[test]
    fn test_sum_amounts() {
        let total = sum_amounts([Decimal::new(50000, 2), Decimal::new(4000, 2)]);
        assert_eq!(total, Decimal::new(54000, 2));
        assert_eq!(sum_amounts([]), Decimal::ZERO);
    }
}
