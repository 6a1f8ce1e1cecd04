//! Prices
//!
//! Money helpers shared by the rate table, tier resolver and compositor. All arithmetic is
//! done in minor units; [`Money`] is only used at the edges.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

/// A monetary amount in an ISO currency.
pub type Price = Money<'static, Currency>;

/// Errors from minor unit arithmetic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PriceError {
    /// An intermediate value did not fit in `i64` minor units.
    #[error("minor unit arithmetic overflowed")]
    Overflow,

    /// Division by a zero quantity.
    #[error("cannot divide an amount across zero units")]
    ZeroQuantity,

    /// Two amounts in different currencies were combined.
    #[error("currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch {
        /// Expected ISO code
        expected: &'static str,

        /// Found ISO code
        found: &'static str,
    },
}

/// Build a [`Price`] from minor units.
#[must_use]
pub fn from_minor(minor: i64, currency: &'static Currency) -> Price {
    Money::from_minor(minor, currency)
}

/// Multiply a unit amount by a quantity.
///
/// # Errors
///
/// Returns [`PriceError::Overflow`] when the product does not fit in `i64`.
pub fn times(unit_minor: i64, quantity: u32) -> Result<i64, PriceError> {
    unit_minor
        .checked_mul(i64::from(quantity))
        .ok_or(PriceError::Overflow)
}

/// Divide a total across `quantity` units, rounding half-up to a whole minor unit.
///
/// # Errors
///
/// Returns [`PriceError::ZeroQuantity`] for a zero quantity and [`PriceError::Overflow`] when the
/// result cannot be represented.
pub fn divide_half_up(total_minor: i64, quantity: u32) -> Result<i64, PriceError> {
    if quantity == 0 {
        return Err(PriceError::ZeroQuantity);
    }

    let total = Decimal::from(total_minor);
    let quantity = Decimal::from(quantity);

    total
        .checked_div(quantity)
        .ok_or(PriceError::Overflow)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(PriceError::Overflow)
}

/// Ensure `price` is in `currency`.
///
/// # Errors
///
/// Returns [`PriceError::CurrencyMismatch`] when the currencies differ.
pub fn ensure_currency(price: &Price, currency: &'static Currency) -> Result<(), PriceError> {
    if price.currency() == currency {
        Ok(())
    } else {
        Err(PriceError::CurrencyMismatch {
            expected: currency.iso_alpha_code,
            found: price.currency().iso_alpha_code,
        })
    }
}

/// Render an amount at its currency's precision, e.g. `"30.00"`.
#[must_use]
pub fn format_amount(price: &Price) -> String {
    format_minor(price.to_minor_units(), price.currency())
}

/// Render minor units at the currency's precision.
#[must_use]
pub fn format_minor(minor: i64, currency: &'static Currency) -> String {
    Decimal::new(minor, currency.exponent).to_string()
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{GBP, USD};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn divide_half_up_rounds_midpoints_up() -> TestResult {
        assert_eq!(divide_half_up(1000, 3)?, 333);
        assert_eq!(divide_half_up(5, 2)?, 3);
        assert_eq!(divide_half_up(15_000, 5)?, 3000);

        Ok(())
    }

    #[test]
    fn divide_half_up_rejects_zero_quantity() {
        assert_eq!(divide_half_up(100, 0), Err(PriceError::ZeroQuantity));
    }

    #[test]
    fn times_detects_overflow() {
        assert_eq!(times(i64::MAX, 2), Err(PriceError::Overflow));
    }

    #[test]
    fn formats_at_currency_precision() {
        assert_eq!(format_amount(&from_minor(3000, USD)), "30.00");
        assert_eq!(format_minor(5, USD), "0.05");
    }

    #[test]
    fn ensure_currency_reports_mismatch() {
        let result = ensure_currency(&from_minor(100, GBP), USD);

        assert_eq!(
            result,
            Err(PriceError::CurrencyMismatch {
                expected: "USD",
                found: "GBP",
            })
        );
    }
}
