//! Price Compositor
//!
//! Turns the pre-discount unit price, the quantity and the winning discount into the charged
//! unit price and line total.
//!
//! The line total is authoritative and is always the subtotal minus the discount. The unit price
//! is the line total divided across the units and rounded half-up, and the last unit absorbs the
//! remainder within one minor unit of the unit price. Whatever the unit prices still leave
//! uncovered is reported as the rounding residual; it is never charged.

use rusty_money::Money;
use thiserror::Error;
use tracing::warn;

use crate::{
    breakdown::PriceBreakdown,
    discounts::candidates::RejectionReason,
    prices::{Price, PriceError, divide_half_up, times},
    products::ItemRef,
    rates::ListPrice,
    stacking::Resolution,
    tiers::AppliedTier,
};

/// Errors from composing a line price.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    /// Lines must have at least one unit.
    #[error("quantity must be greater than zero")]
    ZeroQuantity,

    /// Minor unit arithmetic failed.
    #[error(transparent)]
    Price(#[from] PriceError),
}

/// Line amounts in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    /// Pre-discount unit price times quantity
    pub subtotal: i64,

    /// Discount taken off the subtotal
    pub discount: i64,

    /// Charged price per unit
    pub unit: i64,

    /// Charged price of the last unit
    pub last_unit: i64,

    /// Charged line total, always `subtotal - discount`
    pub total: i64,

    /// Line total minus what the unit prices add up to, when the last unit could not absorb it
    pub residual: i64,
}

/// Compute line amounts for `quantity` units of `unit_price` with `discount` off the line.
///
/// # Errors
///
/// Returns [`ComposeError::ZeroQuantity`] for a zero quantity and [`ComposeError::Price`] on
/// overflow.
pub fn line_amounts(
    unit_price: i64,
    quantity: u32,
    discount: i64,
) -> Result<LineAmounts, ComposeError> {
    if quantity == 0 {
        return Err(ComposeError::ZeroQuantity);
    }

    let subtotal = times(unit_price, quantity)?;
    let discount = discount.clamp(0, subtotal.max(0));
    let total = subtotal - discount;

    let unit = divide_half_up(total, quantity)?;
    let leading = times(unit, quantity - 1)?;

    let last_unit = (total - leading).clamp((unit - 1).max(0), unit + 1);

    Ok(LineAmounts {
        subtotal,
        discount,
        unit,
        last_unit,
        total,
        residual: total - (leading + last_unit),
    })
}

/// The pre-discount price for a line: the list price and the tier that replaced it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct BasePricing {
    /// List price for the account class
    pub list: ListPrice,

    /// Tier that overrides the list price
    pub tier: Option<AppliedTier>,
}

impl BasePricing {
    /// Unit price the discount is applied against.
    #[must_use]
    pub fn unit_price(&self) -> Price {
        self.tier.as_ref().map_or(self.list.price, |tier| tier.price)
    }
}

/// Compose the full breakdown for a line.
///
/// A flash sale winner's line discount is already relative to the base price, so every winner
/// is applied the same way.
///
/// # Errors
///
/// Returns a [`ComposeError`] for a zero quantity or on overflow.
pub fn compose(
    item: ItemRef,
    base: BasePricing,
    quantity: u32,
    resolution: Resolution,
    coupon_rejection: Option<RejectionReason>,
) -> Result<PriceBreakdown, ComposeError> {
    let base_price = base.unit_price();
    let currency = base_price.currency();

    let discount = resolution
        .winner
        .as_ref()
        .map_or(0, |winner| winner.amount().to_minor_units());

    let amounts = line_amounts(base_price.to_minor_units(), quantity, discount)?;

    if amounts.residual != 0 {
        warn!(
            ?item,
            quantity,
            residual = amounts.residual,
            "line total could not be spread evenly across units"
        );
    }

    let money = |minor| Money::from_minor(minor, currency);

    Ok(PriceBreakdown {
        item,
        quantity,
        list_price: base.list.price,
        list_price_source: base.list.source,
        base_price,
        tier_applied: base.tier,
        candidates_considered: resolution.considered,
        winning_discount: resolution.winner,
        free_shipping: resolution.free_shipping,
        coupon_rejection,
        line_subtotal: money(amounts.subtotal),
        line_discount: money(amounts.discount),
        final_unit_price: money(amounts.unit),
        last_unit_price: money(amounts.last_unit),
        line_total: money(amounts.total),
        rounding_residual: money(amounts.residual),
    })
}
