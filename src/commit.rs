//! Commit
//!
//! The engine never touches usage counters. It hands back a [`UsageIntent`] naming the counters an
//! order would consume, and the order placement path executes that intent through a
//! [`UsageLedger`] after re-confirming the price.

use std::fmt;

use serde::Serialize;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    accounts::CustomerUuid,
    breakdown::PriceBreakdown,
    catalog::CatalogError,
    discounts::{DiscountUuid, flash::FlashItemUuid},
    prices::format_amount,
};

/// A usage counter an order consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "uuid", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageCounter {
    /// A discount or coupon's usage count.
    Discount(DiscountUuid),

    /// A flash sale item's sold quantity.
    FlashItem(FlashItemUuid),
}

impl fmt::Display for UsageCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discount(uuid) => write!(f, "discount {uuid}"),
            Self::FlashItem(uuid) => write!(f, "flash item {uuid}"),
        }
    }
}

/// One counter increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageIncrement {
    /// Counter to advance
    pub counter: UsageCounter,

    /// How far to advance it
    pub amount: u32,
}

/// Every counter increment a priced line implies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageIntent {
    /// Purchaser, for per-customer redemption counts
    pub customer: Option<CustomerUuid>,

    /// Increments to apply together
    pub increments: SmallVec<[UsageIncrement; 2]>,
}

impl UsageIntent {
    /// Whether the intent consumes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.increments.is_empty()
    }

    /// Merge another line's intent into this one.
    ///
    /// An order redeems a discount once however many lines it priced, so discount counters keep
    /// the larger amount. Flash sale units add up.
    pub fn merge(&mut self, other: &Self) {
        if self.customer.is_none() {
            self.customer = other.customer;
        }

        for increment in &other.increments {
            match self
                .increments
                .iter_mut()
                .find(|existing| existing.counter == increment.counter)
            {
                Some(existing) => {
                    existing.amount = match existing.counter {
                        UsageCounter::Discount(_) => existing.amount.max(increment.amount),
                        UsageCounter::FlashItem(_) => {
                            existing.amount.saturating_add(increment.amount)
                        }
                    };
                }
                None => self.increments.push(*increment),
            }
        }
    }
}

/// Errors from confirming or committing an order's pricing.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The price moved between the quote and the commit.
    #[error("price changed from {quoted} to {current}, re-confirm")]
    PriceChanged {
        /// Quoted line total
        quoted: String,

        /// Line total now
        current: String,
    },

    /// A counter hit its limit since the quote.
    #[error("usage limit reached for {counter}")]
    LimitReached {
        /// The exhausted counter
        counter: UsageCounter,
    },

    /// The intent names a counter the ledger does not hold.
    #[error("unknown usage counter {counter}")]
    UnknownCounter {
        /// The missing counter
        counter: UsageCounter,
    },

    /// Ledger storage failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl CommitError {
    /// Whether re-pricing and retrying the order may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::PriceChanged { .. } | Self::LimitReached { .. })
    }
}

/// Atomic executor for usage intents.
pub trait UsageLedger: Send + Sync {
    /// Apply every increment in `intent`, or none of them.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError::LimitReached`] if any increment would pass its limit.
    fn commit(&self, intent: &UsageIntent) -> Result<(), CommitError>;
}

/// Compare a quoted breakdown with a freshly computed one.
///
/// # Errors
///
/// Returns [`CommitError::PriceChanged`] when the unit price, line total or winning discount
/// differ.
pub fn reconfirm(quoted: &PriceBreakdown, current: &PriceBreakdown) -> Result<(), CommitError> {
    let unchanged = quoted.final_unit_price == current.final_unit_price
        && quoted.line_total == current.line_total
        && quoted.winning_source() == current.winning_source();

    if unchanged {
        Ok(())
    } else {
        Err(CommitError::PriceChanged {
            quoted: format_amount(&quoted.line_total),
            current: format_amount(&current.line_total),
        })
    }
}
