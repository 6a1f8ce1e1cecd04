//! Stacking Resolver
//!
//! Reduces a line's candidates to at most one price-reducing discount plus an independent
//! free-shipping grant. Discounts never add up: a flash sale that lowers the price excludes
//! everything else, and otherwise the single largest discount wins.

use std::cmp::Ordering;

use rustc_hash::FxHashMap;
use rusty_money::Money;

use crate::{
    discounts::{
        DiscountError, DiscountRecord, DiscountUuid,
        candidates::{
            CandidateOffer, CandidateSet, CandidateSource, DiscountCandidate, RejectionReason,
        },
        flash::{FlashItemUuid, FlashListing, preference},
    },
    prices::{Price, ensure_currency, times},
};

/// The discount that prices a line.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedDiscount {
    /// A flash sale price replaces the unit price.
    Flash {
        /// Where it came from
        source: CandidateSource,

        /// Flash sale item whose sold counter the order consumes
        flash_item: FlashItemUuid,

        /// The flash unit price
        sale_price: Price,

        /// Line discount against the pre-discount subtotal
        amount: Price,
    },

    /// A percentage or fixed amount off the line.
    Monetary {
        /// Where it came from
        source: CandidateSource,

        /// Line discount
        amount: Price,
    },
}

impl ResolvedDiscount {
    /// Where the discount came from.
    #[must_use]
    pub const fn source(&self) -> &CandidateSource {
        match self {
            Self::Flash { source, .. } | Self::Monetary { source, .. } => source,
        }
    }

    /// Line discount.
    #[must_use]
    pub const fn amount(&self) -> &Price {
        match self {
            Self::Flash { amount, .. } | Self::Monetary { amount, .. } => amount,
        }
    }
}

/// A candidate as reported in the breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsideredCandidate {
    /// Where it came from
    pub source: CandidateSource,

    /// Line discount it would give, when it was computed
    pub amount: Option<Price>,

    /// Why it did not or could not apply
    pub rejected_reason: Option<RejectionReason>,
}

/// Outcome of stacking resolution for one line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Every candidate, eligible ones first
    pub considered: Vec<ConsideredCandidate>,

    /// The price-reducing winner
    pub winner: Option<ResolvedDiscount>,

    /// Free-shipping grant, independent of the winner
    pub free_shipping: Option<CandidateSource>,
}

/// What earlier lines of the same order already took: the amount each discount granted and the
/// flash sale units each item gave out. Empty for a line priced on its own.
#[derive(Debug, Clone, Default)]
pub struct OrderAllowance {
    granted: FxHashMap<DiscountUuid, i64>,
    flash_units: FxHashMap<FlashItemUuid, u32>,
}

impl OrderAllowance {
    /// Minor units `discount` has already taken off the order.
    #[must_use]
    pub fn granted(&self, discount: DiscountUuid) -> i64 {
        self.granted.get(&discount).copied().unwrap_or(0)
    }

    /// Units of `item` already priced at the flash price.
    #[must_use]
    pub fn flash_units(&self, item: FlashItemUuid) -> u32 {
        self.flash_units.get(&item).copied().unwrap_or(0)
    }

    /// Account for a priced line's winning discount.
    pub fn record(&mut self, winner: &ResolvedDiscount, quantity: u32) {
        match winner {
            ResolvedDiscount::Flash { flash_item, .. } => {
                let units = self.flash_units.entry(*flash_item).or_insert(0);
                *units = units.saturating_add(quantity);
            }
            ResolvedDiscount::Monetary { source, amount } => {
                if let Some(uuid) = source.discount_uuid() {
                    let granted = self.granted.entry(uuid).or_insert(0);
                    *granted = granted.saturating_add(amount.to_minor_units());
                }
            }
        }
    }
}

/// A monetary candidate with its line amount.
#[derive(Debug, Clone, Copy)]
struct Priced<'a> {
    candidate: &'a DiscountCandidate,
    record: &'a DiscountRecord,
    amount: i64,
    cap_used: bool,
}

/// Ranking key for monetary candidates. Larger sorts first.
fn rank(a: &Priced<'_>, b: &Priced<'_>) -> Ordering {
    b.amount
        .cmp(&a.amount)
        // Automatic discounts beat coupons of equal value.
        .then_with(|| {
            a.candidate
                .source
                .is_coupon()
                .cmp(&b.candidate.source.is_coupon())
        })
        .then_with(|| {
            b.record
                .scope
                .kind()
                .specificity()
                .cmp(&a.record.scope.kind().specificity())
        })
        .then_with(|| a.record.uuid.cmp(&b.record.uuid))
}

fn flash_amount(
    listing: &FlashListing,
    subtotal_minor: i64,
    quantity: u32,
) -> Result<i64, DiscountError> {
    let sale_minor = times(listing.item.sale_price.to_minor_units(), quantity)?;

    Ok((subtotal_minor - sale_minor).max(0))
}

/// The line amount a record gives once earlier lines' use of its order cap is taken off.
fn capped_amount(
    record: &DiscountRecord,
    subtotal: &Price,
    allowance: &OrderAllowance,
) -> Result<(i64, bool), DiscountError> {
    let full = record.amount_for(subtotal)?.to_minor_units();

    let Some(cap) = record.order_cap() else {
        return Ok((full, false));
    };

    let left = (cap.to_minor_units() - allowance.granted(record.uuid)).max(0);

    Ok((full.min(left), full > 0 && left == 0))
}

/// Resolve the best discount for a line priced at `unit_price` per unit.
///
/// A flash sale only wins when it lowers the line price and has enough units left, counting
/// units earlier lines of the order already took. A fixed amount or capped percentage grants at
/// most its cap across the whole order.
///
/// # Errors
///
/// Returns a [`DiscountError`] on overflow or when a candidate is in another currency.
pub fn resolve_best(
    set: CandidateSet,
    unit_price: &Price,
    quantity: u32,
    allowance: &OrderAllowance,
) -> Result<Resolution, DiscountError> {
    let currency = unit_price.currency();
    let subtotal_minor = times(unit_price.to_minor_units(), quantity)?;
    let subtotal = Money::from_minor(subtotal_minor, currency);

    let mut flash: Vec<(&DiscountCandidate, &FlashListing, i64)> = Vec::new();
    let mut monetary: Vec<Priced<'_>> = Vec::new();
    let mut shipping: Vec<(&DiscountCandidate, &DiscountRecord)> = Vec::new();
    let mut passed_over: Vec<ConsideredCandidate> = Vec::new();

    for candidate in &set.eligible {
        match &candidate.offer {
            CandidateOffer::Flash(listing) => {
                ensure_currency(&listing.item.sale_price, currency)?;

                let amount = flash_amount(listing, subtotal_minor, quantity)?;
                let claimed = allowance.flash_units(listing.item.uuid);
                let short = listing
                    .item
                    .remaining()
                    .is_some_and(|remaining| remaining.saturating_sub(claimed) < quantity);

                let reason = if short {
                    Some(RejectionReason::InsufficientAllocation)
                } else if amount == 0 {
                    Some(RejectionReason::NoPriceReduction)
                } else {
                    None
                };

                match reason {
                    Some(reason) => passed_over.push(ConsideredCandidate {
                        source: candidate.source.clone(),
                        amount: Some(Money::from_minor(amount, currency)),
                        rejected_reason: Some(reason),
                    }),
                    None => flash.push((candidate, listing, amount)),
                }
            }
            CandidateOffer::Discount(record) if record.kind.is_free_shipping() => {
                shipping.push((candidate, record));
            }
            CandidateOffer::Discount(record) => {
                let (amount, cap_used) = capped_amount(record, &subtotal, allowance)?;

                monetary.push(Priced {
                    candidate,
                    record,
                    amount,
                    cap_used,
                });
            }
        }
    }

    flash.sort_by(|(_, a, _), (_, b, _)| {
        preference((&a.item, a.sale.priority), (&b.item, b.sale.priority))
    });
    monetary.sort_by(rank);
    shipping.sort_by(|(a_candidate, a), (b_candidate, b)| {
        a_candidate
            .source
            .is_coupon()
            .cmp(&b_candidate.source.is_coupon())
            .then_with(|| a.uuid.cmp(&b.uuid))
    });

    let winner = if let Some((candidate, listing, amount)) = flash.first() {
        Some(ResolvedDiscount::Flash {
            source: candidate.source.clone(),
            flash_item: listing.item.uuid,
            sale_price: listing.item.sale_price,
            amount: Money::from_minor(*amount, currency),
        })
    } else {
        monetary
            .first()
            .filter(|priced| priced.amount > 0)
            .map(|priced| ResolvedDiscount::Monetary {
                source: priced.candidate.source.clone(),
                amount: Money::from_minor(priced.amount, currency),
            })
    };

    let free_shipping = shipping
        .first()
        .map(|(candidate, _)| candidate.source.clone());

    let superseded = winner
        .as_ref()
        .filter(|winner| matches!(winner, ResolvedDiscount::Flash { .. }))
        .map(|_| RejectionReason::SupersededByFlashSale);

    let mut considered = Vec::with_capacity(set.eligible.len() + set.rejected.len());

    for (index, (candidate, _, amount)) in flash.iter().enumerate() {
        considered.push(ConsideredCandidate {
            source: candidate.source.clone(),
            amount: Some(Money::from_minor(*amount, currency)),
            rejected_reason: (index > 0).then_some(RejectionReason::SupersededByFlashSale),
        });
    }

    for priced in &monetary {
        considered.push(ConsideredCandidate {
            source: priced.candidate.source.clone(),
            amount: Some(Money::from_minor(priced.amount, currency)),
            rejected_reason: superseded
                .or_else(|| priced.cap_used.then_some(RejectionReason::OrderCapReached)),
        });
    }

    for (candidate, _) in &shipping {
        considered.push(ConsideredCandidate {
            source: candidate.source.clone(),
            amount: Some(Money::from_minor(0, currency)),
            rejected_reason: None,
        });
    }

    considered.extend(passed_over);
    considered.extend(set.rejected.into_iter().map(|rejected| ConsideredCandidate {
        source: rejected.source,
        amount: None,
        rejected_reason: Some(rejected.reason),
    }));

    Ok(Resolution {
        considered,
        winner,
        free_shipping,
    })
}
