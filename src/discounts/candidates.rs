//! Candidates
//!
//! The discounts found for a line, whether they can apply or not.

use std::fmt;

use serde::Serialize;

use crate::discounts::{
    DiscountRecord, DiscountUuid, ScopeKind,
    coupons::CouponCode,
    flash::{FlashListing, FlashSaleUuid},
};

/// Why a candidate cannot apply to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    /// No coupon with the supplied code exists.
    NotFound,

    /// Switched off by an administrator.
    Inactive,

    /// The validity window has not started.
    NotYetActive,

    /// The validity window has ended.
    Expired,

    /// The total usage limit has been reached.
    UsageExhausted,

    /// The customer has used up their redemptions.
    PerCustomerLimit,

    /// The cart subtotal is below the minimum purchase.
    BelowMinimum,

    /// Not offered to the purchaser's account class.
    WrongAccountClass,

    /// Not offered to the purchaser's loyalty tier.
    WrongLoyaltyTier,

    /// The scope does not cover the line.
    NotApplicable,

    /// The flash sale allocation has sold out.
    SoldOut,

    /// Fewer flash sale units are left than the line asks for.
    InsufficientAllocation,

    /// The flash sale price is not below the line's base price.
    NoPriceReduction,

    /// Earlier lines of the order already used the discount's cap.
    OrderCapReached,

    /// An active flash sale on the line excludes every other discount.
    SupersededByFlashSale,
}

impl RejectionReason {
    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Inactive => "INACTIVE",
            Self::NotYetActive => "NOT_YET_ACTIVE",
            Self::Expired => "EXPIRED",
            Self::UsageExhausted => "USAGE_EXHAUSTED",
            Self::PerCustomerLimit => "PER_CUSTOMER_LIMIT",
            Self::BelowMinimum => "BELOW_MINIMUM",
            Self::WrongAccountClass => "WRONG_ACCOUNT_CLASS",
            Self::WrongLoyaltyTier => "WRONG_LOYALTY_TIER",
            Self::NotApplicable => "NOT_APPLICABLE",
            Self::SoldOut => "SOLD_OUT",
            Self::InsufficientAllocation => "INSUFFICIENT_ALLOCATION",
            Self::NoPriceReduction => "NO_PRICE_REDUCTION",
            Self::OrderCapReached => "ORDER_CAP_REACHED",
            Self::SupersededByFlashSale => "SUPERSEDED_BY_FLASH_SALE",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a candidate came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateSource {
    /// An automatic discount.
    Discount {
        /// Record id
        uuid: DiscountUuid,

        /// Display name
        name: String,

        /// Scope kind
        scope: ScopeKind,
    },

    /// A coupon supplied by the shopper. `uuid` is absent when the code was not found.
    Coupon {
        /// Normalized code
        code: CouponCode,

        /// Record id
        uuid: Option<DiscountUuid>,
    },

    /// A flash sale.
    FlashSale {
        /// Sale id
        uuid: FlashSaleUuid,

        /// Display name
        name: String,
    },
}

impl CandidateSource {
    /// Whether the source is a shopper-supplied coupon.
    #[must_use]
    pub const fn is_coupon(&self) -> bool {
        matches!(self, Self::Coupon { .. })
    }

    /// The discount record behind the source, for discounts and found coupons.
    #[must_use]
    pub const fn discount_uuid(&self) -> Option<DiscountUuid> {
        match self {
            Self::Discount { uuid, .. }
            | Self::Coupon {
                uuid: Some(uuid), ..
            } => Some(*uuid),
            Self::Coupon { uuid: None, .. } | Self::FlashSale { .. } => None,
        }
    }

    /// Short human readable label.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Discount { name, scope, .. } => format!("{name} ({scope})"),
            Self::Coupon { code, .. } => format!("coupon {code}"),
            Self::FlashSale { name, .. } => format!("flash sale {name}"),
        }
    }
}

/// What an eligible candidate offers.
#[derive(Debug, Clone)]
pub enum CandidateOffer {
    /// A monetary or free-shipping discount.
    Discount(DiscountRecord),

    /// A flash sale price for the line's item.
    Flash(FlashListing),
}

/// A candidate that passed every eligibility rule.
#[derive(Debug, Clone)]
pub struct DiscountCandidate {
    /// Where it came from
    pub source: CandidateSource,

    /// What it offers
    pub offer: CandidateOffer,
}

impl DiscountCandidate {
    /// Whether the candidate is a flash sale.
    #[must_use]
    pub const fn is_flash(&self) -> bool {
        matches!(self.offer, CandidateOffer::Flash(_))
    }

    /// Whether the candidate only grants free shipping.
    #[must_use]
    pub const fn is_free_shipping(&self) -> bool {
        match &self.offer {
            CandidateOffer::Discount(record) => record.kind.is_free_shipping(),
            CandidateOffer::Flash(_) => false,
        }
    }
}

/// A candidate that failed an eligibility rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedCandidate {
    /// Where it came from
    pub source: CandidateSource,

    /// The first rule it failed
    pub reason: RejectionReason,
}

/// Everything found for one line.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    /// Candidates that can apply
    pub eligible: Vec<DiscountCandidate>,

    /// Candidates that cannot, with reasons
    pub rejected: Vec<RejectedCandidate>,
}

impl CandidateSet {
    /// Record a candidate as eligible or rejected.
    pub fn push(
        &mut self,
        source: CandidateSource,
        offer: CandidateOffer,
        verdict: Result<(), RejectionReason>,
    ) {
        match verdict {
            Ok(()) => self.eligible.push(DiscountCandidate { source, offer }),
            Err(reason) => self.reject(source, reason),
        }
    }

    /// Record a rejected candidate.
    pub fn reject(&mut self, source: CandidateSource, reason: RejectionReason) {
        self.rejected.push(RejectedCandidate { source, reason });
    }

    /// The rejection reason for the shopper's coupon, if it was rejected.
    #[must_use]
    pub fn coupon_rejection(&self) -> Option<RejectionReason> {
        self.rejected
            .iter()
            .find(|rejected| rejected.source.is_coupon())
            .map(|rejected| rejected.reason)
    }

    /// Whether an eligible flash sale exists.
    #[must_use]
    pub fn has_flash(&self) -> bool {
        self.eligible.iter().any(DiscountCandidate::is_flash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_reasons_serialize_screaming_snake() -> testresult::TestResult {
        let json = serde_json::to_string(&RejectionReason::BelowMinimum)?;

        assert_eq!(json, "\"BELOW_MINIMUM\"");
        assert_eq!(RejectionReason::PerCustomerLimit.to_string(), "PER_CUSTOMER_LIMIT");

        Ok(())
    }

    #[test]
    fn coupon_rejection_is_found_among_rejected() -> testresult::TestResult {
        let mut set = CandidateSet::default();

        set.rejected.push(RejectedCandidate {
            source: CandidateSource::Coupon {
                code: "SAVE10".parse()?,
                uuid: None,
            },
            reason: RejectionReason::NotFound,
        });

        assert_eq!(set.coupon_rejection(), Some(RejectionReason::NotFound));
        assert!(!set.has_flash());

        Ok(())
    }
}
