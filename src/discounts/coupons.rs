//! Coupons

use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::discounts::{
    DiscountRecord,
    candidates::{CandidateOffer, CandidateSet, CandidateSource, RejectionReason},
    query::DiscountContext,
};

/// Errors from parsing a coupon code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CouponError {
    /// The code was empty or only whitespace.
    #[error("coupon code is empty")]
    Empty,
}

/// A coupon code, trimmed and upper-cased so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CouponCode(String);

impl CouponCode {
    /// The normalized code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CouponCode {
    type Err = CouponError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();

        if code.is_empty() {
            return Err(CouponError::Empty);
        }

        Ok(Self(code.to_uppercase()))
    }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for CouponCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// A discount record redeemed by code rather than applied automatically.
#[derive(Debug, Clone)]
pub struct Coupon {
    /// Redemption code
    pub code: CouponCode,

    /// The discount it grants
    pub discount: DiscountRecord,
}

impl Coupon {
    /// Create a coupon.
    #[must_use]
    pub fn new(code: CouponCode, discount: DiscountRecord) -> Self {
        Self { code, discount }
    }

    /// Source entry for breakdowns.
    #[must_use]
    pub fn source(&self) -> CandidateSource {
        CandidateSource::Coupon {
            code: self.code.clone(),
            uuid: Some(self.discount.uuid),
        }
    }
}

/// Evaluate a shopper-supplied coupon and record the verdict in `set`.
///
/// A missing coupon is recorded as [`RejectionReason::NotFound`] so the shopper is told why it did
/// not apply.
pub fn evaluate_coupon(
    set: &mut CandidateSet,
    code: &CouponCode,
    coupon: Option<Coupon>,
    ctx: &DiscountContext,
    customer_redemptions: u32,
) {
    let Some(coupon) = coupon else {
        set.reject(
            CandidateSource::Coupon {
                code: code.clone(),
                uuid: None,
            },
            RejectionReason::NotFound,
        );
        return;
    };

    let verdict = coupon.discount.check(ctx, customer_redemptions);
    let source = coupon.source();

    set.push(source, CandidateOffer::Discount(coupon.discount), verdict);
}
