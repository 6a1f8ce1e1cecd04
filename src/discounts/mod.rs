//! Discounts
//!
//! Discount records, their scopes and the arithmetic shared by every discount kind. Records are
//! read-only here: usage counters are only ever advanced by a [`UsageLedger`] at order commit.
//!
//! [`UsageLedger`]: crate::commit::UsageLedger

use std::fmt;

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rusty_money::{Money, MoneyError};
use serde::Serialize;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    accounts::{AccountClass, GroupUuid, LoyaltyTier},
    discounts::{candidates::RejectionReason, query::DiscountContext},
    prices::{Price, PriceError, ensure_currency},
    products::{BrandUuid, CategoryUuid, ProductUuid, SupplierUuid, WarehouseUuid},
    uuids::TypedUuid,
    windows::{ValidityWindow, WindowStatus},
};

pub mod candidates;
pub mod coupons;
pub mod flash;
pub mod query;

/// Discount record id.
pub type DiscountUuid = TypedUuid<DiscountRecord>;

/// Errors specific to discount calculations.
#[derive(Debug, Error)]
pub enum DiscountError {
    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// A percentage outside `(0, 100]`.
    #[error("percentage must be greater than 0 and at most 100, got {0}")]
    PercentOutOfRange(Decimal),

    /// A fixed discount that is zero or negative.
    #[error("fixed discount amount must be positive")]
    NonPositiveAmount,

    /// Minor unit arithmetic failed.
    #[error(transparent)]
    Price(#[from] PriceError),

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Calculate the discount amount in minor units based on a percentage and a minor unit amount.
///
/// Rounds half away from zero, which is half-up for the non-negative amounts priced here.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] if the calculation overflows.
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, DiscountError> {
    let minor = Decimal::from(minor);

    ((*percent) * Decimal::ONE) // decimal_percentage doesn't expose the underlying Decimal
        .checked_mul(minor)
        .ok_or(DiscountError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(DiscountError::PercentConversion)
}

/// What a discount does.
#[derive(Debug, Copy, Clone)]
pub enum DiscountKind {
    /// Percentage off the line subtotal (e.g. "20% off").
    Percentage(Percentage),

    /// Fixed amount off the line subtotal (e.g. "$5 off").
    FixedAmount(Price),

    /// Free shipping. Reported separately, never reduces the line price.
    FreeShipping,
}

impl DiscountKind {
    /// A percentage discount from percentage points, e.g. `20` for 20%.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::PercentOutOfRange`] unless `0 < points <= 100`.
    pub fn percentage(points: Decimal) -> Result<Self, DiscountError> {
        if points <= Decimal::ZERO || points > Decimal::ONE_HUNDRED {
            return Err(DiscountError::PercentOutOfRange(points));
        }

        Ok(Self::Percentage(Percentage::from(points / Decimal::ONE_HUNDRED)))
    }

    /// A fixed amount discount.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::NonPositiveAmount`] for zero or negative amounts.
    pub fn fixed_amount(amount: Price) -> Result<Self, DiscountError> {
        if amount.to_minor_units() <= 0 {
            return Err(DiscountError::NonPositiveAmount);
        }

        Ok(Self::FixedAmount(amount))
    }

    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage(_) => "PERCENTAGE",
            Self::FixedAmount(_) => "FIXED_AMOUNT",
            Self::FreeShipping => "FREE_SHIPPING",
        }
    }

    /// Whether this is a free-shipping discount.
    #[must_use]
    pub const fn is_free_shipping(&self) -> bool {
        matches!(self, Self::FreeShipping)
    }
}

/// Scope kind, without the scope's target ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeKind {
    /// Applies to everything.
    Global,

    /// Applies to a category.
    Category,

    /// Applies to listed products.
    Product,

    /// Applies to a brand.
    Brand,

    /// Applies to a default supplier.
    Supplier,

    /// Applies to a default warehouse.
    Warehouse,

    /// Applies to members of a customer group.
    CustomerGroup,
}

impl ScopeKind {
    /// Rank used to break ties between equal discounts; higher is more specific. Product beats
    /// category, then brand, supplier, warehouse and customer group, with global last.
    #[must_use]
    pub const fn specificity(self) -> u8 {
        match self {
            Self::Product => 6,
            Self::Category => 5,
            Self::Brand => 4,
            Self::Supplier => 3,
            Self::Warehouse => 2,
            Self::CustomerGroup => 1,
            Self::Global => 0,
        }
    }

    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Global => "GLOBAL",
            Self::Category => "CATEGORY",
            Self::Product => "PRODUCT",
            Self::Brand => "BRAND",
            Self::Supplier => "SUPPLIER",
            Self::Warehouse => "WAREHOUSE",
            Self::CustomerGroup => "CUSTOMER_GROUP",
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which lines a discount applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscountScope {
    /// Every line.
    Global,

    /// Lines whose product is in the category.
    Category(CategoryUuid),

    /// Lines for any of the listed products.
    Product(SmallVec<[ProductUuid; 4]>),

    /// Lines whose product carries the brand.
    Brand(BrandUuid),

    /// Lines whose product ships from the supplier by default.
    Supplier(SupplierUuid),

    /// Lines whose product is stocked in the warehouse by default.
    Warehouse(WarehouseUuid),

    /// Lines bought by members of the group.
    CustomerGroup(GroupUuid),
}

impl DiscountScope {
    /// Whether the scope covers the line described by `ctx`.
    #[must_use]
    pub fn matches(&self, ctx: &DiscountContext) -> bool {
        match self {
            Self::Global => true,
            Self::Category(category) => ctx.categories.contains(category),
            Self::Product(products) => products.contains(&ctx.item.product),
            Self::Brand(brand) => ctx.brand == Some(*brand),
            Self::Supplier(supplier) => ctx.supplier == Some(*supplier),
            Self::Warehouse(warehouse) => ctx.warehouse == Some(*warehouse),
            Self::CustomerGroup(group) => ctx.groups.contains(group),
        }
    }

    /// The scope's kind.
    #[must_use]
    pub const fn kind(&self) -> ScopeKind {
        match self {
            Self::Global => ScopeKind::Global,
            Self::Category(_) => ScopeKind::Category,
            Self::Product(_) => ScopeKind::Product,
            Self::Brand(_) => ScopeKind::Brand,
            Self::Supplier(_) => ScopeKind::Supplier,
            Self::Warehouse(_) => ScopeKind::Warehouse,
            Self::CustomerGroup(_) => ScopeKind::CustomerGroup,
        }
    }
}

/// Who a discount is offered to. Empty lists admit everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applicability {
    /// Admitted account classes
    pub account_classes: SmallVec<[AccountClass; 3]>,

    /// Admitted loyalty tiers
    pub loyalty_tiers: SmallVec<[LoyaltyTier; 5]>,
}

impl Applicability {
    /// Admit every account.
    #[must_use]
    pub fn everyone() -> Self {
        Self::default()
    }

    /// Admit only the given account classes.
    #[must_use]
    pub fn classes(classes: &[AccountClass]) -> Self {
        Self {
            account_classes: SmallVec::from_slice(classes),
            loyalty_tiers: SmallVec::new(),
        }
    }

    /// Restrict to the given loyalty tiers.
    #[must_use]
    pub fn with_tiers(mut self, tiers: &[LoyaltyTier]) -> Self {
        self.loyalty_tiers = SmallVec::from_slice(tiers);
        self
    }

    /// Check the purchaser is admitted.
    ///
    /// A tier restriction rejects purchasers with no loyalty tier.
    ///
    /// # Errors
    ///
    /// Returns the reason the purchaser is excluded.
    pub fn check(
        &self,
        class: AccountClass,
        tier: Option<LoyaltyTier>,
    ) -> Result<(), RejectionReason> {
        if !self.account_classes.is_empty() && !self.account_classes.contains(&class) {
            return Err(RejectionReason::WrongAccountClass);
        }

        let tier_admitted = self.loyalty_tiers.is_empty()
            || tier.is_some_and(|tier| self.loyalty_tiers.contains(&tier));

        if tier_admitted {
            Ok(())
        } else {
            Err(RejectionReason::WrongLoyaltyTier)
        }
    }
}

/// Redemption limits for a discount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageLimits {
    /// Maximum redemptions across all customers
    pub total: Option<u32>,

    /// Maximum redemptions per customer
    pub per_customer: Option<u32>,
}

impl UsageLimits {
    /// No limits.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            total: None,
            per_customer: None,
        }
    }

    /// Limit total redemptions only.
    #[must_use]
    pub const fn with_total(limit: u32) -> Self {
        Self {
            total: Some(limit),
            per_customer: None,
        }
    }

    /// Limit redemptions per customer only.
    #[must_use]
    pub const fn with_per_customer(limit: u32) -> Self {
        Self {
            total: None,
            per_customer: Some(limit),
        }
    }

    /// Whether `usage_count` has used up the total limit.
    #[must_use]
    pub fn exhausted(&self, usage_count: u32) -> bool {
        self.total.is_some_and(|limit| usage_count >= limit)
    }
}

/// A discount configured by an administrator.
#[derive(Debug, Clone)]
pub struct DiscountRecord {
    /// Record id
    pub uuid: DiscountUuid,

    /// Display name
    pub name: String,

    /// Which lines it applies to
    pub scope: DiscountScope,

    /// What it does
    pub kind: DiscountKind,

    /// Minimum cart subtotal required
    pub min_purchase: Option<Price>,

    /// Cap on the discount amount for an order
    pub max_discount: Option<Price>,

    /// Redemption limits
    pub limits: UsageLimits,

    /// Redemptions so far
    pub usage_count: u32,

    /// When it is valid
    pub window: ValidityWindow,

    /// Who it is offered to
    pub applicability: Applicability,

    /// Administrative on/off switch
    pub active: bool,
}

impl DiscountRecord {
    /// Create an active, unrestricted record with a fresh id.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        scope: DiscountScope,
        kind: DiscountKind,
        window: ValidityWindow,
    ) -> Self {
        Self {
            uuid: DiscountUuid::new(),
            name: name.into(),
            scope,
            kind,
            min_purchase: None,
            max_discount: None,
            limits: UsageLimits::unlimited(),
            usage_count: 0,
            window,
            applicability: Applicability::everyone(),
            active: true,
        }
    }

    /// Set the record id.
    #[must_use]
    pub fn with_uuid(mut self, uuid: DiscountUuid) -> Self {
        self.uuid = uuid;
        self
    }

    /// Require a minimum cart subtotal.
    #[must_use]
    pub fn with_min_purchase(mut self, amount: Price) -> Self {
        self.min_purchase = Some(amount);
        self
    }

    /// Cap the discount amount.
    #[must_use]
    pub fn with_max_discount(mut self, amount: Price) -> Self {
        self.max_discount = Some(amount);
        self
    }

    /// Set redemption limits and the current usage count.
    #[must_use]
    pub fn with_limits(mut self, limits: UsageLimits, usage_count: u32) -> Self {
        self.limits = limits;
        self.usage_count = usage_count;
        self
    }

    /// Restrict who the discount is offered to.
    #[must_use]
    pub fn with_applicability(mut self, applicability: Applicability) -> Self {
        self.applicability = applicability;
        self
    }

    /// Switch the record off.
    #[must_use]
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// Check every eligibility rule against the line.
    ///
    /// `customer_redemptions` is how often the purchasing customer has already redeemed the
    /// record; pass zero for anonymous purchasers.
    ///
    /// # Errors
    ///
    /// Returns the first rule the line fails, in the order shoppers are told about them.
    pub fn check(
        &self,
        ctx: &DiscountContext,
        customer_redemptions: u32,
    ) -> Result<(), RejectionReason> {
        if !self.active {
            return Err(RejectionReason::Inactive);
        }

        match self.window.status(ctx.now) {
            WindowStatus::NotYetActive => return Err(RejectionReason::NotYetActive),
            WindowStatus::Expired => return Err(RejectionReason::Expired),
            WindowStatus::Active => {}
        }

        if self.limits.exhausted(self.usage_count) {
            return Err(RejectionReason::UsageExhausted);
        }

        if self
            .limits
            .per_customer
            .is_some_and(|limit| customer_redemptions >= limit)
        {
            return Err(RejectionReason::PerCustomerLimit);
        }

        if self
            .min_purchase
            .is_some_and(|min| ctx.subtotal_so_far.to_minor_units() < min.to_minor_units())
        {
            return Err(RejectionReason::BelowMinimum);
        }

        self.applicability.check(ctx.account_class, ctx.loyalty_tier)?;

        if self.scope.matches(ctx) {
            Ok(())
        } else {
            Err(RejectionReason::NotApplicable)
        }
    }

    /// The most this record may take off a whole order: the fixed amount, or the percentage's
    /// `max_discount`. `None` when only the line subtotal bounds it.
    #[must_use]
    pub fn order_cap(&self) -> Option<Price> {
        match &self.kind {
            DiscountKind::FixedAmount(amount) => Some(*amount),
            DiscountKind::Percentage(_) => self.max_discount,
            DiscountKind::FreeShipping => None,
        }
    }

    /// The discount this record gives on a line subtotal.
    ///
    /// Percentages are capped by `max_discount`; fixed amounts never exceed the subtotal;
    /// free shipping is always zero.
    ///
    /// # Errors
    ///
    /// Returns an error when the percentage cannot be computed or currencies differ.
    pub fn amount_for(&self, line_subtotal: &Price) -> Result<Price, DiscountError> {
        let currency = line_subtotal.currency();
        let subtotal_minor = line_subtotal.to_minor_units();

        let amount_minor = match &self.kind {
            DiscountKind::Percentage(percent) => {
                let amount = percent_of_minor(percent, subtotal_minor)?;

                match &self.max_discount {
                    Some(cap) => {
                        ensure_currency(cap, currency)?;
                        amount.min(cap.to_minor_units())
                    }
                    None => amount,
                }
            }
            DiscountKind::FixedAmount(amount) => {
                ensure_currency(amount, currency)?;
                amount.to_minor_units().min(subtotal_minor)
            }
            DiscountKind::FreeShipping => 0,
        };

        Ok(Money::from_minor(amount_minor.max(0), currency))
    }
}
