//! Discount Catalog Query
//!
//! Gathers every discount that could apply to a line and sorts them into eligible and rejected
//! candidates. The query only reads; usage counters are left to the order commit.

use jiff::Timestamp;
use smallvec::SmallVec;
use tracing::debug;

use crate::{
    accounts::{AccountClass, CustomerUuid, GroupUuid, LoyaltyTier},
    catalog::{CatalogError, PricingCatalog},
    discounts::{
        DiscountUuid,
        candidates::{CandidateOffer, CandidateSet, CandidateSource},
        coupons::{CouponCode, evaluate_coupon},
        flash::evaluate_flash,
    },
    prices::Price,
    products::{BrandUuid, CategoryUuid, ItemRef, ProductPriceFacts, SupplierUuid, WarehouseUuid},
};

/// The purchasing context a line is priced in.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountContext {
    /// Item being priced
    pub item: ItemRef,

    /// Categories the item belongs to
    pub categories: SmallVec<[CategoryUuid; 4]>,

    /// Item's brand
    pub brand: Option<BrandUuid>,

    /// Item's default supplier
    pub supplier: Option<SupplierUuid>,

    /// Item's default warehouse
    pub warehouse: Option<WarehouseUuid>,

    /// Purchaser's account class
    pub account_class: AccountClass,

    /// Purchaser's loyalty tier
    pub loyalty_tier: Option<LoyaltyTier>,

    /// Groups the purchaser belongs to
    pub groups: SmallVec<[GroupUuid; 4]>,

    /// Cart subtotal used for minimum purchase checks
    pub subtotal_so_far: Price,

    /// Evaluation instant
    pub now: Timestamp,

    /// Coupon supplied by the shopper
    pub coupon: Option<CouponCode>,

    /// Identified purchaser, for per-customer limits
    pub customer: Option<CustomerUuid>,
}

impl DiscountContext {
    /// Context for an anonymous purchaser with no groups, tier or coupon.
    #[must_use]
    pub fn new(
        item: ItemRef,
        account_class: AccountClass,
        subtotal_so_far: Price,
        now: Timestamp,
    ) -> Self {
        Self {
            item,
            categories: SmallVec::new(),
            brand: None,
            supplier: None,
            warehouse: None,
            account_class,
            loyalty_tier: None,
            groups: SmallVec::new(),
            subtotal_so_far,
            now,
            coupon: None,
            customer: None,
        }
    }

    /// Take the item's categories, brand, supplier and warehouse from its price facts.
    #[must_use]
    pub fn with_item_facts(mut self, facts: &ProductPriceFacts) -> Self {
        self.categories.clone_from(&facts.categories);
        self.brand = facts.brand;
        self.supplier = facts.supplier;
        self.warehouse = facts.warehouse;
        self
    }
}

fn redemptions<C: PricingCatalog + ?Sized>(
    catalog: &C,
    ctx: &DiscountContext,
    discount: DiscountUuid,
) -> Result<u32, CatalogError> {
    ctx.customer
        .map_or(Ok(0), |customer| catalog.customer_redemptions(customer, discount))
}

/// Find the candidates for a line.
///
/// Automatic discounts whose scope does not cover the line are skipped; every other failed rule
/// is reported with its reason. A supplied coupon is always reported, as
/// [`RejectionReason::NotFound`](crate::discounts::candidates::RejectionReason::NotFound) when
/// no coupon has the code.
///
/// # Errors
///
/// Returns a [`CatalogError`] if a catalog lookup fails.
pub fn find_candidates<C: PricingCatalog + ?Sized>(
    catalog: &C,
    ctx: &DiscountContext,
) -> Result<CandidateSet, CatalogError> {
    let mut set = CandidateSet::default();

    for record in catalog.discount_records(ctx)? {
        if !record.scope.matches(ctx) {
            continue;
        }

        let verdict = record.check(ctx, redemptions(catalog, ctx, record.uuid)?);

        if let Err(reason) = verdict {
            debug!(discount = %record.uuid, %reason, "discount rejected");
        }

        let source = CandidateSource::Discount {
            uuid: record.uuid,
            name: record.name.clone(),
            scope: record.scope.kind(),
        };

        set.push(source, CandidateOffer::Discount(record), verdict);
    }

    if let Some(code) = &ctx.coupon {
        let coupon = catalog.coupon_by_code(code)?;

        let customer_redemptions = match &coupon {
            Some(coupon) => redemptions(catalog, ctx, coupon.discount.uuid)?,
            None => 0,
        };

        evaluate_coupon(&mut set, code, coupon, ctx, customer_redemptions);

        if let Some(reason) = set.coupon_rejection() {
            debug!(coupon = %code, %reason, "coupon rejected");
        }
    }

    evaluate_flash(&mut set, catalog.flash_listings(ctx.item.product)?, ctx);

    Ok(set)
}
