//! Lattice pricing prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    accounts::{AccountClass, CustomerUuid, GroupUuid, LoyaltyTier},
    breakdown::{BreakdownError, BreakdownView, PriceBreakdown},
    catalog::{CatalogError, InMemoryCatalog, PricingCatalog},
    commit::{CommitError, UsageCounter, UsageIntent, UsageLedger},
    discounts::{
        Applicability, DiscountError, DiscountKind, DiscountRecord, DiscountScope, DiscountUuid,
        UsageLimits,
        candidates::{CandidateSource, RejectionReason},
        coupons::{Coupon, CouponCode},
        flash::{FlashSale, FlashSaleItem},
    },
    engine::{CartLine, CartQuote, LineRequest, PricingEngine, PricingError, Purchaser},
    fixtures::{Fixture, FixtureError},
    prices::{Price, PriceError},
    products::{
        BrandUuid, CategoryUuid, ItemRef, ProductPriceFacts, ProductUuid, SupplierUuid,
        VariantUuid, WarehouseUuid,
    },
    rates::ListPriceSource,
    stacking::{OrderAllowance, ResolvedDiscount},
    tiers::{QuantityRange, TierError, TierRow},
    windows::ValidityWindow,
};
