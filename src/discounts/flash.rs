//! Flash Sales
//!
//! Time-boxed direct price overrides. A flash sale item replaces the line's unit price and is
//! exclusive of every other discount.

use std::cmp::Ordering;

use crate::{
    discounts::{
        Applicability,
        candidates::{CandidateOffer, CandidateSet, CandidateSource, RejectionReason},
        query::DiscountContext,
    },
    prices::Price,
    products::ItemRef,
    uuids::TypedUuid,
    windows::{ValidityWindow, WindowStatus},
};

/// Flash sale id.
pub type FlashSaleUuid = TypedUuid<FlashSale>;

/// Flash sale item id.
pub type FlashItemUuid = TypedUuid<FlashSaleItem>;

/// A flash sale event grouping one or more discounted items.
#[derive(Debug, Clone)]
pub struct FlashSale {
    /// Sale id
    pub uuid: FlashSaleUuid,

    /// Display name
    pub name: String,

    /// When the sale runs
    pub window: ValidityWindow,

    /// Administrative on/off switch
    pub active: bool,

    /// Higher priorities win between equally priced items
    pub priority: i32,

    /// Who the sale is offered to
    pub applicability: Applicability,
}

impl FlashSale {
    /// Create an active sale open to everyone.
    #[must_use]
    pub fn new(name: impl Into<String>, window: ValidityWindow) -> Self {
        Self {
            uuid: FlashSaleUuid::new(),
            name: name.into(),
            window,
            active: true,
            priority: 0,
            applicability: Applicability::everyone(),
        }
    }
}

/// One item's price inside a flash sale.
#[derive(Debug, Clone, PartialEq)]
pub struct FlashSaleItem {
    /// Item entry id
    pub uuid: FlashItemUuid,

    /// Parent sale
    pub sale: FlashSaleUuid,

    /// The discounted item. A product-level entry covers every variant.
    pub item: ItemRef,

    /// Price shown as struck through
    pub original_price: Price,

    /// Price charged during the sale
    pub sale_price: Price,

    /// Units available across all customers
    pub max_quantity: Option<u32>,

    /// Units sold so far
    pub sold_quantity: u32,
}

impl FlashSaleItem {
    /// Create an uncapped entry for `item` in `sale`.
    #[must_use]
    pub fn new(sale: &FlashSale, item: ItemRef, original_price: Price, sale_price: Price) -> Self {
        Self {
            uuid: FlashItemUuid::new(),
            sale: sale.uuid,
            item,
            original_price,
            sale_price,
            max_quantity: None,
            sold_quantity: 0,
        }
    }

    /// Cap the units available and set how many have sold.
    #[must_use]
    pub fn with_allocation(mut self, max_quantity: u32, sold_quantity: u32) -> Self {
        self.max_quantity = Some(max_quantity);
        self.sold_quantity = sold_quantity;
        self
    }

    /// Units still available, `None` when uncapped.
    #[must_use]
    pub fn remaining(&self) -> Option<u32> {
        self.max_quantity
            .map(|max| max.saturating_sub(self.sold_quantity))
    }

    /// Whether the entry covers `item`.
    #[must_use]
    pub fn covers(&self, item: ItemRef) -> bool {
        self.item.product == item.product
            && self.item.variant.is_none_or(|variant| item.variant == Some(variant))
    }
}

/// A flash sale item together with its parent sale.
#[derive(Debug, Clone)]
pub struct FlashListing {
    /// Parent sale
    pub sale: FlashSale,

    /// The item entry
    pub item: FlashSaleItem,
}

impl FlashListing {
    /// Source entry for breakdowns.
    #[must_use]
    pub fn source(&self) -> CandidateSource {
        CandidateSource::FlashSale {
            uuid: self.sale.uuid,
            name: self.sale.name.clone(),
        }
    }

    /// Check the listing can price the line.
    ///
    /// # Errors
    ///
    /// Returns the first rule the listing fails.
    pub fn check(&self, ctx: &DiscountContext) -> Result<(), RejectionReason> {
        if !self.sale.active {
            return Err(RejectionReason::Inactive);
        }

        match self.sale.window.status(ctx.now) {
            WindowStatus::NotYetActive => return Err(RejectionReason::NotYetActive),
            WindowStatus::Expired => return Err(RejectionReason::Expired),
            WindowStatus::Active => {}
        }

        if self.item.remaining() == Some(0) {
            return Err(RejectionReason::SoldOut);
        }

        self.sale
            .applicability
            .check(ctx.account_class, ctx.loyalty_tier)?;

        if self.item.covers(ctx.item) {
            Ok(())
        } else {
            Err(RejectionReason::NotApplicable)
        }
    }
}

/// Order flash items so the preferred one sorts first: lowest sale price, then higher sale
/// priority, then lower item id.
#[must_use]
pub fn preference(a: (&FlashSaleItem, i32), b: (&FlashSaleItem, i32)) -> Ordering {
    let (a_item, a_priority) = a;
    let (b_item, b_priority) = b;

    a_item
        .sale_price
        .to_minor_units()
        .cmp(&b_item.sale_price.to_minor_units())
        .then_with(|| b_priority.cmp(&a_priority))
        .then_with(|| a_item.uuid.cmp(&b_item.uuid))
}

/// Evaluate flash listings for a line and record each verdict in `set`.
pub fn evaluate_flash(set: &mut CandidateSet, listings: Vec<FlashListing>, ctx: &DiscountContext) {
    for listing in listings {
        let verdict = listing.check(ctx);
        let source = listing.source();

        set.push(source, CandidateOffer::Flash(listing), verdict);
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::USD};
    use testresult::TestResult;

    use crate::{
        accounts::{AccountClass, LoyaltyTier},
        products::{ProductUuid, VariantUuid},
    };

    use super::*;

    fn item() -> ItemRef {
        ItemRef::product(ProductUuid::from_key("widget"))
    }

    fn context() -> TestResult<DiscountContext> {
        Ok(DiscountContext::new(
            item(),
            AccountClass::Consumer,
            Money::from_minor(10_000, USD),
            "2026-05-10T12:00:00Z".parse()?,
        ))
    }

    fn listing() -> TestResult<FlashListing> {
        let sale = FlashSale::new(
            "Midnight madness",
            ValidityWindow::new(
                "2026-05-10T00:00:00Z".parse()?,
                Some("2026-05-11T00:00:00Z".parse()?),
            )?,
        );

        let item = FlashSaleItem::new(
            &sale,
            item(),
            Money::from_minor(4000, USD),
            Money::from_minor(2500, USD),
        );

        Ok(FlashListing { sale, item })
    }

    #[test]
    fn active_listing_passes() -> TestResult {
        assert_eq!(listing()?.check(&context()?), Ok(()));

        Ok(())
    }

    #[test]
    fn sold_out_listing_is_rejected() -> TestResult {
        let mut listing = listing()?;
        listing.item = listing.item.with_allocation(10, 10);

        assert_eq!(listing.check(&context()?), Err(RejectionReason::SoldOut));

        listing.item.sold_quantity = 9;

        assert_eq!(listing.check(&context()?), Ok(()));

        Ok(())
    }

    #[test]
    fn inactive_and_expired_sales_are_rejected() -> TestResult {
        let mut inactive = listing()?;
        inactive.sale.active = false;

        assert_eq!(inactive.check(&context()?), Err(RejectionReason::Inactive));

        let mut ctx = context()?;
        ctx.now = "2026-05-12T00:00:00Z".parse()?;

        assert_eq!(listing()?.check(&ctx), Err(RejectionReason::Expired));

        Ok(())
    }

    #[test]
    fn sale_applicability_is_enforced() -> TestResult {
        let mut listing = listing()?;
        listing.sale.applicability = Applicability::everyone().with_tiers(&[LoyaltyTier::Gold]);

        assert_eq!(
            listing.check(&context()?),
            Err(RejectionReason::WrongLoyaltyTier)
        );

        Ok(())
    }

    #[test]
    fn variant_entry_only_covers_that_variant() -> TestResult {
        let mut listing = listing()?;
        let blue = VariantUuid::from_key("blue");
        listing.item.item = ItemRef::variant(item().product, blue);

        assert_eq!(listing.check(&context()?), Err(RejectionReason::NotApplicable));

        let mut ctx = context()?;
        ctx.item = ItemRef::variant(item().product, blue);

        assert_eq!(listing.check(&ctx), Ok(()));

        Ok(())
    }

    #[test]
    fn preference_orders_by_price_then_priority() -> TestResult {
        let cheap = listing()?;
        let mut dear = listing()?;
        dear.item.sale_price = Money::from_minor(2600, USD);

        assert_eq!(
            preference((&cheap.item, 0), (&dear.item, 5)),
            Ordering::Less
        );

        let mut same = listing()?;
        same.item.uuid = cheap.item.uuid;

        assert_eq!(
            preference((&cheap.item, 1), (&same.item, 2)),
            Ordering::Greater
        );

        Ok(())
    }
}
