//! Integration tests pricing lines against the storefront catalog fixture.
//!
//! The fixture carries:
//!
//! - Widget: list $40.00, volume buyer $36.00, government $32.00, in "hardware"
//!   - GSA schedule tier: 5+ at $30.00
//!   - Everyone tiers: 10-49 at $35.00, 50+ at $33.00
//! - Gadget: list $100.00, in "hardware"
//! - Lantern: list $60.00, on sale at $48.00 through May 2026
//! - Tent: list $250.00, flash sale at $199.00 on 1-2 June 2026 (20 units, 5 sold)
//! - Camp stove: list $80.00, in "outdoor", Trailhead brand from Northwind, ships from east
//! - Automatic discounts: $5 off gadgets, $7.50 off hardware over $75, trade club 10% for volume
//!   buyers, Trailhead 8%, $6.40 east warehouse clearance, $5 off Northwind, free shipping for
//!   gold members and above
//! - Coupons: SAVE20 (20% off capped at $10, $50 minimum, once per customer), SHIPFREE

use jiff::Timestamp;
use rusty_money::{Money, iso::USD};
use testresult::TestResult;

use lattice_pricing::{
    accounts::{AccountClass, CustomerUuid, LoyaltyTier},
    breakdown::PriceBreakdown,
    catalog::InMemoryCatalog,
    commit::{CommitError, UsageCounter, UsageIncrement, UsageLedger},
    discounts::{
        DiscountUuid,
        candidates::{CandidateSource, RejectionReason},
    },
    engine::{CartLine, LineRequest, PricingEngine, PricingError, Purchaser},
    fixtures::Fixture,
    prices::format_amount,
    products::ItemRef,
    rates::ListPriceSource,
    stacking::ResolvedDiscount,
};

const STOREFRONT: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/fixtures/catalogs/storefront.yml"
);

struct Storefront {
    fixture: Fixture,
}

impl Storefront {
    fn load() -> TestResult<Self> {
        Ok(Self {
            fixture: Fixture::load(STOREFRONT)?,
        })
    }

    fn item(&self, product: &str) -> TestResult<ItemRef> {
        Ok(self.fixture.keys().item(product, None)?)
    }

    fn purchaser(&self, class: AccountClass, groups: &[&str]) -> TestResult<Purchaser> {
        let mut purchaser = Purchaser::new(class);

        for group in groups {
            purchaser = purchaser.with_group(self.fixture.keys().group(group)?);
        }

        Ok(purchaser)
    }

    fn engine(self) -> PricingEngine<InMemoryCatalog> {
        PricingEngine::new(self.fixture.into_catalog())
    }
}

fn at(timestamp: &str) -> TestResult<Timestamp> {
    Ok(timestamp.parse()?)
}

fn request(
    item: ItemRef,
    quantity: u32,
    purchaser: Purchaser,
    subtotal_minor: i64,
    now: &str,
) -> TestResult<LineRequest> {
    Ok(LineRequest {
        item,
        quantity,
        purchaser,
        subtotal_so_far: Money::from_minor(subtotal_minor, USD),
        now: at(now)?,
    })
}

fn winner_name(breakdown: &PriceBreakdown) -> Option<String> {
    match breakdown.winning_source()? {
        CandidateSource::Discount { name, .. } | CandidateSource::FlashSale { name, .. } => {
            Some(name.clone())
        }
        CandidateSource::Coupon { code, .. } => Some(code.to_string()),
    }
}

#[test]
fn government_tier_overrides_class_price() -> TestResult {
    let store = Storefront::load()?;
    let item = store.item("widget")?;
    let purchaser = store.purchaser(AccountClass::Government, &["gsa-schedule"])?;
    let engine = store.engine();

    let breakdown = engine.price_line(&request(
        item,
        5,
        purchaser,
        15_000,
        "2026-03-01T12:00:00Z",
    )?)?;

    assert_eq!(breakdown.list_price, Money::from_minor(3200, USD));
    assert_eq!(breakdown.list_price_source, ListPriceSource::Government);
    assert_eq!(
        breakdown.tier_applied.as_ref().map(|tier| tier.price),
        Some(Money::from_minor(3000, USD))
    );
    assert_eq!(format_amount(&breakdown.final_unit_price), "30.00");
    assert_eq!(format_amount(&breakdown.line_total), "150.00");

    Ok(())
}

#[test]
fn below_tier_quantity_uses_class_price() -> TestResult {
    let store = Storefront::load()?;
    let item = store.item("widget")?;
    let purchaser = store.purchaser(AccountClass::Government, &["gsa-schedule"])?;
    let engine = store.engine();

    let breakdown = engine.price_line(&request(
        item,
        4,
        purchaser,
        12_800,
        "2026-03-01T12:00:00Z",
    )?)?;

    assert!(breakdown.tier_applied.is_none());
    assert_eq!(format_amount(&breakdown.line_total), "128.00");

    Ok(())
}

#[test]
fn larger_fixed_discount_wins() -> TestResult {
    let store = Storefront::load()?;
    let item = store.item("gadget")?;
    let purchaser = store.purchaser(AccountClass::Consumer, &[])?;
    let engine = store.engine();

    let quote = engine.price_cart(
        &purchaser,
        &[CartLine { item, quantity: 1 }],
        at("2026-03-01T12:00:00Z")?,
    )?;

    let breakdown = quote.lines.first().ok_or("expected a priced line")?;

    assert_eq!(
        winner_name(breakdown).as_deref(),
        Some("$7.50 off hardware")
    );
    assert_eq!(format_amount(&breakdown.line_discount), "7.50");
    assert_eq!(format_amount(&breakdown.line_total), "92.50");
    // $5 off gadgets, $7.50 off hardware, and gold free shipping rejected for the tier
    assert_eq!(breakdown.candidates_considered.len(), 3);
    assert_eq!(quote.total, breakdown.line_total);

    Ok(())
}

#[test]
fn coupon_minimum_purchase_is_inclusive() -> TestResult {
    let store = Storefront::load()?;
    let item = store.item("widget")?;
    let purchaser = store
        .purchaser(AccountClass::Consumer, &[])?
        .with_coupon("save20".parse()?);
    let engine = store.engine();

    let below = engine.price_line(&request(
        item,
        1,
        purchaser.clone(),
        4999,
        "2026-03-01T12:00:00Z",
    )?)?;

    assert_eq!(below.coupon_rejection, Some(RejectionReason::BelowMinimum));
    assert!(below.winning_discount.is_none());
    assert_eq!(format_amount(&below.line_total), "40.00");

    let at_minimum = engine.price_line(&request(
        item,
        1,
        purchaser,
        5000,
        "2026-03-01T12:00:00Z",
    )?)?;

    assert_eq!(at_minimum.coupon_rejection, None);
    assert_eq!(winner_name(&at_minimum).as_deref(), Some("SAVE20"));
    assert_eq!(format_amount(&at_minimum.line_total), "32.00");

    Ok(())
}

#[test]
fn percentage_coupon_is_capped() -> TestResult {
    let store = Storefront::load()?;
    let item = store.item("gadget")?;
    let purchaser = store
        .purchaser(AccountClass::Consumer, &[])?
        .with_coupon("SAVE20".parse()?);
    let engine = store.engine();

    let breakdown = engine.price_line(&request(
        item,
        1,
        purchaser,
        10_000,
        "2026-03-01T12:00:00Z",
    )?)?;

    assert_eq!(
        breakdown.winning_discount.as_ref().map(|winner| *winner.amount()),
        Some(Money::from_minor(1000, USD))
    );
    assert_eq!(format_amount(&breakdown.line_total), "90.00");

    Ok(())
}

#[test]
fn flash_sale_excludes_every_other_discount() -> TestResult {
    let store = Storefront::load()?;
    let item = store.item("tent")?;
    let purchaser = store
        .purchaser(AccountClass::Consumer, &[])?
        .with_coupon("SAVE20".parse()?);
    let engine = store.engine();

    let breakdown = engine.price_line(&request(
        item,
        1,
        purchaser,
        25_000,
        "2026-06-02T00:00:00Z",
    )?)?;

    let Some(ResolvedDiscount::Flash { sale_price, .. }) = &breakdown.winning_discount else {
        return Err("expected the flash sale to win".into());
    };

    assert_eq!(*sale_price, Money::from_minor(19_900, USD));
    assert_eq!(format_amount(&breakdown.line_total), "199.00");

    let coupon = breakdown
        .candidates_considered
        .iter()
        .find(|candidate| candidate.source.is_coupon())
        .ok_or("expected the coupon to be considered")?;

    assert_eq!(
        coupon.rejected_reason,
        Some(RejectionReason::SupersededByFlashSale)
    );

    Ok(())
}

#[test]
fn flash_sale_outside_its_window_is_reported() -> TestResult {
    let store = Storefront::load()?;
    let item = store.item("tent")?;
    let purchaser = store.purchaser(AccountClass::Consumer, &[])?;
    let engine = store.engine();

    let breakdown = engine.price_line(&request(
        item,
        1,
        purchaser,
        25_000,
        "2026-06-03T00:00:01Z",
    )?)?;

    assert!(breakdown.winning_discount.is_none());
    assert!(breakdown.candidates_considered.iter().any(|candidate| {
        matches!(candidate.source, CandidateSource::FlashSale { .. })
            && candidate.rejected_reason == Some(RejectionReason::Expired)
    }));

    Ok(())
}

#[test]
fn sale_price_applies_inside_its_window() -> TestResult {
    let store = Storefront::load()?;
    let item = store.item("lantern")?;
    let purchaser = store.purchaser(AccountClass::Consumer, &[])?;
    let engine = store.engine();

    let in_may = engine.price_line(&request(
        item,
        1,
        purchaser.clone(),
        4800,
        "2026-05-15T00:00:00Z",
    )?)?;

    assert_eq!(in_may.list_price_source, ListPriceSource::Sale);
    assert_eq!(format_amount(&in_may.line_total), "48.00");

    let in_june = engine.price_line(&request(
        item,
        1,
        purchaser,
        6000,
        "2026-06-15T00:00:00Z",
    )?)?;

    assert_eq!(in_june.list_price_source, ListPriceSource::List);
    assert_eq!(format_amount(&in_june.line_total), "60.00");

    Ok(())
}

#[test]
fn free_shipping_does_not_displace_the_price_discount() -> TestResult {
    let store = Storefront::load()?;
    let item = store.item("gadget")?;
    let purchaser = store
        .purchaser(AccountClass::Consumer, &[])?
        .with_loyalty_tier(LoyaltyTier::Gold);
    let engine = store.engine();

    let breakdown = engine.price_line(&request(
        item,
        1,
        purchaser,
        10_000,
        "2026-03-01T12:00:00Z",
    )?)?;

    assert!(breakdown.free_shipping());
    assert_eq!(
        winner_name(&breakdown).as_deref(),
        Some("$7.50 off hardware")
    );
    assert_eq!(format_amount(&breakdown.line_total), "92.50");

    Ok(())
}

#[test]
fn unknown_coupon_is_reported_not_fatal() -> TestResult {
    let store = Storefront::load()?;
    let item = store.item("widget")?;
    let purchaser = store
        .purchaser(AccountClass::Consumer, &[])?
        .with_coupon("BOGUS".parse()?);
    let engine = store.engine();

    let breakdown = engine.price_line(&request(
        item,
        1,
        purchaser,
        4000,
        "2026-03-01T12:00:00Z",
    )?)?;

    assert_eq!(breakdown.coupon_rejection, Some(RejectionReason::NotFound));
    assert_eq!(format_amount(&breakdown.line_total), "40.00");

    Ok(())
}

#[test]
fn identical_inputs_give_byte_identical_json() -> TestResult {
    let store = Storefront::load()?;
    let item = store.item("widget")?;
    let purchaser = store
        .purchaser(AccountClass::Government, &["gsa-schedule"])?
        .with_coupon("SAVE20".parse()?)
        .with_loyalty_tier(LoyaltyTier::Platinum);
    let engine = store.engine();

    let line = request(item, 7, purchaser, 21_000, "2026-03-01T12:00:00Z")?;

    let first = engine.price_line(&line)?.to_json()?;
    let second = engine.price_line(&line)?.to_json()?;

    assert_eq!(first, second);
    assert!(first.contains("\"basePrice\": \"30.00\""));
    assert!(first.contains("\"lineTotal\": \"200.00\""));

    let reloaded = Storefront::load()?.engine().price_line(&line)?.to_json()?;

    assert_eq!(first, reloaded);

    Ok(())
}

#[test]
fn zero_quantity_is_rejected() -> TestResult {
    let store = Storefront::load()?;
    let item = store.item("widget")?;
    let purchaser = store.purchaser(AccountClass::Consumer, &[])?;
    let engine = store.engine();

    let result = engine.price_line(&request(item, 0, purchaser, 0, "2026-03-01T12:00:00Z")?);

    assert!(matches!(result, Err(PricingError::ZeroQuantity)));

    Ok(())
}

#[test]
fn commit_reports_limit_reached_since_quote() -> TestResult {
    let store = Storefront::load()?;
    let item = store.item("tent")?;
    let purchaser = store.purchaser(AccountClass::Consumer, &[])?;
    let engine = store.engine();

    let line = request(item, 10, purchaser, 250_000, "2026-06-02T00:00:00Z")?;

    let first_quote = engine.price_line(&line)?;
    let second_quote = engine.price_line(&line)?;

    let intent = engine.commit_line(engine.catalog(), &line, &first_quote)?;

    assert_eq!(intent.increments.len(), 1);

    // Only 5 units are left, so the flash price no longer applies.
    let repriced = engine.commit_line(engine.catalog(), &line, &second_quote);

    let Err(error) = repriced else {
        return Err("expected the second commit to fail".into());
    };

    assert!(error.is_retryable());
    assert!(matches!(
        error,
        PricingError::Commit(CommitError::PriceChanged { .. })
    ));

    // Committing the stale quote's intent directly hits the allocation.
    let stale = engine.catalog().commit(&second_quote.usage_intent(None));

    let Err(error) = stale else {
        return Err("expected the stale intent to be refused".into());
    };

    assert!(error.is_retryable());
    assert!(matches!(
        error,
        CommitError::LimitReached {
            counter: UsageCounter::FlashItem(_)
        }
    ));

    Ok(())
}

#[test]
fn flash_sale_needs_enough_units_left() -> TestResult {
    let store = Storefront::load()?;
    let item = store.item("tent")?;
    let purchaser = store.purchaser(AccountClass::Consumer, &[])?;
    let engine = store.engine();

    let too_many = engine.price_line(&request(
        item,
        16,
        purchaser.clone(),
        400_000,
        "2026-06-02T00:00:00Z",
    )?)?;

    assert!(too_many.winning_discount.is_none());
    assert!(too_many.candidates_considered.iter().any(|candidate| {
        matches!(candidate.source, CandidateSource::FlashSale { .. })
            && candidate.rejected_reason == Some(RejectionReason::InsufficientAllocation)
    }));
    assert_eq!(format_amount(&too_many.line_total), "4000.00");

    let all_left = engine.price_line(&request(
        item,
        15,
        purchaser,
        375_000,
        "2026-06-02T00:00:00Z",
    )?)?;

    assert_eq!(format_amount(&all_left.final_unit_price), "199.00");
    assert_eq!(format_amount(&all_left.line_total), "2985.00");

    Ok(())
}

#[test]
fn flash_units_are_shared_across_cart_lines() -> TestResult {
    let store = Storefront::load()?;
    let item = store.item("tent")?;
    let purchaser = store.purchaser(AccountClass::Consumer, &[])?;
    let engine = store.engine();

    let quote = engine.price_cart(
        &purchaser,
        &[
            CartLine { item, quantity: 10 },
            CartLine { item, quantity: 10 },
        ],
        at("2026-06-02T00:00:00Z")?,
    )?;

    let [first, second] = quote.lines.as_slice() else {
        return Err("expected two priced lines".into());
    };

    assert_eq!(format_amount(&first.line_total), "1990.00");
    assert!(second.winning_discount.is_none());
    assert_eq!(format_amount(&second.line_total), "2500.00");

    Ok(())
}

#[test]
fn brand_discount_outranks_equal_warehouse_discount() -> TestResult {
    let store = Storefront::load()?;
    let item = store.item("stove")?;
    let purchaser = store.purchaser(AccountClass::Consumer, &[])?;
    let engine = store.engine();

    let breakdown = engine.price_line(&request(
        item,
        1,
        purchaser,
        8000,
        "2026-03-01T12:00:00Z",
    )?)?;

    assert_eq!(winner_name(&breakdown).as_deref(), Some("Trailhead 8%"));
    assert_eq!(format_amount(&breakdown.line_discount), "6.40");
    assert_eq!(format_amount(&breakdown.line_total), "73.60");
    // Trailhead, east clearance, Northwind, and gold free shipping rejected for the tier
    assert_eq!(breakdown.candidates_considered.len(), 4);

    let supplier = breakdown
        .candidates_considered
        .iter()
        .find(|candidate| {
            matches!(
                &candidate.source,
                CandidateSource::Discount { name, .. } if name == "$5 off Northwind"
            )
        })
        .ok_or("expected the supplier discount to be considered")?;

    assert_eq!(supplier.amount, Some(Money::from_minor(500, USD)));

    Ok(())
}

#[test]
fn cart_coupon_cap_is_granted_once() -> TestResult {
    let store = Storefront::load()?;
    let widget = store.item("widget")?;
    let gadget = store.item("gadget")?;
    let purchaser = store
        .purchaser(AccountClass::Consumer, &[])?
        .with_coupon("SAVE20".parse()?)
        .with_customer(CustomerUuid::from_key("alice"));
    let engine = store.engine();

    let lines = [
        CartLine {
            item: widget,
            quantity: 2,
        },
        CartLine {
            item: gadget,
            quantity: 1,
        },
    ];
    let now = at("2026-03-01T12:00:00Z")?;

    let quote = engine.price_cart(&purchaser, &lines, now)?;

    let [widgets, gadgets] = quote.lines.as_slice() else {
        return Err("expected two priced lines".into());
    };

    assert_eq!(winner_name(widgets).as_deref(), Some("SAVE20"));
    assert_eq!(format_amount(&widgets.line_total), "70.00");

    let coupon = gadgets
        .candidates_considered
        .iter()
        .find(|candidate| candidate.source.is_coupon())
        .ok_or("expected the coupon to be considered")?;

    assert_eq!(coupon.rejected_reason, Some(RejectionReason::OrderCapReached));
    assert_eq!(
        winner_name(gadgets).as_deref(),
        Some("$7.50 off hardware")
    );
    assert_eq!(format_amount(&gadgets.line_total), "92.50");
    assert_eq!(format_amount(&quote.total), "162.50");

    let save20 = UsageCounter::Discount(DiscountUuid::from_key("coupon/SAVE20"));
    let intent = quote.usage_intent(purchaser.customer);

    assert!(intent.increments.contains(&UsageIncrement {
        counter: save20,
        amount: 1,
    }));

    let committed = engine.commit_cart(engine.catalog(), &purchaser, &lines, now, &quote)?;

    assert_eq!(committed, intent);

    let repriced = engine.price_line(&request(
        widget,
        2,
        purchaser.clone(),
        18_000,
        "2026-03-01T12:00:00Z",
    )?)?;

    assert_eq!(
        repriced.coupon_rejection,
        Some(RejectionReason::PerCustomerLimit)
    );

    let again = engine.commit_cart(engine.catalog(), &purchaser, &lines, now, &quote);

    assert!(matches!(
        again,
        Err(PricingError::Commit(CommitError::PriceChanged { .. }))
    ));

    Ok(())
}

#[test]
fn commit_reports_price_change_since_quote() -> TestResult {
    let store = Storefront::load()?;
    let item = store.item("widget")?;
    let purchaser = store
        .purchaser(AccountClass::Consumer, &[])?
        .with_coupon("SAVE20".parse()?)
        .with_customer(CustomerUuid::from_key("alice"));
    let engine = store.engine();

    let line = request(item, 1, purchaser, 5000, "2026-03-01T12:00:00Z")?;
    let quote = engine.price_line(&line)?;

    engine.commit_line(engine.catalog(), &line, &quote)?;

    let result = engine.commit_line(engine.catalog(), &line, &quote);

    let Err(error) = result else {
        return Err("expected the coupon to be used up".into());
    };

    assert!(error.is_retryable());
    assert!(matches!(
        error,
        PricingError::Commit(CommitError::PriceChanged { .. })
    ));

    let repriced = engine.price_line(&line)?;

    assert_eq!(
        repriced.coupon_rejection,
        Some(RejectionReason::PerCustomerLimit)
    );

    Ok(())
}
