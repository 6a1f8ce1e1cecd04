//! Pricing Engine
//!
//! Prices a line end to end: rate table, tier resolver, discount catalog query, stacking
//! resolver and compositor. The engine only reads from its catalog; the same request at the same
//! instant always produces the same breakdown.

use jiff::Timestamp;
use rusty_money::Money;
use smallvec::SmallVec;
use thiserror::Error;
use tracing::{Span, debug, info};

use crate::{
    accounts::{AccountClass, CustomerUuid, GroupUuid, LoyaltyTier},
    breakdown::PriceBreakdown,
    catalog::{CatalogError, PricingCatalog},
    commit::{CommitError, UsageIntent, UsageLedger, reconfirm},
    compositor::{BasePricing, ComposeError, compose},
    discounts::{
        DiscountError,
        coupons::CouponCode,
        query::{DiscountContext, find_candidates},
    },
    prices::{Price, PriceError, ensure_currency, format_amount, times},
    products::{ItemRef, ProductPriceFacts},
    rates::resolve_list_price,
    stacking::{OrderAllowance, resolve_best},
    tiers::{AppliedTier, TierError, resolve_tier_for_groups},
};

/// Errors from pricing a line or cart.
#[derive(Debug, Error)]
pub enum PricingError {
    /// Lines must have at least one unit.
    #[error("quantity must be greater than zero")]
    ZeroQuantity,

    /// Carts must have at least one line.
    #[error("cart has no lines")]
    EmptyCart,

    /// The catalog has no price facts for the item.
    #[error("no price facts for {0:?}")]
    MissingPriceFacts(ItemRef),

    /// Price fields, tiers or the request disagree on currency.
    #[error("inconsistent currency")]
    Currency(#[source] PriceError),

    /// Tier data is invalid.
    #[error(transparent)]
    Tier(#[from] TierError),

    /// A catalog lookup failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Discount arithmetic failed.
    #[error(transparent)]
    Discount(#[from] DiscountError),

    /// Composing the line failed.
    #[error(transparent)]
    Compose(#[from] ComposeError),

    /// Confirming or committing the order failed.
    #[error(transparent)]
    Commit(#[from] CommitError),
}

impl PricingError {
    /// Whether the error points at bad catalog data rather than a bad request or outage.
    #[must_use]
    pub const fn is_configuration_fault(&self) -> bool {
        matches!(
            self,
            Self::MissingPriceFacts(_)
                | Self::Currency(_)
                | Self::Tier(_)
                | Self::Discount(DiscountError::Price(PriceError::CurrencyMismatch { .. }))
        )
    }

    /// Whether re-pricing and retrying may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Commit(error) => error.is_retryable(),
            _ => false,
        }
    }
}

/// Who is buying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchaser {
    /// Account class
    pub account_class: AccountClass,

    /// Loyalty tier
    pub loyalty_tier: Option<LoyaltyTier>,

    /// Customer group memberships
    pub groups: SmallVec<[GroupUuid; 4]>,

    /// Coupon code supplied at checkout
    pub coupon: Option<CouponCode>,

    /// Identified customer, for per-customer limits
    pub customer: Option<CustomerUuid>,
}

impl Purchaser {
    /// An anonymous purchaser of `account_class`.
    #[must_use]
    pub fn new(account_class: AccountClass) -> Self {
        Self {
            account_class,
            loyalty_tier: None,
            groups: SmallVec::new(),
            coupon: None,
            customer: None,
        }
    }

    /// Set the loyalty tier.
    #[must_use]
    pub fn with_loyalty_tier(mut self, tier: LoyaltyTier) -> Self {
        self.loyalty_tier = Some(tier);
        self
    }

    /// Add a group membership.
    #[must_use]
    pub fn with_group(mut self, group: GroupUuid) -> Self {
        self.groups.push(group);
        self
    }

    /// Supply a coupon code.
    #[must_use]
    pub fn with_coupon(mut self, code: CouponCode) -> Self {
        self.coupon = Some(code);
        self
    }

    /// Identify the customer.
    #[must_use]
    pub fn with_customer(mut self, customer: CustomerUuid) -> Self {
        self.customer = Some(customer);
        self
    }
}

/// A request to price one line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineRequest {
    /// Item to price
    pub item: ItemRef,

    /// Units requested
    pub quantity: u32,

    /// Who is buying
    pub purchaser: Purchaser,

    /// Cart subtotal used for minimum purchase checks
    pub subtotal_so_far: Price,

    /// Evaluation instant
    pub now: Timestamp,
}

/// A cart line to price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    /// Item to price
    pub item: ItemRef,

    /// Units requested
    pub quantity: u32,
}

/// A priced cart.
#[derive(Debug, Clone, PartialEq)]
pub struct CartQuote {
    /// Pre-discount cart subtotal, used as every line's subtotal so far
    pub subtotal: Price,

    /// Priced lines, in request order
    pub lines: Vec<PriceBreakdown>,

    /// Sum of line totals
    pub total: Price,
}

impl CartQuote {
    /// Whether any line ships free.
    #[must_use]
    pub fn free_shipping(&self) -> bool {
        self.lines.iter().any(PriceBreakdown::free_shipping)
    }

    /// The usage counters the whole cart would consume.
    #[must_use]
    pub fn usage_intent(&self, customer: Option<CustomerUuid>) -> UsageIntent {
        let mut intent = UsageIntent {
            customer,
            ..UsageIntent::default()
        };

        for line in &self.lines {
            intent.merge(&line.usage_intent(customer));
        }

        intent
    }
}

/// The price and discount resolution engine.
#[derive(Debug, Clone)]
pub struct PricingEngine<C> {
    catalog: C,
}

impl<C: PricingCatalog> PricingEngine<C> {
    /// Create an engine over `catalog`.
    #[must_use]
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// The catalog the engine reads from.
    #[must_use]
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    fn price_facts(&self, item: ItemRef) -> Result<ProductPriceFacts, PricingError> {
        let facts = self
            .catalog
            .price_facts(item)?
            .ok_or(PricingError::MissingPriceFacts(item))?;

        facts.validate().map_err(PricingError::Currency)?;

        Ok(facts)
    }

    fn applied_tier(
        &self,
        item: ItemRef,
        groups: &[GroupUuid],
        quantity: u32,
    ) -> Result<Option<AppliedTier>, PricingError> {
        let rows = self.catalog.tier_rows(item, groups)?;

        if let Some(row) = resolve_tier_for_groups(&rows, item, groups, quantity)? {
            return Ok(Some(AppliedTier::from(row)));
        }

        // Variants without their own tiers use the product's.
        if item.variant.is_none() {
            return Ok(None);
        }

        let product = ItemRef::product(item.product);
        let rows = self.catalog.tier_rows(product, groups)?;

        Ok(resolve_tier_for_groups(&rows, product, groups, quantity)?.map(AppliedTier::from))
    }

    /// The pre-discount pricing for `quantity` units of `item`.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] when the item has no price facts, its data is inconsistent, or
    /// a lookup fails.
    pub fn base_pricing(
        &self,
        item: ItemRef,
        purchaser: &Purchaser,
        quantity: u32,
        now: Timestamp,
    ) -> Result<(BasePricing, ProductPriceFacts), PricingError> {
        if quantity == 0 {
            return Err(PricingError::ZeroQuantity);
        }

        let facts = self.price_facts(item)?;
        let list = resolve_list_price(&facts, purchaser.account_class, now);
        let tier = self.applied_tier(item, &purchaser.groups, quantity)?;

        if let Some(tier) = &tier {
            ensure_currency(&tier.price, facts.currency()).map_err(PricingError::Currency)?;
        }

        Ok((BasePricing { list, tier }, facts))
    }

    /// Price one line.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::ZeroQuantity`] before any lookup for a zero quantity, and a
    /// configuration fault when catalog data is missing or inconsistent. A rejected coupon is not
    /// an error; its reason is reported in the breakdown.
    pub fn price_line(&self, request: &LineRequest) -> Result<PriceBreakdown, PricingError> {
        self.price_order_line(request, &OrderAllowance::default())
    }

    #[tracing::instrument(
        name = "pricing.engine.price_line",
        skip(self, request, allowance),
        fields(
            item = ?request.item,
            quantity = request.quantity,
            account_class = %request.purchaser.account_class,
            list_price_source = tracing::field::Empty,
            tier_applied = tracing::field::Empty,
            candidate_count = tracing::field::Empty,
            line_total = tracing::field::Empty
        ),
        err
    )]
    fn price_order_line(
        &self,
        request: &LineRequest,
        allowance: &OrderAllowance,
    ) -> Result<PriceBreakdown, PricingError> {
        let (base, facts) = self.base_pricing(
            request.item,
            &request.purchaser,
            request.quantity,
            request.now,
        )?;

        ensure_currency(&request.subtotal_so_far, facts.currency())
            .map_err(PricingError::Currency)?;

        let span = Span::current();

        span.record("list_price_source", base.list.source.as_str());

        if let Some(tier) = &base.tier {
            span.record("tier_applied", tracing::field::display(tier.describe()));
        }

        let purchaser = &request.purchaser;

        let mut ctx = DiscountContext::new(
            request.item,
            purchaser.account_class,
            request.subtotal_so_far,
            request.now,
        )
        .with_item_facts(&facts);

        ctx.loyalty_tier = purchaser.loyalty_tier;
        ctx.groups.clone_from(&purchaser.groups);
        ctx.coupon.clone_from(&purchaser.coupon);
        ctx.customer = purchaser.customer;

        let candidates = find_candidates(&self.catalog, &ctx)?;
        let coupon_rejection = candidates.coupon_rejection();

        span.record(
            "candidate_count",
            candidates.eligible.len() + candidates.rejected.len(),
        );

        let resolution =
            resolve_best(candidates, &base.unit_price(), request.quantity, allowance)?;

        if let Some(winner) = &resolution.winner {
            debug!(
                source = %winner.source().label(),
                amount = %format_amount(winner.amount()),
                "discount applied"
            );
        }

        let breakdown = compose(
            request.item,
            base,
            request.quantity,
            resolution,
            coupon_rejection,
        )?;

        span.record(
            "line_total",
            tracing::field::display(format_amount(&breakdown.line_total)),
        );

        Ok(breakdown)
    }

    /// Price every line of a cart.
    ///
    /// The cart's pre-discount subtotal is used as every line's subtotal so far, so minimum
    /// purchase rules see the whole cart. Lines are priced in order, and each sees what earlier
    /// lines took: a fixed amount or capped percentage grants its cap once per cart, and flash
    /// sale units claimed by one line are not available to the next.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::EmptyCart`] for an empty cart, or the first line's error.
    #[tracing::instrument(
        name = "pricing.engine.price_cart",
        skip(self, purchaser, lines),
        fields(
            line_count = lines.len(),
            subtotal = tracing::field::Empty,
            total = tracing::field::Empty
        ),
        err
    )]
    pub fn price_cart(
        &self,
        purchaser: &Purchaser,
        lines: &[CartLine],
        now: Timestamp,
    ) -> Result<CartQuote, PricingError> {
        let Some(first) = lines.first() else {
            return Err(PricingError::EmptyCart);
        };

        let currency = self.price_facts(first.item)?.currency();
        let mut subtotal_minor: i64 = 0;

        for line in lines {
            let (base, _) = self.base_pricing(line.item, purchaser, line.quantity, now)?;
            let unit = base.unit_price();

            ensure_currency(&unit, currency).map_err(PricingError::Currency)?;

            let line_minor = times(unit.to_minor_units(), line.quantity).map_err(ComposeError::from)?;

            subtotal_minor = subtotal_minor
                .checked_add(line_minor)
                .ok_or(ComposeError::Price(PriceError::Overflow))?;
        }

        let subtotal = Money::from_minor(subtotal_minor, currency);

        let mut allowance = OrderAllowance::default();
        let mut priced = Vec::with_capacity(lines.len());

        for line in lines {
            let breakdown = self.price_order_line(
                &LineRequest {
                    item: line.item,
                    quantity: line.quantity,
                    purchaser: purchaser.clone(),
                    subtotal_so_far: subtotal,
                    now,
                },
                &allowance,
            )?;

            if let Some(winner) = &breakdown.winning_discount {
                allowance.record(winner, breakdown.quantity);
            }

            priced.push(breakdown);
        }

        let total_minor = priced.iter().try_fold(0_i64, |total, line| {
            total
                .checked_add(line.line_total.to_minor_units())
                .ok_or(ComposeError::Price(PriceError::Overflow))
        })?;

        let total = Money::from_minor(total_minor, currency);

        let span = Span::current();

        span.record("subtotal", tracing::field::display(format_amount(&subtotal)));
        span.record("total", tracing::field::display(format_amount(&total)));

        Ok(CartQuote {
            subtotal,
            lines: priced,
            total,
        })
    }

    /// Re-price a line and check it still matches the quote.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError::PriceChanged`] (retryable) when the price moved since `quoted`.
    pub fn confirm(
        &self,
        request: &LineRequest,
        quoted: &PriceBreakdown,
    ) -> Result<PriceBreakdown, PricingError> {
        let current = self.price_line(request)?;

        reconfirm(quoted, &current)?;

        Ok(current)
    }

    /// Re-confirm a quoted line and atomically consume its usage counters.
    ///
    /// # Errors
    ///
    /// Returns a retryable error when the price moved or a limit was reached since the quote.
    #[tracing::instrument(
        name = "pricing.engine.commit_line",
        skip(self, ledger, request, quoted),
        fields(increments = tracing::field::Empty),
        err
    )]
    pub fn commit_line<L: UsageLedger + ?Sized>(
        &self,
        ledger: &L,
        request: &LineRequest,
        quoted: &PriceBreakdown,
    ) -> Result<UsageIntent, PricingError> {
        let current = self.confirm(request, quoted)?;
        let intent = current.usage_intent(request.purchaser.customer);

        Span::current().record("increments", intent.increments.len());

        ledger.commit(&intent)?;

        info!(line_total = %format_amount(&current.line_total), "line committed");

        Ok(intent)
    }

    /// Re-price a cart and check every line still matches the quote.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError::PriceChanged`] (retryable) when any line moved since `quoted`.
    pub fn confirm_cart(
        &self,
        purchaser: &Purchaser,
        lines: &[CartLine],
        now: Timestamp,
        quoted: &CartQuote,
    ) -> Result<CartQuote, PricingError> {
        let current = self.price_cart(purchaser, lines, now)?;

        if current.lines.len() != quoted.lines.len() {
            return Err(CommitError::PriceChanged {
                quoted: format_amount(&quoted.total),
                current: format_amount(&current.total),
            }
            .into());
        }

        for (quoted_line, current_line) in quoted.lines.iter().zip(&current.lines) {
            reconfirm(quoted_line, current_line)?;
        }

        Ok(current)
    }

    /// Re-confirm a quoted cart and atomically consume the usage counters of every line.
    ///
    /// A discount that priced several lines is redeemed once.
    ///
    /// # Errors
    ///
    /// Returns a retryable error when a price moved or a limit was reached since the quote.
    #[tracing::instrument(
        name = "pricing.engine.commit_cart",
        skip(self, ledger, purchaser, lines, quoted),
        fields(line_count = lines.len(), increments = tracing::field::Empty),
        err
    )]
    pub fn commit_cart<L: UsageLedger + ?Sized>(
        &self,
        ledger: &L,
        purchaser: &Purchaser,
        lines: &[CartLine],
        now: Timestamp,
        quoted: &CartQuote,
    ) -> Result<UsageIntent, PricingError> {
        let current = self.confirm_cart(purchaser, lines, now, quoted)?;
        let intent = current.usage_intent(purchaser.customer);

        Span::current().record("increments", intent.increments.len());

        ledger.commit(&intent)?;

        info!(total = %format_amount(&current.total), "cart committed");

        Ok(intent)
    }
}
