//! Breakdown
//!
//! The auditable result of pricing a line, with a JSON view for callers and a table for humans.

use std::io;

use serde::Serialize;
use smallvec::SmallVec;
use tabled::{
    builder::Builder,
    settings::{
        Alignment, Color, Style,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    accounts::CustomerUuid,
    commit::{UsageCounter, UsageIncrement, UsageIntent},
    discounts::candidates::{CandidateSource, RejectionReason},
    prices::{Price, format_amount},
    products::ItemRef,
    rates::ListPriceSource,
    stacking::{ConsideredCandidate, ResolvedDiscount},
    tiers::AppliedTier,
};

/// Errors from rendering a breakdown.
#[derive(Debug, Error)]
pub enum BreakdownError {
    /// Serialisation failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error")]
    IO,
}

/// Everything the engine decided about one line.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBreakdown {
    /// Item priced
    pub item: ItemRef,

    /// Units priced
    pub quantity: u32,

    /// List price for the account class
    pub list_price: Price,

    /// Field the list price came from
    pub list_price_source: ListPriceSource,

    /// Pre-discount unit price: the tier price when a tier applied, else the list price
    pub base_price: Price,

    /// Tier that replaced the list price
    pub tier_applied: Option<AppliedTier>,

    /// Every candidate discount, with its amount or rejection reason
    pub candidates_considered: Vec<ConsideredCandidate>,

    /// The discount that priced the line
    pub winning_discount: Option<ResolvedDiscount>,

    /// Free-shipping grant
    pub free_shipping: Option<CandidateSource>,

    /// Why the supplied coupon did not apply
    pub coupon_rejection: Option<RejectionReason>,

    /// `base_price * quantity`
    pub line_subtotal: Price,

    /// Discount taken off the subtotal
    pub line_discount: Price,

    /// Charged price per unit
    pub final_unit_price: Price,

    /// Charged price of the last unit
    pub last_unit_price: Price,

    /// Charged line total
    pub line_total: Price,

    /// Drift the last unit could not absorb
    pub rounding_residual: Price,
}

impl PriceBreakdown {
    /// Source of the winning discount.
    #[must_use]
    pub fn winning_source(&self) -> Option<&CandidateSource> {
        self.winning_discount.as_ref().map(ResolvedDiscount::source)
    }

    /// Whether the line ships free.
    #[must_use]
    pub const fn free_shipping(&self) -> bool {
        self.free_shipping.is_some()
    }

    /// The usage counters an order for this line would consume.
    ///
    /// A coupon or discount consumes one use; a flash sale consumes one unit per unit bought.
    /// Flash sale items are identified through the eligible candidate that won.
    #[must_use]
    pub fn usage_intent(&self, customer: Option<CustomerUuid>) -> UsageIntent {
        let mut increments: SmallVec<[UsageIncrement; 2]> = SmallVec::new();

        let discounts = [self.winning_source(), self.free_shipping.as_ref()];

        for uuid in discounts
            .into_iter()
            .flatten()
            .filter_map(CandidateSource::discount_uuid)
        {
            increments.push(UsageIncrement {
                counter: UsageCounter::Discount(uuid),
                amount: 1,
            });
        }

        if let Some(ResolvedDiscount::Flash { flash_item, .. }) = &self.winning_discount {
            increments.push(UsageIncrement {
                counter: UsageCounter::FlashItem(*flash_item),
                amount: self.quantity,
            });
        }

        UsageIntent {
            customer,
            increments,
        }
    }

    /// Serialisable view with amounts rendered at currency precision.
    #[must_use]
    pub fn view(&self) -> BreakdownView {
        BreakdownView::from(self)
    }

    /// Render the breakdown as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`BreakdownError::Json`] if serialisation fails.
    pub fn to_json(&self) -> Result<String, BreakdownError> {
        Ok(serde_json::to_string_pretty(&self.view())?)
    }

    /// Write the breakdown as a table.
    ///
    /// # Errors
    ///
    /// Returns [`BreakdownError::IO`] if writing fails.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), BreakdownError> {
        let mut builder = Builder::default();

        builder.push_record(["", "Amount", "Detail"]);
        builder.push_record([
            "List price".to_string(),
            format_amount(&self.list_price),
            self.list_price_source.as_str().to_string(),
        ]);

        if let Some(tier) = &self.tier_applied {
            builder.push_record(["Tier".to_string(), format_amount(&tier.price), tier.describe()]);
        }

        builder.push_record([
            "Subtotal".to_string(),
            format_amount(&self.line_subtotal),
            format!("{} x {}", self.quantity, format_amount(&self.base_price)),
        ]);

        for candidate in &self.candidates_considered {
            let amount = candidate
                .amount
                .as_ref()
                .map(format_amount)
                .unwrap_or_default();

            let status = match (candidate.rejected_reason, self.winning_source()) {
                (Some(reason), _) => reason.to_string(),
                (None, Some(winner)) if *winner == candidate.source => "APPLIED".to_string(),
                (None, _) => String::new(),
            };

            builder.push_record([candidate.source.label(), amount, status]);
        }

        builder.push_record([
            "Discount".to_string(),
            format_amount(&self.line_discount),
            String::new(),
        ]);
        builder.push_record([
            "Unit price".to_string(),
            format_amount(&self.final_unit_price),
            format!("last unit {}", format_amount(&self.last_unit_price)),
        ]);
        builder.push_record([
            "Line total".to_string(),
            format_amount(&self.line_total),
            if self.free_shipping() {
                "free shipping".to_string()
            } else {
                String::new()
            },
        ]);

        let mut table = builder.build();

        table.with(Style::modern_rounded());
        table.modify(Rows::first(), Color::BOLD);
        table.modify(Columns::new(1..2), Alignment::right());

        writeln!(out, "\n{table}").map_err(|_err| BreakdownError::IO)?;

        if let Some(reason) = self.coupon_rejection {
            writeln!(out, "Coupon not applied: {reason}").map_err(|_err| BreakdownError::IO)?;
        }

        if self.rounding_residual.to_minor_units() != 0 {
            writeln!(
                out,
                "Rounding residual: {}",
                format_amount(&self.rounding_residual)
            )
            .map_err(|_err| BreakdownError::IO)?;
        }

        Ok(())
    }
}

/// A tier as serialised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierView {
    /// Minimum quantity
    pub min: u32,

    /// Maximum quantity, absent when unbounded
    pub max: Option<u32>,

    /// Unit price
    pub price: String,
}

/// A candidate as serialised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateView {
    /// Where it came from
    pub source: CandidateSource,

    /// Line discount it would give
    pub amount: Option<String>,

    /// Why it did not apply
    pub rejected_reason: Option<RejectionReason>,
}

/// The winning discount as serialised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinningView {
    /// Where it came from
    pub source: CandidateSource,

    /// Line discount
    pub amount: String,
}

/// JSON shape of a [`PriceBreakdown`]. Amounts are decimal strings at currency precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownView {
    /// Item priced
    pub item: ItemRef,

    /// Units priced
    pub quantity: u32,

    /// ISO currency code
    pub currency: &'static str,

    /// List price
    pub list_price: String,

    /// Field the list price came from
    pub list_price_source: ListPriceSource,

    /// Pre-discount unit price
    pub base_price: String,

    /// Tier applied
    pub tier_applied: Option<TierView>,

    /// Candidates considered
    pub candidates_considered: Vec<CandidateView>,

    /// Winning discount
    pub winning_discount: Option<WinningView>,

    /// Whether the line ships free
    pub free_shipping: bool,

    /// Source of the free-shipping grant
    pub free_shipping_source: Option<CandidateSource>,

    /// Why the coupon did not apply
    pub coupon_rejection: Option<RejectionReason>,

    /// Line subtotal
    pub line_subtotal: String,

    /// Line discount
    pub line_discount: String,

    /// Charged unit price
    pub final_unit_price: String,

    /// Charged last unit price
    pub last_unit_price: String,

    /// Charged line total
    pub line_total: String,

    /// Unabsorbed rounding drift
    pub rounding_residual: String,
}

impl From<&PriceBreakdown> for BreakdownView {
    fn from(breakdown: &PriceBreakdown) -> Self {
        Self {
            item: breakdown.item,
            quantity: breakdown.quantity,
            currency: breakdown.base_price.currency().iso_alpha_code,
            list_price: format_amount(&breakdown.list_price),
            list_price_source: breakdown.list_price_source,
            base_price: format_amount(&breakdown.base_price),
            tier_applied: breakdown.tier_applied.as_ref().map(|tier| TierView {
                min: tier.range.min(),
                max: tier.range.max(),
                price: format_amount(&tier.price),
            }),
            candidates_considered: breakdown
                .candidates_considered
                .iter()
                .map(|candidate| CandidateView {
                    source: candidate.source.clone(),
                    amount: candidate.amount.as_ref().map(format_amount),
                    rejected_reason: candidate.rejected_reason,
                })
                .collect(),
            winning_discount: breakdown
                .winning_discount
                .as_ref()
                .map(|winner| WinningView {
                    source: winner.source().clone(),
                    amount: format_amount(winner.amount()),
                }),
            free_shipping: breakdown.free_shipping(),
            free_shipping_source: breakdown.free_shipping.clone(),
            coupon_rejection: breakdown.coupon_rejection,
            line_subtotal: format_amount(&breakdown.line_subtotal),
            line_discount: format_amount(&breakdown.line_discount),
            final_unit_price: format_amount(&breakdown.final_unit_price),
            last_unit_price: format_amount(&breakdown.last_unit_price),
            line_total: format_amount(&breakdown.line_total),
            rounding_residual: format_amount(&breakdown.rounding_residual),
        }
    }
}
