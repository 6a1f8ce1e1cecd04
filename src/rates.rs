//! Rate Table
//!
//! Picks the raw price field that applies to an account class. Class prices are used verbatim
//! and are never themselves discounted by class rules; promotional discounting happens later.

use jiff::Timestamp;
use serde::Serialize;

use crate::{accounts::AccountClass, prices::Price, products::ProductPriceFacts};

/// Which price field produced the list price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListPriceSource {
    /// The government contract price.
    Government,

    /// The volume-buyer price.
    VolumeBuyer,

    /// An active sale price.
    Sale,

    /// The standard list price.
    List,
}

impl ListPriceSource {
    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Government => "GOVERNMENT",
            Self::VolumeBuyer => "VOLUME_BUYER",
            Self::Sale => "SALE",
            Self::List => "LIST",
        }
    }
}

/// The pre-tier, pre-discount price for an account class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListPrice {
    /// Unit price
    pub price: Price,

    /// Field the price came from
    pub source: ListPriceSource,
}

/// Resolve the list price for `class` at `now`.
///
/// Class-specific prices win, then an active sale price, then the standard list price.
pub fn resolve_list_price(
    facts: &ProductPriceFacts,
    class: AccountClass,
    now: Timestamp,
) -> ListPrice {
    let class_price = match class {
        AccountClass::Government => facts
            .government_price
            .map(|price| (price, ListPriceSource::Government)),
        AccountClass::VolumeBuyer => facts
            .volume_buyer_price
            .map(|price| (price, ListPriceSource::VolumeBuyer)),
        AccountClass::Consumer => None,
    };

    let active_sale = || {
        facts
            .sale
            .filter(|sale| sale.window.contains(now))
            .map(|sale| (sale.price, ListPriceSource::Sale))
    };

    let (price, source) = class_price
        .or_else(active_sale)
        .unwrap_or((facts.list_price, ListPriceSource::List));

    ListPrice { price, source }
}
