//! Product Fixtures

use rust_decimal::{Decimal, prelude::ToPrimitive};
use rusty_money::{
    Money,
    iso::{self, Currency},
};
use serde::Deserialize;
use smallvec::SmallVec;

use crate::{
    fixtures::{FixtureError, Keys},
    prices::Price,
    products::{ItemRef, ProductPriceFacts},
    tiers::{QuantityRange, TierRow, TierUuid},
    windows::ValidityWindow,
};

/// Product Fixture
#[derive(Debug, Deserialize)]
pub struct ProductFixture {
    /// Product name
    pub name: String,

    /// Category keys
    #[serde(default)]
    pub categories: Vec<String>,

    /// Brand key
    #[serde(default)]
    pub brand: Option<String>,

    /// Supplier key
    #[serde(default)]
    pub supplier: Option<String>,

    /// Warehouse key
    #[serde(default)]
    pub warehouse: Option<String>,

    /// List price (e.g., "40.00 USD")
    pub list_price: String,

    /// Price for volume-buyer accounts
    #[serde(default)]
    pub volume_buyer_price: Option<String>,

    /// Price for government accounts
    #[serde(default)]
    pub government_price: Option<String>,

    /// Unit cost
    #[serde(default)]
    pub cost: Option<String>,

    /// Time-boxed sale price
    #[serde(default)]
    pub sale: Option<SaleFixture>,

    /// Variants, each overriding some of the product's prices
    #[serde(default)]
    pub variants: Vec<VariantFixture>,
}

/// Sale price fixture
#[derive(Debug, Deserialize)]
pub struct SaleFixture {
    /// Sale price
    pub price: String,

    /// When the sale price applies
    #[serde(flatten)]
    pub window: ValidityWindow,
}

/// Variant Fixture. Missing prices fall back to the product's.
#[derive(Debug, Deserialize)]
pub struct VariantFixture {
    /// Variant key
    pub key: String,

    /// List price
    #[serde(default)]
    pub list_price: Option<String>,

    /// Price for volume-buyer accounts
    #[serde(default)]
    pub volume_buyer_price: Option<String>,

    /// Price for government accounts
    #[serde(default)]
    pub government_price: Option<String>,

    /// Time-boxed sale price
    #[serde(default)]
    pub sale: Option<SaleFixture>,
}

impl ProductFixture {
    /// Build the product's price facts.
    ///
    /// # Errors
    ///
    /// Returns an error if any price cannot be parsed or a category, brand, supplier or warehouse is
    /// undeclared.
    pub fn price_facts(
        &self,
        item: ItemRef,
        keys: &Keys,
    ) -> Result<ProductPriceFacts, FixtureError> {
        let mut facts = ProductPriceFacts::new(item, parse_money(&self.list_price)?);

        facts.categories = self
            .categories
            .iter()
            .map(|key| keys.category(key))
            .collect::<Result<SmallVec<_>, _>>()?;
        facts.brand = self.brand.as_deref().map(|key| keys.brand(key)).transpose()?;
        facts.supplier = self.supplier.as_deref().map(|key| keys.supplier(key)).transpose()?;
        facts.warehouse = self.warehouse.as_deref().map(|key| keys.warehouse(key)).transpose()?;
        facts.volume_buyer_price = parse_optional(self.volume_buyer_price.as_deref())?;
        facts.government_price = parse_optional(self.government_price.as_deref())?;
        facts.cost = parse_optional(self.cost.as_deref())?;

        if let Some(sale) = &self.sale {
            facts = facts.with_sale(parse_money(&sale.price)?, sale.window);
        }

        Ok(facts)
    }
}

impl VariantFixture {
    /// Build the variant's price facts on top of its product's.
    ///
    /// # Errors
    ///
    /// Returns an error if any price cannot be parsed.
    pub fn price_facts(
        &self,
        item: ItemRef,
        product: &ProductPriceFacts,
    ) -> Result<ProductPriceFacts, FixtureError> {
        let mut facts = product.clone();

        facts.item = item;

        if let Some(price) = &self.list_price {
            facts.list_price = parse_money(price)?;
        }

        if let Some(price) = &self.volume_buyer_price {
            facts.volume_buyer_price = Some(parse_money(price)?);
        }

        if let Some(price) = &self.government_price {
            facts.government_price = Some(parse_money(price)?);
        }

        if let Some(sale) = &self.sale {
            facts = facts.with_sale(parse_money(&sale.price)?, sale.window);
        }

        Ok(facts)
    }
}

/// Tier Fixture
#[derive(Debug, Deserialize)]
pub struct TierFixture {
    /// Product key
    pub product: String,

    /// Variant key, the whole product when omitted
    #[serde(default)]
    pub variant: Option<String>,

    /// Group key, every customer when omitted
    #[serde(default)]
    pub group: Option<String>,

    /// Smallest quantity the row applies to
    pub min: u32,

    /// Largest quantity the row applies to, unbounded when omitted
    #[serde(default)]
    pub max: Option<u32>,

    /// Unit price
    pub price: String,
}

impl TierFixture {
    /// Build the tier row.
    ///
    /// # Errors
    ///
    /// Returns an error if the range or price is invalid or a key is undeclared.
    pub fn row(&self, keys: &Keys) -> Result<TierRow, FixtureError> {
        let item = keys.item(&self.product, self.variant.as_deref())?;
        let group = self.group.as_deref().map(|key| keys.group(key)).transpose()?;
        let range = QuantityRange::new(self.min, self.max)?;

        let mut row = TierRow::new(item, group, range, parse_money(&self.price)?);

        row.uuid = TierUuid::from_key(&format!(
            "{}/{}/{}/{}",
            self.product,
            self.variant.as_deref().unwrap_or_default(),
            self.group.as_deref().unwrap_or_default(),
            self.min
        ));

        Ok(row)
    }
}

/// Parse price string (e.g., "2.99 USD") into minor units and currency
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY", if the amount is not a
/// decimal with at most the currency's precision, or if the currency code is not recognized.
pub fn parse_price(s: &str) -> Result<(i64, &'static Currency), FixtureError> {
    let parts: Vec<&str> = s.split_whitespace().collect();

    let [amount, code] = parts.as_slice() else {
        return Err(FixtureError::InvalidPrice(format!(
            "Expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    };

    let currency =
        iso::find(code).ok_or_else(|| FixtureError::UnknownCurrency((*code).to_string()))?;

    let amount = amount
        .parse::<Decimal>()
        .map_err(|_err| FixtureError::InvalidPrice(s.to_string()))?;

    if amount.scale() > currency.exponent {
        return Err(FixtureError::InvalidPrice(format!(
            "{s} has more decimal places than {code} allows"
        )));
    }

    let minor_units = amount
        .checked_mul(Decimal::from(10_i64.pow(currency.exponent)))
        .and_then(|value| value.trunc().to_i64())
        .ok_or_else(|| FixtureError::InvalidPrice(s.to_string()))?;

    Ok((minor_units, currency))
}

/// Parse a price string straight into a [`Price`].
///
/// # Errors
///
/// See [`parse_price`].
pub fn parse_money(s: &str) -> Result<Price, FixtureError> {
    let (minor_units, currency) = parse_price(s)?;

    Ok(Money::from_minor(minor_units, currency))
}

fn parse_optional(s: Option<&str>) -> Result<Option<Price>, FixtureError> {
    s.map(parse_money).transpose()
}

/// Parse percentage string (e.g., "15%" or "0.15") into percentage points (15)
///
/// Accepts two formats:
/// - Percentage format: "15%" for 15%
/// - Decimal format: "0.15" for 15%
///
/// # Errors
///
/// Returns an error if the string cannot be parsed.
pub fn parse_percentage(s: &str) -> Result<Decimal, FixtureError> {
    let trimmed = s.trim();

    if let Some(percent_str) = trimmed.strip_suffix('%') {
        percent_str
            .trim()
            .parse::<Decimal>()
            .map_err(|_err| FixtureError::InvalidPercentage(s.to_string()))
    } else {
        trimmed
            .parse::<Decimal>()
            .map_err(|_err| FixtureError::InvalidPercentage(s.to_string()))?
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or_else(|| FixtureError::InvalidPercentage(s.to_string()))
    }
}
