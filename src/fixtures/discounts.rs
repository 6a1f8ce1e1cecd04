//! Discount Fixtures

use serde::Deserialize;
use smallvec::SmallVec;

use crate::{
    accounts::{AccountClass, LoyaltyTier},
    discounts::{
        Applicability, DiscountKind, DiscountRecord, DiscountScope, DiscountUuid, UsageLimits,
        flash::{FlashItemUuid, FlashSale, FlashSaleItem, FlashSaleUuid},
    },
    fixtures::{
        FixtureError, Keys,
        products::{parse_money, parse_percentage},
    },
    windows::ValidityWindow,
};

/// Which lines a discount applies to
#[derive(Debug, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScopeFixture {
    /// Every line
    #[default]
    Global,

    /// Lines whose product is in the category
    Category {
        /// Category key
        category: String,
    },

    /// Lines whose product carries the brand
    Brand {
        /// Brand key
        brand: String,
    },

    /// Lines whose product comes from the supplier
    Supplier {
        /// Supplier key
        supplier: String,
    },

    /// Lines whose product ships from the warehouse
    Warehouse {
        /// Warehouse key
        warehouse: String,
    },

    /// Lines for any of the listed products
    Product {
        /// Product keys
        products: Vec<String>,
    },

    /// Lines bought by members of the group
    CustomerGroup {
        /// Group key
        group: String,
    },
}

/// What a discount does
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KindFixture {
    /// Percentage off (e.g., "20%" or "0.2")
    Percentage {
        /// Percentage
        percent: String,
    },

    /// Fixed amount off (e.g., "5.00 USD")
    FixedAmount {
        /// Amount
        amount: String,
    },

    /// Free shipping
    FreeShipping,
}

/// Discount Fixture, used for automatic discounts and coupons
#[derive(Debug, Deserialize)]
pub struct DiscountFixture {
    /// Display name
    pub name: String,

    /// Scope, global when omitted
    #[serde(default)]
    pub scope: ScopeFixture,

    /// Discount kind
    pub kind: KindFixture,

    /// Minimum cart subtotal
    #[serde(default)]
    pub min_purchase: Option<String>,

    /// Cap on the discount for a whole order
    #[serde(default)]
    pub max_discount: Option<String>,

    /// Total redemptions allowed
    #[serde(default)]
    pub usage_limit: Option<u32>,

    /// Redemptions allowed per customer
    #[serde(default)]
    pub per_customer_limit: Option<u32>,

    /// Redemptions so far
    #[serde(default)]
    pub usage_count: u32,

    /// When the discount applies
    #[serde(flatten)]
    pub window: ValidityWindow,

    /// Admitted account classes, everyone when empty
    #[serde(default)]
    pub account_classes: Vec<AccountClass>,

    /// Admitted loyalty tiers, everyone when empty
    #[serde(default)]
    pub loyalty_tiers: Vec<LoyaltyTier>,

    /// Administrative switch
    #[serde(default = "enabled")]
    pub active: bool,
}

const fn enabled() -> bool {
    true
}

impl DiscountFixture {
    /// Build the discount record.
    ///
    /// # Errors
    ///
    /// Returns an error if an amount or percentage is invalid or the scope names an undeclared
    /// key.
    pub fn record(&self, uuid: DiscountUuid, keys: &Keys) -> Result<DiscountRecord, FixtureError> {
        let scope = match &self.scope {
            ScopeFixture::Global => DiscountScope::Global,
            ScopeFixture::Category { category } => {
                DiscountScope::Category(keys.category(category)?)
            }
            ScopeFixture::Brand { brand } => DiscountScope::Brand(keys.brand(brand)?),
            ScopeFixture::Supplier { supplier } => {
                DiscountScope::Supplier(keys.supplier(supplier)?)
            }
            ScopeFixture::Warehouse { warehouse } => {
                DiscountScope::Warehouse(keys.warehouse(warehouse)?)
            }
            ScopeFixture::Product { products } => DiscountScope::Product(
                products
                    .iter()
                    .map(|key| keys.product(key))
                    .collect::<Result<SmallVec<_>, _>>()?,
            ),
            ScopeFixture::CustomerGroup { group } => {
                DiscountScope::CustomerGroup(keys.group(group)?)
            }
        };

        let kind = match &self.kind {
            KindFixture::Percentage { percent } => {
                DiscountKind::percentage(parse_percentage(percent)?)?
            }
            KindFixture::FixedAmount { amount } => {
                DiscountKind::fixed_amount(parse_money(amount)?)?
            }
            KindFixture::FreeShipping => DiscountKind::FreeShipping,
        };

        let limits = UsageLimits {
            total: self.usage_limit,
            per_customer: self.per_customer_limit,
        };

        let mut record = DiscountRecord::new(self.name.clone(), scope, kind, self.window)
            .with_uuid(uuid)
            .with_limits(limits, self.usage_count)
            .with_applicability(
                Applicability::classes(&self.account_classes).with_tiers(&self.loyalty_tiers),
            );

        if let Some(amount) = &self.min_purchase {
            record = record.with_min_purchase(parse_money(amount)?);
        }

        if let Some(amount) = &self.max_discount {
            record = record.with_max_discount(parse_money(amount)?);
        }

        if !self.active {
            record = record.deactivated();
        }

        Ok(record)
    }
}

/// Flash Sale Fixture
#[derive(Debug, Deserialize)]
pub struct FlashSaleFixture {
    /// Display name
    pub name: String,

    /// When the sale runs
    #[serde(flatten)]
    pub window: ValidityWindow,

    /// Preference between equally priced items, higher wins
    #[serde(default)]
    pub priority: i32,

    /// Administrative switch
    #[serde(default = "enabled")]
    pub active: bool,

    /// Admitted account classes, everyone when empty
    #[serde(default)]
    pub account_classes: Vec<AccountClass>,

    /// Admitted loyalty tiers, everyone when empty
    #[serde(default)]
    pub loyalty_tiers: Vec<LoyaltyTier>,

    /// Discounted items
    pub items: Vec<FlashItemFixture>,
}

/// Flash Sale Item Fixture
#[derive(Debug, Deserialize)]
pub struct FlashItemFixture {
    /// Product key
    pub product: String,

    /// Variant key, the whole product when omitted
    #[serde(default)]
    pub variant: Option<String>,

    /// Struck-through price
    pub original_price: String,

    /// Price during the sale
    pub sale_price: String,

    /// Units available, uncapped when omitted
    #[serde(default)]
    pub max_quantity: Option<u32>,

    /// Units sold so far
    #[serde(default)]
    pub sold_quantity: u32,
}

impl FlashSaleFixture {
    /// Build the sale and its items.
    ///
    /// # Errors
    ///
    /// Returns an error if a price is invalid or an item names an undeclared product or variant.
    pub fn sale(
        &self,
        key: &str,
        keys: &Keys,
    ) -> Result<(FlashSale, Vec<FlashSaleItem>), FixtureError> {
        let mut sale = FlashSale::new(self.name.clone(), self.window);

        sale.uuid = FlashSaleUuid::from_key(key);
        sale.active = self.active;
        sale.priority = self.priority;
        sale.applicability =
            Applicability::classes(&self.account_classes).with_tiers(&self.loyalty_tiers);

        let items = self
            .items
            .iter()
            .map(|fixture| {
                let item = keys.item(&fixture.product, fixture.variant.as_deref())?;

                let mut entry = FlashSaleItem::new(
                    &sale,
                    item,
                    parse_money(&fixture.original_price)?,
                    parse_money(&fixture.sale_price)?,
                );

                entry.uuid = FlashItemUuid::from_key(&format!(
                    "{key}/{}/{}",
                    fixture.product,
                    fixture.variant.as_deref().unwrap_or_default()
                ));

                if let Some(max_quantity) = fixture.max_quantity {
                    entry = entry.with_allocation(max_quantity, fixture.sold_quantity);
                }

                Ok(entry)
            })
            .collect::<Result<Vec<_>, FixtureError>>()?;

        Ok((sale, items))
    }
}
