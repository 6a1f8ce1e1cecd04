//! Products
//!
//! Price facts for a product or one of its variants, as supplied by the catalog.

use rusty_money::iso::Currency;
use serde::Serialize;
use smallvec::SmallVec;

use crate::{
    prices::{Price, PriceError, ensure_currency},
    uuids::TypedUuid,
    windows::ValidityWindow,
};

/// Product marker.
#[derive(Debug)]
pub struct ProductRecord;

/// Product id.
pub type ProductUuid = TypedUuid<ProductRecord>;

/// Variant marker.
#[derive(Debug)]
pub struct VariantRecord;

/// Variant id.
pub type VariantUuid = TypedUuid<VariantRecord>;

/// Category marker.
#[derive(Debug)]
pub struct CategoryRecord;

/// Category id.
pub type CategoryUuid = TypedUuid<CategoryRecord>;

/// Brand marker.
#[derive(Debug)]
pub struct BrandRecord;

/// Brand id.
pub type BrandUuid = TypedUuid<BrandRecord>;

/// Supplier marker.
#[derive(Debug)]
pub struct SupplierRecord;

/// Supplier id.
pub type SupplierUuid = TypedUuid<SupplierRecord>;

/// Warehouse marker.
#[derive(Debug)]
pub struct WarehouseRecord;

/// Warehouse id.
pub type WarehouseUuid = TypedUuid<WarehouseRecord>;

/// The sellable thing being priced: a product, or a specific variant of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItemRef {
    /// Product id
    pub product: ProductUuid,

    /// Variant id, when pricing a variant
    pub variant: Option<VariantUuid>,
}

impl ItemRef {
    /// Reference a product without a variant.
    #[must_use]
    pub const fn product(product: ProductUuid) -> Self {
        Self {
            product,
            variant: None,
        }
    }

    /// Reference a specific variant.
    #[must_use]
    pub const fn variant(product: ProductUuid, variant: VariantUuid) -> Self {
        Self {
            product,
            variant: Some(variant),
        }
    }
}

/// A sale price and the window it is active in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SalePrice {
    /// Sale price
    pub price: Price,

    /// When the sale price applies
    pub window: ValidityWindow,
}

/// Raw price fields for a product or variant.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductPriceFacts {
    /// What these facts price
    pub item: ItemRef,

    /// Categories the product belongs to
    pub categories: SmallVec<[CategoryUuid; 4]>,

    /// Brand
    pub brand: Option<BrandUuid>,

    /// Default supplier
    pub supplier: Option<SupplierUuid>,

    /// Default warehouse
    pub warehouse: Option<WarehouseUuid>,

    /// Standard list price
    pub list_price: Price,

    /// Time-boxed sale price
    pub sale: Option<SalePrice>,

    /// Price for volume-buyer accounts
    pub volume_buyer_price: Option<Price>,

    /// Price for government accounts
    pub government_price: Option<Price>,

    /// Unit cost. Carried for margin reporting upstream; never used in pricing.
    pub cost: Option<Price>,
}

impl ProductPriceFacts {
    /// Facts with only a list price.
    #[must_use]
    pub fn new(item: ItemRef, list_price: Price) -> Self {
        Self {
            item,
            categories: SmallVec::new(),
            brand: None,
            supplier: None,
            warehouse: None,
            list_price,
            sale: None,
            volume_buyer_price: None,
            government_price: None,
            cost: None,
        }
    }

    /// Add a category.
    #[must_use]
    pub fn with_category(mut self, category: CategoryUuid) -> Self {
        self.categories.push(category);
        self
    }

    /// Set the brand.
    #[must_use]
    pub fn with_brand(mut self, brand: BrandUuid) -> Self {
        self.brand = Some(brand);
        self
    }

    /// Set the default supplier.
    #[must_use]
    pub fn with_supplier(mut self, supplier: SupplierUuid) -> Self {
        self.supplier = Some(supplier);
        self
    }

    /// Set the default warehouse.
    #[must_use]
    pub fn with_warehouse(mut self, warehouse: WarehouseUuid) -> Self {
        self.warehouse = Some(warehouse);
        self
    }

    /// Set a time-boxed sale price.
    #[must_use]
    pub fn with_sale(mut self, price: Price, window: ValidityWindow) -> Self {
        self.sale = Some(SalePrice { price, window });
        self
    }

    /// Set the volume-buyer price.
    #[must_use]
    pub fn with_volume_buyer_price(mut self, price: Price) -> Self {
        self.volume_buyer_price = Some(price);
        self
    }

    /// Set the government price.
    #[must_use]
    pub fn with_government_price(mut self, price: Price) -> Self {
        self.government_price = Some(price);
        self
    }

    /// Set the unit cost.
    #[must_use]
    pub fn with_cost(mut self, price: Price) -> Self {
        self.cost = Some(price);
        self
    }

    /// Currency of the facts, taken from the list price.
    #[must_use]
    pub fn currency(&self) -> &'static Currency {
        self.list_price.currency()
    }

    /// Check every price field shares the list price currency.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::CurrencyMismatch`] for the first field in another currency.
    pub fn validate(&self) -> Result<(), PriceError> {
        let currency = self.currency();

        [
            self.sale.as_ref().map(|sale| &sale.price),
            self.volume_buyer_price.as_ref(),
            self.government_price.as_ref(),
            self.cost.as_ref(),
        ]
        .into_iter()
        .flatten()
        .try_for_each(|price| ensure_currency(price, currency))
    }
}
