//! Fixtures
//!
//! YAML catalog fixtures for tests, demos and the quote binary. Fixture keys are mapped to
//! deterministic UUIDv5 ids, so the same file always produces the same catalog.

use std::{fs, path::Path};

use rustc_hash::FxHashMap;
use rusty_money::iso::Currency;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    accounts::GroupUuid,
    catalog::{CatalogError, InMemoryCatalog},
    discounts::{
        DiscountError, DiscountUuid,
        coupons::{Coupon, CouponCode, CouponError},
    },
    fixtures::{
        discounts::{DiscountFixture, FlashSaleFixture},
        products::{ProductFixture, TierFixture},
    },
    prices::PriceError,
    products::{
        BrandUuid, CategoryUuid, ItemRef, ProductUuid, SupplierUuid, VariantUuid, WarehouseUuid,
    },
    tiers::TierError,
};

pub mod discounts;
pub mod products;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Invalid percentage format
    #[error("Invalid percentage format: {0}")]
    InvalidPercentage(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Product not found
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Variant not found
    #[error("Variant not found: {0}")]
    VariantNotFound(String),

    /// Group not declared
    #[error("Group not found: {0}")]
    GroupNotFound(String),

    /// Category not declared
    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    /// Brand not declared
    #[error("Brand not found: {0}")]
    BrandNotFound(String),

    /// Supplier not declared
    #[error("Supplier not found: {0}")]
    SupplierNotFound(String),

    /// Warehouse not declared
    #[error("Warehouse not found: {0}")]
    WarehouseNotFound(String),

    /// Currency mismatch between products
    #[error("Currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),

    /// No products loaded
    #[error("No products loaded; currency unknown")]
    NoCurrency,

    /// Inconsistent product prices
    #[error(transparent)]
    Price(#[from] PriceError),

    /// Invalid tier range
    #[error(transparent)]
    Tier(#[from] TierError),

    /// Invalid discount
    #[error(transparent)]
    Discount(#[from] DiscountError),

    /// Invalid coupon code
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// The catalog rejected a write
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// A catalog fixture file.
#[derive(Debug, Deserialize)]
pub struct CatalogFixture {
    /// Declared category keys
    #[serde(default)]
    pub categories: Vec<String>,

    /// Declared brand keys
    #[serde(default)]
    pub brands: Vec<String>,

    /// Declared supplier keys
    #[serde(default)]
    pub suppliers: Vec<String>,

    /// Declared warehouse keys
    #[serde(default)]
    pub warehouses: Vec<String>,

    /// Declared customer group keys
    #[serde(default)]
    pub groups: Vec<String>,

    /// Product key -> product fixture
    pub products: FxHashMap<String, ProductFixture>,

    /// Quantity-break rows
    #[serde(default)]
    pub tiers: Vec<TierFixture>,

    /// Discount key -> automatic discount
    #[serde(default)]
    pub discounts: FxHashMap<String, DiscountFixture>,

    /// Coupon code -> discount it grants
    #[serde(default)]
    pub coupons: FxHashMap<String, DiscountFixture>,

    /// Flash sale key -> flash sale
    #[serde(default)]
    pub flash_sales: FxHashMap<String, FlashSaleFixture>,
}

/// String key -> id lookups for a loaded fixture.
#[derive(Debug, Default)]
pub struct Keys {
    products: FxHashMap<String, ProductUuid>,
    variants: FxHashMap<(ProductUuid, String), VariantUuid>,
    groups: FxHashMap<String, GroupUuid>,
    categories: FxHashMap<String, CategoryUuid>,
    brands: FxHashMap<String, BrandUuid>,
    suppliers: FxHashMap<String, SupplierUuid>,
    warehouses: FxHashMap<String, WarehouseUuid>,
}

impl Keys {
    /// Look up a product.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::ProductNotFound`] for unknown keys.
    pub fn product(&self, key: &str) -> Result<ProductUuid, FixtureError> {
        self.products
            .get(key)
            .copied()
            .ok_or_else(|| FixtureError::ProductNotFound(key.to_string()))
    }

    /// Look up a product, or one of its variants.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown product or variant keys.
    pub fn item(&self, product: &str, variant: Option<&str>) -> Result<ItemRef, FixtureError> {
        let product_uuid = self.product(product)?;

        let Some(variant) = variant else {
            return Ok(ItemRef::product(product_uuid));
        };

        self.variants
            .get(&(product_uuid, variant.to_string()))
            .map(|variant_uuid| ItemRef::variant(product_uuid, *variant_uuid))
            .ok_or_else(|| FixtureError::VariantNotFound(format!("{product}/{variant}")))
    }

    /// Look up a group.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::GroupNotFound`] for undeclared keys.
    pub fn group(&self, key: &str) -> Result<GroupUuid, FixtureError> {
        self.groups
            .get(key)
            .copied()
            .ok_or_else(|| FixtureError::GroupNotFound(key.to_string()))
    }

    /// Look up a category.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::CategoryNotFound`] for undeclared keys.
    pub fn category(&self, key: &str) -> Result<CategoryUuid, FixtureError> {
        self.categories
            .get(key)
            .copied()
            .ok_or_else(|| FixtureError::CategoryNotFound(key.to_string()))
    }

    /// Look up a brand.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::BrandNotFound`] for undeclared keys.
    pub fn brand(&self, key: &str) -> Result<BrandUuid, FixtureError> {
        self.brands
            .get(key)
            .copied()
            .ok_or_else(|| FixtureError::BrandNotFound(key.to_string()))
    }

    /// Look up a supplier.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::SupplierNotFound`] for undeclared keys.
    pub fn supplier(&self, key: &str) -> Result<SupplierUuid, FixtureError> {
        self.suppliers
            .get(key)
            .copied()
            .ok_or_else(|| FixtureError::SupplierNotFound(key.to_string()))
    }

    /// Look up a warehouse.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::WarehouseNotFound`] for undeclared keys.
    pub fn warehouse(&self, key: &str) -> Result<WarehouseUuid, FixtureError> {
        self.warehouses
            .get(key)
            .copied()
            .ok_or_else(|| FixtureError::WarehouseNotFound(key.to_string()))
    }
}

/// A loaded fixture: the catalog it describes and its key lookups.
#[derive(Debug)]
pub struct Fixture {
    catalog: InMemoryCatalog,
    keys: Keys,
    currency: Option<&'static Currency>,
}

fn sorted<V>(map: FxHashMap<String, V>) -> Vec<(String, V)> {
    let mut entries: Vec<_> = map.into_iter().collect();

    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

impl Fixture {
    /// Load a catalog fixture file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or its contents are invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml(&contents)
    }

    /// Load a catalog fixture from YAML.
    ///
    /// Entries are loaded in key order so the catalog is the same on every run.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed or its contents are invalid.
    pub fn from_yaml(contents: &str) -> Result<Self, FixtureError> {
        let fixture: CatalogFixture = serde_norway::from_str(contents)?;

        let mut loaded = Self {
            catalog: InMemoryCatalog::new(),
            keys: Keys::default(),
            currency: None,
        };

        for key in fixture.groups {
            loaded.keys.groups.insert(key.clone(), GroupUuid::from_key(&key));
        }

        for key in fixture.categories {
            loaded.keys.categories.insert(key.clone(), CategoryUuid::from_key(&key));
        }

        for key in fixture.brands {
            loaded.keys.brands.insert(key.clone(), BrandUuid::from_key(&key));
        }

        for key in fixture.suppliers {
            loaded.keys.suppliers.insert(key.clone(), SupplierUuid::from_key(&key));
        }

        for key in fixture.warehouses {
            loaded.keys.warehouses.insert(key.clone(), WarehouseUuid::from_key(&key));
        }

        for (key, product) in sorted(fixture.products) {
            loaded.load_product(key, &product)?;
        }

        for tier in &fixture.tiers {
            loaded.catalog.upsert_tier(tier.row(&loaded.keys)?)?;
        }

        for (key, discount) in sorted(fixture.discounts) {
            let record = discount.record(DiscountUuid::from_key(&key), &loaded.keys)?;

            loaded.catalog.put_discount(record)?;
        }

        for (code, discount) in sorted(fixture.coupons) {
            let code: CouponCode = code.parse()?;
            let uuid = DiscountUuid::from_key(&format!("coupon/{code}"));

            loaded
                .catalog
                .put_coupon(Coupon::new(code, discount.record(uuid, &loaded.keys)?))?;
        }

        for (key, sale) in sorted(fixture.flash_sales) {
            let (sale, items) = sale.sale(&key, &loaded.keys)?;

            loaded.catalog.put_flash_sale(sale)?;

            for item in items {
                loaded.catalog.put_flash_item(item)?;
            }
        }

        Ok(loaded)
    }

    fn load_product(&mut self, key: String, product: &ProductFixture) -> Result<(), FixtureError> {
        let product_uuid = ProductUuid::from_key(&key);
        let facts = product.price_facts(ItemRef::product(product_uuid), &self.keys)?;

        self.check_currency(facts.currency())?;
        facts.validate()?;

        for variant in &product.variants {
            let variant_uuid = VariantUuid::from_key(&format!("{key}/{}", variant.key));
            let variant_facts =
                variant.price_facts(ItemRef::variant(product_uuid, variant_uuid), &facts)?;

            variant_facts.validate()?;

            self.keys
                .variants
                .insert((product_uuid, variant.key.clone()), variant_uuid);
            self.catalog.put_price_facts(variant_facts)?;
        }

        self.catalog.put_price_facts(facts)?;
        self.keys.products.insert(key, product_uuid);

        Ok(())
    }

    fn check_currency(&mut self, currency: &'static Currency) -> Result<(), FixtureError> {
        match self.currency {
            Some(existing) if existing != currency => Err(FixtureError::CurrencyMismatch(
                existing.iso_alpha_code.to_string(),
                currency.iso_alpha_code.to_string(),
            )),
            Some(_) => Ok(()),
            None => {
                self.currency = Some(currency);

                Ok(())
            }
        }
    }

    /// The fixture's currency.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::NoCurrency`] if no products were loaded.
    pub fn currency(&self) -> Result<&'static Currency, FixtureError> {
        self.currency.ok_or(FixtureError::NoCurrency)
    }

    /// Key lookups.
    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    /// The loaded catalog.
    pub fn catalog(&self) -> &InMemoryCatalog {
        &self.catalog
    }

    /// Take the loaded catalog.
    pub fn into_catalog(self) -> InMemoryCatalog {
        self.catalog
    }
}
