//! Pricing Catalog
//!
//! The read-only lookups the engine consumes, and an in-memory catalog that also acts as the
//! usage ledger for tests, fixtures and the quote binary.

use std::sync::{Arc, Mutex, RwLock};

use mockall::automock;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::info;

use crate::{
    accounts::{CustomerUuid, GroupUuid},
    commit::{CommitError, UsageCounter, UsageIntent, UsageLedger},
    discounts::{
        DiscountRecord, DiscountUuid,
        coupons::{Coupon, CouponCode},
        flash::{FlashItemUuid, FlashListing, FlashSale, FlashSaleItem, FlashSaleUuid},
        query::DiscountContext,
    },
    products::{ItemRef, ProductPriceFacts, ProductUuid},
    tiers::{TierError, TierRow, check_overlap},
};

/// Errors from catalog lookups and writes.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A lock was poisoned by a panicking writer.
    #[error("catalog storage is poisoned")]
    Poisoned,

    /// The backing store could not be reached.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    /// A tier write was rejected.
    #[error(transparent)]
    Tier(#[from] TierError),

    /// A flash item names a sale the catalog does not hold.
    #[error("unknown flash sale {0}")]
    UnknownFlashSale(FlashSaleUuid),
}

/// Read-only pricing lookups.
#[automock]
pub trait PricingCatalog: Send + Sync {
    /// Price facts for an item, `None` when the catalog has none.
    fn price_facts(&self, item: ItemRef) -> Result<Option<ProductPriceFacts>, CatalogError>;

    /// Tier rows for an item: the groupless set and the sets for each of `groups`.
    fn tier_rows(&self, item: ItemRef, groups: &[GroupUuid]) -> Result<Vec<TierRow>, CatalogError>;

    /// Automatic discounts that may apply in `ctx`.
    fn discount_records(&self, ctx: &DiscountContext) -> Result<Vec<DiscountRecord>, CatalogError>;

    /// The coupon with `code`, if any.
    fn coupon_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, CatalogError>;

    /// Flash sale listings for a product.
    fn flash_listings(&self, product: ProductUuid) -> Result<Vec<FlashListing>, CatalogError>;

    /// How often `customer` has redeemed `discount`.
    fn customer_redemptions(
        &self,
        customer: CustomerUuid,
        discount: DiscountUuid,
    ) -> Result<u32, CatalogError>;
}

type TierKey = (ItemRef, Option<GroupUuid>);

/// An in-memory catalog.
///
/// Tier writes for one `(item, group)` pair are serialised by a mutex per pair, so the overlap
/// check and the write see the same rows.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    facts: RwLock<FxHashMap<ItemRef, ProductPriceFacts>>,
    tiers: RwLock<Vec<TierRow>>,
    tier_locks: Mutex<FxHashMap<TierKey, Arc<Mutex<()>>>>,
    discounts: RwLock<Vec<DiscountRecord>>,
    coupons: RwLock<FxHashMap<CouponCode, Coupon>>,
    flash_sales: RwLock<FxHashMap<FlashSaleUuid, FlashSale>>,
    flash_items: RwLock<Vec<FlashSaleItem>>,
    redemptions: RwLock<FxHashMap<(CustomerUuid, DiscountUuid), u32>>,
}

fn poisoned<T>(_: T) -> CatalogError {
    CatalogError::Poisoned
}

impl InMemoryCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an item's price facts.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Poisoned`] if the store is poisoned.
    pub fn put_price_facts(&self, facts: ProductPriceFacts) -> Result<(), CatalogError> {
        self.facts.write().map_err(poisoned)?.insert(facts.item, facts);

        Ok(())
    }

    fn tier_lock(&self, key: TierKey) -> Result<Arc<Mutex<()>>, CatalogError> {
        let mut locks = self.tier_locks.lock().map_err(poisoned)?;

        Ok(Arc::clone(locks.entry(key).or_default()))
    }

    /// Insert a tier row, or replace the row with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`TierError::Overlap`] (wrapped) when the row would overlap another row for the same
    /// item and group.
    pub fn upsert_tier(&self, row: TierRow) -> Result<(), CatalogError> {
        let lock = self.tier_lock((row.item, row.group))?;
        let _guard = lock.lock().map_err(poisoned)?;

        check_overlap(&self.tiers.read().map_err(poisoned)?, &row)?;

        let mut tiers = self.tiers.write().map_err(poisoned)?;

        match tiers.iter_mut().find(|existing| existing.uuid == row.uuid) {
            Some(existing) => *existing = row,
            None => tiers.push(row),
        }

        Ok(())
    }

    /// Every stored tier row.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Poisoned`] if the store is poisoned.
    pub fn all_tiers(&self) -> Result<Vec<TierRow>, CatalogError> {
        Ok(self.tiers.read().map_err(poisoned)?.clone())
    }

    /// Insert or replace an automatic discount.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Poisoned`] if the store is poisoned.
    pub fn put_discount(&self, record: DiscountRecord) -> Result<(), CatalogError> {
        let mut discounts = self.discounts.write().map_err(poisoned)?;

        match discounts.iter_mut().find(|existing| existing.uuid == record.uuid) {
            Some(existing) => *existing = record,
            None => discounts.push(record),
        }

        Ok(())
    }

    /// Insert or replace a coupon.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Poisoned`] if the store is poisoned.
    pub fn put_coupon(&self, coupon: Coupon) -> Result<(), CatalogError> {
        self.coupons
            .write()
            .map_err(poisoned)?
            .insert(coupon.code.clone(), coupon);

        Ok(())
    }

    /// Insert or replace a flash sale.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Poisoned`] if the store is poisoned.
    pub fn put_flash_sale(&self, sale: FlashSale) -> Result<(), CatalogError> {
        self.flash_sales
            .write()
            .map_err(poisoned)?
            .insert(sale.uuid, sale);

        Ok(())
    }

    /// Insert or replace a flash sale item.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownFlashSale`] if the parent sale is missing.
    pub fn put_flash_item(&self, item: FlashSaleItem) -> Result<(), CatalogError> {
        if !self.flash_sales.read().map_err(poisoned)?.contains_key(&item.sale) {
            return Err(CatalogError::UnknownFlashSale(item.sale));
        }

        let mut items = self.flash_items.write().map_err(poisoned)?;

        match items.iter_mut().find(|existing| existing.uuid == item.uuid) {
            Some(existing) => *existing = item,
            None => items.push(item),
        }

        Ok(())
    }

    /// Current usage count of a discount or coupon.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Poisoned`] if the store is poisoned.
    pub fn usage_count(&self, discount: DiscountUuid) -> Result<Option<u32>, CatalogError> {
        let automatic = self
            .discounts
            .read()
            .map_err(poisoned)?
            .iter()
            .find(|record| record.uuid == discount)
            .map(|record| record.usage_count);

        if automatic.is_some() {
            return Ok(automatic);
        }

        Ok(self
            .coupons
            .read()
            .map_err(poisoned)?
            .values()
            .find(|coupon| coupon.discount.uuid == discount)
            .map(|coupon| coupon.discount.usage_count))
    }

    /// Units sold of a flash sale item.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Poisoned`] if the store is poisoned.
    pub fn sold_quantity(&self, item: FlashItemUuid) -> Result<Option<u32>, CatalogError> {
        Ok(self
            .flash_items
            .read()
            .map_err(poisoned)?
            .iter()
            .find(|entry| entry.uuid == item)
            .map(|entry| entry.sold_quantity))
    }
}

impl PricingCatalog for InMemoryCatalog {
    fn price_facts(&self, item: ItemRef) -> Result<Option<ProductPriceFacts>, CatalogError> {
        let facts = self.facts.read().map_err(poisoned)?;

        // Variants without their own facts are priced as the product.
        let found = facts
            .get(&item)
            .or_else(|| facts.get(&ItemRef::product(item.product)));

        Ok(found.cloned())
    }

    fn tier_rows(&self, item: ItemRef, groups: &[GroupUuid]) -> Result<Vec<TierRow>, CatalogError> {
        Ok(self
            .tiers
            .read()
            .map_err(poisoned)?
            .iter()
            .filter(|row| {
                row.item == item && row.group.is_none_or(|group| groups.contains(&group))
            })
            .cloned()
            .collect())
    }

    fn discount_records(&self, ctx: &DiscountContext) -> Result<Vec<DiscountRecord>, CatalogError> {
        Ok(self
            .discounts
            .read()
            .map_err(poisoned)?
            .iter()
            .filter(|record| record.scope.matches(ctx))
            .cloned()
            .collect())
    }

    fn coupon_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, CatalogError> {
        Ok(self.coupons.read().map_err(poisoned)?.get(code).cloned())
    }

    fn flash_listings(&self, product: ProductUuid) -> Result<Vec<FlashListing>, CatalogError> {
        let sales = self.flash_sales.read().map_err(poisoned)?;
        let items = self.flash_items.read().map_err(poisoned)?;

        items
            .iter()
            .filter(|item| item.item.product == product)
            .map(|item| {
                let sale = sales
                    .get(&item.sale)
                    .ok_or(CatalogError::UnknownFlashSale(item.sale))?;

                Ok(FlashListing {
                    sale: sale.clone(),
                    item: item.clone(),
                })
            })
            .collect()
    }

    fn customer_redemptions(
        &self,
        customer: CustomerUuid,
        discount: DiscountUuid,
    ) -> Result<u32, CatalogError> {
        Ok(self
            .redemptions
            .read()
            .map_err(poisoned)?
            .get(&(customer, discount))
            .copied()
            .unwrap_or(0))
    }
}

impl UsageLedger for InMemoryCatalog {
    fn commit(&self, intent: &UsageIntent) -> Result<(), CommitError> {
        // Lock order: discounts, coupons, flash items, redemptions.
        let mut discounts = self.discounts.write().map_err(poisoned)?;
        let mut coupons = self.coupons.write().map_err(poisoned)?;
        let mut flash_items = self.flash_items.write().map_err(poisoned)?;
        let mut redemptions = self.redemptions.write().map_err(poisoned)?;

        for increment in &intent.increments {
            let counter = increment.counter;

            let within_limit = match counter {
                UsageCounter::Discount(uuid) => {
                    let record = discounts
                        .iter()
                        .chain(coupons.values().map(|coupon| &coupon.discount))
                        .find(|record| record.uuid == uuid)
                        .ok_or(CommitError::UnknownCounter { counter })?;

                    let used = record.usage_count.saturating_add(increment.amount);
                    let by_customer = intent.customer.map_or(0, |customer| {
                        redemptions
                            .get(&(customer, uuid))
                            .copied()
                            .unwrap_or(0)
                            .saturating_add(increment.amount)
                    });

                    record.limits.total.is_none_or(|limit| used <= limit)
                        && record
                            .limits
                            .per_customer
                            .is_none_or(|limit| by_customer <= limit)
                }
                UsageCounter::FlashItem(uuid) => {
                    let item = flash_items
                        .iter()
                        .find(|item| item.uuid == uuid)
                        .ok_or(CommitError::UnknownCounter { counter })?;

                    let sold = item.sold_quantity.saturating_add(increment.amount);

                    item.max_quantity.is_none_or(|max| sold <= max)
                }
            };

            if !within_limit {
                return Err(CommitError::LimitReached { counter });
            }
        }

        for increment in &intent.increments {
            match increment.counter {
                UsageCounter::Discount(uuid) => {
                    let record = discounts
                        .iter_mut()
                        .chain(coupons.values_mut().map(|coupon| &mut coupon.discount))
                        .find(|record| record.uuid == uuid);

                    if let Some(record) = record {
                        record.usage_count = record.usage_count.saturating_add(increment.amount);
                    }

                    if let Some(customer) = intent.customer {
                        let count = redemptions.entry((customer, uuid)).or_insert(0);
                        *count = count.saturating_add(increment.amount);
                    }
                }
                UsageCounter::FlashItem(uuid) => {
                    if let Some(item) = flash_items.iter_mut().find(|item| item.uuid == uuid) {
                        item.sold_quantity = item.sold_quantity.saturating_add(increment.amount);
                    }
                }
            }
        }

        info!(increments = intent.increments.len(), "usage intent committed");

        Ok(())
    }
}
