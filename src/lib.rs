//! Lattice Pricing
//!
//! Price and discount resolution for a multi-class storefront. Given a product, a quantity and
//! who is buying, the engine resolves the list price for the account class, applies any
//! quantity-break tier, picks the single best discount (a flash sale, an automatic discount or a
//! coupon), and returns an auditable breakdown of how the price was reached.

pub mod accounts;
pub mod breakdown;
pub mod catalog;
pub mod commit;
pub mod compositor;
pub mod config;
pub mod discounts;
pub mod engine;
pub mod fixtures;
pub mod logging;
pub mod prelude;
pub mod prices;
pub mod products;
pub mod rates;
pub mod stacking;
pub mod tiers;
pub mod uuids;
pub mod windows;
