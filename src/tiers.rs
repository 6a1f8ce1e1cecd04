//! Tier Resolver
//!
//! Quantity-break pricing. Rows are grouped by `(item, group)`; a row with no group applies to
//! every customer. Ranges within one group never overlap, which [`check_overlap`] enforces
//! before a row is written.

use serde::Serialize;
use thiserror::Error;

use crate::{
    accounts::GroupUuid,
    prices::{Price, format_amount},
    products::ItemRef,
    uuids::TypedUuid,
};

/// Tier row id.
pub type TierUuid = TypedUuid<TierRow>;

/// Errors from tier validation and lookup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TierError {
    /// A range is empty or starts below one.
    #[error("invalid tier range {min}..={max:?}")]
    InvalidRange {
        /// Requested minimum
        min: u32,

        /// Requested maximum
        max: Option<u32>,
    },

    /// A write would overlap an existing row for the same item and group.
    #[error("tier range overlaps existing tier {existing}")]
    Overlap {
        /// The row the candidate collides with
        existing: TierUuid,
    },

    /// More than one stored row matched a quantity. The stored data is corrupt.
    #[error("tiers {first} and {second} both match quantity {quantity}")]
    Ambiguous {
        /// First matching row
        first: TierUuid,

        /// Second matching row
        second: TierUuid,

        /// Quantity looked up
        quantity: u32,
    },
}

/// An inclusive quantity range, unbounded above when `max` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuantityRange {
    min: u32,
    max: Option<u32>,
}

impl QuantityRange {
    /// Create a range.
    ///
    /// # Errors
    ///
    /// Returns [`TierError::InvalidRange`] when `min` is zero or `max < min`.
    pub fn new(min: u32, max: Option<u32>) -> Result<Self, TierError> {
        if min == 0 || max.is_some_and(|max| max < min) {
            return Err(TierError::InvalidRange { min, max });
        }

        Ok(Self { min, max })
    }

    /// Minimum quantity, inclusive.
    #[must_use]
    pub const fn min(&self) -> u32 {
        self.min
    }

    /// Maximum quantity, inclusive.
    #[must_use]
    pub const fn max(&self) -> Option<u32> {
        self.max
    }

    /// Whether `quantity` falls inside the range.
    #[must_use]
    pub fn contains(&self, quantity: u32) -> bool {
        quantity >= self.min && self.max.is_none_or(|max| quantity <= max)
    }

    /// Whether the two ranges share at least one quantity.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        let starts_before_other_ends = other.max.is_none_or(|max| self.min <= max);
        let ends_after_other_starts = self.max.is_none_or(|max| max >= other.min);

        starts_before_other_ends && ends_after_other_starts
    }
}

/// A quantity-break price row.
#[derive(Debug, Clone, PartialEq)]
pub struct TierRow {
    /// Row id
    pub uuid: TierUuid,

    /// Item the row prices
    pub item: ItemRef,

    /// Group the row is restricted to, `None` for every customer
    pub group: Option<GroupUuid>,

    /// Quantities the row applies to
    pub range: QuantityRange,

    /// Unit price for those quantities
    pub price: Price,
}

impl TierRow {
    /// Create a row with a fresh id.
    #[must_use]
    pub fn new(item: ItemRef, group: Option<GroupUuid>, range: QuantityRange, price: Price) -> Self {
        Self {
            uuid: TierUuid::new(),
            item,
            group,
            range,
            price,
        }
    }

    /// Whether the row belongs to the same `(item, group)` set as `other`.
    #[must_use]
    pub fn same_set(&self, other: &Self) -> bool {
        self.item == other.item && self.group == other.group
    }
}

/// The tier used for a line, as reported in the breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedTier {
    /// Row id
    pub uuid: TierUuid,

    /// Group the tier belongs to
    pub group: Option<GroupUuid>,

    /// Quantity range
    pub range: QuantityRange,

    /// Unit price
    pub price: Price,
}

impl From<&TierRow> for AppliedTier {
    fn from(row: &TierRow) -> Self {
        Self {
            uuid: row.uuid,
            group: row.group,
            range: row.range,
            price: row.price,
        }
    }
}

impl AppliedTier {
    /// Short description, e.g. `"5+ @ 30.00"`.
    #[must_use]
    pub fn describe(&self) -> String {
        let range = match self.range.max() {
            Some(max) => format!("{}-{max}", self.range.min()),
            None => format!("{}+", self.range.min()),
        };

        format!("{range} @ {}", format_amount(&self.price))
    }
}

/// Check a row about to be written against the existing rows.
///
/// Only rows in the same `(item, group)` set are compared. A row with the candidate's own id
/// is skipped so an update can move its own range.
///
/// # Errors
///
/// Returns [`TierError::Overlap`] naming the first intersecting row.
pub fn check_overlap(existing: &[TierRow], candidate: &TierRow) -> Result<(), TierError> {
    existing
        .iter()
        .filter(|row| row.uuid != candidate.uuid && row.same_set(candidate))
        .find(|row| row.range.intersects(&candidate.range))
        .map_or(Ok(()), |row| {
            Err(TierError::Overlap {
                existing: row.uuid,
            })
        })
}

/// Find the row in one `(item, group)` set that contains `quantity`.
///
/// # Errors
///
/// Returns [`TierError::Ambiguous`] if more than one row matches.
fn match_in_set<'r>(
    rows: &'r [TierRow],
    item: ItemRef,
    group: Option<GroupUuid>,
    quantity: u32,
) -> Result<Option<&'r TierRow>, TierError> {
    let mut matches = rows
        .iter()
        .filter(|row| row.item == item && row.group == group && row.range.contains(quantity));

    let first = matches.next();

    if let (Some(first), Some(second)) = (first, matches.next()) {
        return Err(TierError::Ambiguous {
            first: first.uuid,
            second: second.uuid,
            quantity,
        });
    }

    Ok(first)
}

/// Resolve the tier for a single (optional) group.
///
/// Group rows are tried first and groupless rows only when no group row matches.
///
/// # Errors
///
/// Returns [`TierError::Ambiguous`] if a set holds overlapping rows.
pub fn resolve_tier<'r>(
    rows: &'r [TierRow],
    item: ItemRef,
    group: Option<GroupUuid>,
    quantity: u32,
) -> Result<Option<&'r TierRow>, TierError> {
    if let Some(group) = group
        && let Some(row) = match_in_set(rows, item, Some(group), quantity)?
    {
        return Ok(Some(row));
    }

    match_in_set(rows, item, None, quantity)
}

/// Resolve the tier for a customer belonging to several groups.
///
/// Every member group's set is searched. When more than one group matches, the cheapest row
/// wins, then the lowest group id. Groupless rows are used only when no group matches.
///
/// # Errors
///
/// Returns [`TierError::Ambiguous`] if a set holds overlapping rows.
pub fn resolve_tier_for_groups<'r>(
    rows: &'r [TierRow],
    item: ItemRef,
    groups: &[GroupUuid],
    quantity: u32,
) -> Result<Option<&'r TierRow>, TierError> {
    let mut best: Option<&'r TierRow> = None;

    for group in groups {
        let Some(row) = match_in_set(rows, item, Some(*group), quantity)? else {
            continue;
        };

        let better = best.is_none_or(|current| {
            (row.price.to_minor_units(), row.group) < (current.price.to_minor_units(), current.group)
        });

        if better {
            best = Some(row);
        }
    }

    match best {
        Some(row) => Ok(Some(row)),
        None => match_in_set(rows, item, None, quantity),
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::USD};
    use testresult::TestResult;

    use crate::products::ProductUuid;

    use super::*;

    fn item() -> ItemRef {
        ItemRef::product(ProductUuid::from_key("widget"))
    }

    fn row(group: Option<GroupUuid>, min: u32, max: Option<u32>, price: i64) -> TestResult<TierRow> {
        Ok(TierRow::new(
            item(),
            group,
            QuantityRange::new(min, max)?,
            Money::from_minor(price, USD),
        ))
    }

    #[test]
    fn range_rejects_empty_and_zero() {
        assert!(QuantityRange::new(0, None).is_err());
        assert!(QuantityRange::new(10, Some(9)).is_err());
        assert!(QuantityRange::new(5, Some(5)).is_ok());
    }

    #[test]
    fn intersects_handles_unbounded_ranges() -> TestResult {
        let low = QuantityRange::new(1, Some(4))?;
        let high = QuantityRange::new(5, None)?;
        let touching = QuantityRange::new(4, Some(8))?;

        assert!(!low.intersects(&high));
        assert!(!high.intersects(&low));
        assert!(low.intersects(&touching));
        assert!(high.intersects(&touching));
        assert!(high.intersects(&QuantityRange::new(100, None)?));

        Ok(())
    }

    #[test]
    fn check_overlap_rejects_intersecting_row() -> TestResult {
        let existing = vec![row(None, 1, Some(9), 1000)?, row(None, 10, None, 900)?];
        let candidate = row(None, 8, Some(12), 950)?;

        let result = check_overlap(&existing, &candidate);

        assert!(matches!(result, Err(TierError::Overlap { existing: uuid }) if uuid == existing[0].uuid));

        Ok(())
    }

    #[test]
    fn check_overlap_ignores_other_groups_and_self() -> TestResult {
        let group = GroupUuid::from_key("contractors");
        let existing = vec![row(None, 1, None, 1000)?];
        let grouped = row(Some(group), 1, None, 900)?;

        assert_eq!(check_overlap(&existing, &grouped), Ok(()));

        let mut update = existing[0].clone();
        update.range = QuantityRange::new(2, None)?;

        assert_eq!(check_overlap(&existing, &update), Ok(()));

        Ok(())
    }

    #[test]
    fn resolve_prefers_group_rows() -> TestResult {
        let group = GroupUuid::from_key("contractors");
        let rows = vec![row(None, 5, None, 3500)?, row(Some(group), 5, None, 3000)?];

        let tier = resolve_tier(&rows, item(), Some(group), 5)?;

        assert_eq!(tier.map(|t| t.price), Some(Money::from_minor(3000, USD)));

        Ok(())
    }

    #[test]
    fn resolve_falls_back_to_groupless_rows() -> TestResult {
        let group = GroupUuid::from_key("contractors");
        let rows = vec![row(None, 1, Some(9), 3500)?, row(Some(group), 10, None, 3000)?];

        let tier = resolve_tier(&rows, item(), Some(group), 5)?;

        assert_eq!(tier.map(|t| t.price), Some(Money::from_minor(3500, USD)));

        Ok(())
    }

    #[test]
    fn resolve_returns_none_without_match() -> TestResult {
        let rows = vec![row(None, 10, None, 3500)?];

        assert_eq!(resolve_tier(&rows, item(), None, 9)?, None);

        Ok(())
    }

    #[test]
    fn resolve_reports_corrupt_overlap() -> TestResult {
        let rows = vec![row(None, 1, Some(10), 3500)?, row(None, 5, None, 3000)?];

        let result = resolve_tier(&rows, item(), None, 7);

        assert!(matches!(result, Err(TierError::Ambiguous { quantity: 7, .. })));

        Ok(())
    }

    #[test]
    fn resolve_for_groups_picks_cheapest_group_row() -> TestResult {
        let contractors = GroupUuid::from_key("contractors");
        let schools = GroupUuid::from_key("schools");

        let rows = vec![
            row(Some(contractors), 1, None, 3100)?,
            row(Some(schools), 1, None, 2900)?,
            row(None, 1, None, 3500)?,
        ];

        let tier = resolve_tier_for_groups(&rows, item(), &[contractors, schools], 3)?;

        assert_eq!(tier.map(|t| t.group), Some(Some(schools)));

        Ok(())
    }

    #[test]
    fn applied_tier_describes_range() -> TestResult {
        let tier = AppliedTier::from(&row(None, 5, None, 3000)?);

        assert_eq!(tier.describe(), "5+ @ 30.00");

        Ok(())
    }
}
