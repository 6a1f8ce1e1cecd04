//! Seeded fuzzing of tier writes: whatever sequence of writes is attempted, sequentially or from
//! concurrent writers, the catalog never holds two overlapping rows in one `(item, group)` set.

use std::thread;

use rand::{Rng, SeedableRng, rngs::StdRng};
use rusty_money::{Money, iso::USD};
use testresult::TestResult;

use lattice_pricing::{
    accounts::GroupUuid,
    catalog::{CatalogError, InMemoryCatalog},
    products::{ItemRef, ProductUuid},
    tiers::{QuantityRange, TierError, TierRow},
};

const WRITES: usize = 2_000;
const WRITERS: u64 = 8;

fn random_row(
    rng: &mut StdRng,
    items: &[ItemRef],
    groups: &[Option<GroupUuid>],
) -> TestResult<TierRow> {
    let item = items[rng.gen_range(0..items.len())];
    let group = groups[rng.gen_range(0..groups.len())];

    let min = rng.gen_range(1..200);
    let max = if rng.gen_bool(0.2) {
        None
    } else {
        Some(min + rng.gen_range(0..40))
    };

    Ok(TierRow::new(
        item,
        group,
        QuantityRange::new(min, max)?,
        Money::from_minor(rng.gen_range(100..10_000), USD),
    ))
}

fn fixtures() -> (Vec<ItemRef>, Vec<Option<GroupUuid>>) {
    let items = ["widget", "gadget"]
        .iter()
        .map(|key| ItemRef::product(ProductUuid::from_key(key)))
        .collect();

    let groups = vec![
        None,
        Some(GroupUuid::from_key("gsa-schedule")),
        Some(GroupUuid::from_key("trade-club")),
    ];

    (items, groups)
}

fn assert_no_overlaps(catalog: &InMemoryCatalog) -> TestResult {
    let rows = catalog.all_tiers()?;

    for (index, row) in rows.iter().enumerate() {
        for other in &rows[index + 1..] {
            assert!(
                !(row.same_set(other) && row.range.intersects(&other.range)),
                "rows {} and {} overlap: {:?} / {:?}",
                row.uuid,
                other.uuid,
                row.range,
                other.range
            );
        }
    }

    Ok(())
}

fn write(catalog: &InMemoryCatalog, row: TierRow) -> TestResult<bool> {
    match catalog.upsert_tier(row) {
        Ok(()) => Ok(true),
        Err(CatalogError::Tier(TierError::Overlap { .. })) => Ok(false),
        Err(error) => Err(error.into()),
    }
}

#[test]
fn sequential_writes_never_commit_an_overlap() -> TestResult {
    let (items, groups) = fixtures();
    let catalog = InMemoryCatalog::new();
    let mut rng = StdRng::seed_from_u64(0x7143_2026);

    let mut accepted = 0;
    let mut written: Vec<TierRow> = Vec::new();

    for _ in 0..WRITES {
        // Occasionally move an existing row instead of adding one.
        let row = match written.last() {
            Some(previous) if rng.gen_bool(0.1) => {
                let mut moved = previous.clone();
                let min = rng.gen_range(1..200);

                moved.range = QuantityRange::new(min, Some(min + rng.gen_range(0..10)))?;
                moved
            }
            _ => random_row(&mut rng, &items, &groups)?,
        };

        if write(&catalog, row.clone())? {
            accepted += 1;
            written.push(row);
        }
    }

    assert!(accepted > 0, "the fuzzer should land some writes");
    assert_no_overlaps(&catalog)
}

#[test]
fn concurrent_writers_never_commit_an_overlap() -> TestResult {
    let (items, groups) = fixtures();
    let catalog = InMemoryCatalog::new();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..WRITERS)
            .map(|writer| {
                let catalog = &catalog;
                let items = &items;
                let groups = &groups;

                scope.spawn(move || -> TestResult {
                    let mut rng = StdRng::seed_from_u64(0x5eed_0000 + writer);

                    for _ in 0..WRITES / 4 {
                        write(catalog, random_row(&mut rng, items, groups)?)?;
                    }

                    Ok(())
                })
            })
            .collect();

        handles
            .into_iter()
            .try_for_each(|handle| handle.join().map_err(|_panic| "writer panicked")?)
    })?;

    assert_no_overlaps(&catalog)
}

#[test]
fn competing_writers_for_one_range_admit_exactly_one() -> TestResult {
    let catalog = InMemoryCatalog::new();
    let item = ItemRef::product(ProductUuid::from_key("widget"));

    let accepted = thread::scope(|scope| {
        let handles: Vec<_> = (0..WRITERS)
            .map(|writer| {
                let catalog = &catalog;

                scope.spawn(move || -> TestResult<bool> {
                    let row = TierRow::new(
                        item,
                        None,
                        QuantityRange::new(10, Some(20))?,
                        Money::from_minor(1000 + i64::try_from(writer)?, USD),
                    );

                    write(catalog, row)
                })
            })
            .collect();

        handles.into_iter().try_fold(0, |accepted, handle| {
            let landed = handle.join().map_err(|_panic| "writer panicked")??;

            TestResult::<usize>::Ok(accepted + usize::from(landed))
        })
    })?;

    assert_eq!(accepted, 1);
    assert_no_overlaps(&catalog)
}
