//! Lattice Quote
//!
//! Prices one line against a catalog fixture and prints the breakdown.
//!
//! Use `-f` to pick the catalog fixture, `-p`/`-q` for the product and quantity, and `-o json` for
//! the JSON breakdown.

use std::{
    io::{self, Write},
    time::Instant,
};

use anyhow::{Context, Result};
use humanize_duration::{Truncate, prelude::DurationExt};
use jiff::Timestamp;
use tracing::info;

use lattice_pricing::{
    accounts::CustomerUuid,
    config::{OutputFormat, QuoteConfig},
    engine::{CartLine, LineRequest, PricingEngine, Purchaser},
    fixtures::{Fixture, products::parse_money},
    logging::init_subscriber,
};

fn main() -> Result<()> {
    let config = QuoteConfig::load()?;

    init_subscriber(&config.logging)?;

    let fixture = Fixture::load(&config.catalog)
        .with_context(|| format!("loading catalog {}", config.catalog.display()))?;

    let line = &config.line;
    let keys = fixture.keys();
    let item = keys.item(&line.product, line.variant.as_deref())?;

    let mut purchaser = Purchaser::new(line.account_class);

    if let Some(tier) = line.loyalty_tier {
        purchaser = purchaser.with_loyalty_tier(tier);
    }

    for group in &line.groups {
        purchaser = purchaser.with_group(keys.group(group)?);
    }

    if let Some(code) = &line.coupon {
        purchaser = purchaser.with_coupon(code.parse()?);
    }

    if let Some(customer) = &line.customer {
        purchaser = purchaser.with_customer(CustomerUuid::from_key(customer));
    }

    let subtotal_so_far = line
        .subtotal
        .as_deref()
        .map(|amount| {
            fixture
                .currency()
                .map(|currency| format!("{amount} {}", currency.iso_alpha_code))
        })
        .transpose()?
        .as_deref()
        .map(parse_money)
        .transpose()?;

    let now = line.now.unwrap_or_else(Timestamp::now);
    let quantity = line.quantity;
    let engine = PricingEngine::new(fixture.into_catalog());

    let start = Instant::now();

    let breakdown = if let Some(subtotal_so_far) = subtotal_so_far {
        engine.price_line(&LineRequest {
            item,
            quantity,
            purchaser,
            subtotal_so_far,
            now,
        })?
    } else {
        engine
            .price_cart(&purchaser, &[CartLine { item, quantity }], now)?
            .lines
            .into_iter()
            .next()
            .context("priced cart has no lines")?
    };

    let elapsed = start.elapsed();

    info!(elapsed = %elapsed.human(Truncate::Nano), "line priced");

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match config.output {
        OutputFormat::Json => writeln!(handle, "{}", breakdown.to_json()?)?,
        OutputFormat::Table => {
            breakdown.write_to(&mut handle)?;

            writeln!(
                handle,
                " {} ({}s)",
                elapsed.human(Truncate::Nano),
                elapsed.as_secs_f32()
            )?;
        }
    }

    Ok(())
}
