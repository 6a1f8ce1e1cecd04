//! Quote configuration

use std::path::PathBuf;

use clap::{Args, Parser};
use jiff::Timestamp;

use crate::accounts::{AccountClass, LoyaltyTier};

/// Log output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// How the breakdown is printed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table.
    Table,

    /// The JSON breakdown.
    Json,
}

/// What to price and for whom.
#[derive(Debug, Args)]
pub struct LineConfig {
    /// Product key in the catalog fixture
    #[arg(short, long)]
    pub product: String,

    /// Variant key of the product
    #[arg(long)]
    pub variant: Option<String>,

    /// Units to price
    #[arg(short, long, default_value_t = 1)]
    pub quantity: u32,

    /// Account class (consumer, volume-buyer, government)
    #[arg(short, long, env = "QUOTE_ACCOUNT_CLASS", default_value = "CONSUMER")]
    pub account_class: AccountClass,

    /// Loyalty tier (bronze, silver, gold, platinum, diamond)
    #[arg(long)]
    pub loyalty_tier: Option<LoyaltyTier>,

    /// Customer group key, may be repeated
    #[arg(short, long = "group")]
    pub groups: Vec<String>,

    /// Coupon code
    #[arg(short, long)]
    pub coupon: Option<String>,

    /// Customer key, for per-customer coupon limits
    #[arg(long)]
    pub customer: Option<String>,

    /// Cart subtotal for minimum purchase checks (e.g., "75.00"), the line subtotal when omitted
    #[arg(long)]
    pub subtotal: Option<String>,

    /// Evaluation instant (RFC 3339), the current time when omitted
    #[arg(long, env = "QUOTE_NOW")]
    pub now: Option<Timestamp>,
}

/// Lattice quote configuration
#[derive(Debug, Parser)]
#[command(name = "lattice-quote", about = "Price a line against a catalog fixture", long_about = None)]
pub struct QuoteConfig {
    /// Catalog fixture file
    #[arg(
        short = 'f',
        long,
        env = "QUOTE_CATALOG",
        default_value = "fixtures/catalogs/storefront.yml"
    )]
    pub catalog: PathBuf,

    /// Output format (table, json)
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    /// Line settings.
    #[command(flatten)]
    pub line: LineConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,
}

impl QuoteConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }
}
