//! Storefront CLI
//!
//! Runs the HTTP server and the operator commands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use storefront::{
    error::{AppError, Result},
    models::Config,
    server::{self, AppState},
};

/// Digital watch-face storefront
#[derive(Parser, Debug)]
#[command(name = "storefront", version, about = "Digital goods storefront backend")]
struct Cli {
    /// Path to storage directory containing config.toml and orders.json
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server
    Serve,

    /// Scan the catalog and print the listing
    Catalog,

    /// Show the daily offer
    Daily {
        /// Calendar date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },

    /// Retry unfinished link minting and notifications once
    Sweep,

    /// List paid orders whose buyer has not been notified
    Pending,

    /// Validate configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn parse_date(raw: Option<&str>) -> Result<NaiveDate> {
    match raw {
        None => Ok(AppState::today()),
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
            AppError::validation(format!("Invalid date {raw:?}, expected YYYY-MM-DD"))
        }),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let mut config = Config::load_or_default(&config_path);
    config.apply_env();

    if let Command::Validate = cli.command {
        log::info!("Validating configuration...");
        if let Err(e) = config.validate() {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
        log::info!("✓ Config OK ({})", config_path.display());
        return Ok(());
    }

    config.validate()?;
    log::info!("Loaded configuration from {}", cli.storage_dir.display());

    let state = AppState::open(config, &cli.storage_dir).await?;

    match cli.command {
        Command::Serve => server::serve(state).await?,

        Command::Catalog => {
            let catalog = state.catalog.snapshot().await?;
            for product in &catalog.products {
                log::info!(
                    "{:<10} {:<12} {:>3} images  {}",
                    product.id,
                    product.display_name,
                    product.images.len(),
                    if product.sellable { "sellable" } else { "not for sale" }
                );
            }
            log::info!(
                "{} folders, {} sellable, {} images",
                catalog.stats.total_folders,
                catalog.sellable().len(),
                catalog.stats.total_images
            );
        }

        Command::Daily { date } => {
            let date = parse_date(date.as_deref())?;
            let catalog = state.catalog.snapshot().await?;
            match state.daily_offer(&catalog, date) {
                Some(offer) => log::info!(
                    "Daily offer for {}: {} at {} {}",
                    date,
                    offer.product.display_name,
                    offer.offer_price,
                    state.config.pricing.currency
                ),
                None => log::warn!("No sellable products; no daily offer for {}", date),
            }
        }

        Command::Sweep => {
            let report = state.dispatcher.sweep().await?;
            log::info!(
                "Minted {} links, sent {} notifications, {} still pending, {} exhausted",
                report.links_minted,
                report.notifications_sent,
                report.still_pending,
                report.exhausted
            );
        }

        Command::Pending => {
            let pending = state.dispatcher.store().pending_notifications().await?;
            if pending.is_empty() {
                log::info!("No pending notifications.");
            }
            for order in pending {
                log::warn!(
                    "Order {} ({}, {}) paid {}: {} failed chains",
                    order.order_id,
                    order.product_id,
                    order.customer_email,
                    order.paid_at_local(),
                    order.notification.failed_chains()
                );
            }
        }

        Command::Validate => {}
    }

    Ok(())
}
