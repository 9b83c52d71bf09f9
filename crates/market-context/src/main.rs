//! Market context poller: snapshot, regime classification, position sizing.
//!
//! Usage:
//!   market-context-poller [--interval SECS] [--dry-run] [--verbose]

use std::time::Duration;

use market_context::{
    build_market_context_record, classify_regimes, format_context_for_llm,
};
use meridian_core::get_settings;
use meridian_store::Store;
use price_ingest::fetch_market_snapshot;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "market_context=info,price_ingest=warn".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let interval: u64 = args
        .iter()
        .position(|a| a == "--interval")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let dry_run = args.iter().any(|a| a == "--dry-run");
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");

    let settings = get_settings();
    let store = if dry_run {
        None
    } else {
        Some(Store::connect(&settings.database_url).await?)
    };

    loop {
        println!("Fetching market snapshot...");
        let snapshot = fetch_market_snapshot(&settings.fred_api_key, None).await;
        println!(
            "Fetched {} Yahoo symbols, {} FRED series",
            snapshot.yahoo_prices.len(),
            snapshot.fred_values.len()
        );
        if !snapshot.errors.is_empty() {
            println!("Warnings: {} errors during fetch", snapshot.errors.len());
            if verbose {
                for error in snapshot.errors.iter().take(10) {
                    println!("  - {error}");
                }
                if snapshot.errors.len() > 10 {
                    println!("  ... and {} more", snapshot.errors.len() - 10);
                }
            }
        }

        let regimes = classify_regimes(&snapshot);
        println!(
            "\nRegimes: volatility={}, dollar={}, curve={}, credit={}",
            regimes.volatility_regime,
            regimes.dollar_regime,
            regimes.curve_regime,
            regimes.credit_regime
        );

        let record = build_market_context_record(&snapshot, Some(regimes));
        println!(
            "Position sizing multiplier: {:.0}%",
            record.suggested_size_multiplier * 100.0
        );
        if verbose {
            println!("\n{}", format_context_for_llm(&record));
        }

        let success = match &store {
            None => {
                println!("\n[DRY RUN] Skipping database insert");
                true
            }
            Some(store) => {
                println!("\nStoring to database...");
                match store.upsert_market_context(&record).await {
                    Ok(()) => {
                        println!("SUCCESS: Market context stored for {}", record.context_date);
                        true
                    }
                    Err(err) => {
                        eprintln!("ERROR: Failed to store market context: {err}");
                        false
                    }
                }
            }
        };

        if interval == 0 {
            if !success {
                std::process::exit(1);
            }
            return Ok(());
        }
        let status = if success { "OK" } else { "FAILED" };
        println!("\n[{status}] Sleeping for {interval} seconds...");
        tokio::time::sleep(Duration::from_secs(interval)).await;
        println!("\n{}\n", "=".repeat(50));
    }
}
