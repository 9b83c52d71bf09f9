//! Daily price poller.
//!
//! Usage:
//!   prices-poller [--interval SECS] [--lookback-days N]
//!                 [--symbols GC=F,SI=F] [--include-optional]
//!                 [--fred-series DGS2,T10Y2Y]

use std::time::Duration;

use chrono::Utc;

use http_fetcher::Fetcher;
use meridian_core::get_settings;
use meridian_store::Store;
use price_ingest::{
    ingest_fred_series, ingest_prices, CORE_SYMBOLS, DEFAULT_LOOKBACK_DAYS, OPTIONAL_SYMBOLS,
};

fn resolve_symbols(symbols: Option<&str>, include_optional: bool) -> Vec<String> {
    if let Some(symbols) = symbols {
        return symbols
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    let mut resolved: Vec<String> = CORE_SYMBOLS.iter().map(|s| s.to_string()).collect();
    if include_optional {
        resolved.extend(OPTIONAL_SYMBOLS.iter().map(|s| s.to_string()));
    }
    resolved
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "price_ingest=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let interval: u64 = args
        .iter()
        .position(|a| a == "--interval")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let lookback_days: i64 = args
        .iter()
        .position(|a| a == "--lookback-days")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_LOOKBACK_DAYS);
    let symbols_arg = args
        .iter()
        .position(|a| a == "--symbols")
        .and_then(|i| args.get(i + 1))
        .cloned();
    let include_optional = args.iter().any(|a| a == "--include-optional");
    let fred_series_arg = args
        .iter()
        .position(|a| a == "--fred-series")
        .and_then(|i| args.get(i + 1))
        .cloned();

    let symbols = resolve_symbols(symbols_arg.as_deref(), include_optional);
    let fred_series: Vec<String> = fred_series_arg
        .as_deref()
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let settings = get_settings();
    let store = Store::connect(&settings.database_url).await?;
    let fetcher = Fetcher::with_timeout(Duration::from_secs(price_ingest::yahoo::YAHOO_TIMEOUT_SECS));
    let fred_fetcher =
        Fetcher::with_timeout(Duration::from_secs(price_ingest::fred::FRED_TIMEOUT_SECS));

    loop {
        let end_date = Utc::now().date_naive();
        let start_date = end_date - chrono::Duration::days(lookback_days);
        let mut results = ingest_prices(&fetcher, &store, &symbols, start_date, end_date).await;

        if !fred_series.is_empty() {
            let series_refs: Vec<&str> = fred_series.iter().map(String::as_str).collect();
            let fred_results = ingest_fred_series(
                &fred_fetcher,
                &store,
                &series_refs,
                start_date,
                end_date,
                &settings.fred_api_key,
            )
            .await;
            results.extend(fred_results);
        }

        let summary: Vec<String> = results
            .iter()
            .map(|(name, count)| format!("{name}={count}"))
            .collect();
        println!("Price ingestion results: {}", summary.join(", "));

        if interval == 0 {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(interval)).await;
    }
}
