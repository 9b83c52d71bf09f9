//! Daily price ingestion: Yahoo OHLCV, FRED series, derived ratios, and the
//! market snapshot batch.

pub mod fred;
pub mod snapshot;
pub mod yahoo;

use std::collections::HashMap;

use chrono::NaiveDate;

use http_fetcher::Fetcher;
use meridian_store::Store;

pub use fred::{FredObservation, DEFAULT_FRED_BASE_URL, FRED_SOURCE};
pub use snapshot::{extract_key_levels, fetch_market_snapshot, KeyLevels};
pub use yahoo::{
    build_ratio_series, parse_yahoo_chart, CORE_SYMBOLS, DEFAULT_LOOKBACK_DAYS,
    DEFAULT_RATIO_NAME, GOLD_SYMBOL, OPTIONAL_SYMBOLS, SILVER_SYMBOL,
};

/// Fetch and upsert daily bars per symbol, then recompute the gold/silver
/// ratio on the shared-date intersection. Per-symbol failures record a zero
/// count and never abort the batch.
pub async fn ingest_prices(
    fetcher: &Fetcher,
    store: &Store,
    symbols: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> HashMap<String, u64> {
    let mut results = HashMap::new();
    let mut bars_by_symbol = HashMap::new();

    for symbol in symbols {
        let count = match yahoo::fetch_yahoo_chart(fetcher, symbol, start_date, end_date).await {
            Ok(payload) => {
                let bars = yahoo::parse_yahoo_chart(&payload, symbol);
                match store.upsert_prices(&bars, "yahoo").await {
                    Ok(written) => {
                        bars_by_symbol.insert(symbol.clone(), bars);
                        written
                    }
                    Err(err) => {
                        tracing::error!(symbol, error = %err, "price upsert failed");
                        0
                    }
                }
            }
            Err(err) => {
                tracing::error!(symbol, error = %err, "price ingestion failed");
                0
            }
        };
        results.insert(symbol.clone(), count);
    }

    let mut ratio_written = 0u64;
    if let (Some(gold_bars), Some(silver_bars)) = (
        bars_by_symbol.get(GOLD_SYMBOL),
        bars_by_symbol.get(SILVER_SYMBOL),
    ) {
        let entries = build_ratio_series(
            GOLD_SYMBOL,
            SILVER_SYMBOL,
            gold_bars,
            silver_bars,
            DEFAULT_RATIO_NAME,
        );
        if !entries.is_empty() {
            match store.upsert_price_ratios(&entries).await {
                Ok(written) => ratio_written = written,
                Err(err) => {
                    tracing::error!(ratio = DEFAULT_RATIO_NAME, error = %err, "ratio upsert failed");
                }
            }
        }
    }
    results.insert(DEFAULT_RATIO_NAME.to_string(), ratio_written);

    results
}

/// Fetch FRED series and store them as `fred`-sourced bars.
pub async fn ingest_fred_series(
    fetcher: &Fetcher,
    store: &Store,
    series_ids: &[&str],
    start_date: NaiveDate,
    end_date: NaiveDate,
    api_key: &str,
) -> HashMap<String, u64> {
    let observations_by_series = fred::fetch_fred_series_batch(
        fetcher,
        series_ids,
        start_date,
        end_date,
        api_key,
        DEFAULT_FRED_BASE_URL,
    )
    .await;

    let mut results = HashMap::new();
    for (series_id, observations) in observations_by_series {
        if observations.is_empty() {
            results.insert(series_id, 0);
            continue;
        }
        let bars = fred::fred_observations_to_price_bars(&observations);
        let count = match store.upsert_prices(&bars, FRED_SOURCE).await {
            Ok(written) => {
                tracing::info!(series_id, written, "FRED series stored");
                written
            }
            Err(err) => {
                tracing::error!(series_id, error = %err, "FRED price upsert failed");
                0
            }
        };
        results.insert(series_id, count);
    }
    results
}
