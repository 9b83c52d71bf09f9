//! Market snapshot: batch fetch the whole core watchlist and compute the
//! derived ratios.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use http_fetcher::Fetcher;
use meridian_core::watchlist::{fred_series, yahoo_symbols, CALCULATED_RATIOS};
use meridian_core::{MarketSnapshot, PriceBar};

use crate::fred::{get_latest_fred_values, DEFAULT_FRED_BASE_URL, FRED_TIMEOUT_SECS};
use crate::yahoo::{fetch_yahoo_chart, parse_yahoo_chart, YAHOO_TIMEOUT_SECS};

const SNAPSHOT_LOOKBACK_DAYS: i64 = 5;

/// Key levels extracted from a snapshot for the market_context row.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyLevels {
    pub vix_level: Option<f64>,
    pub dxy_level: Option<f64>,
    pub us10y_level: Option<f64>,
    pub us2y_level: Option<f64>,
    pub gold_level: Option<f64>,
    pub oil_level: Option<f64>,
    pub spx_level: Option<f64>,
    pub btc_level: Option<f64>,
    pub spread_2s10s: Option<f64>,
    pub hy_spread: Option<f64>,
    pub gold_silver_ratio: Option<f64>,
    pub copper_gold_ratio: Option<f64>,
    pub vix_term_structure: Option<f64>,
    pub spy_rsp_ratio: Option<f64>,
}

/// Latest closes for multiple Yahoo symbols; per-symbol failures are
/// recorded, never fatal.
pub async fn fetch_yahoo_batch(
    fetcher: &Fetcher,
    symbols: &[&str],
    lookback_days: i64,
) -> (
    HashMap<String, Decimal>,
    HashMap<String, Vec<PriceBar>>,
    Vec<String>,
) {
    let today = Utc::now().date_naive();
    let start = today - chrono::Duration::days(lookback_days);

    let mut latest_prices = HashMap::new();
    let mut all_bars = HashMap::new();
    let mut errors = Vec::new();

    for symbol in symbols {
        match fetch_yahoo_chart(fetcher, symbol, start, today).await {
            Ok(payload) => {
                let bars = parse_yahoo_chart(&payload, symbol);
                if bars.is_empty() {
                    errors.push(format!("No data for {symbol}"));
                    continue;
                }
                let latest = bars.iter().max_by_key(|bar| bar.price_date);
                match latest.and_then(|bar| bar.close) {
                    Some(close) => {
                        latest_prices.insert(symbol.to_string(), close);
                    }
                    None => errors.push(format!("No close price for {symbol}")),
                }
                all_bars.insert(symbol.to_string(), bars);
            }
            Err(err) => {
                tracing::warn!(symbol, error = %err, "Yahoo snapshot fetch failed");
                errors.push(format!("Yahoo fetch failed for {symbol}: {err}"));
            }
        }
    }

    tracing::info!(
        fetched = latest_prices.len(),
        requested = symbols.len(),
        "Yahoo batch fetch complete"
    );
    (latest_prices, all_bars, errors)
}

pub async fn fetch_fred_batch(
    fetcher: &Fetcher,
    series_ids: &[&str],
    api_key: &str,
) -> (HashMap<String, Decimal>, Vec<String>) {
    let values =
        get_latest_fred_values(fetcher, series_ids, api_key, DEFAULT_FRED_BASE_URL).await;

    let mut result = HashMap::new();
    let mut errors = Vec::new();
    for (series_id, value) in values {
        match value {
            Some(value) => {
                result.insert(series_id, value);
            }
            None => errors.push(format!("No FRED data for {series_id}")),
        }
    }
    tracing::info!(
        fetched = result.len(),
        requested = series_ids.len(),
        "FRED batch fetch complete"
    );
    (result, errors)
}

/// Derived ratios over the latest values, by symbol lookup.
pub fn calculate_ratios(
    yahoo_prices: &HashMap<String, Decimal>,
    fred_values: &HashMap<String, Decimal>,
) -> (HashMap<String, Decimal>, Vec<String>) {
    let get = |symbol: &str| {
        yahoo_prices
            .get(symbol)
            .or_else(|| fred_values.get(symbol))
            .copied()
    };

    let mut ratios = HashMap::new();
    let mut errors = Vec::new();
    for ratio in CALCULATED_RATIOS {
        let Some(numerator) = get(ratio.numerator_symbol) else {
            errors.push(format!(
                "Missing numerator {} for {}",
                ratio.numerator_symbol, ratio.name
            ));
            continue;
        };
        let Some(denominator) = get(ratio.denominator_symbol) else {
            errors.push(format!(
                "Missing denominator {} for {}",
                ratio.denominator_symbol, ratio.name
            ));
            continue;
        };
        if denominator.is_zero() {
            errors.push(format!("Zero denominator for {}", ratio.name));
            continue;
        }
        ratios.insert(ratio.name.to_string(), numerator / denominator);
    }
    (ratios, errors)
}

/// Fetch a complete snapshot of the core watchlist.
pub async fn fetch_market_snapshot(
    fred_api_key: &str,
    snapshot_date: Option<NaiveDate>,
) -> MarketSnapshot {
    let snapshot_date = snapshot_date.unwrap_or_else(|| Utc::now().date_naive());
    let yahoo_fetcher = Fetcher::with_timeout(Duration::from_secs(YAHOO_TIMEOUT_SECS));
    let fred_fetcher = Fetcher::with_timeout(Duration::from_secs(FRED_TIMEOUT_SECS));

    let mut errors = Vec::new();

    let symbols = yahoo_symbols();
    let (yahoo_prices, raw_yahoo_bars, yahoo_errors) =
        fetch_yahoo_batch(&yahoo_fetcher, &symbols, SNAPSHOT_LOOKBACK_DAYS).await;
    errors.extend(yahoo_errors);

    let series = fred_series();
    let (fred_values, fred_errors) = fetch_fred_batch(&fred_fetcher, &series, fred_api_key).await;
    errors.extend(fred_errors);

    let (calculated_ratios, ratio_errors) = calculate_ratios(&yahoo_prices, &fred_values);
    errors.extend(ratio_errors);

    tracing::info!(
        %snapshot_date,
        yahoo = yahoo_prices.len(),
        fred = fred_values.len(),
        ratios = calculated_ratios.len(),
        errors = errors.len(),
        "market snapshot complete"
    );

    MarketSnapshot {
        snapshot_date,
        yahoo_prices,
        fred_values,
        calculated_ratios,
        raw_yahoo_bars,
        errors,
    }
}

/// Key levels for the market_context columns, by fixed symbol mapping.
pub fn extract_key_levels(snapshot: &MarketSnapshot) -> KeyLevels {
    let value = |symbol: &str| snapshot.get_value(symbol).and_then(|d| d.to_f64());
    let ratio = |name: &str| snapshot.calculated_ratios.get(name).and_then(|d| d.to_f64());

    KeyLevels {
        vix_level: value("^VIX"),
        dxy_level: value("DX=F"),
        us10y_level: value("^TNX"),
        us2y_level: value("DGS2"),
        gold_level: value("GC=F"),
        oil_level: value("CL=F"),
        spx_level: value("^GSPC"),
        btc_level: value("BTC-USD"),
        spread_2s10s: value("T10Y2Y"),
        hy_spread: value("BAMLH0A0HYM2"),
        gold_silver_ratio: ratio("gold_silver"),
        copper_gold_ratio: ratio("copper_gold"),
        vix_term_structure: ratio("vix_term_structure"),
        spy_rsp_ratio: ratio("spy_rsp"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot_with(values: &[(&str, Decimal)], fred: &[(&str, Decimal)]) -> MarketSnapshot {
        let mut snapshot = MarketSnapshot::default();
        for (symbol, value) in values {
            snapshot.yahoo_prices.insert(symbol.to_string(), *value);
        }
        for (series, value) in fred {
            snapshot.fred_values.insert(series.to_string(), *value);
        }
        let (ratios, errors) = calculate_ratios(&snapshot.yahoo_prices, &snapshot.fred_values);
        snapshot.calculated_ratios = ratios;
        snapshot.errors = errors;
        snapshot
    }

    #[test]
    fn ratios_compute_from_latest_closes() {
        let snapshot = snapshot_with(
            &[
                ("GC=F", dec!(2000)),
                ("SI=F", dec!(25)),
                ("HG=F", dec!(4)),
                ("^VIX", dec!(20)),
                ("^VIX3M", dec!(22)),
                ("SPY", dec!(500)),
                ("RSP", dec!(160)),
                ("HYG", dec!(77)),
                ("LQD", dec!(110)),
            ],
            &[],
        );
        assert_eq!(snapshot.calculated_ratios["gold_silver"], dec!(80));
        assert_eq!(snapshot.calculated_ratios["copper_gold"], dec!(0.002));
        assert!(snapshot.calculated_ratios.contains_key("vix_vix3m"));
        assert!(snapshot.calculated_ratios.contains_key("hyg_lqd"));
    }

    #[test]
    fn missing_legs_surface_as_errors_not_panics() {
        let snapshot = snapshot_with(&[("GC=F", dec!(2000))], &[]);
        assert!(!snapshot.calculated_ratios.contains_key("gold_silver"));
        assert!(snapshot
            .errors
            .iter()
            .any(|e| e.contains("Missing denominator SI=F")));
    }

    #[test]
    fn zero_denominator_is_an_error() {
        let snapshot = snapshot_with(&[("GC=F", dec!(2000)), ("SI=F", dec!(0))], &[]);
        assert!(snapshot.errors.iter().any(|e| e.contains("Zero denominator")));
    }

    #[test]
    fn key_levels_map_symbols_to_columns() {
        let snapshot = snapshot_with(
            &[
                ("^VIX", dec!(22.5)),
                ("DX=F", dec!(102.0)),
                ("GC=F", dec!(2000)),
                ("SI=F", dec!(25)),
            ],
            &[("T10Y2Y", dec!(0.5)), ("BAMLH0A0HYM2", dec!(3.5))],
        );
        let levels = extract_key_levels(&snapshot);
        assert_eq!(levels.vix_level, Some(22.5));
        assert_eq!(levels.dxy_level, Some(102.0));
        assert_eq!(levels.spread_2s10s, Some(0.5));
        assert_eq!(levels.hy_spread, Some(3.5));
        assert_eq!(levels.gold_silver_ratio, Some(80.0));
        assert_eq!(levels.us10y_level, None);
    }
}
