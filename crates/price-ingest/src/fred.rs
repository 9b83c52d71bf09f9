//! FRED series observations stored as price bars.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use http_fetcher::Fetcher;
use meridian_core::PriceBar;

use crate::yahoo::parse_decimal;

pub const DEFAULT_FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred";
pub const FRED_TIMEOUT_SECS: u64 = 30;
pub const FRED_SOURCE: &str = "fred";
const INTER_REQUEST_DELAY_MS: u64 = 200;

/// A single FRED observation (date + value). `.` values are missing.
#[derive(Debug, Clone, PartialEq)]
pub struct FredObservation {
    pub series_id: String,
    pub observation_date: NaiveDate,
    pub value: Option<Decimal>,
}

pub fn observations_url(
    base_url: &str,
    series_id: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    api_key: &str,
) -> String {
    format!(
        "{}/series/observations?api_key={api_key}&file_type=json&series_id={series_id}&observation_start={start_date}&observation_end={end_date}&sort_order=asc",
        base_url.trim_end_matches('/')
    )
}

/// Parse a `series/observations` payload.
pub fn parse_fred_observations(payload: &Value, series_id: &str) -> Vec<FredObservation> {
    let Some(entries) = payload.get("observations").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut observations = Vec::new();
    for entry in entries {
        let Some(date_str) = entry.get("date").and_then(Value::as_str) else {
            continue;
        };
        let Ok(observation_date) = date_str.parse::<NaiveDate>() else {
            continue;
        };
        let value = match entry.get("value").and_then(Value::as_str) {
            Some(".") | None => None,
            Some(raw) => parse_decimal(Some(&Value::String(raw.to_string()))),
        };
        observations.push(FredObservation {
            series_id: series_id.to_string(),
            observation_date,
            value,
        });
    }
    observations
}

pub async fn fetch_fred_series(
    fetcher: &Fetcher,
    series_id: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    api_key: &str,
    base_url: &str,
) -> Vec<FredObservation> {
    if api_key.is_empty() {
        tracing::warn!(series_id, "no FRED API key configured; skipping series");
        return Vec::new();
    }
    let url = observations_url(base_url, series_id, start_date, end_date, api_key);
    let payload = match fetcher.get_text(&url).await {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(series_id, error = %err, "FRED series fetch failed");
            return Vec::new();
        }
    };
    let Ok(parsed) = serde_json::from_str::<Value>(&payload) else {
        tracing::warn!(series_id, "FRED payload was not valid JSON");
        return Vec::new();
    };
    parse_fred_observations(&parsed, series_id)
}

/// Fetch several series sequentially with a small inter-request delay.
pub async fn fetch_fred_series_batch(
    fetcher: &Fetcher,
    series_ids: &[&str],
    start_date: NaiveDate,
    end_date: NaiveDate,
    api_key: &str,
    base_url: &str,
) -> HashMap<String, Vec<FredObservation>> {
    let mut results = HashMap::new();
    for series_id in series_ids {
        let observations =
            fetch_fred_series(fetcher, series_id, start_date, end_date, api_key, base_url).await;
        results.insert(series_id.to_string(), observations);
        tokio::time::sleep(Duration::from_millis(INTER_REQUEST_DELAY_MS)).await;
    }
    results
}

/// FRED observations become bars with the value in both close and adj_close.
pub fn fred_observations_to_price_bars(observations: &[FredObservation]) -> Vec<PriceBar> {
    observations
        .iter()
        .filter_map(|obs| {
            let value = obs.value?;
            Some(PriceBar {
                symbol: obs.series_id.clone(),
                price_date: obs.observation_date,
                open: None,
                high: None,
                low: None,
                close: Some(value),
                adj_close: Some(value),
                volume: None,
            })
        })
        .collect()
}

/// Latest non-null value per series over the trailing five days.
pub async fn get_latest_fred_values(
    fetcher: &Fetcher,
    series_ids: &[&str],
    api_key: &str,
    base_url: &str,
) -> HashMap<String, Option<Decimal>> {
    let today = Utc::now().date_naive();
    let start = today - chrono::Duration::days(5);
    let by_series =
        fetch_fred_series_batch(fetcher, series_ids, start, today, api_key, base_url).await;

    by_series
        .into_iter()
        .map(|(series_id, observations)| {
            let latest = observations.iter().rev().find_map(|obs| obs.value);
            (series_id, latest)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_observations_and_treats_dot_as_missing() {
        let payload = serde_json::json!({
            "observations": [
                {"date": "2024-03-01", "value": "4.25"},
                {"date": "2024-03-02", "value": "."},
                {"date": "bad-date", "value": "4.30"},
                {"date": "2024-03-04", "value": "4.31"}
            ]
        });
        let observations = parse_fred_observations(&payload, "DGS2");
        assert_eq!(observations.len(), 3);
        assert_eq!(observations[0].value, Some(dec!(4.25)));
        assert_eq!(observations[1].value, None);
        assert_eq!(observations[2].value, Some(dec!(4.31)));
    }

    #[test]
    fn null_valued_observations_are_dropped_from_bars() {
        let observations = vec![
            FredObservation {
                series_id: "T10Y2Y".to_string(),
                observation_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                value: Some(dec!(0.5)),
            },
            FredObservation {
                series_id: "T10Y2Y".to_string(),
                observation_date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
                value: None,
            },
        ];
        let bars = fred_observations_to_price_bars(&observations);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, Some(dec!(0.5)));
        assert_eq!(bars[0].adj_close, Some(dec!(0.5)));
        assert_eq!(bars[0].open, None);
        assert_eq!(bars[0].volume, None);
    }

    #[test]
    fn missing_observations_key_yields_empty() {
        assert!(parse_fred_observations(&serde_json::json!({}), "DGS2").is_empty());
        assert!(parse_fred_observations(&serde_json::json!({"observations": "x"}), "DGS2").is_empty());
    }

    #[test]
    fn url_includes_window_and_key() {
        let url = observations_url(
            "https://api.stlouisfed.org/fred/",
            "DGS2",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            "secret",
        );
        assert!(url.starts_with("https://api.stlouisfed.org/fred/series/observations?"));
        assert!(url.contains("series_id=DGS2"));
        assert!(url.contains("observation_start=2024-01-01"));
        assert!(url.contains("observation_end=2024-01-31"));
    }
}
