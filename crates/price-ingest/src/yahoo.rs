//! Yahoo daily-chart fetching and parsing.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;

use http_fetcher::{FetchError, Fetcher};
use meridian_core::{PriceBar, RatioEntry};

pub const CORE_SYMBOLS: &[&str] = &["GC=F", "SI=F", "HG=F"];
pub const OPTIONAL_SYMBOLS: &[&str] = &["GLD", "SLV", "COPX", "NEM", "GOLD", "FCX"];
pub const DEFAULT_LOOKBACK_DAYS: i64 = 10;
pub const GOLD_SYMBOL: &str = "GC=F";
pub const SILVER_SYMBOL: &str = "SI=F";
pub const DEFAULT_RATIO_NAME: &str = "gold_silver";
pub const YAHOO_TIMEOUT_SECS: u64 = 10;

pub fn build_yahoo_chart_url(symbol: &str, start_date: NaiveDate, end_date: NaiveDate) -> String {
    let start = to_unix_seconds(start_date);
    let end = to_unix_seconds(end_date + chrono::Duration::days(1));
    let encoded: String = symbol
        .chars()
        .map(|c| match c {
            '=' => "%3D".to_string(),
            '^' => "%5E".to_string(),
            other => other.to_string(),
        })
        .collect();
    format!(
        "https://query1.finance.yahoo.com/v8/finance/chart/{encoded}?period1={start}&period2={end}&interval=1d&includeAdjustedClose=true"
    )
}

pub async fn fetch_yahoo_chart(
    fetcher: &Fetcher,
    symbol: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<String, FetchError> {
    fetcher
        .get_text(&build_yahoo_chart_url(symbol, start_date, end_date))
        .await
}

/// Parse a Yahoo chart payload into bars. A bar is kept only when its close
/// parses; other fields stay null when missing; NaN/Inf become null.
pub fn parse_yahoo_chart(payload: &str, symbol: &str) -> Vec<PriceBar> {
    let Ok(data) = serde_json::from_str::<Value>(payload) else {
        return Vec::new();
    };
    let chart = &data["chart"];
    if !chart["error"].is_null() {
        return Vec::new();
    }
    let Some(series) = chart["result"].get(0) else {
        return Vec::new();
    };
    let Some(timestamps) = series["timestamp"].as_array() else {
        return Vec::new();
    };
    let quote = &series["indicators"]["quote"][0];
    let adjclose = &series["indicators"]["adjclose"][0]["adjclose"];

    let mut bars = Vec::new();
    for (idx, ts) in timestamps.iter().enumerate() {
        let Some(price_date) = parse_timestamp_date(ts) else {
            continue;
        };
        let Some(close) = parse_decimal(value_at(&quote["close"], idx)) else {
            continue;
        };
        bars.push(PriceBar {
            symbol: symbol.to_string(),
            price_date,
            open: parse_decimal(value_at(&quote["open"], idx)),
            high: parse_decimal(value_at(&quote["high"], idx)),
            low: parse_decimal(value_at(&quote["low"], idx)),
            close: Some(close),
            adj_close: parse_decimal(value_at(adjclose, idx)),
            volume: parse_int(value_at(&quote["volume"], idx)),
        });
    }
    bars
}

/// Ratio of base close over quote close on the shared-date intersection.
pub fn build_ratio_series(
    base_symbol: &str,
    quote_symbol: &str,
    base_bars: &[PriceBar],
    quote_bars: &[PriceBar],
    ratio_name: &str,
) -> Vec<RatioEntry> {
    let base_map: std::collections::BTreeMap<NaiveDate, Decimal> = base_bars
        .iter()
        .filter(|bar| bar.symbol == base_symbol)
        .filter_map(|bar| bar.close.map(|close| (bar.price_date, close)))
        .collect();
    let quote_map: std::collections::BTreeMap<NaiveDate, Decimal> = quote_bars
        .iter()
        .filter(|bar| bar.symbol == quote_symbol)
        .filter_map(|bar| bar.close.map(|close| (bar.price_date, close)))
        .collect();

    base_map
        .iter()
        .filter_map(|(date, base_value)| {
            let quote_value = quote_map.get(date)?;
            if quote_value.is_zero() {
                return None;
            }
            Some(RatioEntry {
                ratio_name: ratio_name.to_string(),
                price_date: *date,
                value: *base_value / *quote_value,
                base_symbol: base_symbol.to_string(),
                quote_symbol: quote_symbol.to_string(),
            })
        })
        .collect()
}

pub fn parse_decimal(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::Number(number) => {
            let float = number.as_f64()?;
            if !float.is_finite() {
                return None;
            }
            Decimal::from_f64(float)
        }
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") || trimmed.eq_ignore_ascii_case("nan")
            {
                return None;
            }
            trimmed.parse().ok()
        }
        _ => None,
    }
}

pub fn parse_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                return Some(int);
            }
            let float = number.as_f64()?;
            float.is_finite().then_some(float as i64)
        }
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

fn parse_timestamp_date(value: &Value) -> Option<NaiveDate> {
    let ts = value.as_i64().or_else(|| {
        let float = value.as_f64()?;
        float.is_finite().then_some(float as i64)
    })?;
    DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
}

fn value_at(values: &Value, idx: usize) -> Option<&Value> {
    values.as_array()?.get(idx)
}

fn to_unix_seconds(date: NaiveDate) -> i64 {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight exists"))
        .timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_payload() -> String {
        serde_json::json!({
            "chart": {
                "result": [{
                    "timestamp": [1700006400, 1700092800, 1700179200],
                    "indicators": {
                        "quote": [{
                            "open": [1990.0, null, 2002.5],
                            "high": [2001.0, 2010.0, 2012.0],
                            "low": [1985.0, 1995.0, 1998.0],
                            "close": [2000.0, null, 2010.0],
                            "volume": [120000, 90000, null]
                        }],
                        "adjclose": [{
                            "adjclose": [2000.0, 2005.0, 2010.0]
                        }]
                    }
                }],
                "error": null
            }
        })
        .to_string()
    }

    #[test]
    fn parses_bars_and_drops_missing_closes() {
        let bars = parse_yahoo_chart(&sample_payload(), "GC=F");
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, Some(dec!(2000.0)));
        assert_eq!(bars[0].volume, Some(120000));
        assert_eq!(bars[1].open, Some(dec!(2002.5)));
        assert_eq!(bars[1].volume, None);
    }

    #[test]
    fn timestamps_convert_to_utc_dates() {
        let bars = parse_yahoo_chart(&sample_payload(), "GC=F");
        assert_eq!(bars[0].price_date, NaiveDate::from_ymd_opt(2023, 11, 15).unwrap());
    }

    #[test]
    fn error_payloads_and_garbage_yield_nothing() {
        assert!(parse_yahoo_chart("not json", "GC=F").is_empty());
        let error_payload = serde_json::json!({
            "chart": {"result": null, "error": {"code": "Not Found"}}
        })
        .to_string();
        assert!(parse_yahoo_chart(&error_payload, "GC=F").is_empty());
    }

    #[test]
    fn chart_url_encodes_symbol_and_window() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let url = build_yahoo_chart_url("GC=F", start, end);
        assert!(url.contains("GC%3DF"));
        assert!(url.contains("interval=1d"));
        assert!(url.contains("period1=1704067200"));
        // period2 is exclusive of the day after end.
        assert!(url.contains("period2=1704931200"));
    }

    fn bar(symbol: &str, day: u32, close: Option<Decimal>) -> PriceBar {
        PriceBar {
            symbol: symbol.to_string(),
            price_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            open: None,
            high: None,
            low: None,
            close,
            adj_close: close,
            volume: None,
        }
    }

    #[test]
    fn ratio_series_uses_shared_dates_only() {
        let gold = vec![
            bar("GC=F", 1, Some(dec!(2000))),
            bar("GC=F", 2, Some(dec!(2020))),
            bar("GC=F", 3, Some(dec!(2040))),
        ];
        let silver = vec![
            bar("SI=F", 2, Some(dec!(25))),
            bar("SI=F", 3, Some(dec!(0))),
            bar("SI=F", 4, Some(dec!(26))),
        ];
        let ratios = build_ratio_series("GC=F", "SI=F", &gold, &silver, DEFAULT_RATIO_NAME);
        // Only March 2 is shared with a non-zero quote.
        assert_eq!(ratios.len(), 1);
        assert_eq!(ratios[0].value, dec!(80.8));
        assert_eq!(ratios[0].ratio_name, "gold_silver");
    }

    #[test]
    fn decimal_parser_rejects_non_finite_markers() {
        assert_eq!(parse_decimal(Some(&Value::String("nan".into()))), None);
        assert_eq!(parse_decimal(Some(&Value::String("null".into()))), None);
        assert_eq!(parse_decimal(Some(&Value::String(" 42.5 ".into()))), Some(dec!(42.5)));
        assert_eq!(parse_decimal(Some(&Value::Null)), None);
        assert_eq!(parse_decimal(None), None);
    }
}
