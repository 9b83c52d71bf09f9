use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Daily OHLCV bar. FRED-sourced bars carry only `close`/`adj_close`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub symbol: String,
    pub price_date: NaiveDate,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    pub adj_close: Option<Decimal>,
    pub volume: Option<i64>,
}

/// Derived price ratio, unique by `(ratio_name, price_date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioEntry {
    pub ratio_name: String,
    pub price_date: NaiveDate,
    pub value: Decimal,
    pub base_symbol: String,
    pub quote_symbol: String,
}

/// A new macro event as produced by the RSS ingestor, before scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMacroEvent {
    pub source: String,
    pub headline: String,
    pub url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// A stored macro event as read back for scoring and analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroEventRecord {
    pub id: Uuid,
    pub source: String,
    pub headline: String,
    pub full_text: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub event_type: Option<String>,
    pub regions: Option<Vec<String>>,
    pub entities: Option<Vec<String>>,
    pub significance_score: Option<i32>,
}

/// Significance score fields written back onto a macro event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreUpdate {
    pub significance_score: i32,
    pub score_components: serde_json::Value,
    pub priority_flag: bool,
}

/// Structured interpretation written back by the analysis pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventAnalysisUpdate {
    pub raw_facts: Vec<String>,
    pub metal_impacts: serde_json::Value,
    pub historical_precedent: String,
    pub counter_case: String,
    pub crypto_transmission: serde_json::Value,
}

/// Calendar entry, unique by `(event_name, event_date, region)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicCalendarEvent {
    pub event_name: String,
    pub event_date: DateTime<Utc>,
    pub region: String,
    pub impact_level: String,
    pub expected_value: Option<String>,
    pub actual_value: Option<String>,
    pub previous_value: Option<String>,
    pub surprise_direction: Option<String>,
    pub surprise_magnitude: Option<Decimal>,
}

/// A dated central-bank text statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentralBankComm {
    pub bank: String,
    pub comm_type: String,
    pub published_at: DateTime<Utc>,
    pub full_text: String,
}

/// One metals knowledge-base entry, unique by `(metal, category)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetalsKnowledgeEntry {
    pub metal: String,
    pub category: String,
    pub content: serde_json::Value,
}

/// Fields of a historical case used by the fallback matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalCase {
    pub event_name: String,
    pub date_range: Option<String>,
    pub event_type: Option<String>,
    pub significance_score: Option<i32>,
    pub structural_drivers: Option<Vec<String>>,
    pub lessons: Option<Vec<String>>,
    pub counter_examples: Option<Vec<String>>,
    pub traditional_market_reaction: Option<Vec<String>>,
}

/// Richer case view fed into analysis prompts and horizon recommendations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalCaseSummary {
    pub id: Uuid,
    pub event_name: String,
    pub date_range: Option<String>,
    pub event_type: Option<String>,
    pub significance_score: Option<i32>,
    pub metal_impacts: Option<serde_json::Value>,
    pub crypto_transmission: Option<serde_json::Value>,
    pub quantitative_impacts: Option<serde_json::Value>,
    pub time_horizon_behavior: Option<serde_json::Value>,
    pub transmission_channels: Option<Vec<String>>,
    pub lessons: Option<Vec<String>>,
    pub counter_examples: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Embedding,
    Fallback,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Embedding => "embedding",
            MatchMethod::Fallback => "fallback",
        }
    }
}

/// A ranked historical-case match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalMatch {
    pub event_name: String,
    pub date_range: Option<String>,
    pub event_type: Option<String>,
    pub significance_score: Option<i32>,
    pub match_method: MatchMethod,
    pub distance: Option<f64>,
    pub match_score: Option<i64>,
}

/// A point-in-time snapshot of all core watchlist instruments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub snapshot_date: NaiveDate,
    pub yahoo_prices: HashMap<String, Decimal>,
    pub fred_values: HashMap<String, Decimal>,
    pub calculated_ratios: HashMap<String, Decimal>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub raw_yahoo_bars: HashMap<String, Vec<PriceBar>>,
    pub errors: Vec<String>,
}

impl MarketSnapshot {
    /// Look a value up by symbol, checking Yahoo prices then FRED series.
    pub fn get_value(&self, symbol: &str) -> Option<Decimal> {
        self.yahoo_prices
            .get(symbol)
            .or_else(|| self.fred_values.get(symbol))
            .copied()
    }

    /// Raw JSON blobs for the audit columns: (prices, fred).
    pub fn to_raw_json(&self) -> (serde_json::Value, serde_json::Value) {
        let prices: serde_json::Map<String, serde_json::Value> = self
            .yahoo_prices
            .iter()
            .map(|(k, v)| (k.clone(), decimal_json(*v)))
            .collect();
        let fred: serde_json::Map<String, serde_json::Value> = self
            .fred_values
            .iter()
            .map(|(k, v)| (k.clone(), decimal_json(*v)))
            .collect();
        (serde_json::Value::Object(prices), serde_json::Value::Object(fred))
    }
}

fn decimal_json(value: Decimal) -> serde_json::Value {
    use rust_decimal::prelude::ToPrimitive;
    value
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Daily market-context row, unique by `context_date`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketContextRecord {
    pub context_date: NaiveDate,
    pub volatility_regime: String,
    pub dollar_regime: String,
    pub curve_regime: String,
    pub credit_regime: String,
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
    pub suggested_size_multiplier: f64,
    pub raw_prices: serde_json::Value,
    pub raw_fred: serde_json::Value,
}

/// Cached daily digest row, unique by `digest_date`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyDigest {
    pub digest_date: NaiveDate,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub priority_events: Vec<serde_json::Value>,
    pub metals_snapshot: serde_json::Value,
    pub economic_calendar: Vec<serde_json::Value>,
    pub active_theses: Vec<serde_json::Value>,
    pub full_digest: String,
    pub timezone: String,
}

/// Priority event view used by the digest composer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityEventSummary {
    pub id: Uuid,
    pub source: String,
    pub headline: String,
    pub published_at: Option<DateTime<Utc>>,
    pub score: Option<i32>,
    pub analysis_ready: bool,
}

/// Thesis fields the core reads for digest composition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThesisSummary {
    pub id: Uuid,
    pub title: String,
    pub asset_type: Option<String>,
    pub asset_symbol: Option<String>,
    pub status: Option<String>,
    pub price_change_percent: Option<Decimal>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn snapshot_lookup_prefers_yahoo_over_fred() {
        let mut snapshot = MarketSnapshot::default();
        snapshot.yahoo_prices.insert("^VIX".to_string(), dec!(22.5));
        snapshot.fred_values.insert("DGS2".to_string(), dec!(4.1));

        assert_eq!(snapshot.get_value("^VIX"), Some(dec!(22.5)));
        assert_eq!(snapshot.get_value("DGS2"), Some(dec!(4.1)));
        assert_eq!(snapshot.get_value("GC=F"), None);
    }

    #[test]
    fn raw_json_carries_both_sources() {
        let mut snapshot = MarketSnapshot::default();
        snapshot.yahoo_prices.insert("GC=F".to_string(), dec!(2000));
        snapshot.fred_values.insert("T10Y2Y".to_string(), dec!(0.5));

        let (prices, fred) = snapshot.to_raw_json();
        assert_eq!(prices["GC=F"], serde_json::json!(2000.0));
        assert_eq!(fred["T10Y2Y"], serde_json::json!(0.5));
    }
}
