//! Market regime classification and position sizing.
//!
//! Four regimes from fixed thresholds (volatility on VIX, dollar on DXY,
//! curve on the 2s10s spread, credit on HY OAS) plus a conservative
//! position-sizing multiplier: the minimum of the volatility and credit
//! adjustments.

use serde::{Deserialize, Serialize};

use meridian_core::watchlist::{
    credit_multiplier, volatility_multiplier, CREDIT_REGIME_THRESHOLDS, CURVE_REGIME_THRESHOLDS,
    DXY_STRONG_LEVEL, DXY_WEAK_LEVEL, VOLATILITY_REGIME_THRESHOLDS,
};
use meridian_core::{MarketContextRecord, MarketSnapshot, MeridianError};
use meridian_store::Store;
use price_ingest::{extract_key_levels, fetch_market_snapshot, KeyLevels};

pub const UNKNOWN_REGIME: &str = "unknown";

/// Classification of current market regimes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeClassification {
    pub volatility_regime: String,
    pub dollar_regime: String,
    pub curve_regime: String,
    pub credit_regime: String,
}

/// VIX floors: >=40 crisis, >=30 fear, >=20 elevated, >=15 normal, else calm.
pub fn classify_volatility_regime(vix_level: Option<f64>) -> String {
    let Some(vix) = vix_level else {
        return UNKNOWN_REGIME.to_string();
    };
    for (regime, floor) in VOLATILITY_REGIME_THRESHOLDS {
        if vix >= *floor {
            return regime.to_string();
        }
    }
    "calm".to_string()
}

/// Absolute DXY level: >=105 strong, <=95 weak, else neutral.
pub fn classify_dollar_regime(dxy_level: Option<f64>) -> String {
    let Some(dxy) = dxy_level else {
        return UNKNOWN_REGIME.to_string();
    };
    if dxy >= DXY_STRONG_LEVEL {
        "strong".to_string()
    } else if dxy <= DXY_WEAK_LEVEL {
        "weak".to_string()
    } else {
        "neutral".to_string()
    }
}

/// 2s10s spread in percentage points: >=1.0 steep, >=0.25 normal, >=0 flat,
/// negative inverted.
pub fn classify_curve_regime(spread_2s10s: Option<f64>) -> String {
    let Some(spread) = spread_2s10s else {
        return UNKNOWN_REGIME.to_string();
    };
    for (regime, floor) in CURVE_REGIME_THRESHOLDS {
        if spread >= *floor {
            return regime.to_string();
        }
    }
    "inverted".to_string()
}

/// HY OAS in basis points: >=800 crisis, >=500 stressed, >=400 wide,
/// >=300 normal, else tight.
pub fn classify_credit_regime(hy_spread: Option<f64>) -> String {
    let Some(spread) = hy_spread else {
        return UNKNOWN_REGIME.to_string();
    };
    for (regime, floor) in CREDIT_REGIME_THRESHOLDS {
        if spread >= *floor {
            return regime.to_string();
        }
    }
    "tight".to_string()
}

pub fn classify_regimes(snapshot: &MarketSnapshot) -> RegimeClassification {
    let levels = extract_key_levels(snapshot);
    classify_key_levels(&levels)
}

pub fn classify_key_levels(levels: &KeyLevels) -> RegimeClassification {
    RegimeClassification {
        volatility_regime: classify_volatility_regime(levels.vix_level),
        dollar_regime: classify_dollar_regime(levels.dxy_level),
        curve_regime: classify_curve_regime(levels.spread_2s10s),
        credit_regime: classify_credit_regime(levels.hy_spread),
    }
}

/// min(vol, credit) against the published tables; unknown regimes map to 1.0.
pub fn calculate_position_multiplier(regimes: &RegimeClassification) -> f64 {
    let vol = volatility_multiplier(&regimes.volatility_regime);
    let credit = credit_multiplier(&regimes.credit_regime);
    vol.min(credit)
}

/// Build the complete market-context row for a snapshot.
pub fn build_market_context_record(
    snapshot: &MarketSnapshot,
    regimes: Option<RegimeClassification>,
) -> MarketContextRecord {
    let levels = extract_key_levels(snapshot);
    let regimes = regimes.unwrap_or_else(|| classify_key_levels(&levels));
    let multiplier = calculate_position_multiplier(&regimes);
    let (raw_prices, raw_fred) = snapshot.to_raw_json();

    MarketContextRecord {
        context_date: snapshot.snapshot_date,
        volatility_regime: regimes.volatility_regime,
        dollar_regime: regimes.dollar_regime,
        curve_regime: regimes.curve_regime,
        credit_regime: regimes.credit_regime,
        vix_level: levels.vix_level,
        dxy_level: levels.dxy_level,
        us10y_level: levels.us10y_level,
        us2y_level: levels.us2y_level,
        gold_level: levels.gold_level,
        oil_level: levels.oil_level,
        spx_level: levels.spx_level,
        btc_level: levels.btc_level,
        spread_2s10s: levels.spread_2s10s,
        hy_spread: levels.hy_spread,
        gold_silver_ratio: levels.gold_silver_ratio,
        copper_gold_ratio: levels.copper_gold_ratio,
        vix_term_structure: levels.vix_term_structure,
        spy_rsp_ratio: levels.spy_rsp_ratio,
        suggested_size_multiplier: multiplier,
        raw_prices,
        raw_fred,
    }
}

/// Full pipeline: fetch snapshot, classify, store. Returns the stored row.
pub async fn ingest_market_context(
    store: &Store,
    fred_api_key: &str,
) -> Result<MarketContextRecord, MeridianError> {
    let snapshot = fetch_market_snapshot(fred_api_key, None).await;
    let record = build_market_context_record(&snapshot, None);
    store.upsert_market_context(&record).await?;
    tracing::info!(context_date = %record.context_date, "market context upserted");
    Ok(record)
}

/// Human-readable rendering for LLM prompt injection.
pub fn format_context_for_llm(record: &MarketContextRecord) -> String {
    let mut lines = vec![
        "=== CURRENT MARKET CONTEXT ===".to_string(),
        format!("Date: {}", record.context_date),
        String::new(),
        "REGIME CLASSIFICATION:".to_string(),
        format!("  Volatility: {}", record.volatility_regime.to_uppercase()),
        format!("  Dollar: {}", record.dollar_regime.to_uppercase()),
        format!("  Yield Curve: {}", record.curve_regime.to_uppercase()),
        format!("  Credit: {}", record.credit_regime.to_uppercase()),
        format!(
            "  Suggested Position Size: {:.0}%",
            record.suggested_size_multiplier * 100.0
        ),
        String::new(),
        "KEY LEVELS:".to_string(),
    ];

    if let Some(vix) = record.vix_level {
        lines.push(format!("  VIX: {vix:.2}"));
    }
    if let Some(dxy) = record.dxy_level {
        lines.push(format!("  DXY: {dxy:.2}"));
    }
    if let Some(us10y) = record.us10y_level {
        lines.push(format!("  US10Y: {us10y:.2}"));
    }
    if let Some(spread) = record.spread_2s10s {
        lines.push(format!("  2s10s Spread: {spread:.2}"));
    }
    if let Some(gold) = record.gold_level {
        lines.push(format!("  Gold: ${gold:.2}"));
    }
    if let Some(oil) = record.oil_level {
        lines.push(format!("  Oil: ${oil:.2}"));
    }
    if let Some(spx) = record.spx_level {
        lines.push(format!("  S&P 500: {spx:.2}"));
    }
    if let Some(btc) = record.btc_level {
        lines.push(format!("  Bitcoin: ${btc:.2}"));
    }
    if let Some(hy) = record.hy_spread {
        lines.push(format!("  HY Spread: {hy:.0}bps"));
    }

    lines.push(String::new());
    lines.push("KEY RATIOS:".to_string());
    if let Some(ratio) = record.gold_silver_ratio {
        lines.push(format!("  Gold/Silver: {ratio:.1}"));
    }
    if let Some(ratio) = record.copper_gold_ratio {
        lines.push(format!("  Copper/Gold: {ratio:.4}"));
    }
    if let Some(term) = record.vix_term_structure {
        let label = if term > 1.0 {
            "backwardation (panic)"
        } else {
            "contango (normal)"
        };
        lines.push(format!("  VIX Term Structure: {term:.2} ({label})"));
    }
    if let Some(ratio) = record.spy_rsp_ratio {
        let label = if ratio > 1.05 {
            "narrow (mega-cap led)"
        } else {
            "healthy"
        };
        lines.push(format!("  SPY/RSP: {ratio:.3} ({label})"));
    }

    lines.push(String::new());
    lines.push("=".repeat(30));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regimes(vol: &str, credit: &str) -> RegimeClassification {
        RegimeClassification {
            volatility_regime: vol.to_string(),
            dollar_regime: "neutral".to_string(),
            curve_regime: "normal".to_string(),
            credit_regime: credit.to_string(),
        }
    }

    #[test]
    fn volatility_boundaries_classify_exactly() {
        assert_eq!(classify_volatility_regime(Some(14.9)), "calm");
        assert_eq!(classify_volatility_regime(Some(15.0)), "normal");
        assert_eq!(classify_volatility_regime(Some(20.0)), "elevated");
        assert_eq!(classify_volatility_regime(Some(30.0)), "fear");
        assert_eq!(classify_volatility_regime(Some(40.0)), "crisis");
        assert_eq!(classify_volatility_regime(None), UNKNOWN_REGIME);
    }

    #[test]
    fn dollar_uses_absolute_levels() {
        assert_eq!(classify_dollar_regime(Some(105.0)), "strong");
        assert_eq!(classify_dollar_regime(Some(102.0)), "neutral");
        assert_eq!(classify_dollar_regime(Some(95.0)), "weak");
        assert_eq!(classify_dollar_regime(None), UNKNOWN_REGIME);
    }

    #[test]
    fn curve_boundaries_classify_exactly() {
        assert_eq!(classify_curve_regime(Some(1.0)), "steep");
        assert_eq!(classify_curve_regime(Some(0.25)), "normal");
        assert_eq!(classify_curve_regime(Some(0.0)), "flat");
        assert_eq!(classify_curve_regime(Some(-0.01)), "inverted");
        assert_eq!(classify_curve_regime(None), UNKNOWN_REGIME);
    }

    #[test]
    fn credit_boundaries_classify_exactly() {
        assert_eq!(classify_credit_regime(Some(299.0)), "tight");
        assert_eq!(classify_credit_regime(Some(300.0)), "normal");
        assert_eq!(classify_credit_regime(Some(400.0)), "wide");
        assert_eq!(classify_credit_regime(Some(500.0)), "stressed");
        assert_eq!(classify_credit_regime(Some(800.0)), "crisis");
        assert_eq!(classify_credit_regime(None), UNKNOWN_REGIME);
    }

    #[test]
    fn spec_snapshot_scenario_classifies_elevated() {
        let levels = KeyLevels {
            vix_level: Some(22.5),
            dxy_level: Some(102.0),
            spread_2s10s: Some(0.5),
            hy_spread: Some(350.0),
            ..Default::default()
        };
        let classified = classify_key_levels(&levels);
        assert_eq!(classified.volatility_regime, "elevated");
        assert_eq!(classified.dollar_regime, "neutral");
        assert_eq!(classified.curve_regime, "normal");
        assert_eq!(classified.credit_regime, "normal");
        assert_eq!(calculate_position_multiplier(&classified), 0.75);
    }

    #[test]
    fn multiplier_takes_the_minimum_leg() {
        assert_eq!(calculate_position_multiplier(&regimes("fear", "wide")), 0.50);
        assert_eq!(calculate_position_multiplier(&regimes("calm", "crisis")), 0.25);
        assert_eq!(calculate_position_multiplier(&regimes("unknown", "unknown")), 1.0);
    }

    #[test]
    fn multiplier_stays_in_published_range() {
        for vol in ["calm", "normal", "elevated", "fear", "crisis", "unknown"] {
            for credit in ["tight", "normal", "wide", "stressed", "crisis", "unknown"] {
                let value = calculate_position_multiplier(&regimes(vol, credit));
                assert!((0.25..=1.0).contains(&value), "{vol}/{credit}: {value}");
            }
        }
    }

    #[test]
    fn record_building_carries_levels_and_audit_blobs() {
        use rust_decimal::Decimal;
        let mut snapshot = MarketSnapshot::default();
        snapshot
            .yahoo_prices
            .insert("^VIX".to_string(), Decimal::new(225, 1));
        snapshot
            .fred_values
            .insert("BAMLH0A0HYM2".to_string(), Decimal::new(350, 0));

        let record = build_market_context_record(&snapshot, None);
        assert_eq!(record.volatility_regime, "elevated");
        assert_eq!(record.credit_regime, "normal");
        assert_eq!(record.dollar_regime, UNKNOWN_REGIME);
        assert_eq!(record.suggested_size_multiplier, 0.75);
        assert!(record.raw_prices.get("^VIX").is_some());
        assert!(record.raw_fred.get("BAMLH0A0HYM2").is_some());
    }

    #[test]
    fn llm_formatting_mentions_regimes() {
        let mut snapshot = MarketSnapshot::default();
        snapshot
            .yahoo_prices
            .insert("^VIX".to_string(), rust_decimal::Decimal::from(22));
        let record = build_market_context_record(&snapshot, None);
        let text = format_context_for_llm(&record);
        assert!(text.contains("Volatility: ELEVATED"));
        assert!(text.contains("VIX: 22.00"));
    }
}
