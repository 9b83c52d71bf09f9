//! Horizon-aware trade recommendations.
//!
//! Short term (1-5 days) wants futures and high-liquidity ETFs, medium term
//! (2-8 weeks) sector ETFs and stocks, long term (6+ months) miners and
//! producers. Direction comes from matched historical behaviour, falling
//! back to channel polarity.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use conviction::ConvictionLevel;
use meridian_core::HistoricalCaseSummary;
use transmission::ChannelType;

pub const MAX_INSTRUMENTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeHorizon {
    ShortTerm,
    MediumTerm,
    LongTerm,
}

impl TradeHorizon {
    pub fn label(&self) -> &'static str {
        match self {
            TradeHorizon::ShortTerm => "Short-Term (1-5 days)",
            TradeHorizon::MediumTerm => "Medium-Term (2-8 weeks)",
            TradeHorizon::LongTerm => "Long-Term (6+ months)",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TradeHorizon::ShortTerm => {
                "Immediate reaction trades. Focus on high-liquidity instruments with \
                 tight spreads. Use futures and spot ETFs for quick execution."
            }
            TradeHorizon::MediumTerm => {
                "Trend-following positions. Use sector ETFs and individual stocks for \
                 larger moves. Consider options spreads for defined risk."
            }
            TradeHorizon::LongTerm => {
                "Structural positioning. Accumulate equity positions in quality names. \
                 Use miners and producers for leveraged commodity exposure."
            }
        }
    }

    fn behavior_key(&self) -> &'static str {
        match self {
            TradeHorizon::ShortTerm => "short_term_1_5d",
            TradeHorizon::MediumTerm => "medium_term_2_8w",
            TradeHorizon::LongTerm => "long_term_6m_plus",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    Long,
    Short,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonRecommendation {
    pub horizon: TradeHorizon,
    pub horizon_label: String,
    pub instruments: Vec<String>,
    pub direction: TradeDirection,
    pub rationale: String,
    pub conviction: ConvictionLevel,
    pub entry_approach: String,
    pub risk_management: String,
    pub expected_magnitude: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonAnalysis {
    pub event_summary: String,
    pub short_term: HorizonRecommendation,
    pub medium_term: HorizonRecommendation,
    pub long_term: HorizonRecommendation,
    pub warnings: Vec<String>,
}

impl HorizonAnalysis {
    pub fn all_recommendations(&self) -> [&HorizonRecommendation; 3] {
        [&self.short_term, &self.medium_term, &self.long_term]
    }
}

const COMMODITY_CHANNELS: [ChannelType; 3] = [
    ChannelType::OilSupplyDisruption,
    ChannelType::OilDemandShock,
    ChannelType::NaturalGasSupply,
];

pub fn analyze_time_horizons(
    event_headline: &str,
    channels: &[ChannelType],
    historical_cases: &[HistoricalCaseSummary],
    quantitative_impacts: Option<&Value>,
    conviction_level: ConvictionLevel,
) -> HorizonAnalysis {
    let mut warnings = Vec::new();
    if historical_cases.is_empty() {
        warnings.push("No historical cases matched".to_string());
    }
    if quantitative_impacts.is_none() {
        warnings.push("No quantitative impact data".to_string());
    }
    if matches!(
        conviction_level,
        ConvictionLevel::Low | ConvictionLevel::Insufficient
    ) {
        warnings.push("Conviction is low; treat recommendations as exploratory".to_string());
    }

    let behavior_case = historical_cases
        .iter()
        .find(|case| case.time_horizon_behavior.is_some());

    let build = |horizon| {
        build_recommendation(
            horizon,
            channels,
            behavior_case,
            quantitative_impacts,
            conviction_level,
        )
    };

    HorizonAnalysis {
        event_summary: event_headline.to_string(),
        short_term: build(TradeHorizon::ShortTerm),
        medium_term: build(TradeHorizon::MediumTerm),
        long_term: build(TradeHorizon::LongTerm),
        warnings,
    }
}

fn build_recommendation(
    horizon: TradeHorizon,
    channels: &[ChannelType],
    behavior_case: Option<&HistoricalCaseSummary>,
    quantitative_impacts: Option<&Value>,
    conviction_level: ConvictionLevel,
) -> HorizonRecommendation {
    let instruments = select_instruments(horizon, channels);
    let uses_oil = channels.iter().any(|c| COMMODITY_CHANNELS.contains(c));

    let behavior = behavior_case
        .and_then(|case| case.time_horizon_behavior.as_ref())
        .and_then(|b| b.get(horizon.behavior_key()));

    let (direction, rationale) = derive_direction(behavior, uses_oil, channels, behavior_case);
    let expected_magnitude = derive_magnitude(horizon, behavior, uses_oil, quantitative_impacts);
    let (entry_approach, risk_management) = horizon_playbook(horizon);

    HorizonRecommendation {
        horizon,
        horizon_label: horizon.label().to_string(),
        instruments,
        direction,
        rationale,
        conviction: conviction_level,
        entry_approach: entry_approach.to_string(),
        risk_management: risk_management.to_string(),
        expected_magnitude,
    }
}

/// Instruments from the horizon x channel catalogue, deduplicated across
/// matched channels, horizon defaults when nothing matches, capped at 8.
pub fn select_instruments(horizon: TradeHorizon, channels: &[ChannelType]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut instruments = Vec::new();
    for channel in channels {
        for ticker in catalogue(horizon, *channel) {
            if seen.insert(*ticker) {
                instruments.push(ticker.to_string());
            }
        }
    }
    if instruments.is_empty() {
        instruments = horizon_defaults(horizon).iter().map(|t| t.to_string()).collect();
    }
    instruments.truncate(MAX_INSTRUMENTS);
    instruments
}

fn horizon_defaults(horizon: TradeHorizon) -> &'static [&'static str] {
    match horizon {
        TradeHorizon::ShortTerm => &["GC=F", "SI=F", "CL=F", "GLD", "SLV", "USO"],
        TradeHorizon::MediumTerm => &["GDX", "XLE", "XME", "COPX", "SLV", "GLD"],
        TradeHorizon::LongTerm => &["GDX", "GDXJ", "COPX", "XME", "FCX", "NEM"],
    }
}

fn catalogue(horizon: TradeHorizon, channel: ChannelType) -> &'static [&'static str] {
    use ChannelType::*;
    match horizon {
        TradeHorizon::ShortTerm => match channel {
            OilSupplyDisruption | OilDemandShock => &["CL=F", "BZ=F", "USO", "XLE"],
            NaturalGasSupply => &["NG=F", "UNG", "LNG"],
            MetalsSupply => &["GC=F", "SI=F", "HG=F", "GLD", "SLV"],
            AgriculturalSupply => &["ZW=F", "ZC=F", "ZS=F", "DBA"],
            DollarStrength | DollarWeakness => &["DX=F", "UUP", "FXE"],
            EmCurrencyStress | CarryTradeUnwind | YuanDevaluation => &["FXY", "EEM", "CEW"],
            FedHawkish | FedDovish | YieldCurveInversion => &["TLT", "IEF", "SHY"],
            CreditTightening | LiquidityCrisis => &["HYG", "LQD", "SHY", "BIL"],
            RiskOffFlight | VixSpike => &["GLD", "TLT", "VIXY", "UUP"],
            RiskOnRally => &["SPY", "QQQ", "IWM"],
            TradeSanctions | CapitalControls | ExportRestrictions => &["GC=F", "CL=F", "DBC"],
            InflationSpike | DeflationRisk | WagePressure => &["GC=F", "TIP", "TLT"],
        },
        TradeHorizon::MediumTerm => match channel {
            OilSupplyDisruption | OilDemandShock => &["XLE", "XOP", "VLO", "OXY"],
            NaturalGasSupply => &["EQT", "AR", "LNG", "UNG"],
            MetalsSupply => &["GDX", "COPX", "XME", "FCX"],
            AgriculturalSupply => &["ADM", "BG", "MOS", "DBA"],
            DollarStrength | DollarWeakness => &["UUP", "UDN", "EEM"],
            EmCurrencyStress | CarryTradeUnwind | YuanDevaluation => &["EEM", "EMB", "FXI"],
            FedHawkish | FedDovish | YieldCurveInversion => &["TLT", "XLF", "KRE"],
            CreditTightening | LiquidityCrisis => &["HYG", "BKLN", "KRE"],
            RiskOffFlight | VixSpike => &["GLD", "XLP", "XLU"],
            RiskOnRally => &["IWM", "XLY", "EEM"],
            TradeSanctions | CapitalControls | ExportRestrictions => &["XME", "REMX", "DBC"],
            InflationSpike | DeflationRisk | WagePressure => &["TIP", "XLE", "VNQ"],
        },
        TradeHorizon::LongTerm => match channel {
            OilSupplyDisruption | OilDemandShock => &["XOM", "CVX", "COP", "XLE"],
            NaturalGasSupply => &["LNG", "EQT", "TELL"],
            MetalsSupply => &["GDX", "GDXJ", "FCX", "SCCO", "NEM"],
            AgriculturalSupply => &["NTR", "MOS", "ADM"],
            DollarStrength | DollarWeakness => &["GLD", "EEM", "VEU"],
            EmCurrencyStress | CarryTradeUnwind | YuanDevaluation => &["EEM", "VWO", "FXI"],
            FedHawkish | FedDovish | YieldCurveInversion => &["TLT", "ZROZ", "XLF"],
            CreditTightening | LiquidityCrisis => &["LQD", "AGG", "GLD"],
            RiskOffFlight | VixSpike => &["GLD", "GDX", "TLT"],
            RiskOnRally => &["SPY", "VTI", "QQQ"],
            TradeSanctions | CapitalControls | ExportRestrictions => &["REMX", "MP", "XME"],
            InflationSpike | DeflationRisk | WagePressure => &["GC=F", "GDX", "TIP"],
        },
    }
}

fn derive_direction(
    behavior: Option<&Value>,
    uses_oil: bool,
    channels: &[ChannelType],
    behavior_case: Option<&HistoricalCaseSummary>,
) -> (TradeDirection, String) {
    if let Some(behavior) = behavior {
        let key = if uses_oil { "oil_direction" } else { "gold_direction" };
        let direction = behavior.get(key).and_then(Value::as_str).unwrap_or("");
        let mapped = match direction {
            "up" => TradeDirection::Long,
            "down" => TradeDirection::Short,
            _ => TradeDirection::Neutral,
        };
        let case_name = behavior_case
            .map(|c| c.event_name.as_str())
            .unwrap_or("historical case");
        return (
            mapped,
            format!("Direction from {key} in {case_name}"),
        );
    }

    if channels.iter().any(ChannelType::is_bearish) {
        (
            TradeDirection::Short,
            "Bearish transmission channel matched; no historical behaviour data".to_string(),
        )
    } else {
        (
            TradeDirection::Long,
            "Default long bias; no historical behaviour data".to_string(),
        )
    }
}

fn derive_magnitude(
    horizon: TradeHorizon,
    behavior: Option<&Value>,
    uses_oil: bool,
    quantitative_impacts: Option<&Value>,
) -> String {
    if let Some(behavior) = behavior {
        let key = if uses_oil { "oil_magnitude_pct" } else { "gold_magnitude_pct" };
        if let Some(pct) = behavior.get(key).and_then(Value::as_f64) {
            return format!("{pct:.0}% based on historical behaviour");
        }
    }
    if let Some(impacts) = quantitative_impacts {
        let pct = impacts
            .get("peak_price_impact_pct")
            .or_else(|| impacts.get("price_impact_pct"))
            .and_then(Value::as_f64);
        if let Some(pct) = pct {
            return format!("{pct:.0}% peak price impact in comparable episodes");
        }
    }
    match horizon {
        TradeHorizon::ShortTerm => "2-8% move".to_string(),
        TradeHorizon::MediumTerm => "5-15% move".to_string(),
        TradeHorizon::LongTerm => "15-40% move".to_string(),
    }
}

fn horizon_playbook(horizon: TradeHorizon) -> (&'static str, &'static str) {
    match horizon {
        TradeHorizon::ShortTerm => (
            "immediate entry on confirmation",
            "tight stop, 2-3% below entry",
        ),
        TradeHorizon::MediumTerm => (
            "scale in over 3-5 sessions",
            "stop below recent swing, hedge with index puts",
        ),
        TradeHorizon::LongTerm => (
            "accumulate on pullbacks (DCA)",
            "position sized for 20% drawdown tolerance",
        ),
    }
}

/// Render horizon analysis for LLM prompt injection.
pub fn format_horizons_for_prompt(analysis: &HorizonAnalysis) -> String {
    let mut lines = vec!["=== TIME HORIZON PLAYBOOK ===".to_string(), String::new()];
    for rec in analysis.all_recommendations() {
        lines.push(format!("{}:", rec.horizon_label));
        lines.push(format!(
            "  {:?} {} ({})",
            rec.direction,
            rec.instruments.join(", "),
            rec.expected_magnitude
        ));
        lines.push(format!("  Entry: {}", rec.entry_approach));
        lines.push(format!("  Risk: {}", rec.risk_management));
        lines.push(String::new());
    }
    if !analysis.warnings.is_empty() {
        lines.push("WARNINGS:".to_string());
        for warning in &analysis.warnings {
            lines.push(format!("  ! {warning}"));
        }
        lines.push(String::new());
    }
    lines.push("=".repeat(29));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn case_with_behavior(behavior: Value) -> HistoricalCaseSummary {
        HistoricalCaseSummary {
            id: Uuid::nil(),
            event_name: "Gulf supply shock".to_string(),
            date_range: Some("1990".to_string()),
            event_type: Some("supply_shock".to_string()),
            significance_score: Some(90),
            metal_impacts: None,
            crypto_transmission: None,
            quantitative_impacts: None,
            time_horizon_behavior: Some(behavior),
            transmission_channels: None,
            lessons: None,
            counter_examples: None,
        }
    }

    fn oil_behavior() -> Value {
        json!({
            "short_term_1_5d": {
                "primary_driver": "supply fear",
                "volatility": "extreme",
                "oil_direction": "up",
                "oil_magnitude_pct": 20.0,
                "gold_direction": "up",
                "gold_magnitude_pct": 5.0
            },
            "medium_term_2_8w": {
                "primary_driver": "rebalancing",
                "volatility": "high",
                "oil_direction": "down",
                "oil_magnitude_pct": 10.0,
                "gold_direction": "flat",
                "gold_magnitude_pct": 0.0
            },
            "long_term_6m_plus": {
                "primary_driver": "supply response",
                "volatility": "normal",
                "oil_direction": "down",
                "oil_magnitude_pct": 25.0,
                "gold_direction": "up",
                "gold_magnitude_pct": 8.0
            }
        })
    }

    #[test]
    fn commodity_channels_use_oil_direction() {
        let cases = vec![case_with_behavior(oil_behavior())];
        let analysis = analyze_time_horizons(
            "Pipeline outage",
            &[ChannelType::OilSupplyDisruption],
            &cases,
            None,
            ConvictionLevel::High,
        );
        assert_eq!(analysis.short_term.direction, TradeDirection::Long);
        assert_eq!(analysis.medium_term.direction, TradeDirection::Short);
        assert!(analysis.short_term.expected_magnitude.starts_with("20%"));
    }

    #[test]
    fn non_commodity_channels_use_gold_direction() {
        let cases = vec![case_with_behavior(oil_behavior())];
        let analysis = analyze_time_horizons(
            "Risk-off wave",
            &[ChannelType::RiskOffFlight],
            &cases,
            None,
            ConvictionLevel::Medium,
        );
        assert_eq!(analysis.short_term.direction, TradeDirection::Long);
        // gold_direction is "flat" at medium term.
        assert_eq!(analysis.medium_term.direction, TradeDirection::Neutral);
    }

    #[test]
    fn bearish_channels_default_short_without_behavior() {
        let analysis = analyze_time_horizons(
            "Credit stress builds",
            &[ChannelType::CreditTightening],
            &[],
            None,
            ConvictionLevel::Low,
        );
        assert_eq!(analysis.short_term.direction, TradeDirection::Short);
        assert_eq!(analysis.long_term.direction, TradeDirection::Short);
    }

    #[test]
    fn non_bearish_channels_default_long_without_behavior() {
        let analysis = analyze_time_horizons(
            "Metal supply cut",
            &[ChannelType::MetalsSupply],
            &[],
            None,
            ConvictionLevel::Medium,
        );
        assert_eq!(analysis.short_term.direction, TradeDirection::Long);
    }

    #[test]
    fn instruments_fall_back_to_horizon_defaults() {
        let instruments = select_instruments(TradeHorizon::LongTerm, &[]);
        assert_eq!(instruments, vec!["GDX", "GDXJ", "COPX", "XME", "FCX", "NEM"]);
    }

    #[test]
    fn instruments_dedupe_and_cap_at_eight() {
        let channels = [
            ChannelType::OilSupplyDisruption,
            ChannelType::MetalsSupply,
            ChannelType::RiskOffFlight,
            ChannelType::InflationSpike,
        ];
        let instruments = select_instruments(TradeHorizon::ShortTerm, &channels);
        assert!(instruments.len() <= MAX_INSTRUMENTS);
        let unique: std::collections::HashSet<_> = instruments.iter().collect();
        assert_eq!(unique.len(), instruments.len());
    }

    #[test]
    fn quantitative_magnitude_is_second_fallback() {
        let analysis = analyze_time_horizons(
            "Supply cut",
            &[ChannelType::MetalsSupply],
            &[],
            Some(&json!({"peak_price_impact_pct": 35.0})),
            ConvictionLevel::Medium,
        );
        assert!(analysis.short_term.expected_magnitude.starts_with("35%"));
    }

    #[test]
    fn warnings_accumulate() {
        let analysis = analyze_time_horizons(
            "Thin data event",
            &[],
            &[],
            None,
            ConvictionLevel::Insufficient,
        );
        assert_eq!(analysis.warnings.len(), 3);
    }
}
