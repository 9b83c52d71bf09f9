//! Transmission channel definitions: the causal pathways through which macro
//! events reach tradeable assets.
//!
//! Six families: commodity supply, currency/FX, rates/liquidity, risk
//! sentiment, sanctions/controls, and inflation. Each channel carries the
//! assets it moves, the keywords that match events to it, and search queries
//! for discovering related tickers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    // Commodity supply
    OilSupplyDisruption,
    OilDemandShock,
    NaturalGasSupply,
    MetalsSupply,
    AgriculturalSupply,
    // Currency / FX
    DollarStrength,
    DollarWeakness,
    EmCurrencyStress,
    CarryTradeUnwind,
    YuanDevaluation,
    // Rates / liquidity
    FedHawkish,
    FedDovish,
    YieldCurveInversion,
    CreditTightening,
    LiquidityCrisis,
    // Risk sentiment
    RiskOffFlight,
    RiskOnRally,
    VixSpike,
    // Sanctions / controls
    TradeSanctions,
    CapitalControls,
    ExportRestrictions,
    // Inflation
    InflationSpike,
    DeflationRisk,
    WagePressure,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::OilSupplyDisruption => "oil_supply_disruption",
            ChannelType::OilDemandShock => "oil_demand_shock",
            ChannelType::NaturalGasSupply => "natural_gas_supply",
            ChannelType::MetalsSupply => "metals_supply",
            ChannelType::AgriculturalSupply => "agricultural_supply",
            ChannelType::DollarStrength => "dollar_strength",
            ChannelType::DollarWeakness => "dollar_weakness",
            ChannelType::EmCurrencyStress => "em_currency_stress",
            ChannelType::CarryTradeUnwind => "carry_trade_unwind",
            ChannelType::YuanDevaluation => "yuan_devaluation",
            ChannelType::FedHawkish => "fed_hawkish",
            ChannelType::FedDovish => "fed_dovish",
            ChannelType::YieldCurveInversion => "yield_curve_inversion",
            ChannelType::CreditTightening => "credit_tightening",
            ChannelType::LiquidityCrisis => "liquidity_crisis",
            ChannelType::RiskOffFlight => "risk_off_flight",
            ChannelType::RiskOnRally => "risk_on_rally",
            ChannelType::VixSpike => "vix_spike",
            ChannelType::TradeSanctions => "trade_sanctions",
            ChannelType::CapitalControls => "capital_controls",
            ChannelType::ExportRestrictions => "export_restrictions",
            ChannelType::InflationSpike => "inflation_spike",
            ChannelType::DeflationRisk => "deflation_risk",
            ChannelType::WagePressure => "wage_pressure",
        }
    }

    pub fn from_str_tag(tag: &str) -> Option<ChannelType> {
        ALL_CHANNELS
            .iter()
            .map(|c| c.channel_type)
            .find(|ct| ct.as_str() == tag)
    }

    /// Channels that move assets down on bad news by default.
    pub fn is_bearish(&self) -> bool {
        matches!(
            self,
            ChannelType::RiskOffFlight
                | ChannelType::CreditTightening
                | ChannelType::LiquidityCrisis
                | ChannelType::VixSpike
                | ChannelType::DollarStrength
                | ChannelType::FedHawkish
        )
    }
}

/// Expected horizon over which a channel's effect plays out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelHorizon {
    Immediate,
    ShortTerm,
    MediumTerm,
    LongTerm,
}

/// Definition of a macro-to-asset transmission channel.
#[derive(Debug, Clone, Copy)]
pub struct TransmissionChannel {
    pub channel_type: ChannelType,
    pub name: &'static str,
    pub description: &'static str,
    pub primary_assets: &'static [&'static str],
    pub secondary_assets: &'static [&'static str],
    pub keywords: &'static [&'static str],
    pub search_queries: &'static [&'static str],
    pub typical_magnitude: &'static str,
    pub time_horizon: ChannelHorizon,
}

impl TransmissionChannel {
    pub fn all_assets(&self) -> Vec<&'static str> {
        self.primary_assets
            .iter()
            .chain(self.secondary_assets.iter())
            .copied()
            .collect()
    }
}

pub const ALL_CHANNELS: &[TransmissionChannel] = &[
    TransmissionChannel {
        channel_type: ChannelType::OilSupplyDisruption,
        name: "Oil Supply Disruption",
        description: "Physical crude supply cut via outage, conflict, or embargo; prices spike until barrels are replaced.",
        primary_assets: &["CL=F", "BZ=F", "USO", "XLE"],
        secondary_assets: &["XOM", "CVX", "OXY", "UNG"],
        keywords: &["oil", "crude", "pipeline", "opec", "refinery", "tanker", "barrel", "embargo"],
        search_queries: &["oil supply disruption stocks", "crude oil etf exposure"],
        typical_magnitude: "5-20% move in crude within days",
        time_horizon: ChannelHorizon::Immediate,
    },
    TransmissionChannel {
        channel_type: ChannelType::OilDemandShock,
        name: "Oil Demand Shock",
        description: "Demand-side repricing from growth scares or mobility shifts; crude and refiners move with the growth outlook.",
        primary_assets: &["CL=F", "BZ=F", "XLE"],
        secondary_assets: &["DAL", "UAL", "CCL", "VLO"],
        keywords: &["oil demand", "gasoline demand", "jet fuel", "travel demand", "consumption slump"],
        search_queries: &["oil demand shock airlines", "refining margin etf"],
        typical_magnitude: "3-10% move in crude over weeks",
        time_horizon: ChannelHorizon::ShortTerm,
    },
    TransmissionChannel {
        channel_type: ChannelType::NaturalGasSupply,
        name: "Natural Gas Supply",
        description: "Gas flow interruptions or LNG rerouting; regional prices gap while substitution works through power markets.",
        primary_assets: &["NG=F", "UNG", "LNG"],
        secondary_assets: &["EQT", "AR", "TELL"],
        keywords: &["natural gas", "lng", "gas pipeline", "nord stream", "gas storage"],
        search_queries: &["natural gas supply disruption stocks", "lng exporters"],
        typical_magnitude: "10-30% move in regional gas",
        time_horizon: ChannelHorizon::Immediate,
    },
    TransmissionChannel {
        channel_type: ChannelType::MetalsSupply,
        name: "Metals Supply",
        description: "Mine strikes, export bans, or smelter outages tighten refined metal balances.",
        primary_assets: &["GC=F", "SI=F", "HG=F", "COPX"],
        secondary_assets: &["FCX", "SCCO", "NEM", "GOLD"],
        keywords: &["mine", "smelter", "copper supply", "gold supply", "strike", "ore", "refinery outage"],
        search_queries: &["copper supply disruption miners", "gold miners etf"],
        typical_magnitude: "3-12% move in the affected metal",
        time_horizon: ChannelHorizon::ShortTerm,
    },
    TransmissionChannel {
        channel_type: ChannelType::AgriculturalSupply,
        name: "Agricultural Supply",
        description: "Weather, war, or export controls hitting grain and softs balances.",
        primary_assets: &["ZW=F", "ZC=F", "ZS=F", "DBA"],
        secondary_assets: &["ADM", "BG", "MOS", "NTR"],
        keywords: &["wheat", "corn", "soybean", "grain", "harvest", "drought", "fertilizer"],
        search_queries: &["grain supply shock stocks", "agriculture etf exposure"],
        typical_magnitude: "5-15% move in the affected grain",
        time_horizon: ChannelHorizon::ShortTerm,
    },
    TransmissionChannel {
        channel_type: ChannelType::DollarStrength,
        name: "Dollar Strength",
        description: "Safe-haven or rate-differential dollar bid; pressures commodities and EM assets priced in dollars.",
        primary_assets: &["DX=F", "UUP"],
        secondary_assets: &["FXE", "FXY", "GLD", "EEM"],
        keywords: &["dollar strength", "dollar rally", "king dollar", "dxy", "dollar surge"],
        search_queries: &["strong dollar losers", "dollar index etf"],
        typical_magnitude: "1-4% DXY move",
        time_horizon: ChannelHorizon::ShortTerm,
    },
    TransmissionChannel {
        channel_type: ChannelType::DollarWeakness,
        name: "Dollar Weakness",
        description: "Dollar sold on easing expectations or risk appetite; commodities and EM get a tailwind.",
        primary_assets: &["DX=F", "UDN"],
        secondary_assets: &["GLD", "SLV", "EEM", "FXE"],
        keywords: &["dollar weakness", "dollar slide", "dollar drops", "greenback falls"],
        search_queries: &["weak dollar beneficiaries", "commodity etf dollar hedge"],
        typical_magnitude: "1-4% DXY move",
        time_horizon: ChannelHorizon::ShortTerm,
    },
    TransmissionChannel {
        channel_type: ChannelType::EmCurrencyStress,
        name: "EM Currency Stress",
        description: "Funding stress in emerging-market currencies; local assets and EM credit reprice.",
        primary_assets: &["EEM", "EMB", "CEW"],
        secondary_assets: &["EWZ", "EWW", "FXI"],
        keywords: &["emerging market currency", "devaluation", "peso", "lira", "rupiah", "capital flight"],
        search_queries: &["em currency crisis etf", "emerging market bond stress"],
        typical_magnitude: "3-10% move in EM FX pairs",
        time_horizon: ChannelHorizon::ShortTerm,
    },
    TransmissionChannel {
        channel_type: ChannelType::CarryTradeUnwind,
        name: "Carry Trade Unwind",
        description: "Funding-currency squeeze forces leveraged carry positions to close; correlated risk assets sell together.",
        primary_assets: &["FXY", "6J=F"],
        secondary_assets: &["EEM", "AUDJPY=X", "SPY"],
        keywords: &["carry trade", "yen surge", "funding currency", "unwind", "yen rally"],
        search_queries: &["carry trade unwind assets", "yen funding squeeze"],
        typical_magnitude: "2-8% move in funding pairs",
        time_horizon: ChannelHorizon::Immediate,
    },
    TransmissionChannel {
        channel_type: ChannelType::YuanDevaluation,
        name: "Yuan Devaluation",
        description: "Managed or disorderly CNY depreciation; exporters gain, commodity demand sentiment suffers.",
        primary_assets: &["CNH=X", "FXI", "CYB"],
        secondary_assets: &["EEM", "HG=F", "KWEB"],
        keywords: &["yuan", "renminbi", "cny", "devalue", "pboc fix"],
        search_queries: &["yuan devaluation impact stocks", "china currency etf"],
        typical_magnitude: "1-5% CNY move",
        time_horizon: ChannelHorizon::MediumTerm,
    },
    TransmissionChannel {
        channel_type: ChannelType::FedHawkish,
        name: "Fed Hawkish",
        description: "Tighter-policy surprise lifts front-end yields and the dollar; long-duration assets reprice lower.",
        primary_assets: &["TLT", "IEF", "DX=F"],
        secondary_assets: &["QQQ", "GLD", "XLU"],
        keywords: &["hawkish", "rate hike", "tightening", "higher for longer", "taper"],
        search_queries: &["hawkish fed losers", "rising rates etf"],
        typical_magnitude: "20-60bps front-end repricing",
        time_horizon: ChannelHorizon::ShortTerm,
    },
    TransmissionChannel {
        channel_type: ChannelType::FedDovish,
        name: "Fed Dovish",
        description: "Easing surprise compresses real yields; gold and duration rally, dollar softens.",
        primary_assets: &["TLT", "GLD", "QQQ"],
        secondary_assets: &["SLV", "IWM", "EEM"],
        keywords: &["dovish", "rate cut", "rate cuts", "easing", "pause", "pivot"],
        search_queries: &["dovish fed winners", "falling rates etf"],
        typical_magnitude: "20-60bps front-end repricing",
        time_horizon: ChannelHorizon::ShortTerm,
    },
    TransmissionChannel {
        channel_type: ChannelType::YieldCurveInversion,
        name: "Yield Curve Inversion",
        description: "Front-end above long-end signals late-cycle stress; banks and cyclicals underperform.",
        primary_assets: &["TLT", "SHY", "KRE"],
        secondary_assets: &["XLF", "IWM", "GLD"],
        keywords: &["curve inversion", "inverted curve", "2s10s", "yield curve"],
        search_queries: &["yield curve inversion trades", "steepener etf"],
        typical_magnitude: "10-40bps curve move",
        time_horizon: ChannelHorizon::MediumTerm,
    },
    TransmissionChannel {
        channel_type: ChannelType::CreditTightening,
        name: "Credit Tightening",
        description: "Spreads widen as lending standards and default expectations deteriorate; levered balance sheets suffer first.",
        primary_assets: &["HYG", "JNK", "LQD"],
        secondary_assets: &["BKLN", "KRE", "IWM"],
        keywords: &["credit spread", "spreads widen", "lending standards", "default", "downgrade"],
        search_queries: &["credit tightening losers", "high yield spread etf"],
        typical_magnitude: "50-200bps HY spread widening",
        time_horizon: ChannelHorizon::MediumTerm,
    },
    TransmissionChannel {
        channel_type: ChannelType::LiquidityCrisis,
        name: "Liquidity Crisis",
        description: "Funding markets seize; everything liquid is sold to raise cash, then policy response drives the rebound.",
        primary_assets: &["SHY", "BIL", "GLD"],
        secondary_assets: &["TLT", "UUP", "VIXY"],
        keywords: &["liquidity", "funding stress", "repo", "margin call", "fire sale", "bailout"],
        search_queries: &["liquidity crisis safe assets", "cash equivalent etf"],
        typical_magnitude: "Broad 5-15% risk-asset drawdown",
        time_horizon: ChannelHorizon::Immediate,
    },
    TransmissionChannel {
        channel_type: ChannelType::RiskOffFlight,
        name: "Risk-Off Flight",
        description: "Flight to safety out of equities and credit into treasuries, gold, and the dollar.",
        primary_assets: &["GLD", "TLT", "UUP"],
        secondary_assets: &["SPY", "VIXY", "FXY"],
        keywords: &["risk-off", "safe haven", "flight to safety", "selloff", "panic"],
        search_queries: &["risk off safe haven assets", "flight to quality etf"],
        typical_magnitude: "2-8% equity drawdown",
        time_horizon: ChannelHorizon::Immediate,
    },
    TransmissionChannel {
        channel_type: ChannelType::RiskOnRally,
        name: "Risk-On Rally",
        description: "Relief or stimulus squeezes shorts; high-beta and cyclical assets lead.",
        primary_assets: &["SPY", "QQQ", "IWM"],
        secondary_assets: &["EEM", "HYG", "BTC-USD"],
        keywords: &["risk-on", "relief rally", "stimulus", "squeeze", "rebound"],
        search_queries: &["risk on high beta etf", "cyclical recovery stocks"],
        typical_magnitude: "2-6% equity rally",
        time_horizon: ChannelHorizon::ShortTerm,
    },
    TransmissionChannel {
        channel_type: ChannelType::VixSpike,
        name: "VIX Spike",
        description: "Volatility repricing forces systematic deleveraging; gamma and vol-target flows amplify the move.",
        primary_assets: &["VIXY", "UVXY", "^VIX"],
        secondary_assets: &["SPY", "SVXY", "QQQ"],
        keywords: &["vix", "volatility spike", "vol surge", "fear gauge"],
        search_queries: &["vix spike hedges", "volatility etf"],
        typical_magnitude: "30-100% VIX move",
        time_horizon: ChannelHorizon::Immediate,
    },
    TransmissionChannel {
        channel_type: ChannelType::TradeSanctions,
        name: "Trade Sanctions",
        description: "Sanctions or tariffs reroute trade flows; sanctioned-supply commodities and substitutes reprice.",
        primary_assets: &["GC=F", "CL=F", "DBC"],
        secondary_assets: &["XME", "FXI", "EEM"],
        keywords: &["sanction", "sanctions", "tariff", "trade war", "blacklist"],
        search_queries: &["sanctions commodity impact", "trade war etf"],
        typical_magnitude: "Commodity-specific 3-15% moves",
        time_horizon: ChannelHorizon::MediumTerm,
    },
    TransmissionChannel {
        channel_type: ChannelType::CapitalControls,
        name: "Capital Controls",
        description: "Restrictions on moving money out; offshore demand for hard assets and crypto rises.",
        primary_assets: &["GLD", "BTC-USD"],
        secondary_assets: &["EEM", "FXI", "USDT-USD"],
        keywords: &["capital control", "capital controls", "withdrawal limit", "currency restriction"],
        search_queries: &["capital controls bitcoin demand", "offshore asset demand"],
        typical_magnitude: "Flow-driven 2-10% moves in havens",
        time_horizon: ChannelHorizon::MediumTerm,
    },
    TransmissionChannel {
        channel_type: ChannelType::ExportRestrictions,
        name: "Export Restrictions",
        description: "Export bans on strategic goods tighten global supply; domestic producers in importing regions benefit.",
        primary_assets: &["XME", "REMX", "DBC"],
        secondary_assets: &["MP", "ALB", "ZW=F"],
        keywords: &["export ban", "export restriction", "export curb", "export controls"],
        search_queries: &["export ban commodity stocks", "strategic materials etf"],
        typical_magnitude: "5-20% move in restricted goods",
        time_horizon: ChannelHorizon::ShortTerm,
    },
    TransmissionChannel {
        channel_type: ChannelType::InflationSpike,
        name: "Inflation Spike",
        description: "Upside inflation surprises lift breakevens and real assets; duration and growth equities lag.",
        primary_assets: &["GC=F", "TIP", "DBC"],
        secondary_assets: &["SLV", "XLE", "VNQ"],
        keywords: &["inflation", "cpi", "ppi", "price pressure", "cost surge"],
        search_queries: &["inflation hedge assets", "tips etf"],
        typical_magnitude: "10-40bps breakeven move",
        time_horizon: ChannelHorizon::MediumTerm,
    },
    TransmissionChannel {
        channel_type: ChannelType::DeflationRisk,
        name: "Deflation Risk",
        description: "Falling prices raise real debt burdens; long duration outperforms, commodities lag.",
        primary_assets: &["TLT", "ZROZ", "SHY"],
        secondary_assets: &["GLD", "XLP", "DBC"],
        keywords: &["deflation", "disinflation", "falling prices", "demand collapse"],
        search_queries: &["deflation winners bonds", "long duration etf"],
        typical_magnitude: "20-60bps long-end rally",
        time_horizon: ChannelHorizon::LongTerm,
    },
    TransmissionChannel {
        channel_type: ChannelType::WagePressure,
        name: "Wage Pressure",
        description: "Labour cost acceleration squeezes margins and feeds services inflation persistence.",
        primary_assets: &["TIP", "XLI", "IWM"],
        secondary_assets: &["XLY", "SPY", "TLT"],
        keywords: &["wage", "wages", "labor cost", "strike pay", "union deal", "payroll growth"],
        search_queries: &["wage inflation margin pressure", "labor cost sensitive sectors"],
        typical_magnitude: "Sector-level margin repricing",
        time_horizon: ChannelHorizon::LongTerm,
    },
];

/// Fallback routing when keyword matching is weak: event type → channels.
const EVENT_TYPE_CHANNELS: &[(&str, &[ChannelType])] = &[
    (
        "geopolitical",
        &[
            ChannelType::OilSupplyDisruption,
            ChannelType::RiskOffFlight,
            ChannelType::TradeSanctions,
        ],
    ),
    (
        "monetary_policy",
        &[
            ChannelType::FedHawkish,
            ChannelType::FedDovish,
            ChannelType::DollarStrength,
        ],
    ),
    (
        "financial_crisis",
        &[
            ChannelType::LiquidityCrisis,
            ChannelType::RiskOffFlight,
            ChannelType::CreditTightening,
        ],
    ),
    (
        "supply_shock",
        &[
            ChannelType::OilSupplyDisruption,
            ChannelType::MetalsSupply,
            ChannelType::NaturalGasSupply,
        ],
    ),
    (
        "economic_data",
        &[ChannelType::InflationSpike, ChannelType::FedHawkish],
    ),
];

pub fn get_channel_by_type(channel_type: ChannelType) -> &'static TransmissionChannel {
    ALL_CHANNELS
        .iter()
        .find(|c| c.channel_type == channel_type)
        .expect("registry covers every channel type")
}

pub fn get_channels_for_event_type(event_type: &str) -> Vec<&'static TransmissionChannel> {
    EVENT_TYPE_CHANNELS
        .iter()
        .find(|(name, _)| *name == event_type)
        .map(|(_, types)| types.iter().map(|ct| get_channel_by_type(*ct)).collect())
        .unwrap_or_default()
}

/// Channels whose keywords appear in `text`, most keyword hits first.
/// Ties keep registry order.
pub fn match_channels_by_keywords(text: &str) -> Vec<&'static TransmissionChannel> {
    let lowered = text.to_lowercase();
    let mut scored: Vec<(usize, &'static TransmissionChannel)> = ALL_CHANNELS
        .iter()
        .filter_map(|channel| {
            let hits = channel
                .keywords
                .iter()
                .filter(|keyword| lowered.contains(*keyword))
                .count();
            (hits > 0).then_some((hits, channel))
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, channel)| channel).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_one_definition_per_type() {
        assert_eq!(ALL_CHANNELS.len(), 24);
        let mut seen = std::collections::HashSet::new();
        for channel in ALL_CHANNELS {
            assert!(seen.insert(channel.channel_type), "{:?}", channel.channel_type);
            assert!(!channel.primary_assets.is_empty(), "{}", channel.name);
            assert!(!channel.keywords.is_empty(), "{}", channel.name);
        }
    }

    #[test]
    fn pipeline_headline_matches_oil_supply_first() {
        let matched = match_channels_by_keywords("Russia threatens to cut oil pipeline to Europe");
        assert!(!matched.is_empty());
        assert_eq!(matched[0].channel_type, ChannelType::OilSupplyDisruption);
    }

    #[test]
    fn event_type_routing_covers_geopolitical() {
        let channels = get_channels_for_event_type("geopolitical");
        let types: Vec<ChannelType> = channels.iter().map(|c| c.channel_type).collect();
        assert!(types.contains(&ChannelType::OilSupplyDisruption));
        assert!(types.contains(&ChannelType::RiskOffFlight));
        assert!(get_channels_for_event_type("unknown_type").is_empty());
    }

    #[test]
    fn tag_round_trip() {
        for channel in ALL_CHANNELS {
            let tag = channel.channel_type.as_str();
            assert_eq!(ChannelType::from_str_tag(tag), Some(channel.channel_type));
        }
        assert_eq!(ChannelType::from_str_tag("nope"), None);
    }
}
