//! Core watchlist: the instruments checked before analysing any macro event.
//!
//! Vital signs first (VIX, DXY, yields, gold, oil, SPX, BTC, 2s10s), then the
//! regime thresholds and position-sizing tables the classifier reads.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Yahoo,
    Fred,
    Calculated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    VitalSigns,
    Volatility,
    Rates,
    Fx,
    Credit,
    Commodities,
    Breadth,
}

/// Named alert levels for an instrument, keyed by the floor that triggers
/// them.
#[derive(Debug, Clone, Copy)]
pub struct AlertThresholds {
    pub levels: &'static [(&'static str, f64)],
}

impl AlertThresholds {
    /// The highest threshold breached by `value`, or None.
    pub fn alert_level(&self, value: f64) -> Option<&'static str> {
        self.levels
            .iter()
            .filter(|(_, floor)| value >= *floor)
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(name, _)| *name)
    }
}

pub const VIX_ALERTS: AlertThresholds = AlertThresholds {
    levels: &[("elevated", 20.0), ("fear", 30.0), ("crisis", 40.0)],
};

pub const HY_SPREAD_ALERTS: AlertThresholds = AlertThresholds {
    levels: &[("wide", 400.0), ("stressed", 500.0), ("crisis", 800.0)],
};

/// Definition of a core watchlist instrument.
#[derive(Debug, Clone, Copy)]
pub struct WatchlistInstrument {
    pub name: &'static str,
    pub symbol: &'static str,
    pub source: DataSource,
    pub category: Category,
    pub interpretation: &'static str,
}

pub const ALL_INSTRUMENTS: &[WatchlistInstrument] = &[
    WatchlistInstrument {
        name: "CBOE Volatility Index",
        symbol: "^VIX",
        source: DataSource::Yahoo,
        category: Category::VitalSigns,
        interpretation: "Fear gauge; >20 elevated, >30 fear, >40 crisis",
    },
    WatchlistInstrument {
        name: "VIX 3-Month",
        symbol: "^VIX3M",
        source: DataSource::Yahoo,
        category: Category::Volatility,
        interpretation: "Term structure vs spot VIX; backwardation signals panic",
    },
    WatchlistInstrument {
        name: "US Dollar Index Futures",
        symbol: "DX=F",
        source: DataSource::Yahoo,
        category: Category::VitalSigns,
        interpretation: "Global liquidity; >105 strong dollar, <95 weak",
    },
    WatchlistInstrument {
        name: "10-Year Treasury Yield",
        symbol: "^TNX",
        source: DataSource::Yahoo,
        category: Category::VitalSigns,
        interpretation: "Risk-free anchor (Yahoo quotes x10)",
    },
    WatchlistInstrument {
        name: "Gold Futures",
        symbol: "GC=F",
        source: DataSource::Yahoo,
        category: Category::VitalSigns,
        interpretation: "Safe haven and real-rate proxy",
    },
    WatchlistInstrument {
        name: "Silver Futures",
        symbol: "SI=F",
        source: DataSource::Yahoo,
        category: Category::Commodities,
        interpretation: "Monetary + industrial hybrid",
    },
    WatchlistInstrument {
        name: "Copper Futures",
        symbol: "HG=F",
        source: DataSource::Yahoo,
        category: Category::Commodities,
        interpretation: "Growth barometer (Dr. Copper)",
    },
    WatchlistInstrument {
        name: "WTI Crude Futures",
        symbol: "CL=F",
        source: DataSource::Yahoo,
        category: Category::VitalSigns,
        interpretation: "Inflation impulse and supply stress",
    },
    WatchlistInstrument {
        name: "S&P 500",
        symbol: "^GSPC",
        source: DataSource::Yahoo,
        category: Category::VitalSigns,
        interpretation: "Risk asset benchmark",
    },
    WatchlistInstrument {
        name: "Bitcoin",
        symbol: "BTC-USD",
        source: DataSource::Yahoo,
        category: Category::VitalSigns,
        interpretation: "Liquidity-sensitive risk proxy",
    },
    WatchlistInstrument {
        name: "SPY",
        symbol: "SPY",
        source: DataSource::Yahoo,
        category: Category::Breadth,
        interpretation: "Cap-weighted leg of the breadth ratio",
    },
    WatchlistInstrument {
        name: "RSP",
        symbol: "RSP",
        source: DataSource::Yahoo,
        category: Category::Breadth,
        interpretation: "Equal-weighted leg of the breadth ratio",
    },
    WatchlistInstrument {
        name: "High Yield Bond ETF",
        symbol: "HYG",
        source: DataSource::Yahoo,
        category: Category::Credit,
        interpretation: "Credit risk appetite",
    },
    WatchlistInstrument {
        name: "Investment Grade Bond ETF",
        symbol: "LQD",
        source: DataSource::Yahoo,
        category: Category::Credit,
        interpretation: "Quality credit leg of HYG/LQD",
    },
    WatchlistInstrument {
        name: "2-Year Treasury Yield",
        symbol: "DGS2",
        source: DataSource::Fred,
        category: Category::Rates,
        interpretation: "Fed policy pricing",
    },
    WatchlistInstrument {
        name: "10-Year Treasury Yield (FRED)",
        symbol: "DGS10",
        source: DataSource::Fred,
        category: Category::Rates,
        interpretation: "Long-end anchor for curve math",
    },
    WatchlistInstrument {
        name: "2s10s Spread",
        symbol: "T10Y2Y",
        source: DataSource::Fred,
        category: Category::Rates,
        interpretation: "Curve shape; negative = inverted",
    },
    WatchlistInstrument {
        name: "High Yield OAS",
        symbol: "BAMLH0A0HYM2",
        source: DataSource::Fred,
        category: Category::Credit,
        interpretation: "Early warning for credit stress (bps as pct points)",
    },
    WatchlistInstrument {
        name: "10-Year Breakeven Inflation",
        symbol: "T10YIE",
        source: DataSource::Fred,
        category: Category::Rates,
        interpretation: "Inflation expectations",
    },
    WatchlistInstrument {
        name: "Broad Dollar Index",
        symbol: "DTWEXBGS",
        source: DataSource::Fred,
        category: Category::Fx,
        interpretation: "Trade-weighted dollar confirmation",
    },
];

pub fn yahoo_symbols() -> Vec<&'static str> {
    ALL_INSTRUMENTS
        .iter()
        .filter(|i| i.source == DataSource::Yahoo)
        .map(|i| i.symbol)
        .collect()
}

pub fn fred_series() -> Vec<&'static str> {
    ALL_INSTRUMENTS
        .iter()
        .filter(|i| i.source == DataSource::Fred)
        .map(|i| i.symbol)
        .collect()
}

/// Ratio derived from two watchlist symbols by name lookup.
#[derive(Debug, Clone, Copy)]
pub struct CalculatedRatio {
    pub name: &'static str,
    pub numerator_symbol: &'static str,
    pub denominator_symbol: &'static str,
}

pub const CALCULATED_RATIOS: &[CalculatedRatio] = &[
    CalculatedRatio {
        name: "gold_silver",
        numerator_symbol: "GC=F",
        denominator_symbol: "SI=F",
    },
    CalculatedRatio {
        name: "copper_gold",
        numerator_symbol: "HG=F",
        denominator_symbol: "GC=F",
    },
    CalculatedRatio {
        name: "vix_term_structure",
        numerator_symbol: "^VIX",
        denominator_symbol: "^VIX3M",
    },
    CalculatedRatio {
        name: "vix_vix3m",
        numerator_symbol: "^VIX",
        denominator_symbol: "^VIX3M",
    },
    CalculatedRatio {
        name: "spy_rsp",
        numerator_symbol: "SPY",
        denominator_symbol: "RSP",
    },
    CalculatedRatio {
        name: "hyg_lqd",
        numerator_symbol: "HYG",
        denominator_symbol: "LQD",
    },
];

/// Volatility regime floors on VIX, checked highest first.
pub const VOLATILITY_REGIME_THRESHOLDS: &[(&str, f64)] = &[
    ("crisis", 40.0),
    ("fear", 30.0),
    ("elevated", 20.0),
    ("normal", 15.0),
    ("calm", 0.0),
];

/// Curve regime floors on the 2s10s spread in percentage points.
/// Anything below zero is inverted.
pub const CURVE_REGIME_THRESHOLDS: &[(&str, f64)] = &[
    ("steep", 1.0),
    ("normal", 0.25),
    ("flat", 0.0),
];

/// Credit regime floors on the HY OAS in basis points.
pub const CREDIT_REGIME_THRESHOLDS: &[(&str, f64)] = &[
    ("crisis", 800.0),
    ("stressed", 500.0),
    ("wide", 400.0),
    ("normal", 300.0),
    ("tight", 0.0),
];

// Dollar regime could alternatively key off the day change:
//   >= +0.5% strengthening, <= -0.5% weakening, else stable.
// The pipeline uses the absolute DXY level rule (>=105 strong, <=95 weak).
pub const DXY_STRONG_LEVEL: f64 = 105.0;
pub const DXY_WEAK_LEVEL: f64 = 95.0;

/// Position-size multiplier for a volatility regime.
pub fn volatility_multiplier(regime: &str) -> f64 {
    match regime {
        "calm" | "normal" => 1.0,
        "elevated" => 0.75,
        "fear" => 0.50,
        "crisis" => 0.25,
        _ => 1.0,
    }
}

/// Position-size multiplier for a credit regime.
pub fn credit_multiplier(regime: &str) -> f64 {
    match regime {
        "tight" | "normal" => 1.0,
        "wide" => 0.75,
        "stressed" => 0.50,
        "crisis" => 0.25,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_sets_split_by_source() {
        let yahoo = yahoo_symbols();
        let fred = fred_series();
        assert!(yahoo.contains(&"^VIX"));
        assert!(yahoo.contains(&"HYG"));
        assert!(fred.contains(&"T10Y2Y"));
        assert!(!yahoo.iter().any(|s| fred.contains(s)));
    }

    #[test]
    fn every_ratio_leg_is_a_watchlist_symbol() {
        let known: Vec<&str> = ALL_INSTRUMENTS.iter().map(|i| i.symbol).collect();
        for ratio in CALCULATED_RATIOS {
            assert!(known.contains(&ratio.numerator_symbol), "{}", ratio.name);
            assert!(known.contains(&ratio.denominator_symbol), "{}", ratio.name);
        }
    }

    #[test]
    fn alert_levels_pick_the_highest_breached_floor() {
        assert_eq!(VIX_ALERTS.alert_level(18.0), None);
        assert_eq!(VIX_ALERTS.alert_level(21.0), Some("elevated"));
        assert_eq!(VIX_ALERTS.alert_level(35.0), Some("fear"));
        assert_eq!(VIX_ALERTS.alert_level(55.0), Some("crisis"));
        assert_eq!(HY_SPREAD_ALERTS.alert_level(820.0), Some("crisis"));
    }

    #[test]
    fn multipliers_stay_in_published_range() {
        for regime in ["calm", "normal", "elevated", "fear", "crisis", "unknown"] {
            let m = volatility_multiplier(regime);
            assert!((0.25..=1.0).contains(&m));
        }
        assert_eq!(credit_multiplier("wide"), 0.75);
        assert_eq!(credit_multiplier("unknown"), 1.0);
    }
}
