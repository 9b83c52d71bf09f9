//! Four-component significance scoring for macro events.
//!
//! Each component is clamped to 0-100, then combined with fixed weights
//! (structural 35, transmission 30, historical 20, attention 15) and rounded
//! half-up. Scores at or above 65 set the priority flag.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub const PRIORITY_THRESHOLD: i32 = 65;
pub const MONITORING_THRESHOLD: i32 = 50;

const STRUCTURAL_WEIGHT: i32 = 35;
const TRANSMISSION_WEIGHT: i32 = 30;
const HISTORICAL_WEIGHT: i32 = 20;
const ATTENTION_WEIGHT: i32 = 15;

const STRUCTURAL_BASE: &[(&str, i32)] = &[
    ("financial_crisis", 90),
    ("monetary_policy", 75),
    ("geopolitical", 70),
    ("economic_data", 55),
    ("supply_shock", 80),
];

const TRANSMISSION_BASE: &[(&str, i32)] = &[
    ("financial_crisis", 80),
    ("monetary_policy", 80),
    ("geopolitical", 65),
    ("economic_data", 55),
    ("supply_shock", 75),
];

const HISTORICAL_BASE: &[(&str, i32)] = &[
    ("financial_crisis", 80),
    ("monetary_policy", 65),
    ("geopolitical", 60),
    ("economic_data", 50),
    ("supply_shock", 70),
];

const SOURCE_ATTENTION_BASE: &[(&str, i32)] = &[
    ("reuters", 60),
    ("ap", 55),
    ("google_news", 45),
];

const DEFAULT_STRUCTURAL_BASE: i32 = 40;
const DEFAULT_TRANSMISSION_BASE: i32 = 35;
const DEFAULT_HISTORICAL_BASE: i32 = 30;
const DEFAULT_ATTENTION_BASE: i32 = 50;

const EVENT_TYPE_ALIASES: &[(&str, &str)] = &[
    ("monetary", "monetary_policy"),
    ("central_bank", "monetary_policy"),
    ("rate_decision", "monetary_policy"),
    ("geopolitics", "geopolitical"),
    ("sanctions", "geopolitical"),
    ("war", "geopolitical"),
    ("crisis", "financial_crisis"),
    ("banking_crisis", "financial_crisis"),
    ("data", "economic_data"),
    ("macro_data", "economic_data"),
    ("supply", "supply_shock"),
    ("energy", "supply_shock"),
];

pub const MAJOR_REGIONS: &[&str] = &["US", "EU", "CHINA", "UK", "JAPAN", "GLOBAL"];

const REGION_ALIASES: &[(&str, &str)] = &[
    ("UNITED STATES", "US"),
    ("UNITED STATES OF AMERICA", "US"),
    ("USA", "US"),
    ("U.S.", "US"),
    ("EUROPE", "EU"),
    ("EUROZONE", "EU"),
    ("UNITED KINGDOM", "UK"),
    ("WORLD", "GLOBAL"),
];

pub const MAJOR_ENTITIES: &[&str] = &[
    "federal reserve",
    "fed",
    "european central bank",
    "ecb",
    "people's bank of china",
    "pboc",
    "bank of japan",
    "boj",
    "bank of england",
    "boe",
    "imf",
    "opec",
    "treasury",
];

const MONETARY_TERMS: &[&str] = &["rate", "rates", "central bank", "fed", "ecb", "boj", "pboc", "hike"];
const CRISIS_TERMS: &[&str] = &["crisis", "default", "bank", "collapse", "liquidity", "bailout"];
const GEOPOLITICAL_TERMS: &[&str] = &["war", "sanction", "invasion", "conflict", "missile"];
const SUPPLY_TERMS: &[&str] = &["supply", "production", "strike", "shutdown", "export ban", "mine"];
const ECON_DATA_TERMS: &[&str] = &["cpi", "inflation", "gdp", "jobs", "payrolls", "unemployment", "pmi"];

const METAL_TERMS: &[&str] = &["gold", "silver", "copper", "metals", "bullion"];
const MACRO_TERMS: &[&str] = &["rate", "rates", "inflation", "cpi", "yield", "usd", "dollar"];
const HISTORICAL_TERMS: &[&str] = &["crisis", "default", "war", "recession", "sanction", "bank"];
const ATTENTION_TERMS: &[&str] = &["breaking", "urgent", "emergency", "surprise", "unexpected", "shock"];

/// Scoring input: the fields of a macro event the scorer reads.
#[derive(Debug, Clone, Default)]
pub struct EventInput<'a> {
    pub source: &'a str,
    pub headline: &'a str,
    pub full_text: Option<&'a str>,
    pub event_type: Option<&'a str>,
    pub regions: Option<&'a [String]>,
    pub entities: Option<&'a [String]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub structural: i32,
    pub transmission: i32,
    pub historical: i32,
    pub attention: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Priority,
    Monitoring,
    Logged,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Priority => "priority",
            Tier::Monitoring => "monitoring",
            Tier::Logged => "logged",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredEvent {
    pub total_score: i32,
    pub components: ScoreComponents,
    pub priority_flag: bool,
    pub tier: Tier,
}

/// Lowercase, fold `-`/space to `_`, then apply the alias table.
pub fn normalize_event_type(value: Option<&str>) -> Option<String> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }
    let normalized = raw.to_lowercase().replace(['-', ' '], "_");
    let resolved = EVENT_TYPE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(normalized);
    Some(resolved)
}

pub fn classify_score(score: i32) -> Tier {
    if score >= PRIORITY_THRESHOLD {
        Tier::Priority
    } else if score >= MONITORING_THRESHOLD {
        Tier::Monitoring
    } else {
        Tier::Logged
    }
}

pub fn score_event(event: &EventInput<'_>) -> ScoredEvent {
    let text = normalize_text(event.headline, event.full_text);
    let event_type = normalize_event_type(event.event_type).or_else(|| infer_event_type(&text));
    let regions = normalize_regions(event.regions);
    let entities = normalize_entities(event.entities);

    let components = ScoreComponents {
        structural: score_structural(event_type.as_deref(), &regions, &entities),
        transmission: score_transmission(event_type.as_deref(), &text, &entities),
        historical: score_historical(event_type.as_deref(), &text, &regions),
        attention: score_attention(event.source, &text, &regions, &entities),
    };
    let total_score = weighted_total(&components);
    let tier = classify_score(total_score);

    ScoredEvent {
        total_score,
        components,
        priority_flag: total_score >= PRIORITY_THRESHOLD,
        tier,
    }
}

fn weighted_total(components: &ScoreComponents) -> i32 {
    let raw = components.structural * STRUCTURAL_WEIGHT
        + components.transmission * TRANSMISSION_WEIGHT
        + components.historical * HISTORICAL_WEIGHT
        + components.attention * ATTENTION_WEIGHT;
    clamp((raw + 50) / 100)
}

fn score_structural(event_type: Option<&str>, regions: &HashSet<String>, entities: &HashSet<String>) -> i32 {
    let base = lookup(STRUCTURAL_BASE, event_type, DEFAULT_STRUCTURAL_BASE);
    let region_score = (major_region_count(regions) * 8).min(25);
    let entity_score = (major_entity_count(entities) * 5).min(15);
    clamp(base + region_score + entity_score)
}

fn score_transmission(event_type: Option<&str>, text: &str, entities: &HashSet<String>) -> i32 {
    let base = lookup(TRANSMISSION_BASE, event_type, DEFAULT_TRANSMISSION_BASE);
    let mut boost = 0;
    if contains_any(text, METAL_TERMS) {
        boost += 20;
    }
    if contains_any(text, MACRO_TERMS) {
        boost += 10;
    }
    if contains_any(text, SUPPLY_TERMS) {
        boost += 10;
    }
    if major_entity_count(entities) > 0 {
        boost += 5;
    }
    clamp(base + boost)
}

fn score_historical(event_type: Option<&str>, text: &str, regions: &HashSet<String>) -> i32 {
    let base = lookup(HISTORICAL_BASE, event_type, DEFAULT_HISTORICAL_BASE);
    let mut boost = 0;
    if contains_any(text, HISTORICAL_TERMS) {
        boost += 10;
    }
    let major = major_region_count(regions);
    if major > 0 {
        boost += (major * 5).min(10);
    }
    clamp(base + boost)
}

fn score_attention(source: &str, text: &str, regions: &HashSet<String>, entities: &HashSet<String>) -> i32 {
    let source_key = source.trim().to_lowercase();
    let base = SOURCE_ATTENTION_BASE
        .iter()
        .find(|(name, _)| *name == source_key)
        .map(|(_, value)| *value)
        .unwrap_or(DEFAULT_ATTENTION_BASE);
    let mut boost = 0;
    if contains_any(text, ATTENTION_TERMS) {
        boost += 15;
    }
    if major_region_count(regions) >= 2 {
        boost += 5;
    }
    if major_entity_count(entities) >= 2 {
        boost += 5;
    }
    clamp(base + boost)
}

fn normalize_regions(regions: Option<&[String]>) -> HashSet<String> {
    let mut normalized = HashSet::new();
    for region in regions.unwrap_or_default() {
        let key = region.trim().to_uppercase();
        if key.is_empty() {
            continue;
        }
        let folded = REGION_ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or(key);
        normalized.insert(folded);
    }
    normalized
}

fn normalize_entities(entities: Option<&[String]>) -> HashSet<String> {
    entities
        .unwrap_or_default()
        .iter()
        .map(|entity| entity.trim().to_lowercase())
        .filter(|entity| !entity.is_empty())
        .collect()
}

fn major_region_count(regions: &HashSet<String>) -> i32 {
    regions
        .iter()
        .filter(|r| MAJOR_REGIONS.contains(&r.as_str()))
        .count() as i32
}

fn major_entity_count(entities: &HashSet<String>) -> i32 {
    entities
        .iter()
        .filter(|e| MAJOR_ENTITIES.contains(&e.as_str()))
        .count() as i32
}

/// Keyword-bucket inference, checked crisis first.
fn infer_event_type(text: &str) -> Option<String> {
    if contains_any(text, CRISIS_TERMS) {
        return Some("financial_crisis".to_string());
    }
    if contains_any(text, MONETARY_TERMS) {
        return Some("monetary_policy".to_string());
    }
    if contains_any(text, GEOPOLITICAL_TERMS) {
        return Some("geopolitical".to_string());
    }
    if contains_any(text, SUPPLY_TERMS) {
        return Some("supply_shock".to_string());
    }
    if contains_any(text, ECON_DATA_TERMS) {
        return Some("economic_data".to_string());
    }
    None
}

fn normalize_text(headline: &str, full_text: Option<&str>) -> String {
    match full_text {
        Some(body) if !body.is_empty() => format!("{headline} {body}").to_lowercase(),
        _ => headline.to_lowercase(),
    }
}

fn lookup(table: &[(&str, i32)], event_type: Option<&str>, default: i32) -> i32 {
    event_type
        .and_then(|et| table.iter().find(|(name, _)| *name == et))
        .map(|(_, value)| *value)
        .unwrap_or(default)
}

fn contains_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| text.contains(term))
}

fn clamp(value: i32) -> i32 {
    value.clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn scores_fed_rate_cut_headline() {
        let regions = strings(&["US"]);
        let entities = strings(&["Federal Reserve"]);
        let event = EventInput {
            source: "reuters",
            headline: "Fed signals rate cuts",
            event_type: Some("monetary_policy"),
            regions: Some(regions.as_slice()),
            entities: Some(entities.as_slice()),
            ..Default::default()
        };

        let scored = score_event(&event);
        assert_eq!(scored.components.structural, 88);
        assert_eq!(scored.components.transmission, 95);
        assert_eq!(scored.components.historical, 70);
        assert_eq!(scored.components.attention, 60);
        assert_eq!(scored.total_score, 82);
        assert_eq!(scored.tier, Tier::Priority);
        assert!(scored.priority_flag);
    }

    #[test]
    fn infers_monetary_policy_from_headline() {
        let event = EventInput {
            source: "ap",
            headline: "Fed raises rates again",
            ..Default::default()
        };

        let scored = score_event(&event);
        assert_eq!(scored.components.structural, 75);
        assert_eq!(scored.components.transmission, 90);
        assert_eq!(scored.components.historical, 65);
        assert_eq!(scored.components.attention, 55);
        assert_eq!(scored.total_score, 75);
        assert_eq!(scored.tier, Tier::Priority);
    }

    #[test]
    fn unknown_source_and_type_use_neutral_defaults() {
        let event = EventInput {
            source: "blog",
            headline: "Quiet afternoon in markets",
            ..Default::default()
        };

        let scored = score_event(&event);
        assert_eq!(scored.components.structural, 40);
        assert_eq!(scored.components.transmission, 35);
        assert_eq!(scored.components.historical, 30);
        assert_eq!(scored.components.attention, 50);
        assert_eq!(scored.tier, Tier::Logged);
        assert!(!scored.priority_flag);
    }

    #[test]
    fn event_type_aliases_fold_to_canonical() {
        assert_eq!(normalize_event_type(Some("Monetary")).as_deref(), Some("monetary_policy"));
        assert_eq!(normalize_event_type(Some("war")).as_deref(), Some("geopolitical"));
        assert_eq!(normalize_event_type(Some("Rate Decision")).as_deref(), Some("monetary_policy"));
        assert_eq!(normalize_event_type(Some("custom-type")).as_deref(), Some("custom_type"));
        assert_eq!(normalize_event_type(Some("  ")), None);
        assert_eq!(normalize_event_type(None), None);
    }

    #[test]
    fn inference_prefers_crisis_bucket() {
        // "bank" is a crisis term even though "rate" is also present.
        let event = EventInput {
            source: "reuters",
            headline: "Bank collapse forces emergency rate decision",
            ..Default::default()
        };
        let scored = score_event(&event);
        // financial_crisis structural base.
        assert!(scored.components.structural >= 90);
    }

    #[test]
    fn region_aliases_fold_before_matching() {
        let regions = strings(&["United States", "Eurozone", "World"]);
        let event = EventInput {
            source: "reuters",
            headline: "Global outlook shifts",
            event_type: Some("economic_data"),
            regions: Some(regions.as_slice()),
            ..Default::default()
        };
        let scored = score_event(&event);
        // Three major regions after folding: min(25, 24) = 24 on top of base 55.
        assert_eq!(scored.components.structural, 55 + 24);
    }

    #[test]
    fn tier_boundaries_match_thresholds() {
        assert_eq!(classify_score(65), Tier::Priority);
        assert_eq!(classify_score(64), Tier::Monitoring);
        assert_eq!(classify_score(50), Tier::Monitoring);
        assert_eq!(classify_score(49), Tier::Logged);
        assert_eq!(classify_score(0), Tier::Logged);
    }

    #[test]
    fn total_score_stays_clamped() {
        let regions = strings(&["US", "EU", "CHINA", "UK", "JAPAN", "GLOBAL"]);
        let entities = strings(&["fed", "ecb", "boj", "imf", "opec"]);
        let event = EventInput {
            source: "reuters",
            headline: "Breaking: gold surges as war and crisis spark urgent supply shock",
            event_type: Some("financial_crisis"),
            regions: Some(regions.as_slice()),
            entities: Some(entities.as_slice()),
            ..Default::default()
        };
        let scored = score_event(&event);
        assert!(scored.total_score <= 100);
        assert!(scored.components.structural <= 100);
        assert!(scored.components.transmission <= 100);
    }
}
