//! Crypto-transmission normalisation and heuristic evaluation.
//!
//! The analysis collaborator returns a loose JSON blob; everything persisted
//! goes through [`normalize_crypto_transmission`] first. When no collaborator
//! output exists, [`evaluate_transmission`] produces a rule-based assessment.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use significance::normalize_event_type;

const ALLOWED_STRENGTHS: &[&str] = &["strong", "moderate", "weak", "none"];
const STRENGTH_ALIASES: &[(&str, &str)] = &[
    ("high", "strong"),
    ("medium", "moderate"),
    ("low", "weak"),
    ("unknown", "none"),
];

const CRYPTO_ASSET_ALIASES: &[(&str, &str)] = &[
    ("bitcoin", "BTC"),
    ("btc", "BTC"),
    ("ethereum", "ETH"),
    ("eth", "ETH"),
    ("solana", "SOL"),
    ("sol", "SOL"),
    ("stablecoin", "stablecoins"),
    ("stablecoins", "stablecoins"),
    ("usdt", "USDT"),
    ("tether", "USDT"),
    ("usdc", "USDC"),
];

const LIQUIDITY_TERMS: &[&str] = &[
    "liquidity", "rates", "rate", "yield", "dollar", "tightening", "easing",
];
const RISK_TERMS: &[&str] = &["risk-off", "risk on", "risk-on", "risk aversion", "risk appetite"];
const SANCTION_TERMS: &[&str] = &["sanction", "capital control", "controls", "restriction"];

/// Normalised crypto-transmission assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoTransmission {
    pub exists: bool,
    pub path: String,
    pub strength: String,
    pub relevant_assets: Vec<String>,
}

impl Default for CryptoTransmission {
    fn default() -> Self {
        Self {
            exists: false,
            path: String::new(),
            strength: "none".to_string(),
            relevant_assets: Vec::new(),
        }
    }
}

impl CryptoTransmission {
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "exists": self.exists,
            "path": self.path,
            "strength": self.strength,
            "relevant_assets": self.relevant_assets,
        })
    }
}

/// Normalise an untrusted blob: `exists` must be literally true, the path is
/// trimmed, the strength is alias-folded into the allowed set, and assets are
/// alias-mapped and deduplicated. When the transmission exists but no assets
/// were supplied, assets are extracted from the path text.
pub fn normalize_crypto_transmission(payload: Option<&Value>) -> CryptoTransmission {
    let data = payload.and_then(|v| v.as_object());

    let exists = data
        .and_then(|d| d.get("exists"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let path = data
        .and_then(|d| d.get("path"))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("")
        .to_string();

    let strength = normalize_strength(data.and_then(|d| d.get("strength")));

    let raw_assets = data
        .and_then(|d| d.get("relevant_assets").or_else(|| d.get("assets")))
        .cloned()
        .unwrap_or(Value::Null);
    let mut assets = normalize_relevant_assets(&raw_assets);
    if exists && assets.is_empty() {
        assets = extract_relevant_assets(&path);
    }

    CryptoTransmission {
        exists,
        path,
        strength,
        relevant_assets: assets,
    }
}

/// Accepts either a comma-separated string or a list of strings.
pub fn normalize_relevant_assets(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    let mut seen = std::collections::HashSet::new();
    raw.iter()
        .map(|asset| normalize_asset(asset))
        .filter(|asset| seen.insert(asset.clone()))
        .collect()
}

/// Pull known crypto asset names out of free text via the alias table.
pub fn extract_relevant_assets(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut seen = std::collections::HashSet::new();
    let mut assets = Vec::new();
    for token in lowered.split(|c: char| !c.is_ascii_alphanumeric()) {
        if token.is_empty() {
            continue;
        }
        if let Some((_, canonical)) = CRYPTO_ASSET_ALIASES.iter().find(|(alias, _)| *alias == token)
        {
            if seen.insert(*canonical) {
                assets.push(canonical.to_string());
            }
        }
    }
    assets
}

/// Rule-based crypto-transmission assessment for events with no collaborator
/// output.
pub fn evaluate_transmission(event_text: Option<&str>, event_type: Option<&str>) -> CryptoTransmission {
    let text = event_text.unwrap_or("").to_lowercase();
    if text.is_empty() {
        return CryptoTransmission::default();
    }

    let assets = extract_relevant_assets(&text);
    if !assets.is_empty() {
        return normalize_crypto_transmission(Some(&serde_json::json!({
            "exists": true,
            "path": "Direct crypto linkage referenced in the event.",
            "strength": "moderate",
            "relevant_assets": assets,
        })));
    }

    let normalized_type = normalize_event_type(event_type);
    let monetary_or_crisis = matches!(
        normalized_type.as_deref(),
        Some("monetary_policy") | Some("financial_crisis")
    );
    if contains_any(&text, LIQUIDITY_TERMS) && monetary_or_crisis {
        return normalize_crypto_transmission(Some(&serde_json::json!({
            "exists": true,
            "path": "Liquidity and risk conditions can spill into crypto risk appetite.",
            "strength": "weak",
            "relevant_assets": ["BTC", "ETH"],
        })));
    }

    if contains_any(&text, SANCTION_TERMS) && normalized_type.as_deref() == Some("geopolitical") {
        return normalize_crypto_transmission(Some(&serde_json::json!({
            "exists": true,
            "path": "Capital controls can raise stablecoin demand in affected regions.",
            "strength": "weak",
            "relevant_assets": ["stablecoins"],
        })));
    }

    if contains_any(&text, RISK_TERMS) {
        return normalize_crypto_transmission(Some(&serde_json::json!({
            "exists": true,
            "path": "Risk sentiment shifts can influence crypto positioning.",
            "strength": "weak",
            "relevant_assets": ["BTC", "ETH"],
        })));
    }

    CryptoTransmission::default()
}

fn normalize_strength(value: Option<&Value>) -> String {
    if let Some(raw) = value.and_then(Value::as_str) {
        let lowered = raw.trim().to_lowercase();
        if ALLOWED_STRENGTHS.contains(&lowered.as_str()) {
            return lowered;
        }
        if let Some((_, canonical)) = STRENGTH_ALIASES.iter().find(|(alias, _)| *alias == lowered) {
            return canonical.to_string();
        }
    }
    "none".to_string()
}

fn normalize_asset(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    CRYPTO_ASSET_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| value.trim().to_string())
}

fn contains_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| text.contains(term))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strength_aliases_fold() {
        let payload = json!({"exists": true, "path": "p", "strength": "High"});
        assert_eq!(normalize_crypto_transmission(Some(&payload)).strength, "strong");

        let payload = json!({"exists": true, "path": "p", "strength": "garbage"});
        assert_eq!(normalize_crypto_transmission(Some(&payload)).strength, "none");
    }

    #[test]
    fn asset_aliases_and_dedup() {
        let payload = json!({
            "exists": true,
            "path": "p",
            "strength": "weak",
            "relevant_assets": ["bitcoin", "BTC", "tether", " stablecoins "],
        });
        let normalized = normalize_crypto_transmission(Some(&payload));
        assert_eq!(normalized.relevant_assets, vec!["BTC", "USDT", "stablecoins"]);
    }

    #[test]
    fn comma_separated_assets_are_accepted() {
        let assets = normalize_relevant_assets(&json!("bitcoin, eth, , solana"));
        assert_eq!(assets, vec!["BTC", "ETH", "SOL"]);
    }

    #[test]
    fn assets_extracted_from_path_when_missing() {
        let payload = json!({
            "exists": true,
            "path": "Stress pushes flows into bitcoin and tether.",
            "strength": "moderate",
        });
        let normalized = normalize_crypto_transmission(Some(&payload));
        assert_eq!(normalized.relevant_assets, vec!["BTC", "USDT"]);
    }

    #[test]
    fn normalizing_normalized_blob_is_a_no_op() {
        let payload = json!({
            "exists": true,
            "path": "Direct crypto linkage referenced in the event.",
            "strength": "moderate",
            "relevant_assets": ["BTC", "ETH"],
        });
        let once = normalize_crypto_transmission(Some(&payload));
        let twice = normalize_crypto_transmission(Some(&once.to_value()));
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_payload_yields_default() {
        let normalized = normalize_crypto_transmission(None);
        assert!(!normalized.exists);
        assert_eq!(normalized.strength, "none");
        assert!(normalized.relevant_assets.is_empty());
    }

    #[test]
    fn heuristic_detects_direct_mentions() {
        let result = evaluate_transmission(Some("Bitcoin slides as tether depegs"), None);
        assert!(result.exists);
        assert_eq!(result.strength, "moderate");
        assert_eq!(result.relevant_assets, vec!["BTC", "USDT"]);
    }

    #[test]
    fn heuristic_routes_liquidity_terms_for_monetary_events() {
        let result = evaluate_transmission(
            Some("Central bank tightening drains liquidity"),
            Some("monetary_policy"),
        );
        assert!(result.exists);
        assert_eq!(result.strength, "weak");
        assert_eq!(result.relevant_assets, vec!["BTC", "ETH"]);
    }

    #[test]
    fn heuristic_routes_sanctions_to_stablecoins() {
        let result = evaluate_transmission(
            Some("New sanction package includes capital controls"),
            Some("geopolitical"),
        );
        assert!(result.exists);
        assert_eq!(result.relevant_assets, vec!["stablecoins"]);
    }

    #[test]
    fn heuristic_defaults_to_none() {
        let result = evaluate_transmission(Some("Quiet session in commodity markets"), None);
        assert!(!result.exists);
        assert_eq!(result, CryptoTransmission::default());
    }
}
