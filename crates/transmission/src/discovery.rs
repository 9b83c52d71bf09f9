//! Asset discovery: map an event to transmission channels and the tickers
//! they move.

use std::collections::HashSet;

use serde::Serialize;

use crate::channels::{
    get_channels_for_event_type, match_channels_by_keywords, ChannelType, TransmissionChannel,
    ALL_CHANNELS,
};

pub const MAX_CHANNELS: usize = 5;

/// Result of asset discovery for an event.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DiscoveryResult {
    #[serde(skip)]
    pub channels: Vec<&'static TransmissionChannel>,
    pub primary_assets: Vec<String>,
    pub secondary_assets: Vec<String>,
    pub discovered_assets: Vec<String>,
    pub search_queries_used: Vec<String>,
    pub errors: Vec<String>,
}

impl DiscoveryResult {
    pub fn channel_types(&self) -> Vec<ChannelType> {
        self.channels.iter().map(|c| c.channel_type).collect()
    }

    /// All assets in priority order (primary, secondary, discovered).
    pub fn all_assets(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.primary_assets
            .iter()
            .chain(self.secondary_assets.iter())
            .chain(self.discovered_assets.iter())
            .filter(|asset| seen.insert(asset.as_str().to_string()))
            .cloned()
            .collect()
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "channels": self.channels.iter().map(|c| c.name).collect::<Vec<_>>(),
            "channel_types": self
                .channels
                .iter()
                .map(|c| c.channel_type.as_str())
                .collect::<Vec<_>>(),
            "primary_assets": self.primary_assets,
            "secondary_assets": self.secondary_assets,
            "discovered_assets": self.discovered_assets,
            "all_assets": self.all_assets(),
            "search_queries_used": self.search_queries_used,
            "errors": self.errors,
        })
    }
}

/// Discover channels and assets for an event.
///
/// Keyword matches come first (more specific), then event-type routed
/// channels, deduplicated by channel type and capped at [`MAX_CHANNELS`].
/// Secondary assets never shadow primary ones.
pub fn discover_assets_for_event(
    headline: &str,
    event_type: Option<&str>,
    full_text: Option<&str>,
) -> DiscoveryResult {
    let mut result = DiscoveryResult::default();

    let search_text = match full_text {
        Some(body) => format!("{headline} {body}"),
        None => headline.to_string(),
    };
    let keyword_matched = match_channels_by_keywords(&search_text);

    let type_matched = event_type
        .map(get_channels_for_event_type)
        .unwrap_or_default();

    let mut seen_types = HashSet::new();
    let mut combined: Vec<&'static TransmissionChannel> = Vec::new();
    for channel in keyword_matched.into_iter().chain(type_matched) {
        if seen_types.insert(channel.channel_type) {
            combined.push(channel);
        }
    }
    combined.truncate(MAX_CHANNELS);
    result.channels = combined;

    let mut primary_seen = HashSet::new();
    let mut secondary_seen = HashSet::new();
    for channel in &result.channels {
        for asset in channel.primary_assets {
            if primary_seen.insert(*asset) {
                result.primary_assets.push(asset.to_string());
            }
        }
    }
    for channel in &result.channels {
        for asset in channel.secondary_assets {
            if !primary_seen.contains(asset) && secondary_seen.insert(*asset) {
                result.secondary_assets.push(asset.to_string());
            }
        }
    }

    for channel in &result.channels {
        for query in channel.search_queries {
            result.search_queries_used.push(query.to_string());
        }
    }

    result
}

/// Discovery scoped to a single named channel type.
pub fn discover_assets_by_channel_type(channel_type: &str) -> DiscoveryResult {
    let mut result = DiscoveryResult::default();
    match ALL_CHANNELS
        .iter()
        .find(|c| c.channel_type.as_str() == channel_type)
    {
        Some(channel) => {
            result.channels = vec![channel];
            result.primary_assets = channel.primary_assets.iter().map(|a| a.to_string()).collect();
            result.secondary_assets = channel
                .secondary_assets
                .iter()
                .filter(|a| !channel.primary_assets.contains(a))
                .map(|a| a.to_string())
                .collect();
            result.search_queries_used =
                channel.search_queries.iter().map(|q| q.to_string()).collect();
        }
        None => result
            .errors
            .push(format!("Unknown channel type: {channel_type}")),
    }
    result
}

/// Merge several discovery results, preserving the first occurrence of every
/// channel and asset. Primary placement still wins over secondary.
pub fn merge_discovery_results(results: &[DiscoveryResult]) -> DiscoveryResult {
    let mut merged = DiscoveryResult::default();
    let mut channel_seen = HashSet::new();
    let mut primary_seen = HashSet::new();
    let mut secondary_seen = HashSet::new();
    let mut discovered_seen = HashSet::new();
    let mut query_seen = HashSet::new();

    for result in results {
        for channel in &result.channels {
            if channel_seen.insert(channel.channel_type) {
                merged.channels.push(*channel);
            }
        }
        for asset in &result.primary_assets {
            if primary_seen.insert(asset.clone()) {
                merged.primary_assets.push(asset.clone());
            }
        }
        for asset in &result.secondary_assets {
            if !primary_seen.contains(asset) && secondary_seen.insert(asset.clone()) {
                merged.secondary_assets.push(asset.clone());
            }
        }
        for asset in &result.discovered_assets {
            if !primary_seen.contains(asset)
                && !secondary_seen.contains(asset)
                && discovered_seen.insert(asset.clone())
            {
                merged.discovered_assets.push(asset.clone());
            }
        }
        for query in &result.search_queries_used {
            if query_seen.insert(query.clone()) {
                merged.search_queries_used.push(query.clone());
            }
        }
        merged.errors.extend(result.errors.iter().cloned());
    }
    merged
}

/// Render a discovery result for LLM prompt injection.
pub fn format_discovery_for_prompt(result: &DiscoveryResult) -> String {
    let mut lines = vec!["=== DISCOVERED ASSETS ===".to_string()];

    if !result.channels.is_empty() {
        lines.push(String::new());
        lines.push("TRANSMISSION CHANNELS:".to_string());
        for channel in &result.channels {
            lines.push(format!("  - {}", channel.name));
            lines.push(format!("    {}", channel.description));
        }
    }
    if !result.primary_assets.is_empty() {
        lines.push(String::new());
        lines.push("PRIMARY ASSETS (high relevance):".to_string());
        lines.push(format!(
            "  {}",
            result.primary_assets.iter().take(10).cloned().collect::<Vec<_>>().join(", ")
        ));
    }
    if !result.secondary_assets.is_empty() {
        lines.push(String::new());
        lines.push("SECONDARY ASSETS (related exposure):".to_string());
        lines.push(format!(
            "  {}",
            result.secondary_assets.iter().take(10).cloned().collect::<Vec<_>>().join(", ")
        ));
    }

    lines.push(String::new());
    lines.push("=".repeat(25));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_event_discovers_oil_and_risk_off() {
        let result = discover_assets_for_event(
            "Russia threatens to cut oil pipeline to Europe",
            Some("geopolitical"),
            None,
        );
        let types = result.channel_types();
        assert!(types.contains(&ChannelType::OilSupplyDisruption));
        assert!(types.contains(&ChannelType::RiskOffFlight));
        assert!(result.primary_assets.iter().any(|a| a == "CL=F"));
        assert!(result.primary_assets.iter().any(|a| a == "BZ=F"));
    }

    #[test]
    fn channels_are_unique_and_capped() {
        let result = discover_assets_for_event(
            "Oil crude pipeline opec embargo war sanction inflation dollar vix liquidity \
             gold mine wheat gas lng yen yuan hawkish dovish wage deflation",
            Some("geopolitical"),
            None,
        );
        let types = result.channel_types();
        let unique: HashSet<_> = types.iter().collect();
        assert_eq!(unique.len(), types.len());
        assert!(types.len() <= MAX_CHANNELS);
    }

    #[test]
    fn secondary_assets_never_shadow_primary() {
        let result = discover_assets_for_event(
            "Gold mine strike halts copper smelter as risk-off selloff deepens",
            Some("supply_shock"),
            None,
        );
        for asset in &result.secondary_assets {
            assert!(
                !result.primary_assets.contains(asset),
                "{asset} appears in both primary and secondary"
            );
        }
    }

    #[test]
    fn unknown_channel_type_reports_error() {
        let result = discover_assets_by_channel_type("not_a_channel");
        assert!(result.channels.is_empty());
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn single_channel_discovery_returns_its_assets() {
        let result = discover_assets_by_channel_type("oil_supply_disruption");
        assert_eq!(result.channels.len(), 1);
        assert!(result.primary_assets.contains(&"CL=F".to_string()));
        assert!(!result.search_queries_used.is_empty());
    }

    #[test]
    fn merging_results_dedupes_across_inputs() {
        let oil = discover_assets_by_channel_type("oil_supply_disruption");
        let risk = discover_assets_by_channel_type("risk_off_flight");
        let again = discover_assets_by_channel_type("oil_supply_disruption");

        let merged = merge_discovery_results(&[oil, risk, again]);
        assert_eq!(merged.channels.len(), 2);
        let primary: HashSet<_> = merged.primary_assets.iter().collect();
        assert_eq!(primary.len(), merged.primary_assets.len());
        for asset in &merged.secondary_assets {
            assert!(!merged.primary_assets.contains(asset));
        }
    }

    #[test]
    fn all_assets_preserves_priority_order() {
        let result = discover_assets_for_event(
            "Oil pipeline cut triggers risk-off flight to safety",
            None,
            None,
        );
        let all = result.all_assets();
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
        if !result.primary_assets.is_empty() {
            assert_eq!(all[0], result.primary_assets[0]);
        }
    }
}
