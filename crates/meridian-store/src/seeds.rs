//! Seed-file loading and validation for the metals knowledge base and the
//! curated historical cases.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use meridian_core::{MeridianError, MetalsKnowledgeEntry};

use crate::embeddings::EMBEDDING_DIM;

pub const ALLOWED_METALS: [&str; 3] = ["gold", "silver", "copper"];
pub const ALLOWED_CATEGORIES: [&str; 5] = [
    "supply_chain",
    "use_cases",
    "patterns",
    "correlations",
    "actors",
];

#[derive(Debug, Deserialize)]
struct MetalsSeedFile {
    metal: String,
    categories: BTreeMap<String, serde_json::Value>,
}

/// Load every `*.json` metals seed file from a directory, validating that
/// each covers exactly the allowed categories for an allowed metal.
pub fn load_metal_seed_entries(data_dir: &Path) -> Result<Vec<MetalsKnowledgeEntry>, MeridianError> {
    if !data_dir.exists() {
        return Err(MeridianError::Validation(format!(
            "Seed directory not found: {}",
            data_dir.display()
        )));
    }

    let mut paths: Vec<_> = std::fs::read_dir(data_dir)
        .map_err(|err| MeridianError::Parse(format!("{}: {err}", data_dir.display())))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut entries = Vec::new();
    for path in paths {
        entries.extend(load_metal_seed_file(&path)?);
    }
    Ok(entries)
}

fn load_metal_seed_file(path: &Path) -> Result<Vec<MetalsKnowledgeEntry>, MeridianError> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| MeridianError::Parse(format!("{}: {err}", path.display())))?;
    let payload: MetalsSeedFile = serde_json::from_str(&text)
        .map_err(|err| MeridianError::Parse(format!("{}: {err}", path.display())))?;

    if !ALLOWED_METALS.contains(&payload.metal.as_str()) {
        return Err(MeridianError::Validation(format!(
            "{}: metal must be one of {ALLOWED_METALS:?}",
            path.display()
        )));
    }
    let unknown: Vec<&String> = payload
        .categories
        .keys()
        .filter(|k| !ALLOWED_CATEGORIES.contains(&k.as_str()))
        .collect();
    if !unknown.is_empty() {
        return Err(MeridianError::Validation(format!(
            "{}: unknown categories: {unknown:?}",
            path.display()
        )));
    }
    let missing: Vec<&str> = ALLOWED_CATEGORIES
        .iter()
        .filter(|c| !payload.categories.contains_key(**c))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(MeridianError::Validation(format!(
            "{}: missing categories: {missing:?}",
            path.display()
        )));
    }
    for (category, content) in &payload.categories {
        if !content.is_object() && !content.is_array() {
            return Err(MeridianError::Validation(format!(
                "{}: category '{category}' must be an object or list",
                path.display()
            )));
        }
    }

    Ok(payload
        .categories
        .into_iter()
        .map(|(category, content)| MetalsKnowledgeEntry {
            metal: payload.metal.clone(),
            category,
            content,
        })
        .collect())
}

/// A curated historical case as loaded from a seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoricalCaseSeed {
    pub event_name: String,
    pub date_range: String,
    pub event_type: Option<String>,
    pub significance_score: Option<i32>,
    #[serde(default)]
    pub structural_drivers: Vec<String>,
    pub metal_impacts: serde_json::Value,
    #[serde(default)]
    pub traditional_market_reaction: Vec<String>,
    #[serde(default)]
    pub crypto_reaction: Vec<String>,
    #[serde(default)]
    pub crypto_transmission: Option<serde_json::Value>,
    #[serde(default)]
    pub time_delays: Vec<String>,
    #[serde(default)]
    pub lessons: Vec<String>,
    #[serde(default)]
    pub counter_examples: Vec<String>,
    #[serde(default)]
    pub quantitative_impacts: Option<serde_json::Value>,
    #[serde(default)]
    pub time_horizon_behavior: Option<serde_json::Value>,
    #[serde(default)]
    pub transmission_channels: Vec<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

/// Load and validate a JSON file containing a list of case seeds.
pub fn load_case_seeds(path: &Path) -> Result<Vec<HistoricalCaseSeed>, MeridianError> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| MeridianError::Parse(format!("{}: {err}", path.display())))?;
    let seeds: Vec<HistoricalCaseSeed> = serde_json::from_str(&text)
        .map_err(|err| MeridianError::Parse(format!("{}: {err}", path.display())))?;
    if seeds.is_empty() {
        return Err(MeridianError::Validation(format!(
            "{}: case seed file must be a non-empty list",
            path.display()
        )));
    }
    for seed in &seeds {
        validate_case_seed(seed)?;
    }
    Ok(seeds)
}

pub fn validate_case_seed(seed: &HistoricalCaseSeed) -> Result<(), MeridianError> {
    if seed.event_name.trim().is_empty() {
        return Err(MeridianError::Validation("case missing event_name".into()));
    }
    if seed.date_range.trim().is_empty() {
        return Err(MeridianError::Validation(format!(
            "{}: missing date_range",
            seed.event_name
        )));
    }
    if let Some(score) = seed.significance_score {
        if !(0..=100).contains(&score) {
            return Err(MeridianError::Validation(format!(
                "{}: significance_score must be 0-100",
                seed.event_name
            )));
        }
    }

    let impacts = seed.metal_impacts.as_object().ok_or_else(|| {
        MeridianError::Validation(format!("{}: metal_impacts must be an object", seed.event_name))
    })?;
    for metal in ALLOWED_METALS {
        let entry = impacts
            .get(metal)
            .and_then(|v| v.as_object())
            .ok_or_else(|| {
                MeridianError::Validation(format!(
                    "{}: metal_impacts.{metal} must be an object",
                    seed.event_name
                ))
            })?;
        for field in ["direction", "magnitude", "driver"] {
            let present = entry
                .get(field)
                .and_then(|v| v.as_str())
                .is_some_and(|s| !s.trim().is_empty());
            if !present {
                return Err(MeridianError::Validation(format!(
                    "{}: metal_impacts.{metal}.{field} must be a non-empty string",
                    seed.event_name
                )));
            }
        }
    }

    if let Some(embedding) = &seed.embedding {
        if embedding.len() != EMBEDDING_DIM {
            return Err(MeridianError::Validation(format!(
                "{}: embedding must have {EMBEDDING_DIM} dimensions",
                seed.event_name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seed(metal_impacts: serde_json::Value) -> HistoricalCaseSeed {
        HistoricalCaseSeed {
            event_name: "Libya supply collapse".to_string(),
            date_range: "2011".to_string(),
            event_type: Some("supply_shock".to_string()),
            significance_score: Some(85),
            structural_drivers: vec!["civil war".to_string()],
            metal_impacts,
            traditional_market_reaction: Vec::new(),
            crypto_reaction: Vec::new(),
            crypto_transmission: None,
            time_delays: Vec::new(),
            lessons: Vec::new(),
            counter_examples: Vec::new(),
            quantitative_impacts: None,
            time_horizon_behavior: None,
            transmission_channels: Vec::new(),
            embedding: None,
        }
    }

    fn full_impacts() -> serde_json::Value {
        json!({
            "gold": {"direction": "up", "magnitude": "moderate", "driver": "risk hedge"},
            "silver": {"direction": "up", "magnitude": "mild", "driver": "beta to gold"},
            "copper": {"direction": "flat", "magnitude": "none", "driver": "demand unchanged"}
        })
    }

    #[test]
    fn complete_seed_validates() {
        assert!(validate_case_seed(&seed(full_impacts())).is_ok());
    }

    #[test]
    fn missing_metal_entry_is_rejected() {
        let impacts = json!({
            "gold": {"direction": "up", "magnitude": "moderate", "driver": "risk hedge"}
        });
        assert!(validate_case_seed(&seed(impacts)).is_err());
    }

    #[test]
    fn empty_driver_is_rejected() {
        let mut impacts = full_impacts();
        impacts["copper"]["driver"] = json!("  ");
        assert!(validate_case_seed(&seed(impacts)).is_err());
    }

    #[test]
    fn out_of_range_significance_is_rejected() {
        let mut s = seed(full_impacts());
        s.significance_score = Some(150);
        assert!(validate_case_seed(&s).is_err());
    }

    #[test]
    fn wrong_embedding_dimension_is_rejected() {
        let mut s = seed(full_impacts());
        s.embedding = Some(vec![0.1; 8]);
        assert!(validate_case_seed(&s).is_err());
    }
}
