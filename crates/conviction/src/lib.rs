//! Component-based conviction scoring for trading theses.
//!
//! Five weighted components: historical precedent (0-25), quantitative
//! magnitude (0-25), channel clarity (0-20), timing/catalyst (0-15), and a
//! counter-case discount (0 to -15). The clamped total maps to
//! HIGH/MEDIUM/LOW/INSUFFICIENT.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvictionLevel {
    High,
    Medium,
    Low,
    Insufficient,
}

impl ConvictionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConvictionLevel::High => "high",
            ConvictionLevel::Medium => "medium",
            ConvictionLevel::Low => "low",
            ConvictionLevel::Insufficient => "insufficient",
        }
    }
}

const HIGH_THRESHOLD: f64 = 70.0;
const MEDIUM_THRESHOLD: f64 = 50.0;
const LOW_THRESHOLD: f64 = 30.0;

const HISTORICAL_MAX: f64 = 25.0;
const QUANTITATIVE_MAX: f64 = 25.0;
const CHANNEL_MAX: f64 = 20.0;
const TIMING_MAX: f64 = 15.0;
const COUNTER_MAX: f64 = 15.0;

/// One component of the conviction score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvictionComponent {
    pub name: String,
    pub raw_score: f64,
    pub max_score: f64,
    pub weight: f64,
    pub rationale: String,
}

impl ConvictionComponent {
    /// Weighted contribution to the total; negative for discounts.
    pub fn weighted_score(&self) -> f64 {
        if self.weight < 0.0 {
            self.raw_score * self.weight
        } else {
            (self.raw_score * self.weight).min(self.max_score)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvictionResult {
    pub total_score: f64,
    pub level: ConvictionLevel,
    pub components: Vec<ConvictionComponent>,
    pub warnings: Vec<String>,
}

/// A matched historical case as seen by the conviction engine.
#[derive(Debug, Clone, Default)]
pub struct CaseEvidence {
    pub significance_score: Option<i32>,
}

pub fn calculate_conviction_score(
    historical_cases: &[CaseEvidence],
    quantitative_impacts: Option<&Value>,
    matched_channels: &[String],
    catalyst_clarity: &str,
    counter_case_strength: &str,
) -> ConvictionResult {
    let mut components = Vec::new();
    let mut warnings = Vec::new();

    let hist = score_historical_precedent(historical_cases);
    if hist.raw_score < 10.0 {
        warnings.push("Limited historical precedent data".to_string());
    }
    components.push(hist);

    let quant = score_quantitative_magnitude(quantitative_impacts);
    if quant.raw_score < 10.0 {
        warnings.push("Limited quantitative impact data".to_string());
    }
    components.push(quant);

    components.push(score_channel_clarity(matched_channels));
    components.push(score_timing_catalyst(catalyst_clarity));
    components.push(score_counter_case(counter_case_strength));

    let total: f64 = components.iter().map(ConvictionComponent::weighted_score).sum();
    let total = total.clamp(0.0, 100.0);

    ConvictionResult {
        total_score: total,
        level: classify_conviction_level(total),
        components,
        warnings,
    }
}

pub fn classify_conviction_level(score: f64) -> ConvictionLevel {
    if score >= HIGH_THRESHOLD {
        ConvictionLevel::High
    } else if score >= MEDIUM_THRESHOLD {
        ConvictionLevel::Medium
    } else if score >= LOW_THRESHOLD {
        ConvictionLevel::Low
    } else {
        ConvictionLevel::Insufficient
    }
}

/// 0 cases: 0. 1/2/3+ cases: 10/15/20. +5 when mean significance > 80.
fn score_historical_precedent(cases: &[CaseEvidence]) -> ConvictionComponent {
    if cases.is_empty() {
        return ConvictionComponent {
            name: "Historical Precedent".to_string(),
            raw_score: 0.0,
            max_score: HISTORICAL_MAX,
            weight: 1.0,
            rationale: "No historical cases matched".to_string(),
        };
    }

    let base: f64 = match cases.len() {
        1 => 10.0,
        2 => 15.0,
        _ => 20.0,
    };

    let scores: Vec<f64> = cases
        .iter()
        .filter_map(|c| c.significance_score)
        .filter(|s| *s > 0)
        .map(f64::from)
        .collect();
    let avg = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };
    let bonus = if avg > 80.0 { 5.0 } else { 0.0 };

    ConvictionComponent {
        name: "Historical Precedent".to_string(),
        raw_score: (base + bonus).min(HISTORICAL_MAX),
        max_score: HISTORICAL_MAX,
        weight: 1.0,
        rationale: format!("{} case(s) matched, avg significance {avg:.0}", cases.len()),
    }
}

/// Production-drop, price-impact, and global-supply sub-scores with piecewise
/// thresholds.
fn score_quantitative_magnitude(impacts: Option<&Value>) -> ConvictionComponent {
    let Some(impacts) = impacts.and_then(Value::as_object) else {
        return ConvictionComponent {
            name: "Quantitative Magnitude".to_string(),
            raw_score: 0.0,
            max_score: QUANTITATIVE_MAX,
            weight: 1.0,
            rationale: "No quantitative impact data available".to_string(),
        };
    };

    let mut score: f64 = 0.0;
    let mut rationale_parts = Vec::new();

    let prod_drop = number(impacts.get("production_drop_pct"));
    if prod_drop >= 90.0 {
        score += 10.0;
        rationale_parts.push(format!("production drop {prod_drop}% (severe)"));
    } else if prod_drop >= 50.0 {
        score += 7.0;
        rationale_parts.push(format!("production drop {prod_drop}% (major)"));
    } else if prod_drop >= 20.0 {
        score += 4.0;
        rationale_parts.push(format!("production drop {prod_drop}% (moderate)"));
    } else if prod_drop > 0.0 {
        score += 2.0;
        rationale_parts.push(format!("production drop {prod_drop}% (minor)"));
    }

    let price_impact = match impacts.get("price_impact_pct") {
        Some(value) => number(Some(value)),
        None => number(impacts.get("peak_price_impact_pct")),
    };
    if price_impact >= 100.0 {
        score += 10.0;
        rationale_parts.push(format!("price impact {price_impact}% (extreme)"));
    } else if price_impact >= 50.0 {
        score += 7.0;
        rationale_parts.push(format!("price impact {price_impact}% (major)"));
    } else if price_impact >= 20.0 {
        score += 4.0;
        rationale_parts.push(format!("price impact {price_impact}% (notable)"));
    } else if price_impact > 0.0 {
        score += 2.0;
        rationale_parts.push(format!("price impact {price_impact}% (minor)"));
    }

    let global_impact = number(impacts.get("global_supply_impact_pct"));
    if global_impact >= 5.0 {
        score += 5.0;
        rationale_parts.push(format!("global supply {global_impact}% (significant)"));
    } else if global_impact >= 2.0 {
        score += 3.0;
        rationale_parts.push(format!("global supply {global_impact}%"));
    } else if global_impact > 0.0 {
        score += 1.0;
    }

    let rationale = if rationale_parts.is_empty() {
        "Minimal quantitative impact".to_string()
    } else {
        rationale_parts.join("; ")
    };

    ConvictionComponent {
        name: "Quantitative Magnitude".to_string(),
        raw_score: score.min(QUANTITATIVE_MAX),
        max_score: QUANTITATIVE_MAX,
        weight: 1.0,
        rationale,
    }
}

fn score_channel_clarity(channels: &[String]) -> ConvictionComponent {
    if channels.is_empty() {
        return ConvictionComponent {
            name: "Channel Clarity".to_string(),
            raw_score: 0.0,
            max_score: CHANNEL_MAX,
            weight: 1.0,
            rationale: "No transmission channels identified".to_string(),
        };
    }
    let raw: f64 = match channels.len() {
        1 => 10.0,
        2 => 15.0,
        _ => 20.0,
    };
    let listed: Vec<&str> = channels.iter().take(3).map(String::as_str).collect();
    ConvictionComponent {
        name: "Channel Clarity".to_string(),
        raw_score: raw.min(CHANNEL_MAX),
        max_score: CHANNEL_MAX,
        weight: 1.0,
        rationale: format!("{} channel(s): {}", channels.len(), listed.join(", ")),
    }
}

fn score_timing_catalyst(clarity: &str) -> ConvictionComponent {
    let (raw, rationale) = match clarity.to_lowercase().as_str() {
        "high" => (15.0, "Clear catalyst with specific timing"),
        "medium" => (10.0, "General timeframe identified"),
        "low" => (5.0, "Vague or uncertain timing"),
        _ => (0.0, "No clear catalyst or timing"),
    };
    ConvictionComponent {
        name: "Timing/Catalyst".to_string(),
        raw_score: raw,
        max_score: TIMING_MAX,
        weight: 1.0,
        rationale: rationale.to_string(),
    }
}

fn score_counter_case(strength: &str) -> ConvictionComponent {
    let (raw, rationale) = match strength.to_lowercase().as_str() {
        "strong" => (15.0, "Strong counter-arguments present"),
        "moderate" => (10.0, "Some valid concerns identified"),
        "weak" => (5.0, "Minor concerns only"),
        _ => (0.0, "No significant counter-case"),
    };
    ConvictionComponent {
        name: "Counter-Case Discount".to_string(),
        raw_score: raw,
        max_score: COUNTER_MAX,
        weight: -1.0,
        rationale: rationale.to_string(),
    }
}

fn number(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}

/// Render a conviction result for LLM prompt injection.
pub fn format_conviction_for_prompt(result: &ConvictionResult) -> String {
    let mut lines = vec![
        "=== CONVICTION ASSESSMENT ===".to_string(),
        String::new(),
        format!(
            "OVERALL: {} ({:.0}/100)",
            result.level.as_str().to_uppercase(),
            result.total_score
        ),
        String::new(),
        "COMPONENT BREAKDOWN:".to_string(),
    ];

    for comp in &result.components {
        if comp.weight < 0.0 {
            lines.push(format!("  {}: -{:.0} pts", comp.name, comp.weighted_score().abs()));
        } else {
            lines.push(format!(
                "  {}: {:.0}/{:.0} pts",
                comp.name,
                comp.weighted_score(),
                comp.max_score
            ));
        }
        if !comp.rationale.is_empty() {
            lines.push(format!("    {}", comp.rationale));
        }
    }

    if !result.warnings.is_empty() {
        lines.push(String::new());
        lines.push("WARNINGS:".to_string());
        for warning in &result.warnings {
            lines.push(format!("  ! {warning}"));
        }
    }

    lines.push(String::new());
    lines.push("=".repeat(27));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cases(scores: &[i32]) -> Vec<CaseEvidence> {
        scores
            .iter()
            .map(|s| CaseEvidence {
                significance_score: Some(*s),
            })
            .collect()
    }

    fn channels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn supported_thesis_scores_medium() {
        let result = calculate_conviction_score(
            &cases(&[85, 90]),
            Some(&json!({"production_drop_pct": 50, "price_impact_pct": 30})),
            &channels(&["oil_supply_disruption", "trade_sanctions"]),
            "high",
            "weak",
        );
        // 15+5 precedent, 7+4 quant, 15 channels, 15 timing, -5 counter.
        assert_eq!(result.total_score, 56.0);
        assert_eq!(result.level, ConvictionLevel::Medium);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn empty_inputs_are_insufficient_with_warnings() {
        let result = calculate_conviction_score(&[], None, &[], "none", "none");
        assert_eq!(result.total_score, 0.0);
        assert_eq!(result.level, ConvictionLevel::Insufficient);
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn precedent_score_scales_with_case_count() {
        let one = calculate_conviction_score(&cases(&[50]), None, &[], "none", "none");
        let two = calculate_conviction_score(&cases(&[50, 50]), None, &[], "none", "none");
        let three = calculate_conviction_score(&cases(&[50, 50, 50]), None, &[], "none", "none");
        assert_eq!(one.components[0].raw_score, 10.0);
        assert_eq!(two.components[0].raw_score, 15.0);
        assert_eq!(three.components[0].raw_score, 20.0);
    }

    #[test]
    fn high_significance_cases_earn_bonus_capped_at_max() {
        let result = calculate_conviction_score(&cases(&[85, 90, 95]), None, &[], "none", "none");
        assert_eq!(result.components[0].raw_score, 25.0);
    }

    #[test]
    fn quantitative_thresholds_match_glossary() {
        let extreme = calculate_conviction_score(
            &[],
            Some(&json!({
                "production_drop_pct": 95,
                "price_impact_pct": 120,
                "global_supply_impact_pct": 6
            })),
            &[],
            "none",
            "none",
        );
        assert_eq!(extreme.components[1].raw_score, 25.0);

        let minor = calculate_conviction_score(
            &[],
            Some(&json!({
                "production_drop_pct": 5,
                "price_impact_pct": 10,
                "global_supply_impact_pct": 1
            })),
            &[],
            "none",
            "none",
        );
        assert_eq!(minor.components[1].raw_score, 5.0);
    }

    #[test]
    fn peak_price_impact_is_a_fallback_key() {
        let result = calculate_conviction_score(
            &[],
            Some(&json!({"peak_price_impact_pct": 60})),
            &[],
            "none",
            "none",
        );
        assert_eq!(result.components[1].raw_score, 7.0);
    }

    #[test]
    fn counter_case_subtracts() {
        let none = calculate_conviction_score(&cases(&[85, 90, 95]), None, &channels(&["a", "b", "c"]), "high", "none");
        let strong = calculate_conviction_score(&cases(&[85, 90, 95]), None, &channels(&["a", "b", "c"]), "high", "strong");
        assert_eq!(none.total_score - strong.total_score, 15.0);
    }

    #[test]
    fn level_thresholds_hold_at_boundaries() {
        assert_eq!(classify_conviction_level(70.0), ConvictionLevel::High);
        assert_eq!(classify_conviction_level(69.9), ConvictionLevel::Medium);
        assert_eq!(classify_conviction_level(50.0), ConvictionLevel::Medium);
        assert_eq!(classify_conviction_level(30.0), ConvictionLevel::Low);
        assert_eq!(classify_conviction_level(29.9), ConvictionLevel::Insufficient);
    }

    #[test]
    fn total_never_leaves_unit_range() {
        let result = calculate_conviction_score(&[], None, &[], "none", "strong");
        assert_eq!(result.total_score, 0.0);
        assert!(result.total_score >= 0.0);
    }

    #[test]
    fn prompt_format_includes_level_and_warnings() {
        let result = calculate_conviction_score(&[], None, &[], "none", "none");
        let text = format_conviction_for_prompt(&result);
        assert!(text.contains("OVERALL: INSUFFICIENT"));
        assert!(text.contains("Limited historical precedent data"));
    }
}
