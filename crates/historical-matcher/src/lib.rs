//! Historical-case matching: exact nearest-neighbour over embeddings when a
//! query vector is available, keyword/event-type ranking otherwise.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use meridian_core::{HistoricalCase, HistoricalMatch, MatchMethod, MeridianError};
use meridian_store::Store;
use significance::normalize_event_type;

const EVENT_TYPE_BOOST: i64 = 5;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of", "on",
    "or", "that", "the", "to", "with",
];

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[a-z0-9]+").expect("valid pattern"))
}

/// Primary entry point. The embedding path runs first when a vector is
/// supplied; an absent vector or an empty result falls back to keyword
/// ranking over all stored cases.
pub async fn find_historical_cases(
    store: &Store,
    event_text: Option<&str>,
    event_type: Option<&str>,
    embedding: Option<&[f32]>,
    limit: i64,
) -> Result<Vec<HistoricalMatch>, MeridianError> {
    if let Some(embedding) = embedding {
        let matches = store.find_similar_cases(embedding, limit).await?;
        if !matches.is_empty() {
            return Ok(matches);
        }
    }
    let cases = store.fetch_historical_cases().await?;
    Ok(rank_cases(&cases, event_text, event_type, limit as usize))
}

/// Tokenise to lowercase alphanumeric runs of three or more characters,
/// stopword-filtered.
pub fn extract_keywords(text: Option<&str>) -> HashSet<String> {
    let Some(text) = text else {
        return HashSet::new();
    };
    let lowered = text.to_lowercase();
    token_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .filter(|token| token.len() >= 3 && !STOPWORDS.contains(&token.as_str()))
        .collect()
}

/// Rank cases by keyword hits plus an event-type boost, then descending
/// significance, then event name, then date range.
pub fn rank_cases(
    cases: &[HistoricalCase],
    event_text: Option<&str>,
    event_type: Option<&str>,
    limit: usize,
) -> Vec<HistoricalMatch> {
    if cases.is_empty() {
        return Vec::new();
    }

    let keywords = extract_keywords(event_text);
    let normalized_type = normalize_event_type(event_type);

    let mut scored: Vec<(i64, &HistoricalCase)> = cases
        .iter()
        .map(|case| (score_case(case, &keywords, normalized_type.as_deref()), case))
        .collect();

    scored.sort_by(|(score_a, case_a), (score_b, case_b)| {
        score_b
            .cmp(score_a)
            .then_with(|| {
                case_b
                    .significance_score
                    .unwrap_or(0)
                    .cmp(&case_a.significance_score.unwrap_or(0))
            })
            .then_with(|| case_a.event_name.to_lowercase().cmp(&case_b.event_name.to_lowercase()))
            .then_with(|| {
                case_a
                    .date_range
                    .as_deref()
                    .unwrap_or("")
                    .cmp(case_b.date_range.as_deref().unwrap_or(""))
            })
    });

    scored
        .into_iter()
        .take(limit)
        .map(|(match_score, case)| HistoricalMatch {
            event_name: case.event_name.clone(),
            date_range: case.date_range.clone(),
            event_type: case.event_type.clone(),
            significance_score: case.significance_score,
            match_method: MatchMethod::Fallback,
            distance: None,
            match_score: Some(match_score),
        })
        .collect()
}

fn score_case(case: &HistoricalCase, keywords: &HashSet<String>, normalized_type: Option<&str>) -> i64 {
    let mut score = keyword_hits(&case_text(case), keywords);
    if let Some(event_type) = normalized_type {
        let case_type = normalize_event_type(case.event_type.as_deref());
        if case_type.as_deref() == Some(event_type) {
            score += EVENT_TYPE_BOOST;
        }
    }
    score
}

fn case_text(case: &HistoricalCase) -> String {
    let mut parts: Vec<&str> = vec![&case.event_name];
    if let Some(event_type) = &case.event_type {
        parts.push(event_type);
    }
    for list in [
        &case.structural_drivers,
        &case.lessons,
        &case.counter_examples,
        &case.traditional_market_reaction,
    ]
    .into_iter()
    .flatten()
    {
        for value in list {
            if !value.is_empty() {
                parts.push(value);
            }
        }
    }
    parts.join(" ").to_lowercase()
}

fn keyword_hits(text: &str, keywords: &HashSet<String>) -> i64 {
    keywords.iter().filter(|keyword| text.contains(*keyword)).count() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(name: &str, date_range: &str, event_type: Option<&str>, score: Option<i32>) -> HistoricalCase {
        HistoricalCase {
            event_name: name.to_string(),
            date_range: Some(date_range.to_string()),
            event_type: event_type.map(str::to_string),
            significance_score: score,
            structural_drivers: None,
            lessons: None,
            counter_examples: None,
            traditional_market_reaction: None,
        }
    }

    #[test]
    fn keyword_extraction_filters_short_and_stop_words() {
        let keywords = extract_keywords(Some("The oil supply is at risk of war"));
        assert!(keywords.contains("oil"));
        assert!(keywords.contains("supply"));
        assert!(keywords.contains("war"));
        assert!(!keywords.contains("the"));
        assert!(!keywords.contains("is"));
        assert!(!keywords.contains("at"));
    }

    #[test]
    fn event_type_match_boosts_rank() {
        let cases = vec![
            case("Generic episode", "2001", Some("economic_data"), Some(50)),
            case("Policy shock", "2013", Some("monetary_policy"), Some(50)),
        ];
        let matches = rank_cases(&cases, None, Some("monetary"), 5);
        assert_eq!(matches[0].event_name, "Policy shock");
        assert_eq!(matches[0].match_score, Some(EVENT_TYPE_BOOST));
        assert_eq!(matches[0].match_method, MatchMethod::Fallback);
    }

    #[test]
    fn significance_breaks_score_ties() {
        let cases = vec![
            case("Low significance", "1990", None, Some(40)),
            case("High significance", "2008", None, Some(95)),
        ];
        let matches = rank_cases(&cases, None, None, 5);
        assert_eq!(matches[0].event_name, "High significance");
    }

    #[test]
    fn name_then_date_break_remaining_ties() {
        let cases = vec![
            case("Bravo event", "2010", None, Some(60)),
            case("Alpha event", "2012", None, Some(60)),
            case("Alpha event", "2005", None, Some(60)),
        ];
        let matches = rank_cases(&cases, None, None, 5);
        assert_eq!(matches[0].event_name, "Alpha event");
        assert_eq!(matches[0].date_range.as_deref(), Some("2005"));
        assert_eq!(matches[1].date_range.as_deref(), Some("2012"));
        assert_eq!(matches[2].event_name, "Bravo event");
    }

    #[test]
    fn keyword_hits_drive_score() {
        let mut rich = case("Oil embargo", "1973", Some("supply_shock"), Some(80));
        rich.lessons = Some(vec!["supply shocks persist".to_string()]);
        let cases = vec![
            case("Unrelated episode", "1999", None, Some(90)),
            rich,
        ];
        let matches = rank_cases(&cases, Some("oil supply embargo risk"), None, 5);
        assert_eq!(matches[0].event_name, "Oil embargo");
        assert!(matches[0].match_score.unwrap() >= 3);
    }

    #[test]
    fn limit_caps_results() {
        let cases: Vec<HistoricalCase> =
            (0..10).map(|i| case(&format!("case {i}"), "2000", None, Some(50))).collect();
        assert_eq!(rank_cases(&cases, None, None, 3).len(), 3);
    }
}
