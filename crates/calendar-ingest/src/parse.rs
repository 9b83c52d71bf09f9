//! Calendar payload parsing and value normalisation.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use meridian_core::{EconomicCalendarEvent, MeridianError};

pub const IMPACT_LEVELS: [&str; 3] = ["high", "medium", "low"];
const MISSING_VALUE_TOKENS: [&str; 4] = ["", "-", "n/a", "na"];

/// Release-ID catalogue for the macroeconomic-series release-dates API:
/// `release_id -> (event_name, impact_level, region)`.
pub const FRED_RELEASE_MAPPINGS: &[(i64, (&str, &str, &str))] = &[
    (10, ("Consumer Price Index (CPI)", "high", "USD")),
    (50, ("Employment Situation (NFP)", "high", "USD")),
    (53, ("Gross Domestic Product (GDP)", "high", "USD")),
    (54, ("Personal Income and Outlays (PCE)", "high", "USD")),
    (101, ("FOMC Press Release", "high", "USD")),
    (9, ("Retail Sales", "medium", "USD")),
    (13, ("Industrial Production", "medium", "USD")),
    (46, ("Producer Price Index (PPI)", "medium", "USD")),
    (11, ("Unemployment Insurance Weekly Claims", "medium", "USD")),
];

pub fn release_mapping(release_id: i64) -> Option<(&'static str, &'static str, &'static str)> {
    FRED_RELEASE_MAPPINGS
        .iter()
        .find(|(id, _)| *id == release_id)
        .map(|(_, mapping)| *mapping)
}

/// ISO-8601 with trailing `Z` accepted; naive timestamps and bare dates are
/// treated as UTC.
pub fn parse_event_datetime(value: &str) -> Result<DateTime<Utc>, MeridianError> {
    let raw = value.trim();
    let normalized = if let Some(stripped) = raw.strip_suffix('Z') {
        format!("{stripped}+00:00")
    } else {
        raw.to_string()
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = raw.parse::<NaiveDate>() {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }
    Err(MeridianError::Parse(format!("unparseable event date: {value}")))
}

pub fn normalize_impact_level(value: &str) -> Option<&'static str> {
    match value.trim().to_lowercase().as_str() {
        "hi" | "high" => Some("high"),
        "med" | "medium" => Some("medium"),
        "lo" | "low" => Some("low"),
        _ => None,
    }
}

/// Trim and drop missing-value markers; values otherwise pass through.
pub fn normalize_value(value: Option<&str>) -> Option<String> {
    let cleaned = value?.trim();
    if MISSING_VALUE_TOKENS.contains(&cleaned.to_lowercase().as_str()) {
        return None;
    }
    Some(cleaned.to_string())
}

/// Parse a display value to a number, recognising `K/M/B/%` suffixes and
/// comma thousands.
pub fn parse_numeric_value(value: Option<&str>) -> Option<Decimal> {
    let cleaned = normalize_value(value)?;
    let mut body = cleaned.as_str();
    let mut multiplier = Decimal::ONE;

    if let Some(last) = body.chars().last() {
        match last.to_ascii_uppercase() {
            'K' => {
                multiplier = Decimal::from(1_000);
                body = body[..body.len() - 1].trim_end();
            }
            'M' => {
                multiplier = Decimal::from(1_000_000);
                body = body[..body.len() - 1].trim_end();
            }
            'B' => {
                multiplier = Decimal::from(1_000_000_000u64);
                body = body[..body.len() - 1].trim_end();
            }
            '%' => {
                body = body[..body.len() - 1].trim_end();
            }
            _ => {}
        }
    }

    let number: Decimal = body.replace(',', "").parse().ok()?;
    Some(number * multiplier)
}

/// Surprise is computable only when both actual and expected parse.
pub fn calculate_surprise(
    actual_value: Option<&str>,
    expected_value: Option<&str>,
) -> Option<(&'static str, Decimal)> {
    let actual = parse_numeric_value(actual_value)?;
    let expected = parse_numeric_value(expected_value)?;

    let direction = if actual > expected {
        "positive"
    } else if actual < expected {
        "negative"
    } else {
        "flat"
    };
    Some((direction, (actual - expected).abs()))
}

#[allow(clippy::too_many_arguments)]
pub fn build_event(
    event_name: String,
    event_date: DateTime<Utc>,
    region: String,
    impact_level: &'static str,
    expected_value: Option<String>,
    actual_value: Option<String>,
    previous_value: Option<String>,
) -> EconomicCalendarEvent {
    let surprise = calculate_surprise(actual_value.as_deref(), expected_value.as_deref());
    if let Some((direction, magnitude)) = &surprise {
        tracing::info!(
            event = %event_name,
            direction,
            %magnitude,
            "surprise computed"
        );
    }
    let (surprise_direction, surprise_magnitude) = match surprise {
        Some((direction, magnitude)) => (Some(direction.to_string()), Some(magnitude)),
        None => (None, None),
    };

    EconomicCalendarEvent {
        event_name,
        event_date,
        region,
        impact_level: impact_level.to_string(),
        expected_value,
        actual_value,
        previous_value,
        surprise_direction,
        surprise_magnitude,
    }
}

fn first_str<'a>(entry: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| entry.get(*key)?.as_str())
}

fn require_str<'a>(entry: &'a Value, keys: &[&str]) -> Result<&'a str, MeridianError> {
    first_str(entry, keys)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MeridianError::Parse(format!("field {keys:?} must be a non-empty string")))
}

fn parse_entry_with_keys(
    entry: &Value,
    name_keys: &[&str],
    date_keys: &[&str],
    impact_keys: &[&str],
    region_keys: &[&str],
    expected_keys: &[&str],
    actual_keys: &[&str],
    previous_keys: &[&str],
) -> Result<EconomicCalendarEvent, MeridianError> {
    let event_name = require_str(entry, name_keys)?.to_string();
    let event_date = parse_event_datetime(require_str(entry, date_keys)?)?;
    let impact_raw = require_str(entry, impact_keys)?;
    let impact_level = normalize_impact_level(impact_raw)
        .ok_or_else(|| MeridianError::Parse("impact must be high, medium, or low".into()))?;
    let region = first_str(entry, region_keys)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
        .to_string();
    let expected_value = normalize_value(first_str(entry, expected_keys));
    let actual_value = normalize_value(first_str(entry, actual_keys));
    let previous_value = normalize_value(first_str(entry, previous_keys));

    Ok(build_event(
        event_name,
        event_date,
        region,
        impact_level,
        expected_value,
        actual_value,
        previous_value,
    ))
}

/// Parse a generic calendar fixture: `{"events": [...]}` or a bare list.
pub fn parse_calendar_payload(
    payload: &Value,
    source: &str,
) -> Result<Vec<EconomicCalendarEvent>, MeridianError> {
    let entries = match payload {
        Value::Object(map) => map
            .get("events")
            .and_then(Value::as_array)
            .ok_or_else(|| MeridianError::Parse(format!("{source}: expected 'events' list")))?,
        Value::Array(items) => items,
        _ => {
            return Err(MeridianError::Parse(format!(
                "{source}: payload must be an object or list"
            )))
        }
    };

    let mut events = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        if !entry.is_object() {
            tracing::warn!(source, idx, "skipping calendar entry: not an object");
            continue;
        }
        match parse_entry_with_keys(
            entry,
            &["event_name", "event", "name"],
            &["event_date", "date", "datetime"],
            &["impact_level", "impact"],
            &["region", "currency"],
            &["expected_value", "expected"],
            &["actual_value", "actual"],
            &["previous_value", "previous"],
        ) {
            Ok(event) => events.push(event),
            Err(err) => tracing::warn!(source, idx, error = %err, "skipping calendar entry"),
        }
    }
    Ok(events)
}

/// Parse the wire-service weekly feed (a bare list with `title`/`country`/
/// `forecast` style keys).
pub fn parse_forex_factory_payload(payload: &Value) -> Result<Vec<EconomicCalendarEvent>, MeridianError> {
    let entries = payload
        .as_array()
        .ok_or_else(|| MeridianError::Parse("forex_factory payload must be a list".into()))?;

    let mut events = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        if !entry.is_object() {
            tracing::warn!(idx, "skipping forex factory entry: not an object");
            continue;
        }
        match parse_entry_with_keys(
            entry,
            &["title", "event_name", "event"],
            &["date", "event_date"],
            &["impact"],
            &["country", "region"],
            &["forecast", "expected"],
            &["actual"],
            &["previous"],
        ) {
            Ok(event) => events.push(event),
            Err(err) => tracing::warn!(idx, error = %err, "skipping forex factory entry"),
        }
    }
    Ok(events)
}

/// Events for one release id from a `release/dates` payload.
pub fn parse_fred_release_dates(payload: &Value, release_id: i64) -> Vec<EconomicCalendarEvent> {
    let (event_name, impact_level, region) = release_mapping(release_id).unwrap_or((
        "FRED Release",
        "medium",
        "USD",
    ));

    let Some(entries) = payload.get("release_dates").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut events = Vec::new();
    for entry in entries {
        let Some(date_str) = entry.get("date").and_then(Value::as_str) else {
            continue;
        };
        let Ok(event_date) = parse_event_datetime(date_str) else {
            continue;
        };
        let name = if event_name == "FRED Release" {
            format!("FRED Release {release_id}")
        } else {
            event_name.to_string()
        };
        events.push(build_event(
            name,
            event_date,
            region.to_string(),
            impact_level,
            None,
            None,
            None,
        ));
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn datetime_accepts_z_offset_and_naive_forms() {
        let a = parse_event_datetime("2024-03-05T10:00:00Z").unwrap();
        let b = parse_event_datetime("2024-03-05T10:00:00+00:00").unwrap();
        let c = parse_event_datetime("2024-03-05T10:00:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);

        let offset = parse_event_datetime("2024-03-05T05:00:00-05:00").unwrap();
        assert_eq!(offset, a);

        let date_only = parse_event_datetime("2024-03-05").unwrap();
        assert_eq!(date_only, parse_event_datetime("2024-03-05T00:00:00Z").unwrap());

        assert!(parse_event_datetime("soon").is_err());
    }

    #[test]
    fn impact_normalisation_covers_abbreviations() {
        assert_eq!(normalize_impact_level("High"), Some("high"));
        assert_eq!(normalize_impact_level(" med "), Some("medium"));
        assert_eq!(normalize_impact_level("LO"), Some("low"));
        assert_eq!(normalize_impact_level("extreme"), None);
    }

    #[test]
    fn numeric_parse_handles_suffixes_and_commas() {
        assert_eq!(parse_numeric_value(Some("250K")), Some(dec!(250000)));
        assert_eq!(parse_numeric_value(Some("1.5M")), Some(dec!(1500000)));
        assert_eq!(parse_numeric_value(Some("2B")), Some(dec!(2000000000)));
        assert_eq!(parse_numeric_value(Some("3.2%")), Some(dec!(3.2)));
        assert_eq!(parse_numeric_value(Some("1,234.5")), Some(dec!(1234.5)));
        assert_eq!(parse_numeric_value(Some("n/a")), None);
        assert_eq!(parse_numeric_value(Some("-")), None);
        assert_eq!(parse_numeric_value(None), None);
    }

    #[test]
    fn surprise_requires_both_numbers() {
        assert_eq!(
            calculate_surprise(Some("3.4%"), Some("3.2%")),
            Some(("positive", dec!(0.2)))
        );
        assert_eq!(
            calculate_surprise(Some("200K"), Some("250K")),
            Some(("negative", dec!(50000)))
        );
        assert_eq!(
            calculate_surprise(Some("3.2%"), Some("3.2%")),
            Some(("flat", dec!(0.0)))
        );
        assert_eq!(calculate_surprise(Some("strong"), Some("3.2%")), None);
        assert_eq!(calculate_surprise(None, Some("3.2%")), None);
    }

    #[test]
    fn generic_payload_accepts_key_aliases() {
        let payload = json!({
            "events": [
                {
                    "event": "CPI Release",
                    "date": "2024-03-05T13:30:00Z",
                    "impact": "high",
                    "currency": "USD",
                    "expected": "3.2%",
                    "actual": "3.4%"
                },
                {"event": "broken"},
                "not an object"
            ]
        });
        let events = parse_calendar_payload(&payload, "fixture").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_name, "CPI Release");
        assert_eq!(events[0].region, "USD");
        assert_eq!(events[0].surprise_direction.as_deref(), Some("positive"));
    }

    #[test]
    fn forex_factory_payload_uses_wire_keys() {
        let payload = json!([
            {
                "title": "Non-Farm Employment Change",
                "date": "2024-03-08T13:30:00Z",
                "impact": "High",
                "country": "USD",
                "forecast": "200K",
                "previous": "229K"
            }
        ]);
        let events = parse_forex_factory_payload(&payload).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].impact_level, "high");
        assert_eq!(events[0].previous_value.as_deref(), Some("229K"));
        assert_eq!(events[0].surprise_direction, None);
    }

    #[test]
    fn release_dates_map_known_ids() {
        let payload = json!({
            "release_dates": [
                {"release_id": 10, "date": "2024-03-12"},
                {"release_id": 10, "date": "garbage"}
            ]
        });
        let events = parse_fred_release_dates(&payload, 10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_name, "Consumer Price Index (CPI)");
        assert_eq!(events[0].impact_level, "high");
        assert_eq!(events[0].region, "USD");
    }

    #[test]
    fn unknown_release_ids_get_generic_names() {
        let payload = json!({"release_dates": [{"date": "2024-03-12"}]});
        let events = parse_fred_release_dates(&payload, 999);
        assert_eq!(events[0].event_name, "FRED Release 999");
        assert_eq!(events[0].impact_level, "medium");
    }
}
