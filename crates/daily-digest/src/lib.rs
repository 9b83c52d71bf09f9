//! Daily digest composition: a cached join of priority events, metals,
//! calendar, theses, and market context for one UTC day.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use meridian_core::{
    DailyDigest, EconomicCalendarEvent, MarketContextRecord, MeridianError, PriorityEventSummary,
    ThesisSummary,
};
use meridian_store::Store;

pub const PRIORITY_EVENT_LIMIT: i64 = 10;
pub const THESIS_LIMIT: i64 = 10;
const DEFAULT_TIMEZONE: &str = "UTC";

pub const GOLD_SYMBOL: &str = "GC=F";
pub const SILVER_SYMBOL: &str = "SI=F";
pub const COPPER_SYMBOL: &str = "HG=F";
pub const RATIO_NAME: &str = "gold_silver";

const METAL_SYMBOLS: [(&str, &str); 3] = [
    (GOLD_SYMBOL, "gold"),
    (SILVER_SYMBOL, "silver"),
    (COPPER_SYMBOL, "copper"),
];
const METAL_ORDER: [&str; 3] = ["gold", "silver", "copper"];

pub fn utc_day_bounds(digest_date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&digest_date.and_time(chrono::NaiveTime::MIN));
    (start, start + Duration::days(1))
}

/// Return the cached digest for a date, composing and caching it on a miss.
pub async fn get_or_create_digest(
    store: &Store,
    digest_date: NaiveDate,
) -> Result<DailyDigest, MeridianError> {
    if let Some(cached) = store.load_digest(digest_date).await? {
        return Ok(cached);
    }

    let (window_start, window_end) = utc_day_bounds(digest_date);
    let priority_events = store
        .fetch_priority_events_window(window_start, window_end, PRIORITY_EVENT_LIMIT)
        .await?;
    let metals_snapshot = fetch_metals_snapshot(store, digest_date).await?;
    let economic_calendar = store
        .fetch_economic_events_between(window_start, window_end, true)
        .await?;
    let active_theses = store.fetch_active_theses(THESIS_LIMIT).await?;
    let market_context = store.fetch_latest_market_context().await?;

    let digest = compose_digest(
        digest_date,
        &priority_events,
        metals_snapshot,
        &economic_calendar,
        &active_theses,
        market_context.as_ref(),
        Utc::now(),
    );
    store.cache_digest(&digest).await?;
    Ok(digest)
}

/// Metals snapshot: latest two closes per metal at or before the digest date
/// plus the gold/silver ratio, two-decimal rounding throughout.
pub async fn fetch_metals_snapshot(
    store: &Store,
    as_of: NaiveDate,
) -> Result<Value, MeridianError> {
    let mut metals = serde_json::Map::new();
    for (symbol, metal) in METAL_SYMBOLS {
        let closes = store.latest_closes(symbol, as_of, 2).await?;
        metals.insert(metal.to_string(), metal_entry(symbol, &closes));
    }

    let ratio_values = store.latest_ratio_values(RATIO_NAME, as_of, 2).await?;
    Ok(json!({
        "metals": Value::Object(metals),
        "ratio": ratio_entry(RATIO_NAME, &ratio_values),
    }))
}

fn metal_entry(symbol: &str, closes: &[(NaiveDate, Decimal)]) -> Value {
    let latest = closes.first();
    let previous = closes.get(1);
    json!({
        "symbol": symbol,
        "price": latest.map(|(_, value)| round2(*value)),
        "change_percent": change_percent(latest, previous),
        "as_of": latest.map(|(date, _)| date.to_string()),
    })
}

fn ratio_entry(name: &str, values: &[(NaiveDate, Decimal)]) -> Value {
    let latest = values.first();
    let previous = values.get(1);
    json!({
        "name": name,
        "value": latest.map(|(_, value)| round2(*value)),
        "change_percent": change_percent(latest, previous),
        "as_of": latest.map(|(date, _)| date.to_string()),
    })
}

fn change_percent(
    latest: Option<&(NaiveDate, Decimal)>,
    previous: Option<&(NaiveDate, Decimal)>,
) -> Option<f64> {
    let (_, latest) = latest?;
    let (_, previous) = previous?;
    if previous.is_zero() {
        return None;
    }
    Some(round2((*latest - *previous) / *previous * Decimal::from(100))?)
}

fn round2(value: Decimal) -> Option<f64> {
    value.round_dp(2).to_f64()
}

/// Assemble the digest payload and render the plain-text briefing.
pub fn compose_digest(
    digest_date: NaiveDate,
    priority_events: &[PriorityEventSummary],
    metals_snapshot: Value,
    economic_calendar: &[EconomicCalendarEvent],
    active_theses: &[ThesisSummary],
    market_context: Option<&MarketContextRecord>,
    generated_at: DateTime<Utc>,
) -> DailyDigest {
    let (window_start, window_end) = utc_day_bounds(digest_date);

    let priority_values: Vec<Value> = priority_events.iter().map(priority_event_value).collect();
    let calendar_values: Vec<Value> = economic_calendar.iter().map(calendar_event_value).collect();
    let thesis_values: Vec<Value> = active_theses.iter().map(thesis_value).collect();

    let full_digest = render_digest(
        digest_date,
        &priority_values,
        &metals_snapshot,
        &calendar_values,
        &thesis_values,
        market_context,
        DEFAULT_TIMEZONE,
    );

    DailyDigest {
        digest_date,
        window_start,
        window_end,
        generated_at,
        priority_events: priority_values,
        metals_snapshot,
        economic_calendar: calendar_values,
        active_theses: thesis_values,
        full_digest,
        timezone: DEFAULT_TIMEZONE.to_string(),
    }
}

fn priority_event_value(event: &PriorityEventSummary) -> Value {
    json!({
        "id": event.id.to_string(),
        "source": event.source,
        "headline": event.headline,
        "published_at": event.published_at.map(|dt| dt.to_rfc3339()),
        "score": event.score,
        "analysis_ready": event.analysis_ready,
    })
}

fn calendar_event_value(event: &EconomicCalendarEvent) -> Value {
    json!({
        "event_name": event.event_name,
        "event_date": event.event_date.to_rfc3339(),
        "region": event.region,
        "impact_level": event.impact_level,
        "expected_value": event.expected_value,
        "actual_value": event.actual_value,
        "previous_value": event.previous_value,
        "surprise_direction": event.surprise_direction,
        "surprise_magnitude": event.surprise_magnitude.and_then(round2),
    })
}

fn thesis_value(thesis: &ThesisSummary) -> Value {
    json!({
        "id": thesis.id.to_string(),
        "title": thesis.title,
        "asset_type": thesis.asset_type,
        "asset_symbol": thesis.asset_symbol,
        "status": thesis.status,
        "price_change_percent": thesis.price_change_percent.and_then(round2),
        "updated_at": thesis.updated_at.map(|dt| dt.to_rfc3339()),
    })
}

/// Render the plain-text briefing.
pub fn render_digest(
    digest_date: NaiveDate,
    priority_events: &[Value],
    metals_snapshot: &Value,
    economic_calendar: &[Value],
    active_theses: &[Value],
    market_context: Option<&MarketContextRecord>,
    timezone_label: &str,
) -> String {
    let mut lines = Vec::new();
    lines.push("MERIDIAN DAILY BRIEFING".to_string());
    lines.push(format!(
        "{} ({timezone_label})",
        digest_date.format("%A, %b %d, %Y")
    ));
    lines.push(String::new());

    lines.push("MARKET REGIMES".to_string());
    match market_context {
        Some(context) => {
            lines.push(format!(
                "Volatility: {} | Dollar: {} | Curve: {} | Credit: {}",
                context.volatility_regime.to_uppercase(),
                context.dollar_regime.to_uppercase(),
                context.curve_regime.to_uppercase(),
                context.credit_regime.to_uppercase(),
            ));
            lines.push(format!(
                "Position sizing: {:.0}%",
                context.suggested_size_multiplier * 100.0
            ));
        }
        None => lines.push("- No context data".to_string()),
    }

    lines.push(String::new());
    lines.push(format!("PRIORITY EVENTS ({})", priority_events.len()));
    if priority_events.is_empty() {
        lines.push("- None".to_string());
    } else {
        for event in priority_events {
            let headline = event
                .get("headline")
                .and_then(Value::as_str)
                .unwrap_or("untitled event");
            let score_text = event
                .get("score")
                .and_then(Value::as_i64)
                .map(|score| format!("{score}/100"))
                .unwrap_or_else(|| "n/a".to_string());
            let suffix = if event.get("analysis_ready").and_then(Value::as_bool) == Some(true) {
                " [analysis ready]"
            } else {
                ""
            };
            lines.push(format!("- {headline} ({score_text}){suffix}"));
        }
    }

    lines.push(String::new());
    lines.push("METALS SNAPSHOT".to_string());
    let metals = metals_snapshot.get("metals");
    if metals.and_then(Value::as_object).is_none_or(|m| m.is_empty()) {
        lines.push("- No price data".to_string());
    } else {
        for metal in METAL_ORDER {
            let Some(entry) = metals.and_then(|m| m.get(metal)).filter(|e| e.is_object()) else {
                continue;
            };
            let price = format_price(entry.get("price").and_then(Value::as_f64));
            let change = format_percent(entry.get("change_percent").and_then(Value::as_f64));
            lines.push(format!("{}: {price} ({change})", capitalize(metal)));
        }
        if let Some(ratio) = metals_snapshot.get("ratio") {
            if ratio.get("value").and_then(Value::as_f64).is_some() {
                let value = format_ratio(ratio.get("value").and_then(Value::as_f64));
                let change = format_percent(ratio.get("change_percent").and_then(Value::as_f64));
                lines.push(format!("G/S Ratio: {value} ({change})"));
            }
        }
    }

    lines.push(String::new());
    lines.push("TODAY'S CALENDAR".to_string());
    if economic_calendar.is_empty() {
        lines.push("- None".to_string());
    } else {
        for event in economic_calendar {
            let time = format_event_time(event.get("event_date").and_then(Value::as_str));
            let name = event
                .get("event_name")
                .and_then(Value::as_str)
                .unwrap_or("event");
            let impact = event
                .get("impact_level")
                .and_then(Value::as_str)
                .map(str::to_uppercase)
                .unwrap_or_else(|| "N/A".to_string());
            let region = event.get("region").and_then(Value::as_str).unwrap_or("");
            let region_label = if !region.is_empty()
                && !name.to_uppercase().contains(&region.to_uppercase())
            {
                format!("{region} ")
            } else {
                String::new()
            };
            lines.push(format!("- {time} {region_label}{name} ({impact})"));
        }
    }

    lines.push(String::new());
    lines.push("THESIS UPDATES".to_string());
    if active_theses.is_empty() {
        lines.push("- None".to_string());
    } else {
        for thesis in active_theses {
            let title = thesis
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("untitled thesis");
            let status = thesis
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let asset = thesis
                .get("asset_symbol")
                .and_then(Value::as_str)
                .or_else(|| thesis.get("asset_type").and_then(Value::as_str))
                .unwrap_or("");
            let change = format_percent(
                thesis.get("price_change_percent").and_then(Value::as_f64),
            );
            let mut suffix_parts = Vec::new();
            if !asset.is_empty() {
                suffix_parts.push(asset.to_string());
            }
            if change != "n/a" {
                suffix_parts.push(change);
            }
            let suffix = if suffix_parts.is_empty() {
                String::new()
            } else {
                format!(" {}", suffix_parts.join(" "))
            };
            lines.push(format!("- {title} ({status}){suffix}"));
        }
    }

    lines.join("\n")
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn format_price(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("${value:.2}"),
        None => "n/a".to_string(),
    }
}

fn format_ratio(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.2}"),
        None => "n/a".to_string(),
    }
}

fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(value) => {
            let sign = if value > 0.0 { "+" } else { "" };
            format!("{sign}{value:.2}%")
        }
        None => "n/a".to_string(),
    }
}

fn format_event_time(value: Option<&str>) -> String {
    let Some(raw) = value else {
        return "??:??".to_string();
    };
    match raw.parse::<DateTime<Utc>>() {
        Ok(parsed) => parsed.format("%H:%M").to_string(),
        Err(_) => "??:??".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    fn priority_event(score: i32) -> PriorityEventSummary {
        PriorityEventSummary {
            id: Uuid::nil(),
            source: "reuters".to_string(),
            headline: "Fed signals rate cuts".to_string(),
            published_at: Some(Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap()),
            score: Some(score),
            analysis_ready: false,
        }
    }

    fn cpi_event() -> EconomicCalendarEvent {
        EconomicCalendarEvent {
            event_name: "US CPI Release".to_string(),
            event_date: Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap(),
            region: "US".to_string(),
            impact_level: "high".to_string(),
            expected_value: Some("3.2%".to_string()),
            actual_value: None,
            previous_value: None,
            surprise_direction: None,
            surprise_magnitude: None,
        }
    }

    fn slv_thesis() -> ThesisSummary {
        ThesisSummary {
            id: Uuid::nil(),
            title: "Silver squeeze".to_string(),
            asset_type: Some("etf".to_string()),
            asset_symbol: Some("SLV".to_string()),
            status: Some("watching".to_string()),
            price_change_percent: Some(dec!(3.1)),
            updated_at: None,
        }
    }

    fn sample_metals() -> Value {
        json!({
            "metals": {
                "gold": {"symbol": "GC=F", "price": 2000.0, "change_percent": 0.5, "as_of": "2024-03-05"},
                "silver": {"symbol": "SI=F", "price": 25.0, "change_percent": -0.2, "as_of": "2024-03-05"},
                "copper": {"symbol": "HG=F", "price": 4.0, "change_percent": null, "as_of": "2024-03-05"}
            },
            "ratio": {"name": "gold_silver", "value": 80.0, "change_percent": 1.25, "as_of": "2024-03-05"}
        })
    }

    #[test]
    fn briefing_matches_expected_lines() {
        let digest = compose_digest(
            date(),
            &[priority_event(72)],
            sample_metals(),
            &[cpi_event()],
            &[slv_thesis()],
            None,
            Utc::now(),
        );
        let text = &digest.full_digest;
        assert!(text.contains("MERIDIAN DAILY BRIEFING"), "{text}");
        assert!(text.contains("PRIORITY EVENTS (1)"), "{text}");
        assert!(text.contains("- Fed signals rate cuts (72/100)"), "{text}");
        assert!(text.contains("Gold: $2000.00 (+0.50%)"), "{text}");
        assert!(text.contains("Silver: $25.00 (-0.20%)"), "{text}");
        assert!(text.contains("Copper: $4.00 (n/a)"), "{text}");
        assert!(text.contains("G/S Ratio: 80.00 (+1.25%)"), "{text}");
        assert!(text.contains("- 10:00 US CPI Release (HIGH)"), "{text}");
        assert!(text.contains("- Silver squeeze (watching) SLV +3.10%"), "{text}");
    }

    #[test]
    fn empty_sections_render_placeholders() {
        let digest = compose_digest(
            date(),
            &[],
            json!({"metals": {}, "ratio": {}}),
            &[],
            &[],
            None,
            Utc::now(),
        );
        let text = &digest.full_digest;
        assert!(text.contains("PRIORITY EVENTS (0)"));
        assert!(text.contains("- No price data"));
        assert!(text.contains("TODAY'S CALENDAR\n- None"));
        assert!(text.contains("THESIS UPDATES\n- None"));
        assert!(text.contains("MARKET REGIMES\n- No context data"));
    }

    #[test]
    fn regimes_render_when_context_present() {
        let context = MarketContextRecord {
            context_date: date(),
            volatility_regime: "elevated".to_string(),
            dollar_regime: "neutral".to_string(),
            curve_regime: "normal".to_string(),
            credit_regime: "normal".to_string(),
            vix_level: Some(22.5),
            dxy_level: Some(102.0),
            us10y_level: None,
            us2y_level: None,
            gold_level: None,
            oil_level: None,
            spx_level: None,
            btc_level: None,
            spread_2s10s: Some(0.5),
            hy_spread: Some(350.0),
            gold_silver_ratio: None,
            copper_gold_ratio: None,
            vix_term_structure: None,
            spy_rsp_ratio: None,
            suggested_size_multiplier: 0.75,
            raw_prices: Value::Null,
            raw_fred: Value::Null,
        };
        let digest = compose_digest(
            date(),
            &[],
            json!({"metals": {}, "ratio": {}}),
            &[],
            &[],
            Some(&context),
            Utc::now(),
        );
        assert!(digest
            .full_digest
            .contains("Volatility: ELEVATED | Dollar: NEUTRAL | Curve: NORMAL | Credit: NORMAL"));
        assert!(digest.full_digest.contains("Position sizing: 75%"));
    }

    #[test]
    fn day_bounds_are_midnight_to_midnight() {
        let (start, end) = utc_day_bounds(date());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap());
    }

    #[test]
    fn metal_entries_round_to_two_decimals() {
        let closes = vec![
            (NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(), dec!(2001.2345)),
            (NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(), dec!(1991.0)),
        ];
        let entry = metal_entry("GC=F", &closes);
        assert_eq!(entry["price"], json!(2001.23));
        // (2001.2345 - 1991) / 1991 * 100 = 0.514... -> 0.51
        assert_eq!(entry["change_percent"], json!(0.51));
        assert_eq!(entry["as_of"], json!("2024-03-05"));
    }

    #[test]
    fn missing_previous_close_leaves_change_null() {
        let closes = vec![(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(), dec!(2000))];
        let entry = metal_entry("GC=F", &closes);
        assert_eq!(entry["change_percent"], Value::Null);
    }

    #[test]
    fn rendering_cached_payload_is_stable() {
        let digest = compose_digest(
            date(),
            &[priority_event(72)],
            sample_metals(),
            &[cpi_event()],
            &[slv_thesis()],
            None,
            Utc::now(),
        );
        let re_rendered = render_digest(
            digest.digest_date,
            &digest.priority_events,
            &digest.metals_snapshot,
            &digest.economic_calendar,
            &digest.active_theses,
            None,
            &digest.timezone,
        );
        assert_eq!(re_rendered, digest.full_digest);
    }
}
