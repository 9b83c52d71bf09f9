//! Economic-calendar ingestion through three interchangeable adapters:
//! local JSON fixtures, the wire-service weekly feed, and the
//! macroeconomic-series release-dates API.

pub mod adapters;
pub mod parse;

use chrono::{DateTime, Duration, TimeZone, Utc};

use meridian_core::{EconomicCalendarEvent, MeridianError};
use meridian_store::Store;

pub use adapters::{
    resolve_adapter, CalendarAdapter, ForexFactoryAdapter, FredCalendarAdapter,
    JsonCalendarAdapter, DEFAULT_FOREX_FACTORY_URL,
};
pub use parse::{
    build_event, calculate_surprise, normalize_impact_level, normalize_value,
    parse_event_datetime, parse_numeric_value, FRED_RELEASE_MAPPINGS,
};

/// Keep events with `start <= event_date < end`.
pub fn filter_events(
    events: Vec<EconomicCalendarEvent>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<EconomicCalendarEvent> {
    events
        .into_iter()
        .filter(|event| event.event_date >= start && event.event_date < end)
        .collect()
}

/// Whole-day UTC window: today's midnight through `days` days forward.
pub fn build_window(days: i64, now: Option<DateTime<Utc>>) -> Result<(DateTime<Utc>, DateTime<Utc>), MeridianError> {
    if days <= 0 {
        return Err(MeridianError::Validation("days must be positive".into()));
    }
    let current = now.unwrap_or_else(Utc::now);
    let start = Utc.from_utc_datetime(&current.date_naive().and_time(chrono::NaiveTime::MIN));
    Ok((start, start + Duration::days(days)))
}

/// Fetch a window of events through an adapter and upsert them.
pub async fn sync_calendar(
    adapter: &dyn CalendarAdapter,
    store: &Store,
    days: i64,
) -> Result<u64, MeridianError> {
    let (start, end) = build_window(days, None)?;
    let events = adapter.fetch_events(start, end).await?;
    let inserted = store.upsert_economic_events(&events).await?;
    tracing::info!(
        source = adapter.name(),
        events = events.len(),
        inserted,
        "economic calendar sync complete"
    );
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event_at(ts: &str) -> EconomicCalendarEvent {
        EconomicCalendarEvent {
            event_name: "CPI".to_string(),
            event_date: ts.parse().unwrap(),
            region: "US".to_string(),
            impact_level: "high".to_string(),
            expected_value: None,
            actual_value: None,
            previous_value: None,
            surprise_direction: None,
            surprise_magnitude: None,
        }
    }

    #[test]
    fn window_bounds_are_half_open() {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        let events = vec![
            event_at("2024-03-03T23:59:59Z"),
            event_at("2024-03-04T00:00:00Z"),
            event_at("2024-03-04T23:59:59Z"),
            event_at("2024-03-05T00:00:00Z"),
        ];
        let kept = filter_events(events, start, end);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].event_date, start);
    }

    #[test]
    fn build_window_starts_at_utc_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 15, 30, 12).unwrap();
        let (start, end) = build_window(7, Some(now)).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());
    }

    #[test]
    fn build_window_rejects_non_positive_days() {
        assert!(build_window(0, None).is_err());
        assert!(build_window(-3, None).is_err());
    }
}
