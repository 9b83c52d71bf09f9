//! Calendar source adapters behind one trait, resolved by string tag.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use http_fetcher::Fetcher;
use meridian_core::{EconomicCalendarEvent, MeridianError};

use crate::filter_events;
use crate::parse::{
    parse_calendar_payload, parse_forex_factory_payload, parse_fred_release_dates,
    FRED_RELEASE_MAPPINGS,
};

pub const DEFAULT_FOREX_FACTORY_URL: &str =
    "https://nfs.faireconomy.media/ff_calendar_thisweek.json";
const DEFAULT_FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred";
const FOREX_FACTORY_TIMEOUT_SECS: u64 = 15;
const FRED_TIMEOUT_SECS: u64 = 30;

#[async_trait]
pub trait CalendarAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EconomicCalendarEvent>, MeridianError>;
}

fn load_json(path: &Path) -> Result<Value, MeridianError> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| MeridianError::Parse(format!("{}: {err}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|err| MeridianError::Parse(format!("{}: {err}", path.display())))
}

/// Local JSON fixtures: a single file or every `*.json` in a directory.
pub struct JsonCalendarAdapter {
    data_dir: Option<PathBuf>,
    data_file: Option<PathBuf>,
}

impl JsonCalendarAdapter {
    pub fn new(data_dir: Option<PathBuf>, data_file: Option<PathBuf>) -> Result<Self, MeridianError> {
        if data_dir.is_some() && data_file.is_some() {
            return Err(MeridianError::Config(
                "Provide either data_dir or data_file, not both.".into(),
            ));
        }
        Ok(Self { data_dir, data_file })
    }

    fn load_payloads(&self) -> Result<Vec<(String, Value)>, MeridianError> {
        if let Some(file) = &self.data_file {
            return Ok(vec![(
                file.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.display().to_string()),
                load_json(file)?,
            )]);
        }
        let dir = self
            .data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("data/calendar"));
        if !dir.exists() {
            return Err(MeridianError::Config(format!(
                "Calendar directory not found: {}",
                dir.display()
            )));
        }
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map_err(|err| MeridianError::Parse(format!("{}: {err}", dir.display())))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        paths
            .into_iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                Ok((name, load_json(&path)?))
            })
            .collect()
    }
}

#[async_trait]
impl CalendarAdapter for JsonCalendarAdapter {
    fn name(&self) -> &'static str {
        "json"
    }

    async fn fetch_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EconomicCalendarEvent>, MeridianError> {
        let mut events = Vec::new();
        for (source, payload) in self.load_payloads()? {
            events.extend(parse_calendar_payload(&payload, &source)?);
        }
        Ok(filter_events(events, start, end))
    }
}

/// Wire-service weekly JSON feed. The feed is replaced weekly; when it has
/// not refreshed yet, every event is in the past and the batch is dropped.
pub struct ForexFactoryAdapter {
    url: String,
    data_file: Option<PathBuf>,
    future_only: bool,
    fetcher: Fetcher,
}

impl ForexFactoryAdapter {
    pub fn new(url: Option<String>, data_file: Option<PathBuf>) -> Self {
        Self {
            url: url.unwrap_or_else(|| DEFAULT_FOREX_FACTORY_URL.to_string()),
            data_file,
            future_only: true,
            fetcher: Fetcher::with_timeout(Duration::from_secs(FOREX_FACTORY_TIMEOUT_SECS)),
        }
    }
}

#[async_trait]
impl CalendarAdapter for ForexFactoryAdapter {
    fn name(&self) -> &'static str {
        "forex_factory"
    }

    async fn fetch_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EconomicCalendarEvent>, MeridianError> {
        let payload = match &self.data_file {
            Some(file) => load_json(file)?,
            None => {
                let body = self
                    .fetcher
                    .get_text(&self.url)
                    .await
                    .map_err(|err| MeridianError::Fetch(err.to_string()))?;
                serde_json::from_str(&body)
                    .map_err(|err| MeridianError::Parse(format!("forex_factory: {err}")))?
            }
        };
        let mut events = parse_forex_factory_payload(&payload)?;

        if self.future_only && self.data_file.is_none() {
            let now = Utc::now();
            let future: Vec<EconomicCalendarEvent> = events
                .iter()
                .filter(|event| event.event_date >= now)
                .cloned()
                .collect();
            if !events.is_empty() && future.is_empty() {
                tracing::warn!(
                    total = events.len(),
                    "forex factory feed appears stale; all events are in the past"
                );
            }
            events = future;
        }

        Ok(filter_events(events, start, end))
    }
}

/// Release-dates adapter over the macroeconomic-series API.
pub struct FredCalendarAdapter {
    api_key: String,
    base_url: String,
    data_file: Option<PathBuf>,
    release_ids: Vec<i64>,
    fetcher: Fetcher,
}

impl FredCalendarAdapter {
    pub fn new(
        api_key: String,
        data_file: Option<PathBuf>,
        release_ids: Option<Vec<i64>>,
    ) -> Result<Self, MeridianError> {
        if api_key.is_empty() && data_file.is_none() {
            return Err(MeridianError::Config(
                "MERIDIAN_FRED_API_KEY is required for the fred source.".into(),
            ));
        }
        Ok(Self {
            api_key,
            base_url: DEFAULT_FRED_BASE_URL.to_string(),
            data_file,
            release_ids: release_ids
                .unwrap_or_else(|| FRED_RELEASE_MAPPINGS.iter().map(|(id, _)| *id).collect()),
            fetcher: Fetcher::with_timeout(Duration::from_secs(FRED_TIMEOUT_SECS)),
        })
    }

    fn release_dates_url(&self, release_id: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        format!(
            "{}/release/dates?api_key={}&file_type=json&release_id={release_id}&realtime_start={}&realtime_end={}&include_release_dates_with_no_data=true&sort_order=asc&limit=20",
            self.base_url.trim_end_matches('/'),
            self.api_key,
            start.date_naive(),
            end.date_naive(),
        )
    }
}

#[async_trait]
impl CalendarAdapter for FredCalendarAdapter {
    fn name(&self) -> &'static str {
        "fred"
    }

    async fn fetch_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EconomicCalendarEvent>, MeridianError> {
        if let Some(file) = &self.data_file {
            let payload = load_json(file)?;
            let mut events = Vec::new();
            for release_id in &self.release_ids {
                events.extend(parse_fred_release_dates(&payload, *release_id));
            }
            return Ok(filter_events(events, start, end));
        }

        let mut events = Vec::new();
        for release_id in &self.release_ids {
            let url = self.release_dates_url(*release_id, start, end);
            match self.fetcher.get_text(&url).await {
                Ok(body) => match serde_json::from_str::<Value>(&body) {
                    Ok(payload) => {
                        events.extend(parse_fred_release_dates(&payload, *release_id));
                    }
                    Err(err) => {
                        tracing::warn!(release_id, error = %err, "FRED release payload invalid");
                    }
                },
                Err(err) => {
                    tracing::warn!(release_id, error = %err, "FRED release dates fetch failed");
                }
            }
        }
        tracing::info!(
            release_ids = self.release_ids.len(),
            events = events.len(),
            "FRED calendar fetch complete"
        );
        Ok(filter_events(events, start, end))
    }
}

/// Dispatch on a string tag, as the CLIs and scheduler do.
pub fn resolve_adapter(
    source: &str,
    data_dir: Option<PathBuf>,
    data_file: Option<PathBuf>,
    url: Option<String>,
    fred_api_key: &str,
) -> Result<Box<dyn CalendarAdapter>, MeridianError> {
    match source {
        "json" => Ok(Box::new(JsonCalendarAdapter::new(data_dir, data_file)?)),
        "forex_factory" => Ok(Box::new(ForexFactoryAdapter::new(url, data_file))),
        "fred" => Ok(Box::new(FredCalendarAdapter::new(
            fred_api_key.to_string(),
            data_file,
            None,
        )?)),
        other => Err(MeridianError::Config(format!("Unknown source: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fred_adapter_requires_key_without_fixture() {
        assert!(FredCalendarAdapter::new(String::new(), None, None).is_err());
        assert!(FredCalendarAdapter::new("key".to_string(), None, None).is_ok());
        assert!(
            FredCalendarAdapter::new(String::new(), Some(PathBuf::from("fixture.json")), None)
                .is_ok()
        );
    }

    #[test]
    fn json_adapter_rejects_both_dir_and_file() {
        assert!(JsonCalendarAdapter::new(
            Some(PathBuf::from("a")),
            Some(PathBuf::from("b"))
        )
        .is_err());
    }

    #[test]
    fn resolve_rejects_unknown_source() {
        assert!(resolve_adapter("mystery", None, None, None, "key").is_err());
    }

    #[test]
    fn resolve_builds_each_known_adapter() {
        assert!(resolve_adapter("forex_factory", None, None, None, "").is_ok());
        assert!(resolve_adapter("fred", None, None, None, "key").is_ok());
    }
}
