//! RSS ingestion: parse feed XML, normalise headlines, and upsert macro
//! events on the `(source, headline, published_at)` natural key.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use rand::Rng;

use http_fetcher::Fetcher;
use meridian_core::{MeridianError, NewMacroEvent};
use meridian_store::Store;

const ACCEPT_HEADER: &str = "application/rss+xml, application/xml, text/xml, */*";

pub const MIN_DELAY_BETWEEN_FEEDS_SECS: f64 = 1.0;
pub const DELAY_JITTER_SECS: f64 = 2.0;
const RATE_LIMIT_DELAY_CAP_SECS: f64 = 30.0;

/// A feed to poll: source tag plus URL.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub source: String,
    pub url: String,
}

impl FeedConfig {
    pub fn new(source: &str, url: &str) -> Self {
        Self {
            source: source.to_string(),
            url: url.to_string(),
        }
    }
}

/// Wire services and topical aggregators polled by default.
pub fn default_feeds() -> Vec<FeedConfig> {
    vec![
        FeedConfig::new("reuters", "https://feeds.reuters.com/reuters/topNews"),
        FeedConfig::new("ap", "https://rss.ap.org/apf-topnews"),
        FeedConfig::new(
            "google_news",
            "https://news.google.com/rss/search?q=macro+economy&hl=en-US&gl=US&ceid=US:en",
        ),
    ]
}

/// A parsed feed item with the fields the pipeline keeps.
#[derive(Debug, Clone, PartialEq)]
pub struct RssEntry {
    pub source: String,
    pub headline: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
}

impl From<RssEntry> for NewMacroEvent {
    fn from(entry: RssEntry) -> Self {
        NewMacroEvent {
            source: entry.source,
            headline: entry.headline,
            url: Some(entry.url),
            published_at: Some(entry.published_at),
        }
    }
}

pub fn normalize_headline(headline: &str) -> String {
    headline.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical dedup key mirroring the store's natural key.
pub fn canonical_key(source: &str, headline: &str, published_at: DateTime<Utc>) -> String {
    format!(
        "{source}:{}:{}",
        normalize_headline(headline).to_lowercase(),
        published_at.format("%Y-%m-%dT%H:%M:%SZ")
    )
}

/// Parse RSS 2.0 XML, keeping items with a non-empty title, link, and a
/// parseable pubDate.
pub fn parse_rss(feed_xml: &str, source: &str) -> Result<Vec<RssEntry>, MeridianError> {
    let mut reader = Reader::from_str(feed_xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut in_item = false;
    let mut current_tag: Option<String> = None;
    let mut title = String::new();
    let mut link = String::new();
    let mut pub_date = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let local = String::from_utf8_lossy(start.local_name().as_ref()).to_string();
                if local == "item" {
                    in_item = true;
                    title.clear();
                    link.clear();
                    pub_date.clear();
                } else if in_item {
                    current_tag = Some(local);
                }
            }
            Ok(Event::Text(text)) if in_item => {
                if let Some(tag) = &current_tag {
                    let value = text.unescape().unwrap_or_default();
                    append_field(tag, &value, &mut title, &mut link, &mut pub_date);
                }
            }
            Ok(Event::CData(cdata)) if in_item => {
                if let Some(tag) = &current_tag {
                    let value = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                    append_field(tag, &value, &mut title, &mut link, &mut pub_date);
                }
            }
            Ok(Event::End(end)) => {
                let local = String::from_utf8_lossy(end.local_name().as_ref()).to_string();
                if local == "item" {
                    in_item = false;
                    if let Some(entry) = build_entry(source, &title, &link, &pub_date) {
                        entries.push(entry);
                    }
                } else {
                    current_tag = None;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(MeridianError::Parse(format!("{source}: {err}"))),
        }
    }
    Ok(entries)
}

fn append_field(tag: &str, value: &str, title: &mut String, link: &mut String, pub_date: &mut String) {
    match tag {
        "title" => title.push_str(value),
        "link" => link.push_str(value),
        "pubDate" => pub_date.push_str(value),
        _ => {}
    }
}

fn build_entry(source: &str, title: &str, link: &str, pub_date: &str) -> Option<RssEntry> {
    let headline = normalize_headline(title);
    let url = link.trim();
    if headline.is_empty() || url.is_empty() || pub_date.trim().is_empty() {
        return None;
    }
    let published_at = parse_pub_date(pub_date)?;
    Some(RssEntry {
        source: source.to_string(),
        headline,
        url: url.to_string(),
        published_at,
    })
}

fn parse_pub_date(pub_date: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(pub_date.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse one feed body and upsert its entries. Returns rows inserted.
pub async fn ingest_feed(store: &Store, feed_xml: &str, source: &str) -> Result<u64, MeridianError> {
    let entries = parse_rss(feed_xml, source)?;
    if entries.is_empty() {
        return Ok(0);
    }
    let events: Vec<NewMacroEvent> = entries.into_iter().map(Into::into).collect();
    store.insert_macro_events(&events).await
}

/// Ingest multiple feeds with rate-limit awareness: the base inter-feed delay
/// doubles (capped at 30s) for the remainder of the batch after any feed
/// comes back rate-limited. A single feed failure never aborts the batch.
pub async fn ingest_sources(
    fetcher: &Fetcher,
    store: &Store,
    feeds: &[FeedConfig],
    delay_between_feeds: f64,
    delay_jitter: f64,
) -> HashMap<String, u64> {
    let mut results = HashMap::new();
    let mut delay_between_feeds = delay_between_feeds;

    for (idx, feed) in feeds.iter().enumerate() {
        match fetcher
            .get_text_with_headers(&feed.url, &[("Accept", ACCEPT_HEADER)])
            .await
        {
            Ok(feed_xml) => match ingest_feed(store, &feed_xml, &feed.source).await {
                Ok(count) => {
                    tracing::info!(source = %feed.source, count, "ingested feed");
                    results.insert(feed.source.clone(), count);
                }
                Err(err) => {
                    tracing::error!(source = %feed.source, error = %err, "feed ingest failed");
                    results.insert(feed.source.clone(), 0);
                }
            },
            Err(err) if err.is_rate_limit() => {
                tracing::warn!(source = %feed.source, error = %err, "rate limited, skipping feed");
                results.insert(feed.source.clone(), 0);
                delay_between_feeds = (delay_between_feeds * 2.0).min(RATE_LIMIT_DELAY_CAP_SECS);
            }
            Err(err) => {
                tracing::error!(source = %feed.source, error = %err, "feed fetch failed");
                results.insert(feed.source.clone(), 0);
            }
        }

        if idx < feeds.len() - 1 {
            let jitter = rand::thread_rng().gen::<f64>() * delay_jitter;
            tokio::time::sleep(Duration::from_secs_f64(delay_between_feeds + jitter)).await;
        }
    }
    results
}

const POLL_BACKOFF_BASE_SECS: f64 = 5.0;
const POLL_BACKOFF_MAX_SECS: f64 = 300.0;
const POLL_BACKOFF_MULTIPLIER: f64 = 2.0;
const POLL_BACKOFF_JITTER: f64 = 0.2;

/// Per-cycle backoff for the poll loop: grows while every feed returns zero
/// events, resets on the first productive cycle.
#[derive(Debug)]
pub struct PollBackoff {
    current_secs: f64,
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl PollBackoff {
    pub fn new() -> Self {
        Self {
            current_secs: POLL_BACKOFF_BASE_SECS,
        }
    }

    /// Record a cycle's total event count. Zero-event cycles return the delay
    /// to sleep (with 20% jitter) and escalate; productive cycles reset.
    pub fn record_cycle(&mut self, total_events: u64) -> Option<Duration> {
        if total_events > 0 {
            self.current_secs = POLL_BACKOFF_BASE_SECS;
            return None;
        }
        let base = self.current_secs;
        self.current_secs = (self.current_secs * POLL_BACKOFF_MULTIPLIER).min(POLL_BACKOFF_MAX_SECS);
        let jitter = base * POLL_BACKOFF_JITTER * (2.0 * rand::thread_rng().gen::<f64>() - 1.0);
        Some(Duration::from_secs_f64((base + jitter).max(0.1)))
    }

    pub fn current_secs(&self) -> f64 {
        self.current_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Wire</title>
    <item>
      <title>  Fed   signals    rate cuts </title>
      <link>https://example.com/fed-cuts</link>
      <pubDate>Mon, 04 Mar 2024 12:30:00 GMT</pubDate>
    </item>
    <item>
      <title>No link item</title>
      <pubDate>Mon, 04 Mar 2024 13:00:00 GMT</pubDate>
    </item>
    <item>
      <title><![CDATA[Gold & silver rally]]></title>
      <link>https://example.com/gold</link>
      <pubDate>Mon, 04 Mar 2024 14:00:00 +0000</pubDate>
    </item>
    <item>
      <title>Bad date</title>
      <link>https://example.com/bad</link>
      <pubDate>not a date</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn keeps_only_complete_items() {
        let entries = parse_rss(SAMPLE_FEED, "reuters").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].headline, "Fed signals rate cuts");
        assert_eq!(entries[1].headline, "Gold & silver rally");
    }

    #[test]
    fn headline_whitespace_is_collapsed() {
        assert_eq!(normalize_headline("  a \t b\n  c  "), "a b c");
    }

    #[test]
    fn pub_dates_convert_to_utc() {
        let entries = parse_rss(SAMPLE_FEED, "reuters").unwrap();
        assert_eq!(
            entries[0].published_at,
            DateTime::parse_from_rfc2822("Mon, 04 Mar 2024 12:30:00 GMT")
                .unwrap()
                .with_timezone(&Utc)
        );
    }

    #[test]
    fn canonical_key_is_case_and_space_insensitive() {
        let at = Utc::now();
        let a = canonical_key("reuters", "Fed  Signals RATE cuts", at);
        let b = canonical_key("reuters", "fed signals rate cuts", at);
        assert_eq!(a, b);
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        assert!(parse_rss("<rss><item><title>x</tit", "reuters").is_err());
    }

    #[test]
    fn empty_feed_parses_to_no_entries() {
        let entries = parse_rss("<rss><channel></channel></rss>", "ap").unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn poll_backoff_escalates_on_empty_cycles_and_resets() {
        let mut backoff = PollBackoff::new();
        assert_eq!(backoff.current_secs(), 5.0);

        let first = backoff.record_cycle(0).unwrap().as_secs_f64();
        assert!((4.0..=6.0).contains(&first));
        assert_eq!(backoff.current_secs(), 10.0);

        backoff.record_cycle(0);
        backoff.record_cycle(0);
        assert_eq!(backoff.current_secs(), 40.0);

        assert!(backoff.record_cycle(3).is_none());
        assert_eq!(backoff.current_secs(), 5.0);
    }

    #[test]
    fn poll_backoff_caps_at_five_minutes() {
        let mut backoff = PollBackoff::new();
        for _ in 0..12 {
            backoff.record_cycle(0);
        }
        assert_eq!(backoff.current_secs(), 300.0);
    }
}
