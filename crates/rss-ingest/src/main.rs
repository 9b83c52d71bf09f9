//! RSS poller.
//!
//! Usage:
//!   rss-poller [--interval SECS] [--source NAME --url URL]
//!
//! With an interval, the loop backs off exponentially while every feed in a
//! cycle returns zero events and resets on the first productive cycle.

use std::time::Duration;

use http_fetcher::Fetcher;
use meridian_core::get_settings;
use meridian_store::Store;
use rss_ingest::{
    default_feeds, ingest_sources, FeedConfig, PollBackoff, DELAY_JITTER_SECS,
    MIN_DELAY_BETWEEN_FEEDS_SECS,
};

fn resolve_feeds(source: Option<String>, url: Option<String>) -> anyhow::Result<Vec<FeedConfig>> {
    match (source, url) {
        (Some(source), Some(url)) => Ok(vec![FeedConfig { source, url }]),
        (None, None) => Ok(default_feeds()),
        _ => anyhow::bail!("Both --source and --url must be provided together."),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rss_ingest=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let interval: u64 = args
        .iter()
        .position(|a| a == "--interval")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let source = args
        .iter()
        .position(|a| a == "--source")
        .and_then(|i| args.get(i + 1))
        .cloned();
    let url = args
        .iter()
        .position(|a| a == "--url")
        .and_then(|i| args.get(i + 1))
        .cloned();

    let feeds = resolve_feeds(source, url)?;
    let settings = get_settings();
    let store = Store::connect(&settings.database_url).await?;
    let fetcher = Fetcher::new();
    let mut backoff = PollBackoff::new();

    loop {
        let results = ingest_sources(
            &fetcher,
            &store,
            &feeds,
            MIN_DELAY_BETWEEN_FEEDS_SECS,
            DELAY_JITTER_SECS,
        )
        .await;
        let summary: Vec<String> = results
            .iter()
            .map(|(name, count)| format!("{name}={count}"))
            .collect();
        println!("RSS poll results: {}", summary.join(", "));

        if interval == 0 {
            return Ok(());
        }

        let total: u64 = results.values().sum();
        if let Some(extra) = backoff.record_cycle(total) {
            tracing::info!(
                delay_secs = extra.as_secs_f64(),
                "all feeds empty, backing off"
            );
            tokio::time::sleep(extra).await;
        }
        tokio::time::sleep(Duration::from_secs(interval)).await;
    }
}
