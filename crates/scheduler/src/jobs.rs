//! Scheduled job wrappers.
//!
//! Each job is idempotent, logs its own start/finish, and converts every
//! failure into a `JobOutcome` so nothing ever crashes the scheduler.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use calendar_ingest::{sync_calendar, ForexFactoryAdapter};
use daily_digest::get_or_create_digest;
use fed_ingest::ingest_fomc_statements;
use http_fetcher::Fetcher;
use market_context::ingest_market_context;
use meridian_core::Settings;
use meridian_store::Store;
use price_ingest::{ingest_prices, CORE_SYMBOLS, DEFAULT_LOOKBACK_DAYS};
use rss_ingest::{
    default_feeds, ingest_sources, DELAY_JITTER_SECS, MIN_DELAY_BETWEEN_FEEDS_SECS,
};

const CALENDAR_WINDOW_DAYS: i64 = 7;

/// Shared state handed to every job.
pub struct JobContext {
    pub store: Store,
    pub settings: Settings,
    pub fetcher: Fetcher,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub status: String,
    pub detail: serde_json::Value,
}

impl JobOutcome {
    pub fn success(detail: serde_json::Value) -> Self {
        Self {
            status: "success".to_string(),
            detail,
        }
    }

    pub fn error(err: impl std::fmt::Display) -> Self {
        Self {
            status: "error".to_string(),
            detail: json!({"error": err.to_string()}),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

pub async fn job_ingest_rss(ctx: &JobContext) -> JobOutcome {
    tracing::info!("starting RSS ingestion job");
    let feeds = default_feeds();
    let results = ingest_sources(
        &ctx.fetcher,
        &ctx.store,
        &feeds,
        MIN_DELAY_BETWEEN_FEEDS_SECS,
        DELAY_JITTER_SECS,
    )
    .await;
    let total: u64 = results.values().sum();
    tracing::info!(total, "RSS ingestion complete");
    JobOutcome::success(json!({"total_events": total, "feeds": results}))
}

pub async fn job_sync_calendar(ctx: &JobContext) -> JobOutcome {
    tracing::info!("starting calendar sync job");
    let adapter = ForexFactoryAdapter::new(None, None);
    match sync_calendar(&adapter, &ctx.store, CALENDAR_WINDOW_DAYS).await {
        Ok(inserted) => {
            tracing::info!(inserted, "calendar sync complete");
            JobOutcome::success(json!({"inserted": inserted}))
        }
        Err(err) => {
            tracing::error!(error = %err, "calendar sync failed");
            JobOutcome::error(err)
        }
    }
}

pub async fn job_sync_fed(ctx: &JobContext) -> JobOutcome {
    tracing::info!("starting Fed communications sync job");
    match ingest_fomc_statements(&ctx.fetcher, &ctx.store, None).await {
        Ok(inserted) => {
            tracing::info!(inserted, "Fed sync complete");
            JobOutcome::success(json!({"inserted": inserted}))
        }
        Err(err) => {
            tracing::error!(error = %err, "Fed sync failed");
            JobOutcome::error(err)
        }
    }
}

pub async fn job_ingest_prices(ctx: &JobContext) -> JobOutcome {
    tracing::info!("starting price ingestion job");
    let end_date = Utc::now().date_naive();
    let start_date = end_date - chrono::Duration::days(DEFAULT_LOOKBACK_DAYS);
    let symbols: Vec<String> = CORE_SYMBOLS.iter().map(|s| s.to_string()).collect();
    let results = ingest_prices(&ctx.fetcher, &ctx.store, &symbols, start_date, end_date).await;
    let total: u64 = results.values().sum();
    tracing::info!(total, "price ingestion complete");
    JobOutcome::success(json!({"total_prices": total, "symbols": results}))
}

pub async fn job_sync_market_context(ctx: &JobContext) -> JobOutcome {
    tracing::info!("starting market context sync job");
    match ingest_market_context(&ctx.store, &ctx.settings.fred_api_key).await {
        Ok(record) => {
            tracing::info!(
                context_date = %record.context_date,
                vix = ?record.vix_level,
                dxy = ?record.dxy_level,
                "market context sync complete"
            );
            JobOutcome::success(json!({"context_date": record.context_date.to_string()}))
        }
        Err(err) => {
            tracing::error!(error = %err, "market context sync failed");
            JobOutcome::error(err)
        }
    }
}

pub async fn job_generate_digest(ctx: &JobContext) -> JobOutcome {
    tracing::info!("starting daily digest generation job");
    let today = Utc::now().date_naive();
    match get_or_create_digest(&ctx.store, today).await {
        Ok(digest) => {
            tracing::info!(
                digest_date = %today,
                events = digest.priority_events.len(),
                theses = digest.active_theses.len(),
                "digest generation complete"
            );
            JobOutcome::success(json!({
                "digest_date": today.to_string(),
                "priority_events": digest.priority_events.len(),
                "active_theses": digest.active_theses.len(),
            }))
        }
        Err(err) => {
            tracing::error!(error = %err, "digest generation failed");
            JobOutcome::error(err)
        }
    }
}
