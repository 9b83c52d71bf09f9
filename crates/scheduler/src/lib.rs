//! Long-running scheduler: interval jobs for ingestion plus a daily digest
//! cron, with same-id overlap protection and signal-driven shutdown.

pub mod jobs;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use http_fetcher::Fetcher;
use meridian_core::{get_settings, Settings};
use meridian_store::Store;

use crate::jobs::{
    job_generate_digest, job_ingest_prices, job_ingest_rss, job_sync_calendar, job_sync_fed,
    job_sync_market_context, JobContext, JobOutcome,
};

pub const JOB_RSS: &str = "rss_ingestion";
pub const JOB_CALENDAR: &str = "calendar_sync";
pub const JOB_FED: &str = "fed_sync";
pub const JOB_PRICES: &str = "price_ingestion";
pub const JOB_MARKET_CONTEXT: &str = "market_context_sync";
pub const JOB_DIGEST: &str = "digest_generation";

const MARKET_CONTEXT_INTERVAL_MINUTES: u64 = 60;

/// Run a job body behind a per-job try-lock: a tick that fires while the
/// previous run is still in flight is skipped, so same-id jobs never overlap.
async fn run_guarded<F>(name: &'static str, guard: Arc<Mutex<()>>, body: F)
where
    F: Future<Output = JobOutcome>,
{
    let Ok(_lock) = guard.try_lock() else {
        tracing::warn!(job = name, "previous run still in flight, skipping tick");
        return;
    };
    let outcome = body.await;
    tracing::info!(job = name, status = %outcome.status, detail = %outcome.detail, "job finished");
}

macro_rules! interval_job {
    ($sched:expr, $name:expr, $minutes:expr, $ctx:expr, $job_fn:path) => {{
        if $minutes > 0 {
            let ctx = $ctx.clone();
            let guard = Arc::new(Mutex::new(()));
            let job = Job::new_repeated_async(
                Duration::from_secs($minutes * 60),
                move |_uuid, _lock| {
                    let ctx = ctx.clone();
                    let guard = guard.clone();
                    Box::pin(async move {
                        run_guarded($name, guard, $job_fn(&ctx)).await;
                    })
                },
            )?;
            $sched.add(job).await?;
            tracing::info!(job = $name, minutes = $minutes, "scheduled interval job");
        }
    }};
}

/// Build the scheduler with every Meridian job attached.
pub async fn create_scheduler(
    ctx: Arc<JobContext>,
    settings: &Settings,
) -> anyhow::Result<JobScheduler> {
    let sched = JobScheduler::new().await?;

    interval_job!(
        sched,
        JOB_RSS,
        settings.scheduler_rss_interval_minutes,
        ctx,
        job_ingest_rss
    );
    interval_job!(
        sched,
        JOB_CALENDAR,
        settings.scheduler_calendar_interval_minutes,
        ctx,
        job_sync_calendar
    );
    interval_job!(
        sched,
        JOB_FED,
        settings.scheduler_fed_interval_minutes,
        ctx,
        job_sync_fed
    );
    interval_job!(
        sched,
        JOB_PRICES,
        settings.scheduler_prices_interval_minutes,
        ctx,
        job_ingest_prices
    );
    interval_job!(
        sched,
        JOB_MARKET_CONTEXT,
        MARKET_CONTEXT_INTERVAL_MINUTES,
        ctx,
        job_sync_market_context
    );

    let digest_schedule = digest_cron_expression(
        settings.scheduler_digest_hour,
        settings.scheduler_digest_minute,
    );
    {
        let ctx = ctx.clone();
        let guard = Arc::new(Mutex::new(()));
        let job = Job::new_async(digest_schedule.as_str(), move |_uuid, _lock| {
            let ctx = ctx.clone();
            let guard = guard.clone();
            Box::pin(async move {
                run_guarded(JOB_DIGEST, guard, job_generate_digest(&ctx)).await;
            })
        })?;
        sched.add(job).await?;
        tracing::info!(
            job = JOB_DIGEST,
            schedule = %digest_schedule,
            timezone = %settings.scheduler_timezone,
            "scheduled cron job"
        );
    }

    Ok(sched)
}

/// Six-field cron: seconds, minute, hour, dom, month, dow.
pub fn digest_cron_expression(hour: u32, minute: u32) -> String {
    format!("0 {minute} {hour} * * *")
}

/// Run every job once, sequentially, before the schedule starts.
pub async fn run_initial_jobs(ctx: &JobContext) {
    let outcomes: Vec<(&str, JobOutcome)> = vec![
        (JOB_RSS, job_ingest_rss(ctx).await),
        (JOB_CALENDAR, job_sync_calendar(ctx).await),
        (JOB_FED, job_sync_fed(ctx).await),
        (JOB_PRICES, job_ingest_prices(ctx).await),
        (JOB_MARKET_CONTEXT, job_sync_market_context(ctx).await),
        (JOB_DIGEST, job_generate_digest(ctx).await),
    ];
    for (name, outcome) in outcomes {
        if outcome.is_success() {
            tracing::info!(job = name, "initial run completed");
        } else {
            tracing::warn!(job = name, detail = %outcome.detail, "initial run failed");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Run the scheduler in the foreground until SIGINT/SIGTERM.
pub async fn run_scheduler(run_initial: bool) -> anyhow::Result<()> {
    let settings = get_settings().clone();
    tracing::info!("initializing Meridian scheduler");

    let store = Store::connect(&settings.database_url).await?;
    let ctx = Arc::new(JobContext {
        store,
        settings: settings.clone(),
        fetcher: Fetcher::new(),
    });

    if run_initial {
        tracing::info!("running initial job execution");
        run_initial_jobs(&ctx).await;
    }

    let mut sched = create_scheduler(ctx, &settings).await?;
    sched.start().await?;
    tracing::info!("scheduler started, waiting for shutdown signal");

    shutdown_signal().await;
    tracing::info!("shutdown signal received, stopping scheduler");
    sched.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_cron_is_daily_at_configured_time() {
        assert_eq!(digest_cron_expression(6, 0), "0 0 6 * * *");
        assert_eq!(digest_cron_expression(14, 45), "0 45 14 * * *");
    }

    #[tokio::test]
    async fn guarded_jobs_skip_when_already_running() {
        let guard = Arc::new(Mutex::new(()));
        let _held = guard.clone().try_lock_owned().unwrap();

        // The body would panic; the guard must keep it from running.
        run_guarded("test_job", guard.clone(), async {
            panic!("must not run while the guard is held");
        })
        .await;

        drop(_held);
        run_guarded("test_job", guard, async {
            JobOutcome::success(serde_json::json!({}))
        })
        .await;
    }
}
