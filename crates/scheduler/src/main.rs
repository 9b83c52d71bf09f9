//! Meridian background scheduler.
//!
//! Usage:
//!   scheduler               Run with an initial execution of every job
//!   scheduler --no-initial  Skip the immediate run on startup
//!   scheduler --list-jobs   Print the configured schedule and exit

use meridian_core::get_settings;
use scheduler::run_scheduler;

fn list_jobs() {
    let settings = get_settings();
    println!("Meridian Scheduler - Configured Jobs");
    println!("{}", "=".repeat(50));
    println!("Timezone: {}", settings.scheduler_timezone);
    println!();
    println!("INTERVAL JOBS:");
    println!(
        "  RSS ingestion:          every {} minutes",
        settings.scheduler_rss_interval_minutes
    );
    println!(
        "  Calendar sync:          every {} minutes",
        settings.scheduler_calendar_interval_minutes
    );
    println!(
        "  Fed communications:     every {} minutes",
        settings.scheduler_fed_interval_minutes
    );
    println!(
        "  Price ingestion:        every {} minutes",
        settings.scheduler_prices_interval_minutes
    );
    println!("  Market context sync:    every 60 minutes");
    println!();
    println!("CRON JOBS:");
    println!(
        "  Daily digest:           daily at {:02}:{:02} {}",
        settings.scheduler_digest_hour, settings.scheduler_digest_minute, settings.scheduler_timezone
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scheduler=info,rss_ingest=info,calendar_ingest=info,fed_ingest=info,price_ingest=info,market_context=info,digest=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--list-jobs") {
        list_jobs();
        return Ok(());
    }
    let run_initial = !args.iter().any(|a| a == "--no-initial");

    run_scheduler(run_initial).await
}
