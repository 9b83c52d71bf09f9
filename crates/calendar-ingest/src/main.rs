//! Economic calendar poller.
//!
//! Usage:
//!   calendar-poller [--source json|forex_factory|fred] [--data-dir DIR]
//!                   [--data-file FILE] [--url URL] [--days N] [--interval SECS]

use std::path::PathBuf;
use std::time::Duration;

use calendar_ingest::{resolve_adapter, sync_calendar};
use meridian_core::get_settings;
use meridian_store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "calendar_ingest=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let source = args
        .iter()
        .position(|a| a == "--source")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_else(|| "json".to_string());
    let data_dir = args
        .iter()
        .position(|a| a == "--data-dir")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);
    let data_file = args
        .iter()
        .position(|a| a == "--data-file")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);
    let url = args
        .iter()
        .position(|a| a == "--url")
        .and_then(|i| args.get(i + 1))
        .cloned();
    let days: i64 = args
        .iter()
        .position(|a| a == "--days")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
        .unwrap_or(7);
    let interval: u64 = args
        .iter()
        .position(|a| a == "--interval")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let settings = get_settings();
    let adapter = match resolve_adapter(&source, data_dir, data_file, url, &settings.fred_api_key) {
        Ok(adapter) => adapter,
        Err(err) => {
            eprintln!("Adapter error: {err}");
            std::process::exit(1);
        }
    };
    let store = Store::connect(&settings.database_url).await?;

    loop {
        match sync_calendar(adapter.as_ref(), &store, days).await {
            Ok(inserted) => println!("Calendar sync inserted {inserted} events"),
            Err(err) => eprintln!("Calendar sync failed: {err}"),
        }
        if interval == 0 {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(interval)).await;
    }
}
