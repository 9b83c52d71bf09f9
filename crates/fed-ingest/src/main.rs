//! FOMC statement poller.
//!
//! Usage:
//!   fed-poller [--interval SECS] [--index-url URL] [--index-file FILE]

use std::time::Duration;

use fed_ingest::{fetch_statement_entries, ingest_fomc_statements, insert_comms, FED_BASE_URL};
use http_fetcher::Fetcher;
use meridian_core::get_settings;
use meridian_store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fed_ingest=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let interval: u64 = args
        .iter()
        .position(|a| a == "--interval")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let index_url = args
        .iter()
        .position(|a| a == "--index-url")
        .and_then(|i| args.get(i + 1))
        .cloned();
    let index_file = args
        .iter()
        .position(|a| a == "--index-file")
        .and_then(|i| args.get(i + 1))
        .cloned();

    let settings = get_settings();
    let store = Store::connect(&settings.database_url).await?;
    let fetcher = Fetcher::new();

    loop {
        let inserted = if let Some(file) = &index_file {
            let index_html = std::fs::read_to_string(file)?;
            let entries = fetch_statement_entries(&fetcher, &index_html, FED_BASE_URL).await;
            insert_comms(&store, entries).await?
        } else {
            match ingest_fomc_statements(&fetcher, &store, index_url.as_deref()).await {
                Ok(inserted) => inserted,
                Err(err) => {
                    eprintln!("Fed ingestion failed: {err}");
                    0
                }
            }
        };
        println!("Fed poll results: inserted={inserted}");

        if interval == 0 {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(interval)).await;
    }
}
