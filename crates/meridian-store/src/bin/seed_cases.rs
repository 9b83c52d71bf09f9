//! Seed curated historical cases from a JSON file.
//!
//! Usage:
//!   seed-cases --data-file data/historical_cases.json

use std::path::PathBuf;

use meridian_core::get_settings;
use meridian_store::seeds::load_case_seeds;
use meridian_store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meridian_store=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let data_file: PathBuf = args
        .iter()
        .position(|a| a == "--data-file")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/historical_cases.json"));

    let seeds = match load_case_seeds(&data_file) {
        Ok(seeds) => seeds,
        Err(err) => {
            eprintln!("Seed validation failed: {err}");
            std::process::exit(1);
        }
    };

    let settings = get_settings();
    let store = Store::connect(&settings.database_url).await?;
    let mut written = 0u64;
    for seed in &seeds {
        written += store.upsert_historical_case(seed).await?;
    }
    println!(
        "Seeded {written} historical cases from {}",
        data_file.display()
    );
    Ok(())
}
