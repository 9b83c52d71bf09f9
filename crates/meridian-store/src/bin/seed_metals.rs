//! Seed the metals knowledge base from JSON files.
//!
//! Usage:
//!   seed-metals --data-dir data/metals

use std::path::PathBuf;

use meridian_core::get_settings;
use meridian_store::seeds::load_metal_seed_entries;
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
    let data_dir: PathBuf = args
        .iter()
        .position(|a| a == "--data-dir")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/metals"));

    let entries = match load_metal_seed_entries(&data_dir) {
        Ok(entries) => entries,
        Err(err) => {
            eprintln!("Seed validation failed: {err}");
            std::process::exit(1);
        }
    };

    let settings = get_settings();
    let store = Store::connect(&settings.database_url).await?;
    let written = store.upsert_metals_knowledge(&entries).await?;
    println!(
        "Seeded {written} metal knowledge entries from {}",
        data_dir.display()
    );
    Ok(())
}
