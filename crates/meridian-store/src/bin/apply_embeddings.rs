//! Apply historical-case embeddings from a JSON file.
//!
//! Usage:
//!   apply-embeddings --embeddings-file embeddings.json

use std::path::PathBuf;

use meridian_core::get_settings;
use meridian_store::embeddings::load_embedding_updates;
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
    let Some(path) = args
        .iter()
        .position(|a| a == "--embeddings-file")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
    else {
        eprintln!("Usage: apply-embeddings --embeddings-file <path>");
        std::process::exit(1);
    };

    let updates = match load_embedding_updates(&path) {
        Ok(updates) => updates,
        Err(err) => {
            eprintln!("Embedding file invalid: {err}");
            std::process::exit(1);
        }
    };

    let settings = get_settings();
    let store = Store::connect(&settings.database_url).await?;
    let mut updated = 0u64;
    for update in &updates {
        updated += store
            .apply_embedding(&update.event_name, &update.date_range, &update.embedding)
            .await?;
    }
    println!("Updated embeddings for {updated} historical cases");
    Ok(())
}
