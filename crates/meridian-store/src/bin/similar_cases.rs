//! Query nearest historical cases for an ad-hoc embedding vector.
//!
//! Usage:
//!   similar-cases --embedding-file vector.json [--limit 5]

use std::path::PathBuf;

use meridian_core::get_settings;
use meridian_store::embeddings::load_embedding_vector;
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
        .position(|a| a == "--embedding-file")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
    else {
        eprintln!("Usage: similar-cases --embedding-file <path> [--limit N]");
        std::process::exit(1);
    };
    let limit: i64 = args
        .iter()
        .position(|a| a == "--limit")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
        .unwrap_or(5);

    let embedding = match load_embedding_vector(&path) {
        Ok(embedding) => embedding,
        Err(err) => {
            eprintln!("Embedding file invalid: {err}");
            std::process::exit(1);
        }
    };

    let settings = get_settings();
    let store = Store::connect(&settings.database_url).await?;
    let matches = store.find_similar_cases(&embedding, limit).await?;
    println!("{}", serde_json::to_string_pretty(&matches)?);
    Ok(())
}
