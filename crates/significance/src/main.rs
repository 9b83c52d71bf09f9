//! Batch significance scorer.
//!
//! Fetches macro events with no significance score (oldest first), scores
//! them, and writes the result back. `--dry-run` reports tier counts without
//! touching the database.
//!
//! Usage:
//!   significance [--limit N] [--dry-run]

use meridian_core::{get_settings, ScoreUpdate};
use meridian_store::Store;
use significance::{score_event, EventInput, Tier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "significance=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let dry_run = args.iter().any(|a| a == "--dry-run");
    let limit: Option<i64> = args
        .iter()
        .position(|a| a == "--limit")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok());

    let settings = get_settings();
    let store = Store::connect(&settings.database_url).await?;

    let events = store.fetch_events_to_score(limit).await?;
    if events.is_empty() {
        println!("No macro events found without significance scores.");
        return Ok(());
    }

    let mut priority = 0usize;
    let mut monitoring = 0usize;
    let mut logged = 0usize;

    for event in &events {
        let input = EventInput {
            source: &event.source,
            headline: &event.headline,
            full_text: event.full_text.as_deref(),
            event_type: event.event_type.as_deref(),
            regions: event.regions.as_deref(),
            entities: event.entities.as_deref(),
        };
        let scored = score_event(&input);
        match scored.tier {
            Tier::Priority => priority += 1,
            Tier::Monitoring => monitoring += 1,
            Tier::Logged => logged += 1,
        }

        if !dry_run {
            let update = ScoreUpdate {
                significance_score: scored.total_score,
                score_components: serde_json::to_value(scored.components)?,
                priority_flag: scored.priority_flag,
            };
            store.update_event_score(event.id, &update).await?;
        }
    }

    if dry_run {
        println!(
            "Dry run: scored={}, priority={priority}, monitoring={monitoring}, logged={logged}",
            events.len()
        );
    } else {
        println!(
            "Scored macro events: priority={priority}, monitoring={monitoring}, logged={logged}"
        );
    }
    Ok(())
}
