//! Analysis pass over priority macro events.
//!
//! Usage:
//!   macro-event-analysis [--event-id UUID] [--limit N]
//!                        [--provider local|openrouter] [--model NAME]
//!                        [--overwrite] [--dry-run] [--print-prompts]

use uuid::Uuid;

use conviction::{calculate_conviction_score, format_conviction_for_prompt, CaseEvidence};
use historical_matcher::find_historical_cases;
use llm_client::{analyze_event, resolve_provider, AnalysisRequest};
use meridian_core::{get_settings, MacroEventRecord};
use meridian_store::Store;
use significance::normalize_event_type;
use time_horizons::{analyze_time_horizons, format_horizons_for_prompt};
use transmission::{discover_assets_for_event, format_discovery_for_prompt};

/// Channel discovery, historical matching, conviction, and horizon analysis
/// for one event, rendered as prompt context blocks.
async fn build_context_block(
    store: &Store,
    event: &MacroEventRecord,
    cases: &[meridian_core::HistoricalCaseSummary],
) -> anyhow::Result<String> {
    let event_type = normalize_event_type(event.event_type.as_deref());

    let discovery = discover_assets_for_event(
        &event.headline,
        event_type.as_deref(),
        event.full_text.as_deref(),
    );

    let event_text = match &event.full_text {
        Some(body) => format!("{} {body}", event.headline),
        None => event.headline.clone(),
    };
    let matches = find_historical_cases(
        store,
        Some(event_text.as_str()),
        event.event_type.as_deref(),
        None,
        5,
    )
    .await?;

    let evidence: Vec<CaseEvidence> = matches
        .iter()
        .map(|m| CaseEvidence {
            significance_score: m.significance_score,
        })
        .collect();
    let quantitative_impacts = cases
        .iter()
        .find_map(|case| case.quantitative_impacts.clone());
    let channel_tags: Vec<String> = discovery
        .channel_types()
        .iter()
        .map(|ct| ct.as_str().to_string())
        .collect();

    let conviction_result = calculate_conviction_score(
        &evidence,
        quantitative_impacts.as_ref(),
        &channel_tags,
        "medium",
        "moderate",
    );
    let horizons = analyze_time_horizons(
        &event.headline,
        &discovery.channel_types(),
        cases,
        quantitative_impacts.as_ref(),
        conviction_result.level,
    );

    Ok([
        format_discovery_for_prompt(&discovery),
        format_conviction_for_prompt(&conviction_result),
        format_horizons_for_prompt(&horizons),
    ]
    .join("\n\n"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "llm_client=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let event_id: Option<Uuid> = args
        .iter()
        .position(|a| a == "--event-id")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok());
    let limit: Option<i64> = args
        .iter()
        .position(|a| a == "--limit")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok());
    let provider_name = args
        .iter()
        .position(|a| a == "--provider")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_else(|| "local".to_string());
    let model = args
        .iter()
        .position(|a| a == "--model")
        .and_then(|i| args.get(i + 1))
        .cloned();
    let overwrite = args.iter().any(|a| a == "--overwrite");
    let dry_run = args.iter().any(|a| a == "--dry-run");
    let print_prompts = args.iter().any(|a| a == "--print-prompts");

    let settings = get_settings();
    let provider = match resolve_provider(&provider_name, model.as_deref(), settings) {
        Ok(provider) => provider,
        Err(err) => {
            eprintln!("Provider error: {err}");
            std::process::exit(1);
        }
    };

    let store = Store::connect(&settings.database_url).await?;

    let events = if let Some(event_id) = event_id {
        match store.fetch_event_by_id(event_id).await? {
            Some(event) => vec![event],
            None => {
                println!("No macro event found for id {event_id}");
                return Ok(());
            }
        }
    } else {
        let events = store
            .fetch_priority_events_for_analysis(limit, overwrite)
            .await?;
        if events.is_empty() {
            println!("No priority macro events found for analysis.");
            return Ok(());
        }
        events
    };

    let metals_knowledge = store.fetch_metals_knowledge().await?;
    let mut analyzed = 0usize;
    let mut skipped = 0usize;

    for event in events {
        let cases = store
            .fetch_case_summaries(event.event_type.as_deref(), 5)
            .await?;
        let context_block = match build_context_block(&store, &event, &cases).await {
            Ok(block) => Some(block),
            Err(err) => {
                tracing::warn!(event_id = %event.id, error = %err, "context block failed");
                None
            }
        };
        let request = AnalysisRequest {
            event: event.clone(),
            metals_knowledge: metals_knowledge.clone(),
            historical_cases: cases,
            discovery_block: context_block,
        };
        let (analysis, prompt) = match analyze_event(provider.as_ref(), &request).await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(event_id = %event.id, error = %err, "analysis failed");
                skipped += 1;
                continue;
            }
        };
        if print_prompts {
            println!("{prompt}");
        }
        if dry_run {
            analyzed += 1;
            continue;
        }
        if store
            .update_event_analysis(event.id, &analysis.as_update(), overwrite)
            .await?
        {
            analyzed += 1;
        } else {
            skipped += 1;
        }
    }

    println!("Analyzed {analyzed} events (skipped {skipped}).");
    Ok(())
}
