//! Demo binary for tokio-content-router
//!
//! Builds an engine, registers a reader, routes a mixed batch of content and
//! prints the decisions.
//!
//! ## Usage
//!
//! ```text
//! content-router-demo [config.toml]
//! ```
//!
//! ## Environment Variables
//!
//! - `LOG_FORMAT=json` — structured JSON output (production)
//! - `RUST_LOG=info` — log level filter

use chrono::Duration;
use std::path::Path;
use std::sync::Arc;
use tokio_content_router::{
    config::loader, init_tracing, metrics, ContentCategory, ContentRoutingConfig,
    ContentRoutingEngine, RoutingContent, RoutingDestination, UserContext,
};
use tracing::{info, warn};

fn content(category: ContentCategory) -> RoutingContent {
    RoutingContent::new(uuid::Uuid::new_v4().to_string(), category)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = init_tracing();
    metrics::init_metrics()?;

    let config = match std::env::args().nth(1) {
        Some(path) => loader::load_from_file(Path::new(&path))?,
        None => ContentRoutingConfig::default(),
    };

    let engine = Arc::new(ContentRoutingEngine::try_new(config)?);
    info!("Starting tokio-content-router demo");

    engine.set_user_context(
        UserContext::new("reader-1")
            .with_active_topics(["rust", "databases"])
            .with_preference("rust", 0.9),
    );
    engine.add_topic_route("security", RoutingDestination::PriorityQueue);

    let items = vec![
        content(ContentCategory::BreakingNews)
            .with_quality(0.92)
            .with_urgency(0.95)
            .with_topics(["security"]),
        content(ContentCategory::ResearchPaper)
            .with_quality(0.85)
            .with_topics(["databases"]),
        content(ContentCategory::PersonalInterest)
            .with_quality(0.6)
            .with_topics(["rust"])
            .with_relevance("reader-1", 0.8),
        content(ContentCategory::IndustryUpdate)
            .with_quality(0.5)
            .with_age(Duration::hours(96)),
        content(ContentCategory::Educational).with_quality(0.7),
    ];

    info!(count = items.len(), "Routing demo content");
    let results = engine.batch_route_content(&items, Some("reader-1")).await;

    for result in &results {
        if !result.success {
            warn!(
                content_id = %result.content_id,
                error = result.error_message.as_deref().unwrap_or("unknown"),
                "Routing failed"
            );
            continue;
        }
        info!(
            content_id = %result.content_id,
            primary = %result.primary_destination,
            fallbacks = ?result.fallback_destinations,
            decisions = result.decisions.len(),
            "Routed"
        );
        for decision in &result.decisions {
            info!(
                destination = %decision.destination,
                priority = %decision.routing_priority,
                delay_ms = decision.processing_delay_ms,
                reasoning = ?decision.reasoning,
                "  decision"
            );
        }
    }

    let snapshot = engine.get_routing_metrics();
    info!(metrics = %serde_json::to_string(&snapshot)?, "Routing metrics");
    info!("Demo complete");

    Ok(())
}
