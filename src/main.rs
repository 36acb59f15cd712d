//! Footfall - people-counting analytics for retail stores
//!
//! Serves the counter data collected per store:
//! - Raw hourly/daily/peak queries over `store_pc`
//! - Store performance comparisons and the exportable report
//! - Dashboard pages and a live SSE feed from `live_pc`

mod analytics;
mod config;
mod db;
mod error;
mod events;
mod geo;
mod live;
mod pages;
mod web;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use analytics::{FetchPolicy, StatsEngine};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    let config = config::Config::load()?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.to_lowercase()));

    // Use LOG_FORMAT=gcp for structured GCP Cloud Logging
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "gcp" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting Footfall...");
    info!("Configuration loaded");

    let db = db::Database::new(&config.database).await?;
    db.run_migrations().await?;
    info!("Database initialized");

    let policy = FetchPolicy::from_config(&config.analytics);
    let engine = StatsEngine::new(Arc::new(db.clone()), policy);

    // Event bus for broadcasting live snapshots
    let (event_tx, _) = tokio::sync::broadcast::channel(1000);
    let event_bus = events::EventBus::new(event_tx);

    if config.live.enabled {
        live::start_live_poller(
            Arc::new(db.clone()),
            event_bus.clone(),
            Duration::from_secs(config.live.poll_interval_secs),
        );
    } else {
        info!("Live feed disabled");
    }

    let state = Arc::new(web::AppState {
        db,
        engine,
        analytics: config.analytics.clone(),
        event_bus,
    });

    // Start web server (blocking)
    web::start_server(&config, state).await?;

    Ok(())
}
