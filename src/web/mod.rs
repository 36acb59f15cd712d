//! Web server module

mod middleware;
mod routes;
mod sse;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue},
    routing::get,
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer};
use tracing::info;

use crate::analytics::StatsEngine;
use crate::config::{AnalyticsConfig, Config};
use crate::db::Database;
use crate::events::EventBus;

use middleware::RequestLoggingLayer;

pub struct AppState {
    pub db: Database,
    pub engine: StatsEngine,
    pub analytics: AnalyticsConfig,
    pub event_bus: EventBus,
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/hourly-data", get(routes::api_hourly_data))
        .route("/daily-totals", get(routes::api_daily_totals))
        .route("/peak-hours", get(routes::api_peak_hours))
        .route("/peak-hour", get(routes::api_peak_hour))
        .route("/peak-day", get(routes::api_peak_day))
        .route("/live-stats", get(routes::api_live_stats))
        .route("/stores", get(routes::api_stores))
        .route("/report", get(routes::api_report))
        .route("/last-month-best-store", get(routes::api_last_month_best_store))
        .route("/top-performing-days", get(routes::api_top_performing_days))
        .route("/monthly-data", get(routes::api_monthly_data))
        .route("/store-locations", get(routes::api_store_locations))
        .route("/predictive-analytics", get(routes::api_predictive))
        .route("/alerts", get(routes::api_alerts))
        .route("/store-stats", get(routes::api_store_stats))
        .route("/store-report", get(routes::api_store_report))
        .route("/pages/:page", get(routes::api_page))
        // Dashboards must always see current counts
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}

/// Build the application router; `static_dir` serves a bundled frontend at `/`
pub fn router(state: Arc<AppState>, static_dir: Option<&str>) -> Router {
    let mut app = Router::new()
        .nest("/api", api_routes())
        .route("/events", get(sse::events_handler));

    if let Some(dir) = static_dir.filter(|d| !d.is_empty()) {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(RequestLoggingLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: &Config, state: Arc<AppState>) -> Result<()> {
    let app = router(state, Some(&config.server.static_dir));

    let addr = format!("{}:{}", config.server.host, config.server.http_port);

    if config.tls_enabled() {
        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            &config.server.tls_cert,
            &config.server.tls_key,
        )
        .await?;
        let socket: SocketAddr = addr.parse()?;
        info!("Web server starting on https://{}", addr);
        axum_server::bind_rustls(socket, tls)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await?;
    } else {
        info!("Web server starting on http://{}", addr);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
    }

    Ok(())
}
