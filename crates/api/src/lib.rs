//! Parking Monitor API Server
//!
//! REST API and WebSocket server for the parking monitor dashboard.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use detection_loop::{BroadcastPublisher, DetectionLoop, LoopStatus};
use frame_source::open_source;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use occupancy::OccupancyPipeline;
use region_store::RegionStore;
use serde::Serialize;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

mod error;
pub mod rate_limit;
pub mod routes;
pub mod settings;

pub use error::ApiError;
pub use settings::{LoggingSettings, Settings};

use routes::{detection, spaces, stream};

/// Application state shared across handlers
pub struct AppState {
    pub settings: Settings,
    /// Parking space regions, shared with the loop
    pub regions: Arc<RegionStore>,
    /// Fan-out of loop results to viewers
    pub publisher: BroadcastPublisher,
    pub detection: DetectionLoop,
    /// Prometheus renderer, absent when no recorder is installed
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Build the store, publisher and loop described by `settings`
    pub fn new(settings: Settings) -> Self {
        let regions = Arc::new(RegionStore::open(&settings.storage.regions_file));
        let publisher = BroadcastPublisher::new(settings.detection.channel_capacity);
        let detection = DetectionLoop::new(
            OccupancyPipeline::new(settings.occupancy.clone()),
            regions.clone(),
            Arc::new(publisher.clone()),
            settings.detection.clone(),
        );

        Self {
            settings,
            regions,
            publisher,
            detection,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub detection: LoopStatus,
    pub total_spaces: usize,
    pub viewers: usize,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut frame_routes: Router<Arc<AppState>> =
        Router::new().route("/api/process_frame", post(detection::process_frame));
    if let Some(limits) = state.settings.rate_limit.limits() {
        match rate_limit::governor_layer(&limits) {
            Some(layer) => frame_routes = frame_routes.layer(layer),
            None => warn!("Ignoring invalid rate limit settings {:?}", limits),
        }
    }

    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(
            "/api/parking_spaces",
            get(spaces::list_spaces).post(spaces::add_space),
        )
        .route("/api/parking_spaces/:index", delete(spaces::remove_space))
        .route("/api/upload", post(detection::upload))
        .route("/api/start_detection", post(detection::start_detection))
        .route("/api/stop_detection", post(detection::stop_detection))
        .route("/api/status", get(detection::status))
        .route("/ws", get(stream::ws_handler))
        .merge(frame_routes)
        .layer(DefaultBodyLimit::max(state.settings.server.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        detection: state.detection.status().await,
        total_spaces: state.regions.len(),
        viewers: state.publisher.viewer_count(),
    })
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}

/// Initialize logging
pub fn init_logging(settings: &LoggingSettings) {
    let level = Level::from_str(&settings.level).unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let installed = if settings.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    if let Err(e) = installed {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the server until Ctrl-C
pub async fn run_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    tokio::fs::create_dir_all(&settings.storage.uploads_dir).await?;

    let mut state = AppState::new(settings);
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => warn!("Metrics disabled: {}", e),
    }

    if let Some(path) = state.settings.source.clone() {
        let opened = tokio::task::spawn_blocking(move || open_source(path)).await?;
        match opened {
            Ok(source) => state.detection.bind_source(source).await,
            Err(e) => warn!("Startup source not loaded: {}", e),
        }
    }

    let addr = state.settings.server.bind_addr.clone();
    let state = Arc::new(state);
    let app = create_router(state.clone());

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    state.detection.stop().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
