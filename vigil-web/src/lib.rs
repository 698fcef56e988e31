// Vigil web backend: alert ingestion + live fan-out, host telemetry
// ingestion, and the AI trace proxy, on top of axum and SQLite.

pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod store;
pub mod streaming;

pub use config::WebConfig;
pub use database::Database;
pub use error::{ApiResult, AppError, AppResult};
pub use store::{AlertStore, TelemetryStore};
pub use streaming::AlertHub;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tokio::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: WebConfig,
    pub alert_store: AlertStore,
    pub telemetry_store: TelemetryStore,
    pub alert_hub: AlertHub,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub async fn new(config: WebConfig) -> anyhow::Result<Self> {
        let db = Database::new(&config.database_url).await?;
        db.migrate().await?;
        Self::with_database(db, config)
    }

    /// Build state around an existing database (tests use the in-memory one).
    pub fn with_database(db: Database, config: WebConfig) -> anyhow::Result<Self> {
        let persistence_timeout = Duration::from_secs(config.persistence_timeout_secs);
        let alert_store = AlertStore::new(db.pool().clone(), persistence_timeout);
        let telemetry_store = TelemetryStore::new(db.pool().clone(), persistence_timeout);
        let alert_hub = AlertHub::new();

        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.ai_connect_timeout_secs))
            .timeout(Duration::from_secs(config.ai_read_timeout_secs))
            .build()?;

        Ok(Self {
            db,
            config,
            alert_store,
            telemetry_store,
            alert_hub,
            http_client,
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/analysis/alert",
            post(handlers::alerts::receive_alert).get(handlers::alerts::query_alert_page),
        )
        .route("/api/analysis/alert/:id", get(handlers::alerts::query_alert_by_id))
        .route("/api/analysis/ai-trace", post(handlers::trace::ai_trace))
        .route("/api/host/monitor/report", post(handlers::telemetry::receive_report))
        .route("/api/host/monitor/latest", get(handlers::telemetry::latest_for_host))
        .route("/ws", get(streaming::alert_ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::response::Json<serde_json::Value> {
    axum::response::Json(serde_json::json!({
        "status": "healthy",
        "service": NAME,
        "version": VERSION,
        "subscribers": state.alert_hub.connection_count(),
        "timestamp": chrono::Local::now().naive_local().to_string(),
    }))
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "vigil-web");
    }

    #[test]
    fn test_cors_layer_accepts_wildcard_and_lists() {
        // Both configurations must build without panicking.
        let _ = cors_layer(&["*".to_string()]);
        let _ = cors_layer(&["http://localhost:3000".to_string()]);
    }
}
