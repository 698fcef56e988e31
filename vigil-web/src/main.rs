use std::net::SocketAddr;
use tokio::net::TcpListener;

use vigil_web::{create_app, AppState, WebConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists
    dotenv::dotenv().ok();

    // Initialize tracing with environment filter
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Vigil backend");

    let config = match WebConfig::load() {
        Ok(config) => {
            tracing::info!("Configuration loaded, port: {}", config.port);
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    tracing::info!("Initializing database at {}", config.database_url);
    let state = AppState::new(config.clone()).await?;
    tracing::info!("Database ready, migrations applied");

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Vigil listening on http://{}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
