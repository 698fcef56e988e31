use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub port: u16,
    pub database_url: String,
    pub persistence_timeout_secs: u64,
    pub cors_origins: Vec<String>,
    /// Base URL of the external AI root-cause agent.
    pub ai_agent_url: String,
    pub ai_connect_timeout_secs: u64,
    pub ai_read_timeout_secs: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            database_url: "sqlite://./data/vigil.db".to_string(),
            persistence_timeout_secs: 10,
            cors_origins: vec!["http://localhost:3000".to_string()],
            ai_agent_url: "http://127.0.0.1:8000/api/chat".to_string(),
            ai_connect_timeout_secs: 5,
            ai_read_timeout_secs: 30,
        }
    }
}

impl WebConfig {
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::default();

        // Load from environment variables
        if let Ok(port) = env::var("VIGIL_PORT").or_else(|_| env::var("PORT")) {
            config.port = port.parse()?;
        }

        if let Ok(database_url) = env::var("DATABASE_URL") {
            config.database_url = database_url;
        } else if let Ok(db_path) = env::var("VIGIL_DATABASE_PATH") {
            config.database_url = format!("sqlite://{}", db_path);
        }

        if let Ok(timeout) = env::var("VIGIL_PERSISTENCE_TIMEOUT") {
            config.persistence_timeout_secs = timeout.parse()?;
        }

        if let Ok(origins) = env::var("VIGIL_CORS_ORIGINS") {
            config.cors_origins = origins.split(',').map(|s| s.trim().to_string()).collect();
        }

        if let Ok(url) = env::var("VIGIL_AI_AGENT_URL") {
            config.ai_agent_url = url;
        }

        if let Ok(timeout) = env::var("VIGIL_AI_CONNECT_TIMEOUT") {
            config.ai_connect_timeout_secs = timeout.parse()?;
        }

        if let Ok(timeout) = env::var("VIGIL_AI_READ_TIMEOUT") {
            config.ai_read_timeout_secs = timeout.parse()?;
        }

        Ok(config)
    }
}
