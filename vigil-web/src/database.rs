use anyhow::Result;
use sqlx::{migrate::MigrateDatabase, Pool, Sqlite};

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let in_memory = database_url.contains(":memory:");

        if !in_memory {
            // Ensure parent directory exists
            if let Some(db_path) = database_url.strip_prefix("sqlite://") {
                if let Some(parent) = std::path::Path::new(db_path).parent() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            // Create database if it doesn't exist
            if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
                tracing::info!("Creating database at {}", database_url);
                Sqlite::create_database(database_url).await?;
            }
        }

        // Alert and telemetry ingests arrive concurrently from many sensors;
        // size the pool for short independent writes.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 20 })
            .min_connections(if in_memory { 1 } else { 2 })
            .max_lifetime(if in_memory { None } else { Some(std::time::Duration::from_secs(30 * 60)) })
            .idle_timeout(if in_memory { None } else { Some(std::time::Duration::from_secs(10 * 60)) })
            .acquire_timeout(std::time::Duration::from_secs(30))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// In-memory database for tests: a single shared connection so every
    /// query sees the same schema.
    pub async fn in_memory() -> Result<Self> {
        let db = Self::new("sqlite::memory:").await?;
        db.migrate().await?;
        Ok(db)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(self.pool()).await?;
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}
