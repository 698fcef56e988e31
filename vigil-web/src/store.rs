use futures::Future;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use tokio::time::Duration;

use crate::error::{AppError, AppResult};
use vigil_core::{timefmt, Alert, HostReport, TelemetrySnapshot};

/// An alert as it sits in the database: the canonical record plus its row id
/// (used by the listing/detail endpoints).
#[derive(Debug, Clone, Serialize)]
pub struct StoredAlert {
    pub id: i64,
    #[serde(flatten)]
    pub alert: Alert,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub threat_level: Option<i32>,
    pub begin_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageResult<T: Serialize> {
    pub total: i64,
    pub records: Vec<T>,
}

/// Bound a storage future by the configured persistence timeout; a write
/// left pending is treated as failed rather than holding the ingest open.
async fn bounded<T, F>(timeout: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(res) => res.map_err(AppError::from),
        Err(_) => Err(AppError::Persistence(
            "storage operation timed out".to_string(),
        )),
    }
}

fn parse_stored_time(row: &SqliteRow, column: &str) -> Result<chrono::NaiveDateTime, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    timefmt::parse(&raw).ok_or_else(|| sqlx::Error::Decode(
        format!("column {} holds invalid timestamp '{}'", column, raw).into(),
    ))
}

/// Append-only store for canonical alerts.
#[derive(Clone)]
pub struct AlertStore {
    pool: Pool<Sqlite>,
    timeout: Duration,
}

impl AlertStore {
    pub fn new(pool: Pool<Sqlite>, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub async fn insert(&self, alert: &Alert) -> AppResult<i64> {
        let pool = self.pool.clone();
        let alert = alert.clone();
        bounded(self.timeout, async move {
            let result = sqlx::query(
                "INSERT INTO potential_threat_alert \
                 (threat_id, threat_level, impact_scope, occur_time, create_time) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&alert.threat_id)
            .bind(alert.threat_level)
            .bind(&alert.impact_scope)
            .bind(timefmt::format(&alert.occur_time))
            .bind(timefmt::format(&alert.create_time))
            .execute(&pool)
            .await?;
            Ok(result.last_insert_rowid())
        })
        .await
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<StoredAlert>> {
        let pool = self.pool.clone();
        bounded(self.timeout, async move {
            let row = sqlx::query("SELECT * FROM potential_threat_alert WHERE id = ?")
                .bind(id)
                .fetch_optional(&pool)
                .await?;
            row.map(|r| alert_from_row(&r)).transpose()
        })
        .await
    }

    /// Paginated listing with optional level and occur-time range filters.
    pub async fn page(&self, query: &AlertPageQuery) -> AppResult<PageResult<StoredAlert>> {
        // i64 arithmetic: the page number comes straight off the query
        // string and must not overflow the offset computation.
        let page = i64::from(query.page.unwrap_or(1).max(1));
        let page_size = i64::from(query.page_size.unwrap_or(10).clamp(1, 100));
        let offset = (page - 1) * page_size;

        let mut where_clauses = Vec::new();
        if query.threat_level.is_some() {
            where_clauses.push("threat_level = ?");
        }
        if query.begin_time.is_some() {
            where_clauses.push("occur_time >= ?");
        }
        if query.end_time.is_some() {
            where_clauses.push("occur_time <= ?");
        }
        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", where_clauses.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) AS n FROM potential_threat_alert{}", where_sql);
        let list_sql = format!(
            "SELECT * FROM potential_threat_alert{} ORDER BY create_time DESC, id DESC LIMIT ? OFFSET ?",
            where_sql
        );

        let pool = self.pool.clone();
        let query = query.clone();
        bounded(self.timeout, async move {
            let mut count = sqlx::query(&count_sql);
            let mut list = sqlx::query(&list_sql);
            if let Some(level) = query.threat_level {
                count = count.bind(level);
                list = list.bind(level);
            }
            if let Some(begin) = &query.begin_time {
                count = count.bind(begin.clone());
                list = list.bind(begin.clone());
            }
            if let Some(end) = &query.end_time {
                count = count.bind(end.clone());
                list = list.bind(end.clone());
            }

            let total: i64 = count.fetch_one(&pool).await?.try_get("n")?;
            let rows = list
                .bind(page_size)
                .bind(offset)
                .fetch_all(&pool)
                .await?;
            let records = rows
                .iter()
                .map(alert_from_row)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(PageResult { total, records })
        })
        .await
    }
}

fn alert_from_row(row: &SqliteRow) -> Result<StoredAlert, sqlx::Error> {
    Ok(StoredAlert {
        id: row.try_get("id")?,
        alert: Alert {
            threat_id: row.try_get("threat_id")?,
            threat_level: row.try_get("threat_level")?,
            impact_scope: row.try_get("impact_scope")?,
            occur_time: parse_stored_time(row, "occur_time")?,
            create_time: parse_stored_time(row, "create_time")?,
        },
    })
}

/// Append-only store for host telemetry snapshots. History is never
/// overwritten; queries only ever ask for the latest row per host.
#[derive(Clone)]
pub struct TelemetryStore {
    pool: Pool<Sqlite>,
    timeout: Duration,
}

impl TelemetryStore {
    pub fn new(pool: Pool<Sqlite>, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub async fn insert(&self, snapshot: &TelemetrySnapshot) -> AppResult<i64> {
        let pool = self.pool.clone();
        let snap = snapshot.clone();
        bounded(self.timeout, async move {
            let r = &snap.report;
            let result = sqlx::query(
                "INSERT INTO host_status_monitor \
                 (host_id, cpu_usage, memory_usage, disk_usage, network_conn, \
                  disk_info, file_status, memory_info, disk_partitions, \
                  cpu_model, cpu_cores, cpu_freq, memory_total_gb, memory_used_gb, \
                  disk_total_gb, disk_used_gb, disk_free_gb, monitor_time, create_time) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&r.host_id)
            .bind(r.cpu_usage)
            .bind(r.memory_usage)
            .bind(r.disk_usage)
            .bind(r.network_conn)
            .bind(&r.disk_info)
            .bind(&r.file_status)
            .bind(&r.memory_info)
            .bind(&r.disk_partitions)
            .bind(&r.cpu_model)
            .bind(r.cpu_cores)
            .bind(r.cpu_freq)
            .bind(r.memory_total_gb)
            .bind(r.memory_used_gb)
            .bind(r.disk_total_gb)
            .bind(r.disk_used_gb)
            .bind(r.disk_free_gb)
            .bind(timefmt::format(&r.monitor_time))
            .bind(timefmt::format(&snap.create_time))
            .execute(&pool)
            .await?;
            Ok(result.last_insert_rowid())
        })
        .await
    }

    /// Most recent snapshot for a host: greatest monitor_time, ingestion
    /// order breaking ties.
    pub async fn latest_for(&self, host_id: &str) -> AppResult<Option<TelemetrySnapshot>> {
        let pool = self.pool.clone();
        let host_id = host_id.to_string();
        bounded(self.timeout, async move {
            let row = sqlx::query(
                "SELECT * FROM host_status_monitor WHERE host_id = ? \
                 ORDER BY monitor_time DESC, create_time DESC, id DESC LIMIT 1",
            )
            .bind(&host_id)
            .fetch_optional(&pool)
            .await?;
            row.map(|r| snapshot_from_row(&r)).transpose()
        })
        .await
    }
}

fn snapshot_from_row(row: &SqliteRow) -> Result<TelemetrySnapshot, sqlx::Error> {
    Ok(TelemetrySnapshot {
        report: HostReport {
            host_id: row.try_get("host_id")?,
            cpu_usage: row.try_get("cpu_usage")?,
            memory_usage: row.try_get("memory_usage")?,
            disk_usage: row.try_get("disk_usage")?,
            network_conn: row.try_get("network_conn")?,
            disk_info: row.try_get("disk_info")?,
            file_status: row.try_get("file_status")?,
            memory_info: row.try_get("memory_info")?,
            disk_partitions: row.try_get("disk_partitions")?,
            cpu_model: row.try_get("cpu_model")?,
            cpu_cores: row.try_get("cpu_cores")?,
            cpu_freq: row.try_get("cpu_freq")?,
            memory_total_gb: row.try_get("memory_total_gb")?,
            memory_used_gb: row.try_get("memory_used_gb")?,
            disk_total_gb: row.try_get("disk_total_gb")?,
            disk_used_gb: row.try_get("disk_used_gb")?,
            disk_free_gb: row.try_get("disk_free_gb")?,
            monitor_time: parse_stored_time(row, "monitor_time")?,
        },
        create_time: parse_stored_time(row, "create_time")?,
    })
}
