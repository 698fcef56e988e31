use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::timefmt;

/// One host-telemetry report as posted by a monitoring agent. Everything but
/// `hostId` and `monitorTime` is optional: agents on constrained hosts skip
/// fields they cannot measure, and "not reported" must stay distinguishable
/// from a measured zero (0 open connections is a real reading).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostReport {
    pub host_id: String,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub disk_usage: Option<f64>,
    pub network_conn: Option<i64>,
    pub disk_info: Option<String>,
    pub file_status: Option<String>,
    pub memory_info: Option<String>,
    pub disk_partitions: Option<String>,
    pub cpu_model: Option<String>,
    pub cpu_cores: Option<i64>,
    pub cpu_freq: Option<f64>,
    pub memory_total_gb: Option<f64>,
    pub memory_used_gb: Option<f64>,
    pub disk_total_gb: Option<i64>,
    pub disk_used_gb: Option<i64>,
    pub disk_free_gb: Option<i64>,
    #[serde(with = "timefmt::wire")]
    pub monitor_time: NaiveDateTime,
}

/// A persisted snapshot: the report plus the ingestion timestamp. Snapshots
/// are append-only; "latest for host X" is the greatest
/// `(monitor_time, create_time)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    #[serde(flatten)]
    pub report: HostReport,
    #[serde(with = "timefmt::wire")]
    pub create_time: NaiveDateTime,
}

impl TelemetrySnapshot {
    pub fn from_report(report: HostReport, ingested_at: NaiveDateTime) -> Self {
        Self {
            report,
            create_time: ingested_at,
        }
    }
}
