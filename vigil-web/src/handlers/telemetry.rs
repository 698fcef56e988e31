use axum::extract::{Query, State};
use axum::response::Json;
use chrono::Local;
use serde::Deserialize;
use tracing::info;

use crate::error::{ApiResult, AppError, AppResult};
use crate::AppState;
use vigil_core::{HostReport, TelemetrySnapshot};

/// Host telemetry ingestion. One known schema; `hostId` and `monitorTime`
/// are mandatory, every other field may be omitted and is stored as absent
/// (a host reporting 0 connections is not the same as one reporting nothing).
pub async fn receive_report(
    State(state): State<AppState>,
    Json(raw): Json<serde_json::Value>,
) -> AppResult<Json<ApiResult<String>>> {
    let report: HostReport =
        serde_json::from_value(raw).map_err(|e| AppError::Format(e.to_string()))?;

    info!(host_id = %report.host_id, "received host telemetry report");

    let snapshot = TelemetrySnapshot::from_report(report, Local::now().naive_local());
    state.telemetry_store.insert(&snapshot).await?;

    Ok(ApiResult::success("Report received".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    #[serde(rename = "hostId")]
    pub host_id: String,
}

/// Latest snapshot for a host, or empty data when none has been recorded.
pub async fn latest_for_host(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
) -> AppResult<Json<ApiResult<Option<TelemetrySnapshot>>>> {
    let snapshot = state.telemetry_store.latest_for(&query.host_id).await?;
    Ok(ApiResult::success(snapshot))
}
