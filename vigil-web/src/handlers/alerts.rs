use axum::extract::{Path, Query, State};
use axum::response::Json;
use chrono::Local;
use tracing::info;

use crate::error::{ApiResult, AppResult};
use crate::store::{AlertPageQuery, PageResult, StoredAlert};
use crate::AppState;
use vigil_core::InboundAlert;

/// Alert ingestion gateway: normalize, persist, then fan out.
///
/// Persistence is the durability contract. An alert that cannot be stored
/// is never shown to live subscribers, and a delivery problem never changes
/// the acknowledgment the sensor receives.
pub async fn receive_alert(
    State(state): State<AppState>,
    Json(raw): Json<serde_json::Value>,
) -> AppResult<Json<ApiResult<String>>> {
    let inbound = InboundAlert::decode(raw)?;
    let alert = inbound.normalize(Local::now().naive_local());

    info!(
        threat_id = %alert.threat_id,
        threat_level = alert.threat_level,
        "received IDS alert"
    );

    // Store first; broadcast only an alert that exists in the system of record.
    state.alert_store.insert(&alert).await?;
    state.alert_hub.broadcast(&alert);

    Ok(ApiResult::success("Alert received and processed".to_string()))
}

/// Paginated threat alert listing with optional level/time filters.
pub async fn query_alert_page(
    State(state): State<AppState>,
    Query(query): Query<AlertPageQuery>,
) -> AppResult<Json<ApiResult<PageResult<StoredAlert>>>> {
    let page = state.alert_store.page(&query).await?;
    Ok(ApiResult::success(page))
}

/// Single alert detail by row id.
pub async fn query_alert_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResult<Option<StoredAlert>>>> {
    let alert = state.alert_store.find_by_id(id).await?;
    Ok(ApiResult::success(alert))
}
