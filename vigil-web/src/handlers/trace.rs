use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::error::{ApiResult, AppError, AppResult};
use crate::AppState;

const DEFAULT_TOP_K: i64 = 3;

#[derive(Debug, Deserialize)]
pub struct TraceRequest {
    pub question: Option<String>,
    pub top_k: Option<i64>,
}

/// Reverse proxy to the external AI root-cause agent. The agent response is
/// passed through untouched; this layer only owns timeouts and turning the
/// three upstream failure classes into distinguishable envelopes.
pub async fn ai_trace(
    State(state): State<AppState>,
    Json(request): Json<TraceRequest>,
) -> AppResult<Json<ApiResult<serde_json::Value>>> {
    let top_k = request.top_k.unwrap_or(DEFAULT_TOP_K);
    info!(?request.question, top_k, "forwarding AI trace request");

    let response = state
        .http_client
        .post(&state.config.ai_agent_url)
        .json(&json!({
            "question": request.question,
            "top_k": top_k,
        }))
        .send()
        .await
        .map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                AppError::UpstreamUnreachable(e.to_string())
            } else {
                AppError::UpstreamFailed(e.to_string())
            }
        })?;

    let status = response.status();
    if status.is_client_error() {
        error!(%status, "AI agent rejected the trace request");
        return Err(AppError::UpstreamRejected(format!("HTTP {}", status)));
    }
    if !status.is_success() {
        error!(%status, "AI agent trace request failed");
        return Err(AppError::UpstreamFailed(format!("HTTP {}", status)));
    }

    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| AppError::UpstreamFailed(e.to_string()))?;

    Ok(ApiResult::success(body))
}
