use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use thiserror::Error;

/// Response envelope every endpoint returns, matching what the dashboard
/// frontend expects: `code` 1 on success, 0 on failure.
#[derive(Debug, Serialize)]
pub struct ApiResult<T: Serialize> {
    pub code: i32,
    pub msg: Option<String>,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResult<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            code: 1,
            msg: None,
            data: Some(data),
        })
    }

    pub fn error(msg: impl Into<String>) -> Json<Self> {
        Json(Self {
            code: 0,
            msg: Some(msg.into()),
            data: None,
        })
    }
}

/// Failures that surface to a caller. Per-subscriber delivery errors are
/// deliberately absent: they are handled inside the alert hub and a sensor
/// only ever learns whether its payload was durably recorded.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid payload: {0}")]
    Format(String),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("cannot reach AI agent service: {0}")]
    UpstreamUnreachable(String),

    #[error("AI agent rejected the request: {0}")]
    UpstreamRejected(String),

    #[error("AI analysis request failed: {0}")]
    UpstreamFailed(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Format(_) => StatusCode::BAD_REQUEST,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            AppError::UpstreamRejected(_) => StatusCode::BAD_GATEWAY,
            AppError::UpstreamFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Persistence(err.to_string())
    }
}

impl From<vigil_core::FormatError> for AppError {
    fn from(err: vigil_core::FormatError) -> Self {
        AppError::Format(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            AppError::Format(_) => tracing::warn!("{}", self),
            _ => tracing::error!("{}", self),
        }
        (status, ApiResult::<()>::error(self.to_string())).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Format("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Persistence("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::UpstreamUnreachable("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_envelope_shape() {
        let ok = ApiResult::success(serde_json::json!({"k": "v"}));
        let v = serde_json::to_value(&ok.0).unwrap();
        assert_eq!(v["code"], 1);

        let err = ApiResult::<()>::error("boom");
        let v = serde_json::to_value(&err.0).unwrap();
        assert_eq!(v["code"], 0);
        assert_eq!(v["msg"], "boom");
    }
}
