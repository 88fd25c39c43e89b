pub mod collector;
pub mod emitter;
pub mod load;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pool_statsd::ConfigError;
use thiserror::Error;

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    /// The new emitter settings were refused; the old ones stay in force
    #[error("emitter settings rejected: {0}")]
    Config(#[from] ConfigError),

    #[error("no {0}")]
    NotFound(String),

    #[error("Load run already in progress")]
    AlreadyRunning,

    #[error("interceptor has no emitter")]
    NotConfigured,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::BadRequest(_) | Self::Config(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyRunning => StatusCode::CONFLICT,
            Self::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = serde_json::json!({
            "error":  self.to_string(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
