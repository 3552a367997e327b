//! HTTP handlers for the server.

pub mod auth;
pub mod labels;
pub mod records;
pub mod settings;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::LabelError;

/// A [`LabelError`] as a JSON error response.
#[derive(Debug)]
pub struct ApiError(pub LabelError);

impl From<LabelError> for ApiError {
    fn from(e: LabelError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LabelError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            LabelError::Encoding(_) | LabelError::Config(_) => StatusCode::BAD_REQUEST,
            LabelError::DeviceUnavailable { .. } => StatusCode::NOT_FOUND,
            LabelError::Connectivity(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(json!({"success": false, "error": self.0.to_string()})),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Run blocking work (store reads, rendering, printing) off the runtime.
pub async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, LabelError> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(ApiError),
        Err(e) => Err(ApiError(LabelError::Task(e.to_string()))),
    }
}
