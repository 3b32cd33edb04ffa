//! Error responses for the coordinator's HTTP surface.
//!
//! Every error renders as `{ "error": <message>, "code": <CODE> }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use holdmap_core::types::UnitId;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The unit has no live hold.
    #[error("No active hold on unit {0}")]
    HoldNotFound(UnitId),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// HTTP status and machine-readable code.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::HoldNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = json!({ "error": self.to_string(), "code": code });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_hold_maps_to_404() {
        let err = AppError::HoldNotFound("U-9".into());
        assert_eq!(err.status_and_code(), (StatusCode::NOT_FOUND, "NOT_FOUND"));
        assert_eq!(err.to_string(), "No active hold on unit U-9");
    }

    #[test]
    fn missing_hold_renders_404_response() {
        let response = AppError::HoldNotFound("U-9".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
