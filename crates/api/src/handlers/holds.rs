//! Read-only views of the active hold set.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/holds
///
/// Every active hold, sorted by unit id. Connection ids are not exposed.
pub async fn list_holds(State(state): State<AppState>) -> impl IntoResponse {
    Json(DataResponse {
        data: state.coordinator.snapshot().await,
    })
}

/// GET /api/v1/holds/{unit_id}
pub async fn get_hold(
    State(state): State<AppState>,
    Path(unit_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let Some(hold) = state.coordinator.hold(&unit_id).await else {
        return Err(AppError::HoldNotFound(unit_id));
    };

    Ok(Json(DataResponse { data: hold }))
}
