//! Tag listing.

use axum::extract::State;
use axum::Json;

use crate::error::ApiResult;
use crate::state::AppState;

/// Sorted unique tags across all videos.
pub async fn list_tags(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.jobs.list_tags().await?))
}
