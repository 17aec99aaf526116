//! Format discovery handler.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use reclip_models::FormatsResponse;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FormatsQuery {
    pub url: String,
}

/// Video formats available for `url`. An empty list means none could be
/// discovered, not an error.
pub async fn get_formats(
    State(state): State<AppState>,
    Query(query): Query<FormatsQuery>,
) -> ApiResult<Json<FormatsResponse>> {
    let url = query.url.trim();
    if url.is_empty() {
        return Err(ApiError::bad_request("url must not be empty"));
    }

    Ok(Json(state.discovery.formats_response(url).await))
}
