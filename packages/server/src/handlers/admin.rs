use axum::Json;
use axum::extract::{Path, State};
use tracing::{info, instrument};

use crate::error::{AppError, ErrorBody};
use crate::models::admin::{RecomputeAllResponse, RecomputeResponse};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/ratings/recompute",
    tag = "Admin",
    operation_id = "recomputeAllRatings",
    summary = "Recompute every active restaurant's average",
    description = "Rebuilds `average_rating` of all active restaurants from their reviews, one restaurant at a time. Restaurants whose recomputation fails are logged and skipped.",
    responses(
        (status = 200, description = "Recomputation finished", body = RecomputeAllResponse),
        (status = 503, description = "Database unavailable (SERVICE_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn recompute_all(
    State(state): State<AppState>,
) -> Result<Json<RecomputeAllResponse>, AppError> {
    let processed = state.ratings.recompute_all().await?;
    state.listings.invalidate();

    info!(processed, "Bulk recomputation requested");
    Ok(Json(RecomputeAllResponse { processed }))
}

#[utoipa::path(
    post,
    path = "/ratings/recompute/{id}",
    tag = "Admin",
    operation_id = "recomputeRating",
    summary = "Recompute one restaurant's average",
    params(("id" = i32, Path, description = "Restaurant ID")),
    responses(
        (status = 200, description = "New average", body = RecomputeResponse),
        (status = 404, description = "Restaurant not found (NOT_FOUND)", body = ErrorBody),
        (status = 503, description = "Database unavailable (SERVICE_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn recompute_one(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<RecomputeResponse>, AppError> {
    let average_rating = state
        .ratings
        .recompute(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Restaurant not found".into()))?;
    state.listings.invalidate();

    Ok(Json(RecomputeResponse {
        restaurant_id: id,
        average_rating,
    }))
}
