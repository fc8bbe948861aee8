use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use sea_orm::ConnectionTrait;
use tracing::{error, instrument};

use crate::models::admin::{DatabaseHealthResponse, HealthResponse};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Health",
    operation_id = "health",
    summary = "Liveness probe",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse),
    ),
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

#[utoipa::path(
    get,
    path = "/database",
    tag = "Health",
    operation_id = "databaseHealth",
    summary = "Database connectivity probe",
    description = "Runs `SELECT 1` against the database.",
    responses(
        (status = 200, description = "Database reachable", body = DatabaseHealthResponse),
        (status = 503, description = "Database unreachable", body = DatabaseHealthResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn database_health(
    State(state): State<AppState>,
) -> (StatusCode, Json<DatabaseHealthResponse>) {
    match state.db.execute_unprepared("SELECT 1").await {
        Ok(_) => (
            StatusCode::OK,
            Json(DatabaseHealthResponse {
                status: "healthy",
                error: None,
            }),
        ),
        Err(e) => {
            error!(error = %e, "Database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(DatabaseHealthResponse {
                    status: "unhealthy",
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}
