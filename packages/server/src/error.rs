use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::ParseCategoryError;
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;

use crate::database::is_transient;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `NOT_FOUND`,
    /// `CONFLICT`, `SERVICE_UNAVAILABLE`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Rating must be between 1 and 5")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// Business-rule violation, e.g. reviewing an inactive restaurant.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The database stayed unreachable after all retry attempts.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the failure came from a transient store error.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::ServiceUnavailable(_))
    }

    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "CONFLICT",
                    message: msg,
                },
            ),
            AppError::ServiceUnavailable(detail) => {
                tracing::error!("Database unavailable: {}", detail);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody {
                        code: "SERVICE_UNAVAILABLE",
                        message: "Service temporarily unavailable, please try again shortly"
                            .into(),
                    },
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        if is_transient(&err) {
            return AppError::ServiceUnavailable(err.to_string());
        }
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                tracing::warn!("Unique constraint violation: {detail}");
                AppError::Conflict("Record already exists".into())
            }
            Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
                tracing::warn!("Foreign key violation: {detail}");
                AppError::Conflict("Referenced record does not exist or is still in use".into())
            }
            _ => match err {
                DbErr::RecordNotFound(msg) => AppError::NotFound(msg),
                other => AppError::Internal(other.to_string()),
            },
        }
    }
}

impl From<ParseCategoryError> for AppError {
    fn from(err: ParseCategoryError) -> Self {
        AppError::Validation(err.to_string())
    }
}
