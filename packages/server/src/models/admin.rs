use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct RecomputeAllResponse {
    /// Active restaurants whose average was rewritten.
    #[schema(example = 12)]
    pub processed: usize,
}

#[derive(Serialize, ToSchema)]
pub struct RecomputeResponse {
    pub restaurant_id: i32,
    #[schema(value_type = String, example = "4.25")]
    pub average_rating: Decimal,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    /// Seconds since the server started.
    pub uptime_secs: u64,
}

#[derive(Serialize, ToSchema)]
pub struct DatabaseHealthResponse {
    /// `healthy` or `unhealthy`.
    #[schema(example = "healthy")]
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
