use std::future::Future;
use std::time::Duration;

use common::{RetryPolicy, with_retry};
use sea_orm::sea_query::{Index, PostgresQueryBuilder};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::error::AppError;
use crate::entity::{restaurant, review};

/// Message fragments of driver errors that are expected to clear up on retry.
const TRANSIENT_MARKERS: &[&str] = &[
    "timed out",
    "timeout",
    "connection refused",
    "connection reset",
    "broken pipe",
    "pool closed",
];

/// Whether a store error is a transient connection or timeout failure.
///
/// Constraint violations, missing records and every other error are
/// permanent and must not be retried.
pub fn is_transient(err: &DbErr) -> bool {
    if err.sql_err().is_some() {
        return false;
    }
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(e) | DbErr::Query(e) => {
            let msg = e.to_string().to_lowercase();
            TRANSIENT_MARKERS.iter().any(|m| msg.contains(m))
        }
        _ => false,
    }
}

/// Run a store operation through the retry wrapper, retrying transient failures only.
pub async fn retry_db<T, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, DbErr>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    with_retry(policy, is_transient, operation).await
}

/// Run a handler-level operation through the retry wrapper.
///
/// Only [`AppError::ServiceUnavailable`], the mapping of transient store
/// errors, is retried.
pub async fn retry_app<T, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    with_retry(policy, AppError::is_transient, operation).await
}

pub async fn init_db(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.url.to_owned());

    let timeout = Duration::from_secs(config.connect_timeout_secs);
    opt.max_connections(config.max_connections)
        .min_connections(0)
        .connect_timeout(timeout)
        .acquire_timeout(timeout)
        .idle_timeout(Duration::from_secs(10))
        .sqlx_logging(config.sqlx_logging);

    // Constant delay between startup attempts.
    let policy = RetryPolicy {
        max_attempts: config.connect_attempts,
        initial_delay_ms: config.connect_delay_ms,
        backoff_factor: 1.0,
    };
    let db = with_retry(
        &policy,
        |_: &DbErr| true,
        || Database::connect(opt.clone()),
    )
    .await?;
    info!("Database connection established");

    db.get_schema_registry("tasterank_server::entity::*")
        .sync(&db)
        .await?;

    Ok(db)
}

/// Ensure the supporting indexes of the listing and rating queries exist.
///
/// SeaORM's schema-sync doesn't support composite non-unique indexes,
/// so we create them manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Listing: WHERE active = true [AND category = ?] ORDER BY average_rating DESC
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_restaurant_active_rating")
        .table(restaurant::Entity)
        .col(restaurant::Column::Active)
        .col(restaurant::Column::AverageRating)
        .to_string(PostgresQueryBuilder);
    create_index(db, "idx_restaurant_active_rating", &stmt).await;

    // Per-restaurant review pages: WHERE restaurant_id = ? ORDER BY created_at DESC
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_review_restaurant_created")
        .table(review::Entity)
        .col(review::Column::RestaurantId)
        .col(review::Column::CreatedAt)
        .to_string(PostgresQueryBuilder);
    create_index(db, "idx_review_restaurant_created", &stmt).await;

    Ok(())
}

async fn create_index(db: &DatabaseConnection, name: &str, stmt: &str) {
    match db.execute_unprepared(stmt).await {
        Ok(_) => info!("Ensured index {} exists", name),
        Err(e) => warn!("Failed to create index {}: {}", name, e),
    }
}
