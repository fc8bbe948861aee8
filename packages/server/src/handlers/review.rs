use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::Func;
use sea_orm::*;
use tracing::{info, instrument};

use crate::database::{retry_app, retry_db};
use crate::entity::{restaurant, review};
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::handlers::restaurant::{find_restaurant, find_restaurant_for_update};
use crate::models::review::*;
use crate::models::shared::{normalize_optional, page_offset, resolve_page};
use crate::rating::average_rating;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/{id}/reviews",
    tag = "Reviews",
    operation_id = "createReview",
    summary = "Review a restaurant",
    description = "Adds a review and recomputes the restaurant's average rating before responding. An author may review a restaurant only once. Inactive restaurants cannot be reviewed.",
    params(("id" = i32, Path, description = "Restaurant ID")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ReviewWriteResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Restaurant not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Restaurant inactive or author already reviewed it (CONFLICT)", body = ErrorBody),
        (status = 503, description = "Database unavailable (SERVICE_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(restaurant_id = id))]
pub async fn create_review(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<CreateReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_review(&payload)?;

    let db = &state.db;
    let payload = &payload;
    let model = retry_app(&state.config.retry, move || insert_review(db, id, payload)).await?;
    info!(review_id = model.id, rating = model.rating, "Review created");

    let average = state.ratings.refresh_after_review_write(id).await?;
    state.listings.invalidate();

    Ok((
        StatusCode::CREATED,
        Json(ReviewWriteResponse {
            review: model.into(),
            average_rating: average.unwrap_or_else(|| average_rating(&[])),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/{id}/reviews",
    tag = "Reviews",
    operation_id = "listRestaurantReviews",
    summary = "List the reviews of a restaurant",
    description = "Newest first. `min_rating` keeps reviews rated at least that value.",
    params(("id" = i32, Path, description = "Restaurant ID"), RestaurantReviewsQuery),
    responses(
        (status = 200, description = "Page of reviews", body = RestaurantReviewListResponse),
        (status = 400, description = "Invalid query parameter (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Restaurant not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query), fields(restaurant_id = id))]
pub async fn list_restaurant_reviews(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<RestaurantReviewsQuery>,
) -> Result<Json<RestaurantReviewListResponse>, AppError> {
    let (page, limit) = resolve_page(
        query.page,
        query.limit,
        DEFAULT_RESTAURANT_REVIEWS_LIMIT,
        MAX_REVIEWS_LIMIT,
    )?;
    if let Some(min) = query.min_rating {
        validate_rating(min, "min_rating")?;
    }

    let restaurant = find_restaurant(&state.db, id).await?;

    let mut select = review::Entity::find().filter(review::Column::RestaurantId.eq(id));
    if let Some(min) = query.min_rating {
        select = select.filter(review::Column::Rating.gte(min));
    }

    let total = select.clone().count(&state.db).await?;
    let items = select
        .order_by_desc(review::Column::CreatedAt)
        .order_by_desc(review::Column::Id)
        .offset(Some(page_offset(page, limit)))
        .limit(Some(limit))
        .all(&state.db)
        .await?
        .into_iter()
        .map(ReviewResponse::from)
        .collect();

    Ok(Json(RestaurantReviewListResponse {
        restaurant: RestaurantRef {
            id: restaurant.id,
            name: restaurant.name,
        },
        total,
        total_pages: total.div_ceil(limit),
        page,
        limit,
        items,
    }))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Reviews",
    operation_id = "listReviews",
    summary = "List all reviews",
    description = "Reviews of every restaurant, newest first, each with a summary of its restaurant.",
    params(ReviewListQuery),
    responses(
        (status = 200, description = "Page of reviews", body = ReviewListResponse),
        (status = 400, description = "Invalid query parameter (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(query): Query<ReviewListQuery>,
) -> Result<Json<ReviewListResponse>, AppError> {
    let (page, limit) = resolve_page(
        query.page,
        query.limit,
        DEFAULT_ALL_REVIEWS_LIMIT,
        MAX_REVIEWS_LIMIT,
    )?;

    let total = review::Entity::find().count(&state.db).await?;

    let rows = review::Entity::find()
        .find_also_related(restaurant::Entity)
        .order_by_desc(review::Column::CreatedAt)
        .order_by_desc(review::Column::Id)
        .offset(Some(page_offset(page, limit)))
        .limit(Some(limit))
        .all(&state.db)
        .await?;

    let items = rows
        .into_iter()
        .filter_map(|(review, restaurant)| {
            restaurant.map(|r| ReviewWithRestaurant {
                review: review.into(),
                restaurant: summary(r),
            })
        })
        .collect();

    Ok(Json(ReviewListResponse {
        total,
        total_pages: total.div_ceil(limit),
        page,
        limit,
        items,
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Reviews",
    operation_id = "getReview",
    summary = "Get a review by ID",
    params(("id" = i32, Path, description = "Review ID")),
    responses(
        (status = 200, description = "Review with its restaurant", body = ReviewWithRestaurant),
        (status = 404, description = "Review not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ReviewWithRestaurant>, AppError> {
    let (review, restaurant) = review::Entity::find_by_id(id)
        .find_also_related(restaurant::Entity)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".into()))?;
    let restaurant =
        restaurant.ok_or_else(|| AppError::Internal(format!("Review {id} has no restaurant")))?;

    Ok(Json(ReviewWithRestaurant {
        review: review.into(),
        restaurant: summary(restaurant),
    }))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Reviews",
    operation_id = "updateReview",
    summary = "Update a review",
    description = "Changes the rating and/or the comment (`null` clears it). The restaurant's average is recomputed only when the rating changes.",
    params(("id" = i32, Path, description = "Review ID")),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Review updated", body = ReviewWriteResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Review not found (NOT_FOUND)", body = ErrorBody),
        (status = 503, description = "Database unavailable (SERVICE_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(id))]
pub async fn update_review(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateReviewRequest>,
) -> Result<Json<ReviewWriteResponse>, AppError> {
    validate_update_review(&payload)?;

    let db = &state.db;
    let payload = &payload;
    let (model, rating_changed) =
        retry_app(&state.config.retry, move || apply_review_update(db, id, payload)).await?;

    let average = if rating_changed {
        let average = state
            .ratings
            .refresh_after_review_write(model.restaurant_id)
            .await?;
        state.listings.invalidate();
        average
    } else {
        let store = state.ratings.store();
        retry_db(&state.config.retry, || store.find_restaurant(model.restaurant_id))
            .await?
            .map(|r| r.average_rating)
    };

    Ok(Json(ReviewWriteResponse {
        review: model.into(),
        average_rating: average.unwrap_or_else(|| average_rating(&[])),
    }))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Reviews",
    operation_id = "deleteReview",
    summary = "Delete a review",
    description = "Deletes the review and recomputes the restaurant's average rating before responding.",
    params(("id" = i32, Path, description = "Review ID")),
    responses(
        (status = 200, description = "Review deleted, new average returned", body = ReviewDeleteResponse),
        (status = 404, description = "Review not found (NOT_FOUND)", body = ErrorBody),
        (status = 503, description = "Database unavailable (SERVICE_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn delete_review(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ReviewDeleteResponse>, AppError> {
    let db = &state.db;
    let restaurant_id = retry_app(&state.config.retry, move || remove_review(db, id)).await?;
    info!(restaurant_id, "Review deleted");

    let average = state.ratings.refresh_after_review_write(restaurant_id).await?;
    state.listings.invalidate();

    Ok(Json(ReviewDeleteResponse {
        average_rating: average.unwrap_or_else(|| average_rating(&[])),
    }))
}

fn summary(r: restaurant::Model) -> RestaurantSummary {
    RestaurantSummary {
        id: r.id,
        name: r.name,
        category: r.category,
    }
}

async fn insert_review(
    db: &DatabaseConnection,
    restaurant_id: i32,
    payload: &CreateReviewRequest,
) -> Result<review::Model, AppError> {
    let author = payload.author.trim().to_string();
    let txn = db.begin().await?;

    let restaurant = find_restaurant_for_update(&txn, restaurant_id).await?;
    if !restaurant.active {
        return Err(AppError::Conflict(
            "Cannot review an inactive restaurant".into(),
        ));
    }

    let duplicates = review::Entity::find()
        .filter(review::Column::RestaurantId.eq(restaurant_id))
        .filter(Expr::expr(Func::lower(Expr::col(review::Column::Author))).eq(author.to_lowercase()))
        .count(&txn)
        .await?;
    if duplicates > 0 {
        return Err(AppError::Conflict(
            "This author has already reviewed this restaurant".into(),
        ));
    }

    let now = Utc::now();
    let new_review = review::ActiveModel {
        rating: Set(payload.rating),
        comment: Set(normalize_optional(payload.comment.clone())),
        author: Set(author),
        restaurant_id: Set(restaurant_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let model = new_review.insert(&txn).await?;

    txn.commit().await?;
    Ok(model)
}

/// Apply a review update. Returns the saved review and whether its rating changed.
async fn apply_review_update(
    db: &DatabaseConnection,
    id: i32,
    payload: &UpdateReviewRequest,
) -> Result<(review::Model, bool), AppError> {
    let existing = find_review(db, id).await?;
    if *payload == UpdateReviewRequest::default() {
        return Ok((existing, false));
    }

    let rating_changed = payload.rating.is_some_and(|r| r != existing.rating);
    let mut active: review::ActiveModel = existing.into();
    if let Some(rating) = payload.rating {
        active.rating = Set(rating);
    }
    if let Some(ref comment) = payload.comment {
        active.comment = Set(normalize_optional(comment.clone()));
    }
    active.updated_at = Set(Utc::now());

    let model = active.update(db).await?;
    Ok((model, rating_changed))
}

/// Delete a review. Returns the id of the restaurant it belonged to.
async fn remove_review(db: &DatabaseConnection, id: i32) -> Result<i32, AppError> {
    let existing = find_review(db, id).await?;
    let result = review::Entity::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Review not found".into()));
    }
    Ok(existing.restaurant_id)
}

async fn find_review<C: ConnectionTrait>(db: &C, id: i32) -> Result<review::Model, AppError> {
    review::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".into()))
}

