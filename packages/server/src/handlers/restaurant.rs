use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use common::Category;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr, LockType};
use sea_orm::*;
use tracing::{info, instrument};

use crate::database::retry_app;
use crate::entity::{restaurant, review};
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::restaurant::*;
use crate::models::review::ReviewResponse;
use crate::models::shared::{normalize_optional, page_offset};
use crate::rating::{average_rating, count_reviews};
use crate::state::AppState;

/// Trimmed, validated column values of a restaurant write.
#[derive(Clone)]
struct RestaurantFields {
    name: String,
    category: Category,
    address: Option<String>,
    phone: Option<String>,
    description: Option<String>,
}

impl From<RestaurantRequest> for RestaurantFields {
    fn from(req: RestaurantRequest) -> Self {
        Self {
            name: req.name.trim().to_string(),
            category: req.category,
            address: normalize_optional(req.address),
            phone: normalize_optional(req.phone),
            description: normalize_optional(req.description),
        }
    }
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Restaurants",
    operation_id = "createRestaurant",
    summary = "Create a restaurant",
    description = "Creates an active restaurant with an average rating of 0.00. Returns 409 CONFLICT if an active restaurant with the same name and address already exists.",
    request_body = RestaurantRequest,
    responses(
        (status = 201, description = "Restaurant created", body = RestaurantResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Duplicate restaurant (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(name = %payload.name))]
pub async fn create_restaurant(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RestaurantRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_restaurant(&payload)?;
    let fields = RestaurantFields::from(payload);

    let db = &state.db;
    let fields = &fields;
    let model = retry_app(&state.config.retry, move || insert_restaurant(db, fields)).await?;
    state.listings.invalidate();

    info!(id = model.id, "Restaurant created");
    Ok((StatusCode::CREATED, Json(RestaurantResponse::from(model))))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Restaurants",
    operation_id = "listRestaurants",
    summary = "List active restaurants",
    description = "Returns a page of active restaurants, optionally filtered by category and a case-insensitive name search. Ordered by `average_rating desc` unless `sort`/`direction` are given. Responses are cached per normalized query.",
    params(RestaurantListQuery),
    responses(
        (status = 200, description = "Page of restaurants", body = RestaurantListResponse),
        (status = 400, description = "Invalid query parameter (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_restaurants(
    State(state): State<AppState>,
    Query(query): Query<RestaurantListQuery>,
) -> Result<Json<RestaurantListResponse>, AppError> {
    let query = query.normalize()?;
    let response = state
        .listings
        .cached_list(&query, || load_listing(&state.db, &query))
        .await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/stats",
    tag = "Restaurants",
    operation_id = "getRestaurantStats",
    summary = "Restaurant and review counts",
    description = "Counts active restaurants, the reviews of active restaurants, and active restaurants per category.",
    responses(
        (status = 200, description = "Statistics", body = RestaurantStatsResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<RestaurantStatsResponse>, AppError> {
    let active = restaurant::Entity::find().filter(restaurant::Column::Active.eq(true));

    let total_restaurants = active.clone().count(&state.db).await?;

    let total_reviews = review::Entity::find()
        .inner_join(restaurant::Entity)
        .filter(restaurant::Column::Active.eq(true))
        .count(&state.db)
        .await?;

    let by_category = active
        .select_only()
        .column(restaurant::Column::Category)
        .column_as(restaurant::Column::Id.count(), "total")
        .group_by(restaurant::Column::Category)
        .order_by_asc(restaurant::Column::Category)
        .into_model::<CategoryCount>()
        .all(&state.db)
        .await?;

    Ok(Json(RestaurantStatsResponse {
        total_restaurants,
        total_reviews,
        by_category,
    }))
}

#[utoipa::path(
    get,
    path = "/top-rated",
    tag = "Restaurants",
    operation_id = "listTopRatedRestaurants",
    summary = "Best rated active restaurants",
    params(TopRatedQuery),
    responses(
        (status = 200, description = "Restaurants by average rating, best first", body = TopRatedResponse),
        (status = 400, description = "Invalid limit (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn top_rated(
    State(state): State<AppState>,
    Query(query): Query<TopRatedQuery>,
) -> Result<Json<TopRatedResponse>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_RATED_LIMIT);
    if !(1..=MAX_TOP_RATED_LIMIT).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_TOP_RATED_LIMIT}"
        )));
    }

    let items = restaurant::Entity::find()
        .filter(restaurant::Column::Active.eq(true))
        .order_by_desc(restaurant::Column::AverageRating)
        .order_by_asc(restaurant::Column::Id)
        .limit(Some(limit))
        .all(&state.db)
        .await?
        .into_iter()
        .map(RestaurantResponse::from)
        .collect();

    Ok(Json(TopRatedResponse { items }))
}

#[utoipa::path(
    get,
    path = "/category/{category}",
    tag = "Restaurants",
    operation_id = "listRestaurantsByCategory",
    summary = "Active restaurants of one category",
    params(("category" = Category, Path, description = "Restaurant category")),
    responses(
        (status = 200, description = "Restaurants, best rated first", body = CategoryRestaurantsResponse),
        (status = 400, description = "Unknown category (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn list_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<CategoryRestaurantsResponse>, AppError> {
    let category: Category = category.parse()?;

    let items: Vec<RestaurantResponse> = restaurant::Entity::find()
        .filter(restaurant::Column::Active.eq(true))
        .filter(restaurant::Column::Category.eq(category))
        .order_by_desc(restaurant::Column::AverageRating)
        .order_by_asc(restaurant::Column::Id)
        .all(&state.db)
        .await?
        .into_iter()
        .map(RestaurantResponse::from)
        .collect();

    Ok(Json(CategoryRestaurantsResponse {
        category,
        total: items.len(),
        items,
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Restaurants",
    operation_id = "getRestaurant",
    summary = "Get a restaurant by ID",
    description = "Returns the restaurant, active or not, with its 10 most recent reviews.",
    params(("id" = i32, Path, description = "Restaurant ID")),
    responses(
        (status = 200, description = "Restaurant details", body = RestaurantDetailResponse),
        (status = 404, description = "Restaurant not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn get_restaurant(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<RestaurantDetailResponse>, AppError> {
    let model = find_restaurant(&state.db, id).await?;

    let reviews = review::Entity::find()
        .filter(review::Column::RestaurantId.eq(id))
        .order_by_desc(review::Column::CreatedAt)
        .order_by_desc(review::Column::Id)
        .limit(Some(DETAIL_REVIEW_COUNT))
        .all(&state.db)
        .await?
        .into_iter()
        .map(ReviewResponse::from)
        .collect();

    Ok(Json(RestaurantDetailResponse {
        restaurant: model.into(),
        reviews,
    }))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Restaurants",
    operation_id = "replaceRestaurant",
    summary = "Replace a restaurant",
    description = "Overwrites every editable field. Optional fields that are absent are cleared. The average rating and active flag are not editable.",
    params(("id" = i32, Path, description = "Restaurant ID")),
    request_body = RestaurantRequest,
    responses(
        (status = 200, description = "Restaurant updated", body = RestaurantResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Restaurant not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Duplicate restaurant (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(id))]
pub async fn replace_restaurant(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<RestaurantRequest>,
) -> Result<Json<RestaurantResponse>, AppError> {
    validate_restaurant(&payload)?;
    let fields = RestaurantFields::from(payload);

    let db = &state.db;
    let fields = &fields;
    let model = retry_app(&state.config.retry, move || {
        write_restaurant(db, id, move |_| fields.clone())
    })
    .await?;
    state.listings.invalidate();

    Ok(Json(model.into()))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Restaurants",
    operation_id = "updateRestaurant",
    summary = "Partially update a restaurant",
    description = "Only provided fields are modified; `null` clears address, phone or description. An empty payload returns the current resource unchanged.",
    params(("id" = i32, Path, description = "Restaurant ID")),
    request_body = UpdateRestaurantRequest,
    responses(
        (status = 200, description = "Restaurant updated", body = RestaurantResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Restaurant not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Duplicate restaurant (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(id))]
pub async fn update_restaurant(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateRestaurantRequest>,
) -> Result<Json<RestaurantResponse>, AppError> {
    validate_update_restaurant(&payload)?;

    if payload == UpdateRestaurantRequest::default() {
        let existing = find_restaurant(&state.db, id).await?;
        return Ok(Json(existing.into()));
    }

    let db = &state.db;
    let payload = &payload;
    let model = retry_app(&state.config.retry, move || {
        write_restaurant(db, id, move |existing| RestaurantFields {
            name: payload
                .name
                .as_ref()
                .map_or_else(|| existing.name.clone(), |n| n.trim().to_string()),
            category: payload.category.unwrap_or(existing.category),
            address: merge_nullable(&payload.address, &existing.address),
            phone: merge_nullable(&payload.phone, &existing.phone),
            description: merge_nullable(&payload.description, &existing.description),
        })
    })
    .await?;
    state.listings.invalidate();

    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Restaurants",
    operation_id = "deleteRestaurant",
    summary = "Soft-delete a restaurant",
    description = "Marks the restaurant inactive. It disappears from listings but keeps its reviews and can be restored. Deleting an inactive restaurant succeeds without changes.",
    params(("id" = i32, Path, description = "Restaurant ID")),
    responses(
        (status = 204, description = "Restaurant deactivated"),
        (status = 404, description = "Restaurant not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn delete_restaurant(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let db = &state.db;
    let changed = retry_app(&state.config.retry, move || set_active(db, id, false)).await?;
    if changed {
        state.listings.invalidate();
        info!(id, "Restaurant deactivated");
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/{id}/permanent",
    tag = "Restaurants",
    operation_id = "purgeRestaurant",
    summary = "Permanently delete a restaurant",
    description = "Removes the row. Returns 409 CONFLICT while the restaurant still has reviews.",
    params(("id" = i32, Path, description = "Restaurant ID")),
    responses(
        (status = 204, description = "Restaurant deleted"),
        (status = 404, description = "Restaurant not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Restaurant has reviews (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn purge_restaurant(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let db = &state.db;
    retry_app(&state.config.retry, move || hard_delete(db, id)).await?;
    state.listings.invalidate();

    info!(id, "Restaurant permanently deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{id}/restore",
    tag = "Restaurants",
    operation_id = "restoreRestaurant",
    summary = "Restore a soft-deleted restaurant",
    params(("id" = i32, Path, description = "Restaurant ID")),
    responses(
        (status = 200, description = "Restaurant active again", body = RestaurantResponse),
        (status = 404, description = "Restaurant not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "An active duplicate exists (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn restore_restaurant(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<RestaurantResponse>, AppError> {
    let db = &state.db;
    if retry_app(&state.config.retry, move || set_active(db, id, true)).await? {
        state.listings.invalidate();
        info!(id, "Restaurant restored");
    }
    let model = find_restaurant(&state.db, id).await?;
    Ok(Json(model.into()))
}

impl RestaurantFields {
    fn apply_to(self, existing: restaurant::Model) -> restaurant::ActiveModel {
        let mut active: restaurant::ActiveModel = existing.into();
        active.name = Set(self.name);
        active.category = Set(self.category);
        active.address = Set(self.address);
        active.phone = Set(self.phone);
        active.description = Set(self.description);
        active.updated_at = Set(Utc::now());
        active
    }
}

/// PATCH merge of a nullable column: absent keeps, `null` clears, a value replaces.
fn merge_nullable(patch: &Option<Option<String>>, current: &Option<String>) -> Option<String> {
    match patch {
        None => current.clone(),
        Some(value) => normalize_optional(value.clone()),
    }
}

async fn insert_restaurant(
    db: &DatabaseConnection,
    fields: &RestaurantFields,
) -> Result<restaurant::Model, AppError> {
    ensure_unique(db, &fields.name, fields.address.as_deref(), None).await?;

    let now = Utc::now();
    let new_restaurant = restaurant::ActiveModel {
        name: Set(fields.name.clone()),
        category: Set(fields.category),
        address: Set(fields.address.clone()),
        phone: Set(fields.phone.clone()),
        description: Set(fields.description.clone()),
        active: Set(true),
        average_rating: Set(average_rating(&[])),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    Ok(new_restaurant.insert(db).await?)
}

/// Lock the restaurant, compute its new fields with `change`, and save them.
async fn write_restaurant<F>(
    db: &DatabaseConnection,
    id: i32,
    change: F,
) -> Result<restaurant::Model, AppError>
where
    F: FnOnce(&restaurant::Model) -> RestaurantFields,
{
    let txn = db.begin().await?;

    let existing = find_restaurant_for_update(&txn, id).await?;
    let fields = change(&existing);
    if existing.active {
        ensure_unique(&txn, &fields.name, fields.address.as_deref(), Some(id)).await?;
    }

    let model = fields.apply_to(existing).update(&txn).await?;
    txn.commit().await?;
    Ok(model)
}

/// Set the active flag. Returns whether the row changed.
async fn set_active(db: &DatabaseConnection, id: i32, value: bool) -> Result<bool, AppError> {
    let txn = db.begin().await?;

    let existing = find_restaurant_for_update(&txn, id).await?;
    if existing.active == value {
        return Ok(false);
    }
    if value {
        ensure_unique(&txn, &existing.name, existing.address.as_deref(), Some(id)).await?;
    }

    let mut active: restaurant::ActiveModel = existing.into();
    active.active = Set(value);
    active.updated_at = Set(Utc::now());
    active.update(&txn).await?;

    txn.commit().await?;
    Ok(true)
}

async fn hard_delete(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
    let txn = db.begin().await?;

    find_restaurant_for_update(&txn, id).await?;

    let review_count = count_reviews(&txn, id).await?;
    if review_count > 0 {
        return Err(AppError::Conflict(format!(
            "Cannot delete restaurant with {review_count} review(s); delete the reviews or use soft delete"
        )));
    }

    restaurant::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;
    Ok(())
}

/// Reject a second active restaurant with the same name and address.
async fn ensure_unique<C: ConnectionTrait>(
    db: &C,
    name: &str,
    address: Option<&str>,
    exclude_id: Option<i32>,
) -> Result<(), AppError> {
    let mut select = restaurant::Entity::find()
        .filter(restaurant::Column::Active.eq(true))
        .filter(restaurant::Column::Name.eq(name));
    select = match address {
        Some(address) => select.filter(restaurant::Column::Address.eq(address)),
        None => select.filter(restaurant::Column::Address.is_null()),
    };
    if let Some(id) = exclude_id {
        select = select.filter(restaurant::Column::Id.ne(id));
    }

    if select.count(db).await? > 0 {
        return Err(AppError::Conflict(
            "An active restaurant with this name and address already exists".into(),
        ));
    }
    Ok(())
}

async fn load_listing(
    db: &DatabaseConnection,
    query: &NormalizedListQuery,
) -> Result<RestaurantListResponse, AppError> {
    let mut select = restaurant::Entity::find().filter(restaurant::Column::Active.eq(true));

    if let Some(category) = query.category {
        select = select.filter(restaurant::Column::Category.eq(category));
    }
    if let Some(ref search) = query.search {
        let term = escape_like(search);
        select = select.filter(
            Expr::expr(Func::lower(Expr::col(restaurant::Column::Name)))
                .like(LikeExpr::new(format!("%{}%", term.to_lowercase())).escape('\\')),
        );
    }

    let total = select.clone().count(db).await?;
    let total_pages = total.div_ceil(query.limit);

    let order = match query.direction {
        SortDirection::Asc => Order::Asc,
        SortDirection::Desc => Order::Desc,
    };
    let items = select
        .order_by(query.sort.column(), order)
        .order_by_asc(restaurant::Column::Id)
        .offset(Some(page_offset(query.page, query.limit)))
        .limit(Some(query.limit))
        .all(db)
        .await?
        .into_iter()
        .map(RestaurantResponse::from)
        .collect();

    Ok(RestaurantListResponse {
        total,
        total_pages,
        page: query.page,
        limit: query.limit,
        items,
    })
}

/// Find a restaurant, active or not, or return 404.
pub(crate) async fn find_restaurant<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<restaurant::Model, AppError> {
    restaurant::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Restaurant not found".into()))
}

pub(crate) async fn find_restaurant_for_update(
    txn: &DatabaseTransaction,
    id: i32,
) -> Result<restaurant::Model, AppError> {
    restaurant::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Restaurant not found".into()))
}
