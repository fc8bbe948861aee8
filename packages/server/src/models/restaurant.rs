use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::Category;
use rust_decimal::Decimal;
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entity::restaurant;
use crate::error::AppError;

use super::review::ReviewResponse;
pub use super::shared::escape_like;
use super::shared::{
    double_option, normalize_optional, resolve_page, validate_length, validate_optional_length,
};

pub const NAME_MIN: usize = 3;
pub const NAME_MAX: usize = 100;
pub const ADDRESS_MAX: usize = 500;
pub const PHONE_MAX: usize = 20;
pub const DESCRIPTION_MAX: usize = 1000;

pub const DEFAULT_LIST_LIMIT: u64 = 10;
pub const MAX_LIST_LIMIT: u64 = 100;
pub const DEFAULT_TOP_RATED_LIMIT: u64 = 10;
pub const MAX_TOP_RATED_LIMIT: u64 = 50;
/// Reviews embedded in a restaurant detail response.
pub const DETAIL_REVIEW_COUNT: u64 = 10;

/// Body of `POST /restaurants` and `PUT /restaurants/{id}`.
#[derive(Deserialize, ToSchema)]
pub struct RestaurantRequest {
    #[schema(example = "Cantina da Nonna")]
    pub name: String,
    pub category: Category,
    #[schema(example = "Rua Augusta, 123")]
    pub address: Option<String>,
    #[schema(example = "(11) 3333-4444")]
    pub phone: Option<String>,
    pub description: Option<String>,
}

/// Body of `PATCH /restaurants/{id}`. Nullable fields accept `null` to clear.
#[derive(Deserialize, Default, PartialEq, ToSchema)]
pub struct UpdateRestaurantRequest {
    pub name: Option<String>,
    pub category: Option<Category>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct RestaurantResponse {
    pub id: i32,
    pub name: String,
    pub category: Category,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub active: bool,
    /// Mean review rating with two decimals, `"0.00"` without reviews.
    #[schema(value_type = String, example = "4.50")]
    pub average_rating: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<restaurant::Model> for RestaurantResponse {
    fn from(m: restaurant::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            category: m.category,
            address: m.address,
            phone: m.phone,
            description: m.description,
            active: m.active,
            average_rating: m.average_rating,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// A restaurant with its latest reviews.
#[derive(Serialize, ToSchema)]
pub struct RestaurantDetailResponse {
    #[serde(flatten)]
    pub restaurant: RestaurantResponse,
    /// Up to 10 most recent reviews, newest first.
    pub reviews: Vec<ReviewResponse>,
}

#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct RestaurantListResponse {
    #[schema(example = 47)]
    pub total: u64,
    #[schema(example = 5)]
    pub total_pages: u64,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 10)]
    pub limit: u64,
    pub items: Vec<RestaurantResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct CategoryRestaurantsResponse {
    pub category: Category,
    pub total: usize,
    pub items: Vec<RestaurantResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct TopRatedResponse {
    pub items: Vec<RestaurantResponse>,
}

#[derive(Serialize, FromQueryResult, ToSchema)]
pub struct CategoryCount {
    pub category: Category,
    pub total: i64,
}

#[derive(Serialize, ToSchema)]
pub struct RestaurantStatsResponse {
    /// Active restaurants.
    pub total_restaurants: u64,
    /// Reviews of active restaurants.
    pub total_reviews: u64,
    pub by_category: Vec<CategoryCount>,
}

/// Query of `GET /restaurants`.
#[derive(Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RestaurantListQuery {
    /// Page number, 1-based. Default: 1.
    pub page: Option<u64>,
    /// Page size, 1-100. Default: 10.
    pub limit: Option<u64>,
    /// Only restaurants of this category.
    pub category: Option<String>,
    /// Case-insensitive substring of the name.
    pub search: Option<String>,
    /// One of `name`, `category`, `average_rating`, `created_at`. Default: `average_rating`.
    pub sort: Option<String>,
    /// `asc` or `desc`, case-insensitive. Default: `desc`.
    pub direction: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TopRatedQuery {
    /// Number of restaurants, 1-50. Default: 10.
    pub limit: Option<u64>,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Name,
    Category,
    AverageRating,
    CreatedAt,
}

impl SortField {
    pub fn column(self) -> restaurant::Column {
        match self {
            SortField::Name => restaurant::Column::Name,
            SortField::Category => restaurant::Column::Category,
            SortField::AverageRating => restaurant::Column::AverageRating,
            SortField::CreatedAt => restaurant::Column::CreatedAt,
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A listing query with defaults applied and every parameter validated.
///
/// Two requests that mean the same thing normalize to equal values.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct NormalizedListQuery {
    pub page: u64,
    pub limit: u64,
    pub category: Option<Category>,
    pub search: Option<String>,
    pub sort: SortField,
    pub direction: SortDirection,
}

impl RestaurantListQuery {
    pub fn normalize(self) -> Result<NormalizedListQuery, AppError> {
        let (page, limit) = resolve_page(self.page, self.limit, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT)?;

        let category = match self.category.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(c) => Some(c.parse::<Category>()?),
        };

        let sort = match self.sort.as_deref().map(str::trim) {
            None | Some("") | Some("average_rating") => SortField::AverageRating,
            Some("name") => SortField::Name,
            Some("category") => SortField::Category,
            Some("created_at") => SortField::CreatedAt,
            Some(_) => {
                return Err(AppError::Validation(
                    "sort must be one of: name, category, average_rating, created_at".into(),
                ));
            }
        };

        let direction = match self.direction.as_deref().map(str::trim) {
            None | Some("") => SortDirection::Desc,
            Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Desc,
            Some(d) if d.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            Some(_) => {
                return Err(AppError::Validation(
                    "direction must be asc or desc".into(),
                ));
            }
        };

        Ok(NormalizedListQuery {
            page,
            limit,
            category,
            search: normalize_optional(self.search),
            sort,
            direction,
        })
    }
}

impl NormalizedListQuery {
    /// Deterministic cache key of this query: a JSON object with sorted keys.
    pub fn cache_signature(&self) -> Result<String, AppError> {
        let to_internal = |e: serde_json::Error| AppError::Internal(format!("Cache key: {e}"));
        let params: BTreeMap<String, serde_json::Value> =
            serde_json::from_value(serde_json::to_value(self).map_err(to_internal)?)
                .map_err(to_internal)?;
        serde_json::to_string(&params).map_err(to_internal)
    }
}

fn is_valid_phone(phone: &str) -> bool {
    phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '(' | ')' | '-' | '+'))
}

fn validate_phone(phone: Option<&str>) -> Result<(), AppError> {
    if let Some(phone) = phone {
        validate_length("Phone", phone, 0, PHONE_MAX)?;
        if !is_valid_phone(phone.trim()) {
            return Err(AppError::Validation(
                "Phone may only contain digits, spaces, parentheses, hyphens and +".into(),
            ));
        }
    }
    Ok(())
}

pub fn validate_restaurant(req: &RestaurantRequest) -> Result<(), AppError> {
    validate_length("Name", &req.name, NAME_MIN, NAME_MAX)?;
    validate_optional_length("Address", req.address.as_deref(), ADDRESS_MAX)?;
    validate_phone(req.phone.as_deref())?;
    validate_optional_length("Description", req.description.as_deref(), DESCRIPTION_MAX)?;
    Ok(())
}

pub fn validate_update_restaurant(req: &UpdateRestaurantRequest) -> Result<(), AppError> {
    if let Some(ref name) = req.name {
        validate_length("Name", name, NAME_MIN, NAME_MAX)?;
    }
    if let Some(Some(ref address)) = req.address {
        validate_length("Address", address, 0, ADDRESS_MAX)?;
    }
    if let Some(ref phone) = req.phone {
        validate_phone(phone.as_deref())?;
    }
    if let Some(Some(ref description)) = req.description {
        validate_length("Description", description, 0, DESCRIPTION_MAX)?;
    }
    Ok(())
}
