use chrono::{DateTime, Utc};
use common::Category;
use rust_decimal::Decimal;
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entity::review;
use crate::error::AppError;

use super::shared::{double_option, validate_length};

pub const RATING_MIN: i32 = 1;
pub const RATING_MAX: i32 = 5;
pub const AUTHOR_MAX: usize = 100;
pub const COMMENT_MAX: usize = 500;

pub const DEFAULT_RESTAURANT_REVIEWS_LIMIT: u64 = 10;
pub const DEFAULT_ALL_REVIEWS_LIMIT: u64 = 20;
pub const MAX_REVIEWS_LIMIT: u64 = 100;

#[derive(Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    /// Integer rating, 1-5.
    #[schema(example = 5)]
    pub rating: i32,
    #[schema(example = "Great carbonara")]
    pub comment: Option<String>,
    #[schema(example = "Maria")]
    pub author: String,
}

/// Body of `PUT /reviews/{id}`. `comment: null` clears the comment.
#[derive(Deserialize, Default, PartialEq, ToSchema)]
pub struct UpdateReviewRequest {
    pub rating: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub comment: Option<Option<String>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, FromQueryResult, ToSchema)]
pub struct ReviewResponse {
    pub id: i32,
    pub rating: i32,
    pub comment: Option<String>,
    pub author: String,
    pub restaurant_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<review::Model> for ReviewResponse {
    fn from(m: review::Model) -> Self {
        Self {
            id: m.id,
            rating: m.rating,
            comment: m.comment,
            author: m.author,
            restaurant_id: m.restaurant_id,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RestaurantRef {
    pub id: i32,
    pub name: String,
}

#[derive(Serialize, Clone, FromQueryResult, ToSchema)]
pub struct RestaurantSummary {
    pub id: i32,
    pub name: String,
    pub category: Category,
}

/// A review joined with the restaurant it belongs to.
#[derive(Serialize, ToSchema)]
pub struct ReviewWithRestaurant {
    #[serde(flatten)]
    pub review: ReviewResponse,
    pub restaurant: RestaurantSummary,
}

#[derive(Serialize, ToSchema)]
pub struct RestaurantReviewListResponse {
    pub restaurant: RestaurantRef,
    pub total: u64,
    pub total_pages: u64,
    pub page: u64,
    pub limit: u64,
    pub items: Vec<ReviewResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct ReviewListResponse {
    pub total: u64,
    pub total_pages: u64,
    pub page: u64,
    pub limit: u64,
    pub items: Vec<ReviewWithRestaurant>,
}

/// Result of a review write: the review and the restaurant's new average.
#[derive(Serialize, ToSchema)]
pub struct ReviewWriteResponse {
    pub review: ReviewResponse,
    #[schema(value_type = String, example = "4.50")]
    pub average_rating: Decimal,
}

#[derive(Serialize, ToSchema)]
pub struct ReviewDeleteResponse {
    #[schema(value_type = String, example = "3.00")]
    pub average_rating: Decimal,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RestaurantReviewsQuery {
    /// Page number, 1-based. Default: 1.
    pub page: Option<u64>,
    /// Page size, 1-100. Default: 10.
    pub limit: Option<u64>,
    /// Only reviews rated at least this, 1-5.
    pub min_rating: Option<i32>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReviewListQuery {
    /// Page number, 1-based. Default: 1.
    pub page: Option<u64>,
    /// Page size, 1-100. Default: 20.
    pub limit: Option<u64>,
}

pub fn validate_rating(rating: i32, field: &str) -> Result<(), AppError> {
    if !(RATING_MIN..=RATING_MAX).contains(&rating) {
        return Err(AppError::Validation(format!(
            "{field} must be between {RATING_MIN} and {RATING_MAX}"
        )));
    }
    Ok(())
}

pub fn validate_create_review(req: &CreateReviewRequest) -> Result<(), AppError> {
    validate_rating(req.rating, "Rating")?;
    validate_length("Author", &req.author, 1, AUTHOR_MAX)?;
    if let Some(ref comment) = req.comment {
        validate_length("Comment", comment, 0, COMMENT_MAX)?;
    }
    Ok(())
}

pub fn validate_update_review(req: &UpdateReviewRequest) -> Result<(), AppError> {
    if let Some(rating) = req.rating {
        validate_rating(rating, "Rating")?;
    }
    if let Some(Some(ref comment)) = req.comment {
        validate_length("Comment", comment, 0, COMMENT_MAX)?;
    }
    Ok(())
}
