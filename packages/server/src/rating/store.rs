use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::prelude::Expr;
use sea_orm::*;

use crate::entity::{restaurant, review};

/// The restaurant columns the rating engine needs.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct RatedRestaurant {
    pub id: i32,
    pub active: bool,
    pub average_rating: Decimal,
}

/// Persistence boundary of the rating engine.
#[async_trait]
pub trait RatingStore: Send + Sync {
    async fn find_restaurant(&self, id: i32) -> Result<Option<RatedRestaurant>, DbErr>;

    /// Ratings of every review of a restaurant, in no particular order.
    async fn find_review_ratings(&self, restaurant_id: i32) -> Result<Vec<i32>, DbErr>;

    async fn count_reviews_for_restaurant(&self, restaurant_id: i32) -> Result<u64, DbErr>;

    /// Persist a new average. Returns `false` when the restaurant no longer exists.
    async fn update_restaurant_average(
        &self,
        restaurant_id: i32,
        value: Decimal,
    ) -> Result<bool, DbErr>;

    async fn active_restaurant_ids(&self) -> Result<Vec<i32>, DbErr>;
}

/// [`RatingStore`] backed by the application database.
#[derive(Clone)]
pub struct SeaOrmRatingStore {
    db: DatabaseConnection,
}

impl SeaOrmRatingStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RatingStore for SeaOrmRatingStore {
    async fn find_restaurant(&self, id: i32) -> Result<Option<RatedRestaurant>, DbErr> {
        restaurant::Entity::find_by_id(id)
            .select_only()
            .column(restaurant::Column::Id)
            .column(restaurant::Column::Active)
            .column(restaurant::Column::AverageRating)
            .into_model::<RatedRestaurant>()
            .one(&self.db)
            .await
    }

    async fn find_review_ratings(&self, restaurant_id: i32) -> Result<Vec<i32>, DbErr> {
        review::Entity::find()
            .select_only()
            .column(review::Column::Rating)
            .filter(review::Column::RestaurantId.eq(restaurant_id))
            .into_tuple()
            .all(&self.db)
            .await
    }

    async fn count_reviews_for_restaurant(&self, restaurant_id: i32) -> Result<u64, DbErr> {
        count_reviews(&self.db, restaurant_id).await
    }

    async fn update_restaurant_average(
        &self,
        restaurant_id: i32,
        value: Decimal,
    ) -> Result<bool, DbErr> {
        let result = restaurant::Entity::update_many()
            .col_expr(restaurant::Column::AverageRating, Expr::value(value))
            .col_expr(restaurant::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(restaurant::Column::Id.eq(restaurant_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn active_restaurant_ids(&self) -> Result<Vec<i32>, DbErr> {
        restaurant::Entity::find()
            .select_only()
            .column(restaurant::Column::Id)
            .filter(restaurant::Column::Active.eq(true))
            .order_by_asc(restaurant::Column::Id)
            .into_tuple()
            .all(&self.db)
            .await
    }
}

/// Count the reviews of a restaurant on any connection, including transactions.
pub async fn count_reviews<C: ConnectionTrait>(db: &C, restaurant_id: i32) -> Result<u64, DbErr> {
    review::Entity::find()
        .filter(review::Column::RestaurantId.eq(restaurant_id))
        .count(db)
        .await
}
