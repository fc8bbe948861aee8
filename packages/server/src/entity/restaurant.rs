use common::Category;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "restaurant")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(column_type = "String(StringLen::N(100))")]
    pub name: String,
    #[sea_orm(indexed)]
    pub category: Category,
    #[sea_orm(column_type = "Text", nullable)]
    pub address: Option<String>,
    #[sea_orm(column_type = "String(StringLen::N(20))", nullable)]
    pub phone: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Cleared by soft delete, set again by restore.
    #[sea_orm(default_value = true, indexed)]
    pub active: bool,

    /// Mean of the reviews' ratings rounded to 2 decimals, 0 without reviews.
    /// Derived: only the rating engine writes it.
    #[sea_orm(column_type = "Decimal(Some((3, 2)))", default_value = 0)]
    pub average_rating: Decimal,

    #[sea_orm(has_many)]
    pub reviews: HasMany<super::review::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
