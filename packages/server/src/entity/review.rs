use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "review")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub rating: i32, // 1-5
    #[sea_orm(column_type = "Text", nullable)]
    pub comment: Option<String>,
    #[sea_orm(column_type = "String(StringLen::N(100))")]
    pub author: String,

    #[sea_orm(indexed)]
    pub restaurant_id: i32,
    #[sea_orm(belongs_to, from = "restaurant_id", to = "id", on_delete = "Cascade")]
    pub restaurant: HasOne<super::restaurant::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
