#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Cuisine category of a restaurant.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::N(50))")
)]
pub enum Category {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Italian"))]
    Italian,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Japanese"))]
    Japanese,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Brazilian"))]
    Brazilian,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Mexican"))]
    Mexican,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Arabic"))]
    Arabic,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Burger"))]
    Burger,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Pizza"))]
    Pizza,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Vegetarian"))]
    Vegetarian,
    /// Anything that does not fit the other categories.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Other"))]
    Other,
}

impl Category {
    /// All categories, in display order.
    pub const ALL: &'static [Category] = &[
        Self::Italian,
        Self::Japanese,
        Self::Brazilian,
        Self::Mexican,
        Self::Arabic,
        Self::Burger,
        Self::Pizza,
        Self::Vegetarian,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Italian => "Italian",
            Self::Japanese => "Japanese",
            Self::Brazilian => "Brazilian",
            Self::Mexican => "Mexican",
            Self::Arabic => "Arabic",
            Self::Burger => "Burger",
            Self::Pizza => "Pizza",
            Self::Vegetarian => "Vegetarian",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid category '{0}'. Must be one of: Italian, Japanese, Brazilian, Mexican, Arabic, Burger, Pizza, Vegetarian, Other")]
pub struct ParseCategoryError(pub String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    /// Parses a category name. Surrounding whitespace is ignored; case is not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == trimmed)
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}
