use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Default, Clone, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    pub page: Option<i64>,
    #[serde(alias = "limit")]
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(6).clamp(1, 100);
        let offset = (page - 1).saturating_mul(per_page);
        (page, per_page, offset)
    }
}

/// Filters for the recipe list. Built from raw query pairs because `tags`
/// may repeat.
#[derive(Debug, Default, Clone)]
pub struct RecipeQuery {
    pub pagination: Pagination,
    pub author: Option<Uuid>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeQuery {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> AppResult<Self> {
        let mut query = RecipeQuery::default();
        for (key, value) in pairs {
            match key.as_str() {
                "page" => query.pagination.page = Some(parse_int(&key, &value)?),
                "per_page" | "limit" => query.pagination.per_page = Some(parse_int(&key, &value)?),
                "author" => {
                    let id = Uuid::parse_str(&value)
                        .map_err(|_| AppError::BadRequest(format!("invalid author id {value}")))?;
                    query.author = Some(id);
                }
                "tags" => {
                    query.tags.extend(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string),
                    );
                }
                "is_favorited" => query.is_favorited = parse_flag(&value),
                "is_in_shopping_cart" => query.is_in_shopping_cart = parse_flag(&value),
                _ => {}
            }
        }
        Ok(query)
    }
}

fn parse_int(key: &str, value: &str) -> AppResult<i64> {
    value
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest(format!("{key} must be an integer")))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

#[derive(Debug, Default, Clone, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubscriptionQuery {
    pub page: Option<i64>,
    #[serde(alias = "limit")]
    pub per_page: Option<i64>,
    /// Maximum number of recipes embedded per author.
    pub recipes_limit: Option<i64>,
}

impl SubscriptionQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}
