use std::collections::HashSet;

use sea_orm::{EntityTrait, QueryOrder};
use uuid::Uuid;

use crate::{
    dto::ingredients::{IngredientList, IngredientQuery},
    entity::ingredients::{Column, Entity as Ingredients},
    error::{AppError, AppResult},
    models::Ingredient,
    response::ApiResponse,
    state::AppState,
};

/// Ranks ingredients whose name matches `query`, ignoring case.
///
/// Names starting with the query come first, then names containing it
/// anywhere else. Both groups keep the input order and are disjoint: the
/// substring pass skips every id already taken by the prefix pass. An empty
/// query returns the input untouched.
pub fn rank_by_name(query: &str, ingredients: Vec<Ingredient>) -> Vec<Ingredient> {
    if query.is_empty() {
        return ingredients;
    }

    let needle = query.to_lowercase();
    let lowered: Vec<String> = ingredients.iter().map(|i| i.name.to_lowercase()).collect();
    let mut seen: HashSet<Uuid> = HashSet::new();

    let mut prefix_group = Vec::new();
    for (idx, name) in lowered.iter().enumerate() {
        if name.starts_with(&needle) && seen.insert(ingredients[idx].id) {
            prefix_group.push(idx);
        }
    }

    let mut substring_group = Vec::new();
    for (idx, name) in lowered.iter().enumerate() {
        if name.contains(&needle) && seen.insert(ingredients[idx].id) {
            substring_group.push(idx);
        }
    }

    let mut slots: Vec<Option<Ingredient>> = ingredients.into_iter().map(Some).collect();
    prefix_group
        .into_iter()
        .chain(substring_group)
        .filter_map(|idx| slots[idx].take())
        .collect()
}

pub async fn list_ingredients(
    state: &AppState,
    query: IngredientQuery,
) -> AppResult<ApiResponse<IngredientList>> {
    let all: Vec<Ingredient> = Ingredients::find()
        .order_by_asc(Column::Name)
        .order_by_asc(Column::MeasurementUnit)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Ingredient::from)
        .collect();

    let search = query.name.unwrap_or_default();
    let items = rank_by_name(&search, all);
    tracing::debug!(query = %search, matches = items.len(), "ingredient search");

    Ok(ApiResponse::success("Ingredients", IngredientList { items }, None))
}

pub async fn get_ingredient(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Ingredient>> {
    let ingredient = Ingredients::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(Ingredient::from)
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Ingredient", ingredient, None))
}
