use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    audit,
    db::conflict_on_unique,
    entity::favorites::{ActiveModel as FavoriteActive, Column, Entity as Favorites},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::RecipeMinified,
    response::{ApiResponse, Meta},
    services::recipe_service::find_recipe,
    state::AppState,
};

const ALREADY_FAVORITED: &str = "recipe is already in favorites";

pub async fn add_favorite(
    state: &AppState,
    user: &AuthUser,
    recipe_id: Uuid,
) -> AppResult<ApiResponse<RecipeMinified>> {
    let recipe = find_recipe(state, recipe_id).await?;

    let existing = Favorites::find()
        .filter(Column::UserId.eq(user.user_id))
        .filter(Column::RecipeId.eq(recipe.id))
        .count(&state.orm)
        .await?;
    if existing > 0 {
        return Err(AppError::Conflict(ALREADY_FAVORITED.into()));
    }

    FavoriteActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        recipe_id: Set(recipe.id),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(conflict_on_unique(ALREADY_FAVORITED))?;

    audit::record(
        &state.pool,
        user.user_id,
        "favorite_add",
        "favorites",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;

    let data = RecipeMinified {
        id: recipe.id,
        name: recipe.name,
        cooking_time: recipe.cooking_time,
    };
    Ok(ApiResponse::success(
        "Added to favorites",
        data,
        Some(Meta::empty()),
    ))
}

pub async fn remove_favorite(state: &AppState, user: &AuthUser, recipe_id: Uuid) -> AppResult<()> {
    let recipe = find_recipe(state, recipe_id).await?;

    let result = Favorites::delete_many()
        .filter(Column::UserId.eq(user.user_id))
        .filter(Column::RecipeId.eq(recipe.id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::BadRequest(
            "recipe was not in favorites".into(),
        ));
    }

    audit::record(
        &state.pool,
        user.user_id,
        "favorite_remove",
        "favorites",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;

    Ok(())
}
