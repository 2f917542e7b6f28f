use uuid::Uuid;

use crate::{
    audit,
    db::is_sqlx_unique_violation,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::RecipeMinified,
    response::{ApiResponse, Meta},
    state::AppState,
};

const ALREADY_IN_CART: &str = "recipe is already in the shopping cart";

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    recipe_id: Uuid,
) -> AppResult<ApiResponse<RecipeMinified>> {
    let recipe: Option<RecipeMinified> =
        sqlx::query_as("SELECT id, name, cooking_time FROM recipes WHERE id = $1")
            .bind(recipe_id)
            .fetch_optional(&state.pool)
            .await?;
    let recipe = recipe.ok_or(AppError::NotFound)?;

    let exist: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM carts WHERE user_id = $1 AND recipe_id = $2")
            .bind(user.user_id)
            .bind(recipe.id)
            .fetch_optional(&state.pool)
            .await?;
    if exist.is_some() {
        return Err(AppError::Conflict(ALREADY_IN_CART.into()));
    }

    let inserted = sqlx::query("INSERT INTO carts (id, user_id, recipe_id) VALUES ($1, $2, $3)")
        .bind(Uuid::new_v4())
        .bind(user.user_id)
        .bind(recipe.id)
        .execute(&state.pool)
        .await;
    match inserted {
        Ok(_) => {}
        Err(err) if is_sqlx_unique_violation(&err) => {
            return Err(AppError::Conflict(ALREADY_IN_CART.into()));
        }
        Err(err) => return Err(err.into()),
    }

    audit::record(
        &state.pool,
        user.user_id,
        "cart_add",
        "carts",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Added to shopping cart",
        recipe,
        Some(Meta::empty()),
    ))
}

pub async fn remove_from_cart(state: &AppState, user: &AuthUser, recipe_id: Uuid) -> AppResult<()> {
    let recipe_exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM recipes WHERE id = $1")
        .bind(recipe_id)
        .fetch_optional(&state.pool)
        .await?;
    if recipe_exists.is_none() {
        return Err(AppError::NotFound);
    }

    let result = sqlx::query("DELETE FROM carts WHERE recipe_id = $1 AND user_id = $2")
        .bind(recipe_id)
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::BadRequest(
            "recipe was not in the shopping cart".into(),
        ));
    }

    audit::record(
        &state.pool,
        user.user_id,
        "cart_remove",
        "carts",
        serde_json::json!({ "recipe_id": recipe_id }),
    )
    .await;

    Ok(())
}
