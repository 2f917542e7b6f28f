use std::collections::HashMap;

use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, QueryTrait, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    db::conflict_on_unique,
    dto::users::SubscriptionList,
    entity::{
        follows::{ActiveModel as FollowActive, Column as FollowCol, Entity as Follows},
        recipes::{Column as RecipeCol, Entity as Recipes},
        users::{Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{RecipeMinified, Subscription, User},
    response::{ApiResponse, Meta},
    routes::params::SubscriptionQuery,
    services::user_service::find_user,
    state::AppState,
    validation::validate_subscription,
};

pub async fn subscribe(
    state: &AppState,
    user: &AuthUser,
    author_id: Uuid,
    recipes_limit: Option<i64>,
) -> AppResult<ApiResponse<Subscription>> {
    let author = find_user(state, author_id).await?;

    let already_following = Follows::find()
        .filter(FollowCol::UserId.eq(user.user_id))
        .filter(FollowCol::AuthorId.eq(author.id))
        .count(&state.orm)
        .await?
        > 0;
    validate_subscription(user.user_id, author.id, already_following)?;

    FollowActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        author_id: Set(author.id),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(conflict_on_unique("already subscribed to this author"))?;

    audit::record(
        &state.pool,
        user.user_id,
        "subscribe",
        "follows",
        serde_json::json!({ "author_id": author.id }),
    )
    .await;

    let mut views = build_subscriptions(state, vec![author], recipes_limit).await?;
    let view = views
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("subscription view missing")))?;
    Ok(ApiResponse::success("Subscribed", view, Some(Meta::empty())))
}

pub async fn unsubscribe(state: &AppState, user: &AuthUser, author_id: Uuid) -> AppResult<()> {
    let author = find_user(state, author_id).await?;

    let result = Follows::delete_many()
        .filter(FollowCol::UserId.eq(user.user_id))
        .filter(FollowCol::AuthorId.eq(author.id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "unsubscribe",
        "follows",
        serde_json::json!({ "author_id": author.id }),
    )
    .await;

    Ok(())
}

pub async fn list_subscriptions(
    state: &AppState,
    user: &AuthUser,
    query: SubscriptionQuery,
) -> AppResult<ApiResponse<SubscriptionList>> {
    let (page, limit, offset) = query.pagination().normalize();

    let followed = Follows::find()
        .select_only()
        .column(FollowCol::AuthorId)
        .filter(FollowCol::UserId.eq(user.user_id))
        .into_query();
    let finder = Users::find()
        .filter(UserCol::Id.in_subquery(followed))
        .order_by_asc(UserCol::Username);

    let total = finder.clone().count(&state.orm).await? as i64;
    let authors = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = build_subscriptions(state, authors, query.recipes_limit).await?;
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Subscriptions",
        SubscriptionList { items },
        Some(meta),
    ))
}

/// Every author passed in is one the caller follows.
async fn build_subscriptions(
    state: &AppState,
    authors: Vec<UserModel>,
    recipes_limit: Option<i64>,
) -> AppResult<Vec<Subscription>> {
    let author_ids: Vec<Uuid> = authors.iter().map(|a| a.id).collect();
    let recipes = Recipes::find()
        .filter(RecipeCol::AuthorId.is_in(author_ids))
        .order_by_asc(RecipeCol::Name)
        .all(&state.orm)
        .await?;

    let mut by_author: HashMap<Uuid, Vec<RecipeMinified>> = HashMap::new();
    for recipe in recipes {
        by_author
            .entry(recipe.author_id)
            .or_default()
            .push(RecipeMinified {
                id: recipe.id,
                name: recipe.name,
                cooking_time: recipe.cooking_time,
            });
    }

    let limit = recipes_limit.filter(|l| *l >= 0).map(|l| l as usize);
    Ok(authors
        .into_iter()
        .map(|author| {
            let mut recipes = by_author.remove(&author.id).unwrap_or_default();
            let recipes_count = recipes.len() as i64;
            if let Some(limit) = limit {
                recipes.truncate(limit);
            }
            Subscription {
                user: User::from_entity(author, true),
                recipes,
                recipes_count,
            }
        })
        .collect())
}
