use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, QueryTrait, Set, TransactionTrait,
};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    db::conflict_on_unique,
    dto::recipes::{CreateRecipeRequest, IngredientAmount, RecipeList, UpdateRecipeRequest},
    entity::{
        carts::{Column as CartCol, Entity as Carts},
        favorites::{Column as FavCol, Entity as Favorites},
        ingredients::{Column as IngredientCol, Entity as Ingredients},
        recipe_ingredients::{
            ActiveModel as RecipeIngredientActive, Column as RecipeIngredientCol,
            Entity as RecipeIngredients,
        },
        recipe_tags::{ActiveModel as RecipeTagActive, Column as RecipeTagCol, Entity as RecipeTags},
        recipes::{ActiveModel as RecipeActive, Column as RecipeCol, Entity as Recipes, Model as RecipeModel},
        tags::{Column as TagCol, Entity as Tags},
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_author},
    models::{Recipe, RecipeIngredient, Tag, User},
    response::{ApiResponse, Meta},
    routes::params::RecipeQuery,
    services::user_service::subscribed_author_ids,
    state::AppState,
    validation::{
        RecipeDraft, RecipeLookups, RecipeOperation, validate_recipe, validate_tag_slugs,
    },
};

const DUPLICATE_NAME: &str = "author already has a recipe with this name";

#[derive(FromRow)]
struct RecipeIngredientRow {
    recipe_id: Uuid,
    id: Uuid,
    name: String,
    measurement_unit: String,
    amount: i32,
}

pub async fn list_recipes(
    state: &AppState,
    viewer: Option<&AuthUser>,
    query: RecipeQuery,
) -> AppResult<ApiResponse<RecipeList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    if let Some(author) = query.author {
        condition = condition.add(RecipeCol::AuthorId.eq(author));
    }

    if !query.tags.is_empty() {
        let known: HashSet<String> = Tags::find()
            .filter(TagCol::Slug.is_in(query.tags.clone()))
            .all(&state.orm)
            .await?
            .into_iter()
            .map(|tag| tag.slug)
            .collect();
        validate_tag_slugs(&query.tags, &known)?;

        let tagged = RecipeTags::find()
            .select_only()
            .column(RecipeTagCol::RecipeId)
            .inner_join(Tags)
            .filter(TagCol::Slug.is_in(query.tags.clone()))
            .into_query();
        condition = condition.add(RecipeCol::Id.in_subquery(tagged));
    }

    // Membership filters only make sense for a known caller.
    if let Some(user) = viewer {
        if query.is_favorited {
            let favorited = Favorites::find()
                .select_only()
                .column(FavCol::RecipeId)
                .filter(FavCol::UserId.eq(user.user_id))
                .into_query();
            condition = condition.add(RecipeCol::Id.in_subquery(favorited));
        }
        if query.is_in_shopping_cart {
            let in_cart = Carts::find()
                .select_only()
                .column(CartCol::RecipeId)
                .filter(CartCol::UserId.eq(user.user_id))
                .into_query();
            condition = condition.add(RecipeCol::Id.in_subquery(in_cart));
        }
    }

    let finder = Recipes::find()
        .filter(condition)
        .order_by_asc(RecipeCol::Name)
        .order_by_asc(RecipeCol::Id);

    let total = finder.clone().count(&state.orm).await? as i64;
    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = build_recipes(state, viewer, models).await?;
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Recipes", RecipeList { items }, Some(meta)))
}

pub async fn get_recipe(
    state: &AppState,
    viewer: Option<&AuthUser>,
    id: Uuid,
) -> AppResult<ApiResponse<Recipe>> {
    let model = find_recipe(state, id).await?;
    let recipe = build_recipe(state, viewer, model).await?;
    Ok(ApiResponse::success("Recipe", recipe, None))
}

pub async fn create_recipe(
    state: &AppState,
    user: &AuthUser,
    payload: CreateRecipeRequest,
) -> AppResult<ApiResponse<Recipe>> {
    let existing_tags = existing_tag_ids(state, &payload.tags).await?;
    let existing_ingredients = existing_ingredient_ids(state, &payload.ingredients).await?;
    let name_taken = Recipes::find()
        .filter(RecipeCol::AuthorId.eq(user.user_id))
        .filter(RecipeCol::Name.eq(payload.name.as_str()))
        .count(&state.orm)
        .await?
        > 0;

    validate_recipe(
        &RecipeDraft {
            tags: &payload.tags,
            ingredients: &payload.ingredients,
            name: &payload.name,
            text: &payload.text,
            cooking_time: payload.cooking_time,
        },
        &RecipeLookups {
            existing_tags: &existing_tags,
            existing_ingredients: &existing_ingredients,
            name_taken,
        },
        state.limits,
        RecipeOperation::Create,
    )?;

    let txn = state.orm.begin().await?;
    let recipe = RecipeActive {
        id: Set(Uuid::new_v4()),
        author_id: Set(user.user_id),
        name: Set(payload.name),
        text: Set(payload.text),
        cooking_time: Set(payload.cooking_time),
        created_at: NotSet,
    }
    .insert(&txn)
    .await
    .map_err(conflict_on_unique(DUPLICATE_NAME))?;

    replace_tags(&txn, recipe.id, &payload.tags).await?;
    replace_ingredients(&txn, recipe.id, &payload.ingredients).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "recipe_create",
        "recipes",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;

    let view = build_recipe(state, Some(user), recipe).await?;
    Ok(ApiResponse::success("Recipe created", view, Some(Meta::empty())))
}

pub async fn update_recipe(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateRecipeRequest,
) -> AppResult<ApiResponse<Recipe>> {
    let existing = find_recipe(state, id).await?;
    ensure_author(user, existing.author_id)?;

    let tags = match &payload.tags {
        Some(tags) => tags.clone(),
        None => stored_tag_ids(state, existing.id).await?,
    };
    let ingredients = match &payload.ingredients {
        Some(items) => items.clone(),
        None => stored_ingredient_amounts(state, existing.id).await?,
    };
    let name = payload.name.clone().unwrap_or_else(|| existing.name.clone());
    let text = payload.text.clone().unwrap_or_else(|| existing.text.clone());
    let cooking_time = payload.cooking_time.unwrap_or(existing.cooking_time);

    let existing_tags = existing_tag_ids(state, &tags).await?;
    let existing_ingredients = existing_ingredient_ids(state, &ingredients).await?;
    validate_recipe(
        &RecipeDraft {
            tags: &tags,
            ingredients: &ingredients,
            name: &name,
            text: &text,
            cooking_time,
        },
        &RecipeLookups {
            existing_tags: &existing_tags,
            existing_ingredients: &existing_ingredients,
            name_taken: false,
        },
        state.limits,
        RecipeOperation::Update,
    )?;

    let txn = state.orm.begin().await?;
    let mut active: RecipeActive = existing.into();
    active.name = Set(name);
    active.text = Set(text);
    active.cooking_time = Set(cooking_time);
    let recipe = active
        .update(&txn)
        .await
        .map_err(conflict_on_unique(DUPLICATE_NAME))?;

    if payload.tags.is_some() {
        replace_tags(&txn, recipe.id, &tags).await?;
    }
    if payload.ingredients.is_some() {
        replace_ingredients(&txn, recipe.id, &ingredients).await?;
    }
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "recipe_update",
        "recipes",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;

    let view = build_recipe(state, Some(user), recipe).await?;
    Ok(ApiResponse::success("Updated", view, Some(Meta::empty())))
}

pub async fn delete_recipe(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<()> {
    let existing = find_recipe(state, id).await?;
    ensure_author(user, existing.author_id)?;

    let result = Recipes::delete_by_id(existing.id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "recipe_delete",
        "recipes",
        serde_json::json!({ "recipe_id": id, "deleted_at": Utc::now() }),
    )
    .await;

    Ok(())
}

pub(crate) async fn find_recipe(state: &AppState, id: Uuid) -> AppResult<RecipeModel> {
    Recipes::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

async fn existing_tag_ids(state: &AppState, ids: &[Uuid]) -> AppResult<HashSet<Uuid>> {
    if ids.is_empty() {
        return Ok(HashSet::new());
    }
    let rows = Tags::find()
        .filter(TagCol::Id.is_in(ids.to_vec()))
        .all(&state.orm)
        .await?;
    Ok(rows.into_iter().map(|tag| tag.id).collect())
}

async fn existing_ingredient_ids(
    state: &AppState,
    items: &[IngredientAmount],
) -> AppResult<HashSet<Uuid>> {
    if items.is_empty() {
        return Ok(HashSet::new());
    }
    let ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();
    let rows = Ingredients::find()
        .filter(IngredientCol::Id.is_in(ids))
        .all(&state.orm)
        .await?;
    Ok(rows.into_iter().map(|ingredient| ingredient.id).collect())
}

async fn stored_tag_ids(state: &AppState, recipe_id: Uuid) -> AppResult<Vec<Uuid>> {
    let rows = RecipeTags::find()
        .filter(RecipeTagCol::RecipeId.eq(recipe_id))
        .all(&state.orm)
        .await?;
    Ok(rows.into_iter().map(|row| row.tag_id).collect())
}

async fn stored_ingredient_amounts(
    state: &AppState,
    recipe_id: Uuid,
) -> AppResult<Vec<IngredientAmount>> {
    let rows = RecipeIngredients::find()
        .filter(RecipeIngredientCol::RecipeId.eq(recipe_id))
        .all(&state.orm)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| IngredientAmount {
            id: row.ingredient_id,
            amount: row.amount,
        })
        .collect())
}

async fn replace_tags(txn: &DatabaseTransaction, recipe_id: Uuid, tags: &[Uuid]) -> AppResult<()> {
    RecipeTags::delete_many()
        .filter(RecipeTagCol::RecipeId.eq(recipe_id))
        .exec(txn)
        .await?;

    let rows = tags.iter().map(|tag_id| RecipeTagActive {
        recipe_id: Set(recipe_id),
        tag_id: Set(*tag_id),
    });
    RecipeTags::insert_many(rows)
        .exec_without_returning(txn)
        .await?;
    Ok(())
}

async fn replace_ingredients(
    txn: &DatabaseTransaction,
    recipe_id: Uuid,
    items: &[IngredientAmount],
) -> AppResult<()> {
    RecipeIngredients::delete_many()
        .filter(RecipeIngredientCol::RecipeId.eq(recipe_id))
        .exec(txn)
        .await?;

    let rows = items.iter().map(|item| RecipeIngredientActive {
        id: Set(Uuid::new_v4()),
        recipe_id: Set(recipe_id),
        ingredient_id: Set(item.id),
        amount: Set(item.amount),
    });
    RecipeIngredients::insert_many(rows)
        .exec_without_returning(txn)
        .await
        .map_err(conflict_on_unique("ingredient is already in the recipe"))?;
    Ok(())
}

async fn build_recipe(
    state: &AppState,
    viewer: Option<&AuthUser>,
    model: RecipeModel,
) -> AppResult<Recipe> {
    build_recipes(state, viewer, vec![model])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("recipe view missing")))
}

/// Loads tags, ingredients, authors and the viewer's flags for a page of
/// recipes with one query per relation.
async fn build_recipes(
    state: &AppState,
    viewer: Option<&AuthUser>,
    models: Vec<RecipeModel>,
) -> AppResult<Vec<Recipe>> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let recipe_ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
    let author_ids: Vec<Uuid> = models
        .iter()
        .map(|m| m.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let mut tags_by_recipe: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    let tag_rows = RecipeTags::find()
        .filter(RecipeTagCol::RecipeId.is_in(recipe_ids.clone()))
        .find_also_related(Tags)
        .order_by_asc(TagCol::Name)
        .all(&state.orm)
        .await?;
    for (link, tag) in tag_rows {
        if let Some(tag) = tag {
            tags_by_recipe.entry(link.recipe_id).or_default().push(Tag::from(tag));
        }
    }

    let mut ingredients_by_recipe: HashMap<Uuid, Vec<RecipeIngredient>> = HashMap::new();
    let ingredient_rows = sqlx::query_as::<_, RecipeIngredientRow>(
        r#"
        SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
        FROM recipe_ingredients ri
        JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY i.name
        "#,
    )
    .bind(recipe_ids.as_slice())
    .fetch_all(&state.pool)
    .await?;
    for row in ingredient_rows {
        ingredients_by_recipe
            .entry(row.recipe_id)
            .or_default()
            .push(RecipeIngredient {
                id: row.id,
                name: row.name,
                measurement_unit: row.measurement_unit,
                amount: row.amount,
            });
    }

    let subscribed = subscribed_author_ids(state, viewer, &author_ids).await?;
    let authors: HashMap<Uuid, User> = Users::find()
        .filter(UserCol::Id.is_in(author_ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|model| {
            let is_subscribed = subscribed.contains(&model.id);
            (model.id, User::from_entity(model, is_subscribed))
        })
        .collect();

    let (favorited, in_cart) = match viewer {
        Some(user) => {
            let favorited: HashSet<Uuid> = Favorites::find()
                .filter(FavCol::UserId.eq(user.user_id))
                .filter(FavCol::RecipeId.is_in(recipe_ids.clone()))
                .all(&state.orm)
                .await?
                .into_iter()
                .map(|row| row.recipe_id)
                .collect();
            let in_cart: HashSet<Uuid> = Carts::find()
                .filter(CartCol::UserId.eq(user.user_id))
                .filter(CartCol::RecipeId.is_in(recipe_ids))
                .all(&state.orm)
                .await?
                .into_iter()
                .map(|row| row.recipe_id)
                .collect();
            (favorited, in_cart)
        }
        None => (HashSet::new(), HashSet::new()),
    };

    models
        .into_iter()
        .map(|model| {
            let author = authors
                .get(&model.author_id)
                .cloned()
                .ok_or_else(|| AppError::Internal(anyhow::anyhow!("recipe author missing")))?;
            Ok(Recipe {
                id: model.id,
                tags: tags_by_recipe.remove(&model.id).unwrap_or_default(),
                author,
                ingredients: ingredients_by_recipe.remove(&model.id).unwrap_or_default(),
                is_favorited: favorited.contains(&model.id),
                is_in_shopping_cart: in_cart.contains(&model.id),
                name: model.name,
                text: model.text,
                cooking_time: model.cooking_time,
            })
        })
        .collect()
}
