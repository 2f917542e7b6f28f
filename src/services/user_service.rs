use std::collections::HashSet;

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use password_hash::rand_core::OsRng;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use uuid::Uuid;

use crate::{
    audit,
    db::is_sqlx_unique_violation,
    dto::users::{RegisterRequest, UserList},
    entity::{
        follows::{Column as FollowCol, Entity as Follows},
        users::{Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::User,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
    validation::validate_registration,
};

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    validate_registration(&payload)?;
    let RegisterRequest {
        email,
        username,
        first_name,
        last_name,
        password,
    } = payload;

    let taken: Option<(String, String)> =
        sqlx::query_as("SELECT email, username FROM users WHERE email = $1 OR username = $2")
            .bind(email.as_str())
            .bind(username.as_str())
            .fetch_optional(&state.pool)
            .await?;
    if let Some((taken_email, _)) = taken {
        let field = if taken_email == email { "email" } else { "username" };
        return Err(AppError::validation(
            field,
            format!("a user with this {field} already exists"),
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();

    let id = Uuid::new_v4();
    let inserted: Result<(Uuid,), sqlx::Error> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, username, first_name, last_name, password_hash)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(email.as_str())
    .bind(username.as_str())
    .bind(first_name.as_str())
    .bind(last_name.as_str())
    .bind(password_hash)
    .fetch_one(&state.pool)
    .await;

    match inserted {
        Ok(_) => {}
        Err(err) if is_sqlx_unique_violation(&err) => {
            return Err(AppError::Conflict(
                "email or username is already taken".into(),
            ));
        }
        Err(err) => return Err(err.into()),
    }

    audit::record(
        &state.pool,
        id,
        "user_register",
        "users",
        serde_json::json!({ "user_id": id }),
    )
    .await;

    let user = User {
        id,
        email,
        username,
        first_name,
        last_name,
        is_subscribed: false,
    };
    Ok(ApiResponse::success("User created", user, Some(Meta::empty())))
}

pub async fn list_users(
    state: &AppState,
    viewer: Option<&AuthUser>,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Users::find().order_by_asc(UserCol::Username);
    let total = finder.clone().count(&state.orm).await? as i64;

    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = models.iter().map(|u| u.id).collect();
    let subscribed = subscribed_author_ids(state, viewer, &ids).await?;
    let items = models
        .into_iter()
        .map(|model| {
            let is_subscribed = subscribed.contains(&model.id);
            User::from_entity(model, is_subscribed)
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Users", UserList { items }, Some(meta)))
}

pub async fn get_user(
    state: &AppState,
    viewer: Option<&AuthUser>,
    id: Uuid,
) -> AppResult<ApiResponse<User>> {
    let model = find_user(state, id).await?;
    let subscribed = subscribed_author_ids(state, viewer, &[model.id]).await?;
    let is_subscribed = subscribed.contains(&model.id);
    Ok(ApiResponse::success(
        "User",
        User::from_entity(model, is_subscribed),
        None,
    ))
}

pub async fn current_user(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let model = find_user(state, user.user_id).await?;
    Ok(ApiResponse::success("User", User::from_entity(model, false), None))
}

pub(crate) async fn find_user(state: &AppState, id: Uuid) -> AppResult<UserModel> {
    Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

/// Which of `author_ids` the viewer follows. Anonymous viewers follow nobody,
/// and nobody counts as subscribed to themself.
pub(crate) async fn subscribed_author_ids(
    state: &AppState,
    viewer: Option<&AuthUser>,
    author_ids: &[Uuid],
) -> AppResult<HashSet<Uuid>> {
    let Some(viewer) = viewer else {
        return Ok(HashSet::new());
    };
    if author_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let rows = Follows::find()
        .filter(FollowCol::UserId.eq(viewer.user_id))
        .filter(FollowCol::AuthorId.is_in(author_ids.to_vec()))
        .all(&state.orm)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| row.author_id)
        .filter(|author_id| *author_id != viewer.user_id)
        .collect())
}
