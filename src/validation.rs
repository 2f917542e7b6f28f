//! Input checks that do not touch the database.
//!
//! Each validator runs its rules in a fixed order and returns the first
//! violation. Callers gather whatever lookups the rules need up front.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    config::RecipeLimits,
    dto::{recipes::IngredientAmount, users::RegisterRequest},
    error::{AppError, AppResult},
};

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_USER_ATTR_LEN: usize = 150;
pub const MAX_EMAIL_LEN: usize = 254;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeOperation {
    Create,
    Update,
}

/// The recipe as it would look after the write.
#[derive(Debug, Clone, Copy)]
pub struct RecipeDraft<'a> {
    pub tags: &'a [Uuid],
    pub ingredients: &'a [IngredientAmount],
    pub name: &'a str,
    pub text: &'a str,
    pub cooking_time: i32,
}

/// Facts about stored data the recipe rules depend on.
#[derive(Debug, Clone, Copy)]
pub struct RecipeLookups<'a> {
    pub existing_tags: &'a HashSet<Uuid>,
    pub existing_ingredients: &'a HashSet<Uuid>,
    /// The author already owns a recipe with the draft's name.
    pub name_taken: bool,
}

pub fn validate_recipe(
    draft: &RecipeDraft<'_>,
    lookups: &RecipeLookups<'_>,
    limits: RecipeLimits,
    operation: RecipeOperation,
) -> AppResult<()> {
    if draft.tags.is_empty() {
        return Err(AppError::validation("tags", "at least one tag is required"));
    }
    if draft.ingredients.is_empty() {
        return Err(AppError::validation(
            "ingredients",
            "at least one ingredient is required",
        ));
    }

    if let Some(missing) = draft.tags.iter().find(|id| !lookups.existing_tags.contains(id)) {
        return Err(AppError::validation(
            "tags",
            format!("tag {missing} does not exist"),
        ));
    }

    if let Some(dup) = first_duplicate(draft.tags.iter().copied()) {
        return Err(AppError::validation(
            "tags",
            format!("tag {dup} is listed more than once"),
        ));
    }

    if draft
        .ingredients
        .iter()
        .any(|item| !lookups.existing_ingredients.contains(&item.id))
    {
        return Err(AppError::NotFound);
    }

    if let Some(dup) = first_duplicate(draft.ingredients.iter().map(|item| item.id)) {
        return Err(AppError::validation(
            "ingredients",
            format!("ingredient {dup} is already in the recipe"),
        ));
    }

    if let Some(item) = draft
        .ingredients
        .iter()
        .find(|item| item.amount < limits.min_ingredient_amount)
    {
        return Err(AppError::validation(
            "ingredients",
            format!(
                "amount for ingredient {} must be at least {}",
                item.id, limits.min_ingredient_amount
            ),
        ));
    }

    if draft.cooking_time < limits.min_cooking_time {
        return Err(AppError::validation(
            "cooking_time",
            format!("cooking time must be at least {}", limits.min_cooking_time),
        ));
    }

    if operation == RecipeOperation::Create && lookups.name_taken {
        return Err(AppError::validation(
            "name",
            "author already has a recipe with this name",
        ));
    }

    check_text_field("name", draft.name, Some(MAX_NAME_LEN))?;
    check_text_field("text", draft.text, None)?;

    Ok(())
}

/// Every slug in a recipe list filter must name an existing tag.
pub fn validate_tag_slugs(requested: &[String], known: &HashSet<String>) -> AppResult<()> {
    match requested.iter().find(|slug| !known.contains(slug.as_str())) {
        Some(slug) => Err(AppError::validation(
            "tags",
            format!("select a valid choice, {slug} is not one of the available tags"),
        )),
        None => Ok(()),
    }
}

/// A follower may not follow themself nor follow the same author twice.
pub fn validate_subscription(
    follower_id: Uuid,
    author_id: Uuid,
    already_following: bool,
) -> AppResult<()> {
    if follower_id == author_id {
        return Err(AppError::validation(
            "author",
            "cannot subscribe to yourself",
        ));
    }
    if already_following {
        return Err(AppError::Conflict("already subscribed to this author".into()));
    }
    Ok(())
}

pub fn validate_registration(payload: &RegisterRequest) -> AppResult<()> {
    check_text_field("email", &payload.email, Some(MAX_EMAIL_LEN))?;
    if !payload.email.contains('@') {
        return Err(AppError::validation("email", "enter a valid email address"));
    }

    check_text_field("username", &payload.username, Some(MAX_USER_ATTR_LEN))?;
    let restricted: String = payload
        .username
        .chars()
        .filter(|c| !is_username_char(*c))
        .collect();
    if !restricted.is_empty() {
        return Err(AppError::validation(
            "username",
            format!(
                "username may only contain letters, digits and ./@/+/-/_ characters, found {restricted}"
            ),
        ));
    }

    check_text_field("first_name", &payload.first_name, Some(MAX_USER_ATTR_LEN))?;
    check_text_field("last_name", &payload.last_name, Some(MAX_USER_ATTR_LEN))?;
    check_text_field("password", &payload.password, Some(MAX_USER_ATTR_LEN))?;
    Ok(())
}

fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-')
}

fn check_text_field(field: &'static str, value: &str, max_len: Option<usize>) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(field, "this field may not be blank"));
    }
    match max_len {
        Some(max) if value.chars().count() > max => Err(AppError::validation(
            field,
            format!("ensure this field has no more than {max} characters"),
        )),
        _ => Ok(()),
    }
}

fn first_duplicate<I>(ids: I) -> Option<Uuid>
where
    I: IntoIterator<Item = Uuid>,
{
    let mut seen = HashSet::new();
    ids.into_iter().find(|id| !seen.insert(*id))
}
