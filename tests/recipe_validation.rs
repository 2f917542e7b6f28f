use std::collections::HashSet;

use foodgram_api::{
    config::RecipeLimits,
    dto::{recipes::IngredientAmount, users::RegisterRequest},
    error::AppError,
    validation::{
        RecipeDraft, RecipeLookups, RecipeOperation, validate_recipe, validate_registration,
        validate_subscription, validate_tag_slugs,
    },
};
use uuid::Uuid;

struct Fixture {
    tags: HashSet<Uuid>,
    ingredients: HashSet<Uuid>,
    tag: Uuid,
    flour: Uuid,
    eggs: Uuid,
}

impl Fixture {
    fn new() -> Self {
        let tag = Uuid::new_v4();
        let flour = Uuid::new_v4();
        let eggs = Uuid::new_v4();
        Self {
            tags: HashSet::from([tag]),
            ingredients: HashSet::from([flour, eggs]),
            tag,
            flour,
            eggs,
        }
    }

    fn lookups(&self, name_taken: bool) -> RecipeLookups<'_> {
        RecipeLookups {
            existing_tags: &self.tags,
            existing_ingredients: &self.ingredients,
            name_taken,
        }
    }
}

fn amount(id: Uuid, amount: i32) -> IngredientAmount {
    IngredientAmount { id, amount }
}

fn check(
    fx: &Fixture,
    tags: &[Uuid],
    ingredients: &[IngredientAmount],
    cooking_time: i32,
    name_taken: bool,
    op: RecipeOperation,
) -> Result<(), AppError> {
    let draft = RecipeDraft {
        tags,
        ingredients,
        name: "Pancakes",
        text: "Mix and fry.",
        cooking_time,
    };
    validate_recipe(&draft, &fx.lookups(name_taken), RecipeLimits::default(), op)
}

fn field_of(err: AppError) -> &'static str {
    match err {
        AppError::Validation { field, .. } => field,
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn valid_recipe_passes() {
    let fx = Fixture::new();
    let items = [amount(fx.flour, 200), amount(fx.eggs, 2)];
    assert!(check(&fx, &[fx.tag], &items, 10, false, RecipeOperation::Create).is_ok());
}

#[test]
fn duplicate_ingredient_is_reported_on_ingredients() {
    let fx = Fixture::new();
    let items = [amount(fx.flour, 100), amount(fx.flour, 200)];
    let err = check(&fx, &[fx.tag], &items, 10, false, RecipeOperation::Create).unwrap_err();
    assert_eq!(field_of(err), "ingredients");
}

#[test]
fn amount_must_reach_minimum() {
    let fx = Fixture::new();
    let zero = [amount(fx.flour, 0)];
    let err = check(&fx, &[fx.tag], &zero, 10, false, RecipeOperation::Create).unwrap_err();
    assert_eq!(field_of(err), "ingredients");

    let one = [amount(fx.flour, 1)];
    assert!(check(&fx, &[fx.tag], &one, 10, false, RecipeOperation::Create).is_ok());
}

#[test]
fn cooking_time_must_reach_minimum() {
    let fx = Fixture::new();
    let items = [amount(fx.flour, 1)];
    let err = check(&fx, &[fx.tag], &items, 0, false, RecipeOperation::Create).unwrap_err();
    assert_eq!(field_of(err), "cooking_time");
    assert!(check(&fx, &[fx.tag], &items, 1, false, RecipeOperation::Create).is_ok());
}

#[test]
fn configured_limits_are_respected() {
    let fx = Fixture::new();
    let items = [amount(fx.flour, 4)];
    let draft = RecipeDraft {
        tags: &[fx.tag],
        ingredients: &items,
        name: "Pancakes",
        text: "Mix and fry.",
        cooking_time: 10,
    };
    let limits = RecipeLimits {
        min_cooking_time: 1,
        min_ingredient_amount: 5,
    };
    let err = validate_recipe(&draft, &fx.lookups(false), limits, RecipeOperation::Create)
        .unwrap_err();
    assert_eq!(field_of(err), "ingredients");
}

#[test]
fn unknown_ingredient_is_not_found() {
    let fx = Fixture::new();
    let items = [amount(Uuid::new_v4(), 10)];
    let err = check(&fx, &[fx.tag], &items, 10, false, RecipeOperation::Create).unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[test]
fn empty_tags_and_ingredients_are_rejected() {
    let fx = Fixture::new();
    let items = [amount(fx.flour, 10)];
    let err = check(&fx, &[], &items, 10, false, RecipeOperation::Create).unwrap_err();
    assert_eq!(field_of(err), "tags");

    let err = check(&fx, &[fx.tag], &[], 10, false, RecipeOperation::Create).unwrap_err();
    assert_eq!(field_of(err), "ingredients");
}

#[test]
fn unknown_and_repeated_tags_are_rejected() {
    let fx = Fixture::new();
    let items = [amount(fx.flour, 10)];
    let err = check(&fx, &[Uuid::new_v4()], &items, 10, false, RecipeOperation::Create)
        .unwrap_err();
    assert_eq!(field_of(err), "tags");

    let err = check(&fx, &[fx.tag, fx.tag], &items, 10, false, RecipeOperation::Create)
        .unwrap_err();
    assert_eq!(field_of(err), "tags");
}

#[test]
fn first_failing_rule_wins() {
    let fx = Fixture::new();
    // Duplicate ingredient, low amount and low cooking time all at once.
    let items = [amount(fx.flour, 0), amount(fx.flour, 0)];
    let err = check(&fx, &[fx.tag], &items, 0, true, RecipeOperation::Create).unwrap_err();
    match err {
        AppError::Validation { field, message } => {
            assert_eq!(field, "ingredients");
            assert!(message.contains("already in the recipe"), "{message}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn taken_name_only_blocks_creation() {
    let fx = Fixture::new();
    let items = [amount(fx.flour, 10)];
    let err = check(&fx, &[fx.tag], &items, 10, true, RecipeOperation::Create).unwrap_err();
    assert_eq!(field_of(err), "name");

    assert!(check(&fx, &[fx.tag], &items, 10, true, RecipeOperation::Update).is_ok());
}

#[test]
fn blank_name_is_rejected() {
    let fx = Fixture::new();
    let items = [amount(fx.flour, 10)];
    let draft = RecipeDraft {
        tags: &[fx.tag],
        ingredients: &items,
        name: "   ",
        text: "text",
        cooking_time: 5,
    };
    let err = validate_recipe(
        &draft,
        &fx.lookups(false),
        RecipeLimits::default(),
        RecipeOperation::Create,
    )
    .unwrap_err();
    assert_eq!(field_of(err), "name");
}

#[test]
fn self_subscription_is_rejected() {
    let me = Uuid::new_v4();
    let err = validate_subscription(me, me, false).unwrap_err();
    assert_eq!(field_of(err), "author");
}

#[test]
fn second_subscription_is_rejected() {
    let err = validate_subscription(Uuid::new_v4(), Uuid::new_v4(), true).unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);

    assert!(validate_subscription(Uuid::new_v4(), Uuid::new_v4(), false).is_ok());
}

fn registration(username: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        username: username.to_string(),
        first_name: "Ivan".to_string(),
        last_name: "Petrov".to_string(),
        password: "s3cret-pass".to_string(),
    }
}

#[test]
fn registration_checks_username_and_email() {
    assert!(validate_registration(&registration("chef.ivan+1", "ivan@example.com")).is_ok());

    let err = validate_registration(&registration("bad name!", "ivan@example.com")).unwrap_err();
    assert_eq!(field_of(err), "username");

    let err = validate_registration(&registration("ivan", "not-an-email")).unwrap_err();
    assert_eq!(field_of(err), "email");
}

#[test]
fn unknown_tag_slug_in_filter_is_rejected() {
    let known = HashSet::from(["breakfast".to_string(), "dinner".to_string()]);
    let requested = vec!["breakfast".to_string(), "brunch".to_string()];
    match validate_tag_slugs(&requested, &known).unwrap_err() {
        AppError::Validation { field, message } => {
            assert_eq!(field, "tags");
            assert!(message.contains("brunch"), "{message}");
        }
        other => panic!("unexpected error {other:?}"),
    }

    assert!(validate_tag_slugs(&["dinner".to_string()], &known).is_ok());
    assert!(validate_tag_slugs(&[], &known).is_ok());
}
