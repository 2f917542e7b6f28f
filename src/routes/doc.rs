use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        ingredients::{IngredientList, IngredientQuery},
        recipes::{CreateRecipeRequest, IngredientAmount, RecipeList, UpdateRecipeRequest},
        tags::TagList,
        users::{RegisterRequest, SubscriptionList, UserList},
    },
    models::{
        Ingredient, Recipe, RecipeIngredient, RecipeMinified, ShoppingListItem, Subscription, Tag,
        User,
    },
    response::{ApiResponse, Meta},
    routes::{health, ingredients, params, recipes, tags, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        users::register,
        users::list_users,
        users::get_user,
        users::me,
        users::subscriptions,
        users::subscribe,
        users::unsubscribe,
        tags::list_tags,
        tags::get_tag,
        ingredients::list_ingredients,
        ingredients::get_ingredient,
        recipes::list_recipes,
        recipes::get_recipe,
        recipes::create_recipe,
        recipes::update_recipe,
        recipes::delete_recipe,
        recipes::add_favorite,
        recipes::remove_favorite,
        recipes::add_to_shopping_cart,
        recipes::remove_from_shopping_cart,
        recipes::download_shopping_cart
    ),
    components(
        schemas(
            User,
            Tag,
            Ingredient,
            Recipe,
            RecipeIngredient,
            RecipeMinified,
            Subscription,
            ShoppingListItem,
            RegisterRequest,
            CreateRecipeRequest,
            UpdateRecipeRequest,
            IngredientAmount,
            IngredientQuery,
            UserList,
            SubscriptionList,
            TagList,
            IngredientList,
            RecipeList,
            params::Pagination,
            params::SubscriptionQuery,
            health::HealthData,
            Meta,
            ApiResponse<User>,
            ApiResponse<UserList>,
            ApiResponse<Recipe>,
            ApiResponse<RecipeList>,
            ApiResponse<Subscription>,
            ApiResponse<SubscriptionList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Users", description = "Registration and user profiles"),
        (name = "Subscriptions", description = "Following authors"),
        (name = "Tags", description = "Recipe tags"),
        (name = "Ingredients", description = "Ingredient catalog and search"),
        (name = "Recipes", description = "Recipe endpoints"),
        (name = "Favorites", description = "Favorite recipes"),
        (name = "Cart", description = "Shopping cart and shopping list download"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
