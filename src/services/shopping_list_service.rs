use std::collections::BTreeMap;

use sqlx::FromRow;

use crate::{
    error::AppResult,
    middleware::auth::AuthUser,
    models::ShoppingListItem,
    response::TextAttachment,
    state::AppState,
};

pub const SHOPPING_LIST_HEADER: &str = "Список покупок:";
pub const SHOPPING_LIST_SIGNATURE: &str = "Foodgram - продуктовый помощник ";
pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

/// A single ingredient line of a recipe sitting in someone's cart.
#[derive(Debug, Clone, FromRow)]
pub struct CartIngredientRow {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// Sums amounts per (name, unit) pair.
///
/// Grouping is on the displayed fields, so two ingredient rows sharing a name
/// and unit collapse into one line. Output is ordered by name in code point
/// order, then by unit.
pub fn aggregate_rows<I>(rows: I) -> Vec<ShoppingListItem>
where
    I: IntoIterator<Item = CartIngredientRow>,
{
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for row in rows {
        *totals.entry((row.name, row.measurement_unit)).or_insert(0) += i64::from(row.amount);
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), amount)| ShoppingListItem {
            name,
            amount,
            measurement_unit,
        })
        .collect()
}

/// Renders the downloadable text file. Clients parse this layout, keep it stable.
pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    let mut out = String::from(SHOPPING_LIST_HEADER);
    for item in items {
        out.push('\n');
        out.push_str(&format!(
            "{} - {} {}",
            item.name, item.amount, item.measurement_unit
        ));
    }
    out.push('\n');
    out.push_str(SHOPPING_LIST_SIGNATURE);
    out
}

pub async fn shopping_list(state: &AppState, user: &AuthUser) -> AppResult<Vec<ShoppingListItem>> {
    let rows = sqlx::query_as::<_, CartIngredientRow>(
        r#"
        SELECT i.name, i.measurement_unit, ri.amount
        FROM carts c
        JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&state.pool)
    .await?;

    let row_count = rows.len();
    let items = aggregate_rows(rows);
    tracing::debug!(
        user_id = %user.user_id,
        rows = row_count,
        lines = items.len(),
        "shopping list aggregated"
    );
    Ok(items)
}

pub async fn download_shopping_list(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<TextAttachment> {
    let items = shopping_list(state, user).await?;
    Ok(TextAttachment {
        filename: SHOPPING_LIST_FILENAME,
        body: render_shopping_list(&items),
    })
}
