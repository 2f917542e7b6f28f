use std::path::{Path, PathBuf};

use anyhow::Context;
use foodgram_api::{
    config::AppConfig,
    db::{DbPool, create_orm_conn, create_pool, run_migrations},
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct IngredientRecord {
    name: String,
    measurement_unit: String,
}

#[derive(Debug, Deserialize)]
struct TagRecord {
    name: String,
    color: String,
    slug: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".into()));

    // Ensure the schema exists before loading.
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;
    let pool = create_pool(&config.database_url).await?;

    let ingredients: Vec<IngredientRecord> = read_json(&data_dir.join("ingredients.json")).await?;
    let (created, total) = load_ingredients(&pool, &ingredients).await?;
    println!("Ingredients: {created} created, {total} in file");

    let tags: Vec<TagRecord> = read_json(&data_dir.join("tags.json")).await?;
    let (created, total) = load_tags(&pool, &tags).await?;
    println!("Tags: {created} created, {total} in file");

    Ok(())
}

async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> anyhow::Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let parsed =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(parsed)
}

/// Existing (name, unit) pairs are left untouched, so reruns only add new rows.
async fn load_ingredients(
    pool: &DbPool,
    records: &[IngredientRecord],
) -> anyhow::Result<(u64, usize)> {
    let mut created = 0;
    for record in records {
        let result = sqlx::query(
            r#"
            INSERT INTO ingredients (id, name, measurement_unit)
            VALUES ($1, $2, $3)
            ON CONFLICT (name, measurement_unit) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.name.as_str())
        .bind(record.measurement_unit.as_str())
        .execute(pool)
        .await?;
        created += result.rows_affected();
    }
    Ok((created, records.len()))
}

async fn load_tags(pool: &DbPool, records: &[TagRecord]) -> anyhow::Result<(u64, usize)> {
    let mut created = 0;
    for record in records {
        let result = sqlx::query(
            r#"
            INSERT INTO tags (id, name, color, slug)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.name.as_str())
        .bind(record.color.as_str())
        .bind(record.slug.as_str())
        .execute(pool)
        .await?;
        created += result.rows_affected();
    }
    Ok((created, records.len()))
}
