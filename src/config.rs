use std::env;

/// Lower bounds applied by recipe validation.
#[derive(Debug, Clone, Copy)]
pub struct RecipeLimits {
    pub min_cooking_time: i32,
    pub min_ingredient_amount: i32,
}

impl RecipeLimits {
    /// Both minimums must be at least 1; the schema enforces the same floor.
    pub fn new(min_cooking_time: i32, min_ingredient_amount: i32) -> anyhow::Result<Self> {
        if min_cooking_time < 1 {
            anyhow::bail!("MIN_COOKING_TIME must be at least 1, got {min_cooking_time}");
        }
        if min_ingredient_amount < 1 {
            anyhow::bail!("MIN_INGREDIENT_AMOUNT must be at least 1, got {min_ingredient_amount}");
        }
        Ok(Self {
            min_cooking_time,
            min_ingredient_amount,
        })
    }
}

impl Default for RecipeLimits {
    fn default() -> Self {
        Self {
            min_cooking_time: 1,
            min_ingredient_amount: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub limits: RecipeLimits,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);

        let defaults = RecipeLimits::default();
        let limits = RecipeLimits::new(
            env_i32("MIN_COOKING_TIME").unwrap_or(defaults.min_cooking_time),
            env_i32("MIN_INGREDIENT_AMOUNT").unwrap_or(defaults.min_ingredient_amount),
        )?;

        Ok(Self {
            port,
            database_url,
            host,
            limits,
        })
    }
}

fn env_i32(key: &str) -> Option<i32> {
    env::var(key).ok().and_then(|v| v.parse::<i32>().ok())
}
