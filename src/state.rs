use crate::{
    config::RecipeLimits,
    db::{DbPool, OrmConn},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub limits: RecipeLimits,
}
