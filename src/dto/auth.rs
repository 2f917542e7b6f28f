use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Bearer token claims; `sub` carries the user id.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}
