use serde::Serialize;
use utoipa::ToSchema;

use crate::models::Tag;

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct TagList {
    #[schema(value_type = Vec<Tag>)]
    pub items: Vec<Tag>,
}
