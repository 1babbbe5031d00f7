use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    Policies,
    Benefits,
    Procedures,
    Faq,
}

impl TryFrom<String> for Category {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct KnowledgeArticle {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Remote Work Policy")]
    pub title: String,
    #[schema(example = "Employees may work remotely up to three days per week.")]
    pub content: String,
    #[sqlx(try_from = "String")]
    pub category: Category,
    #[schema(value_type = Vec<String>, example = json!(["remote", "policy"]))]
    pub tags: Json<Vec<String>>,
    #[schema(nullable = true)]
    pub created_by: Option<u64>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewArticle {
    #[serde(default)]
    #[schema(example = "Remote Work Policy")]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub category: Option<Category>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<Category>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}
