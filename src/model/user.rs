use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::role::Role;

/// Public profile of a user. The password hash never leaves the auth module.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct User {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "jane.doe@company.com")]
    pub email: String,
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "Engineering", nullable = true)]
    pub department: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[schema(example = "2024-01-01", value_type = Option<String>, format = "date")]
    pub hire_date: Option<NaiveDate>,
    #[schema(example = 10)]
    pub sick_leave_balance: i32,
    #[schema(example = 15)]
    pub vacation_balance: i32,
    #[schema(example = "2024-01-01T00:00:00Z", value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
