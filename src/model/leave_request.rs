use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Sick,
    Vacation,
    Personal,
}

impl TryFrom<String> for LeaveType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl TryFrom<String> for LeaveStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Terminal outcome an approver may set on a pending request.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

impl From<Decision> for LeaveStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approved => LeaveStatus::Approved,
            Decision::Rejected => LeaveStatus::Rejected,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveBalance {
    #[schema(example = 10)]
    pub sick_leave_balance: i32,
    #[schema(example = 15)]
    pub vacation_balance: i32,
}

impl LeaveBalance {
    /// Remaining days for a balance-tracked leave type; `None` for personal leave.
    pub fn available(&self, leave_type: LeaveType) -> Option<i32> {
        match leave_type {
            LeaveType::Sick => Some(self.sick_leave_balance),
            LeaveType::Vacation => Some(self.vacation_balance),
            LeaveType::Personal => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveRequest {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub user_id: u64,
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub leave_type: LeaveType,
    #[schema(example = "2024-01-01", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2024-01-03", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(example = 3)]
    pub days: i32,
    #[schema(example = "Flu", nullable = true)]
    pub reason: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: LeaveStatus,
    #[schema(nullable = true)]
    pub approved_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<DateTime<Utc>>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

/// A leave request joined with the names shown in listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct LeaveRequestView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub request: LeaveRequest,
    pub employee_name: Option<String>,
    pub department: Option<String>,
    pub approver_name: Option<String>,
}

/// Validated input for a new pending request.
#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub user_id: u64,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i32,
    pub reason: Option<String>,
}

impl NewLeaveRequest {
    pub fn new(
        user_id: u64,
        leave_type: LeaveType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: Option<String>,
    ) -> Result<Self, AppError> {
        let days = inclusive_day_span(start_date, end_date)?;
        Ok(Self {
            user_id,
            leave_type,
            start_date,
            end_date,
            days,
            reason: reason.filter(|r| !r.trim().is_empty()),
        })
    }
}

/// Number of calendar days from `start` to `end`, both included.
pub fn inclusive_day_span(start: NaiveDate, end: NaiveDate) -> Result<i32, AppError> {
    if start > end {
        return Err(AppError::InvalidInput(
            "Start date must be before end date".into(),
        ));
    }
    let days = (end - start).num_days() + 1;
    i32::try_from(days).map_err(|_| AppError::InvalidInput("Leave period is too long".into()))
}

pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::InvalidInput(format!("{field} must be a date in YYYY-MM-DD format")))
}
