use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{info, instrument};

use crate::error::AppError;
use crate::model::analytics::{ActionType, LogEntry};
use crate::model::leave_request::{
    Decision, LeaveBalance, LeaveRequest, LeaveRequestView, LeaveStatus, LeaveType,
    NewLeaveRequest,
};
use crate::store::{AnalyticsStore, LeaveStore};

/// Owns the leave-request lifecycle and every balance mutation.
///
/// Requests start `pending` and move exactly once to `approved` or
/// `rejected`. Balances are only debited by an approval.
#[derive(Clone)]
pub struct LeaveLedger {
    leaves: Arc<dyn LeaveStore>,
    analytics: Arc<dyn AnalyticsStore>,
}

impl LeaveLedger {
    pub fn new(leaves: Arc<dyn LeaveStore>, analytics: Arc<dyn AnalyticsStore>) -> Self {
        Self { leaves, analytics }
    }

    pub async fn balance(&self, user_id: u64) -> Result<LeaveBalance, AppError> {
        self.leaves
            .balance(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    /// Direct request from an employee: sick and vacation leave must be
    /// covered by the current balance.
    #[instrument(skip(self, reason))]
    pub async fn create_request(
        &self,
        user_id: u64,
        leave_type: LeaveType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: Option<String>,
    ) -> Result<LeaveRequest, AppError> {
        let new = NewLeaveRequest::new(user_id, leave_type, start_date, end_date, reason)?;

        let balance = self.balance(user_id).await?;
        if let Some(available) = balance.available(leave_type) {
            if available < new.days {
                info!(available, requested = new.days, "Insufficient leave balance");
                return Err(AppError::InsufficientBalance {
                    leave_type: match leave_type {
                        LeaveType::Sick => "sick leave".into(),
                        _ => leave_type.to_string(),
                    },
                    current_balance: available,
                    requested_days: new.days,
                });
            }
        }

        let days = new.days;
        let created = self.leaves.insert_request(new).await?;

        self.analytics
            .record(
                LogEntry::new(user_id, ActionType::LeaveRequest)
                    .with_metadata(json!({ "type": leave_type, "days": days })),
            )
            .await?;

        info!(leave_id = created.id, days, "Leave request created");
        Ok(created)
    }

    /// Request filed by the assistant on the user's behalf. The balance is
    /// not checked here; approval still debits it.
    #[instrument(skip(self, reason))]
    pub async fn submit_without_balance_check(
        &self,
        user_id: u64,
        leave_type: LeaveType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: Option<String>,
    ) -> Result<LeaveRequest, AppError> {
        let new = NewLeaveRequest::new(user_id, leave_type, start_date, end_date, reason)?;
        let created = self.leaves.insert_request(new).await?;
        info!(leave_id = created.id, days = created.days, "Leave request submitted by assistant");
        Ok(created)
    }

    /// Terminal transition of a pending request. The store re-checks the
    /// status inside the same transaction that debits the balance, so a
    /// concurrent second decision fails with `AlreadyProcessed`.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        request_id: u64,
        approver_id: u64,
        decision: Decision,
    ) -> Result<LeaveRequest, AppError> {
        let request = self
            .leaves
            .find_request(request_id)
            .await?
            .ok_or_else(|| AppError::not_found("Leave request"))?;

        if request.status != LeaveStatus::Pending {
            return Err(AppError::AlreadyProcessed);
        }

        let updated = self.leaves.decide(request_id, approver_id, decision).await?;
        info!(status = %updated.status, "Leave request processed");
        Ok(updated)
    }

    pub async fn requests_for_user(&self, user_id: u64) -> Result<Vec<LeaveRequestView>, AppError> {
        self.leaves.requests_for_user(user_id).await
    }

    pub async fn all_requests(
        &self,
        status: Option<LeaveStatus>,
    ) -> Result<Vec<LeaveRequestView>, AppError> {
        self.leaves.all_requests(status).await
    }
}
