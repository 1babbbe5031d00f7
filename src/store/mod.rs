//! Data store gateway.
//!
//! The chat, leave and knowledge services talk to storage through these
//! traits so every component receives its handle explicitly. `MySqlStore`
//! is the production implementation; tests use the in-memory one.

use async_trait::async_trait;

use crate::error::AppError;
use crate::model::analytics::LogEntry;
use crate::model::conversation::{ConversationSummary, Message, NewMessage};
use crate::model::knowledge::{ArticlePatch, Category, CategoryCount, KnowledgeArticle, NewArticle};
use crate::model::leave_request::{
    Decision, LeaveBalance, LeaveRequest, LeaveRequestView, LeaveStatus, NewLeaveRequest,
};

#[cfg(test)]
pub mod memory;
pub mod mysql;

pub use mysql::MySqlStore;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_conversation(&self, user_id: u64, title: &str) -> Result<u64, AppError>;

    /// Owner of the conversation, `None` if it does not exist.
    async fn conversation_owner(&self, conversation_id: u64) -> Result<Option<u64>, AppError>;

    async fn append_message(
        &self,
        conversation_id: u64,
        message: NewMessage,
    ) -> Result<Message, AppError>;

    /// The newest `limit` messages, oldest first.
    async fn recent_messages(
        &self,
        conversation_id: u64,
        limit: u32,
    ) -> Result<Vec<Message>, AppError>;

    async fn touch_conversation(&self, conversation_id: u64) -> Result<(), AppError>;

    async fn list_conversations(&self, user_id: u64)
    -> Result<Vec<ConversationSummary>, AppError>;

    /// All messages of a conversation in creation order.
    async fn messages(&self, conversation_id: u64) -> Result<Vec<Message>, AppError>;

    /// Deletes the conversation if `user_id` owns it. Returns whether a row went away.
    async fn delete_conversation(&self, conversation_id: u64, user_id: u64)
    -> Result<bool, AppError>;
}

#[async_trait]
pub trait LeaveStore: Send + Sync {
    async fn balance(&self, user_id: u64) -> Result<Option<LeaveBalance>, AppError>;

    async fn insert_request(&self, request: NewLeaveRequest) -> Result<LeaveRequest, AppError>;

    async fn find_request(&self, id: u64) -> Result<Option<LeaveRequest>, AppError>;

    /// Moves a pending request to its terminal status and, on approval,
    /// debits the requester's balance. Status check, status update and
    /// debit commit or fail together; a request that is no longer pending
    /// yields `AlreadyProcessed`.
    async fn decide(
        &self,
        id: u64,
        approver_id: u64,
        decision: Decision,
    ) -> Result<LeaveRequest, AppError>;

    async fn requests_for_user(&self, user_id: u64) -> Result<Vec<LeaveRequestView>, AppError>;

    async fn all_requests(
        &self,
        status: Option<LeaveStatus>,
    ) -> Result<Vec<LeaveRequestView>, AppError>;
}

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Case-insensitive substring match on title or content.
    async fn search(
        &self,
        query: &str,
        category: Option<Category>,
        limit: u32,
    ) -> Result<Vec<KnowledgeArticle>, AppError>;

    async fn list(
        &self,
        category: Option<Category>,
        search: Option<&str>,
    ) -> Result<Vec<KnowledgeArticle>, AppError>;

    async fn get(&self, id: u64) -> Result<Option<KnowledgeArticle>, AppError>;

    async fn create(&self, article: NewArticle, author_id: u64)
    -> Result<KnowledgeArticle, AppError>;

    async fn update(&self, id: u64, patch: ArticlePatch)
    -> Result<Option<KnowledgeArticle>, AppError>;

    async fn delete(&self, id: u64) -> Result<bool, AppError>;

    async fn categories(&self) -> Result<Vec<CategoryCount>, AppError>;
}

#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn record(&self, entry: LogEntry) -> Result<(), AppError>;
}

/// `%needle%` pattern for LIKE with the wildcards of `needle` escaped.
pub fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
