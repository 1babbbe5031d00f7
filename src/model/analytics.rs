use serde::Serialize;
use serde_json::Value;
use strum_macros::{AsRefStr, Display};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionType {
    ChatMessage,
    LeaveRequest,
    KnowledgeSearch,
}

/// Append-only event; never read back for control flow.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub user_id: u64,
    pub action: ActionType,
    pub query: Option<String>,
    pub metadata: Option<Value>,
}

impl LogEntry {
    pub fn new(user_id: u64, action: ActionType) -> Self {
        Self {
            user_id,
            action,
            query: None,
            metadata: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
