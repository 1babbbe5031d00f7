use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Characters of the opening message kept as a conversation title.
pub const TITLE_MAX_CHARS: usize = 50;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Function,
}

impl TryFrom<String> for MessageRole {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// What the assistant asked to run and what came back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FunctionCallRecord {
    pub name: String,
    #[schema(value_type = Object)]
    pub arguments: Value,
    #[schema(value_type = Object)]
    pub result: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Message {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1)]
    pub conversation_id: u64,
    #[sqlx(try_from = "String")]
    pub role: MessageRole,
    #[schema(example = "How many vacation days do I have left?")]
    pub content: String,
    #[schema(value_type = Option<FunctionCallRecord>)]
    pub function_call: Option<Json<FunctionCallRecord>>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

/// Message about to be appended to a conversation.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: MessageRole,
    pub content: String,
    pub function_call: Option<FunctionCallRecord>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            function_call: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            function_call: None,
        }
    }

    /// Function-call turns carry no user-visible text.
    pub fn function_call(record: FunctionCallRecord) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: String::new(),
            function_call: Some(record),
        }
    }
}

/// Row of the conversation list, with a preview of the newest message.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ConversationSummary {
    pub id: u64,
    pub title: String,
    #[schema(value_type = String, format = "date-time")]
    pub last_message_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    pub last_message: Option<String>,
}

/// Title for a conversation opened by `text`.
pub fn title_from(text: &str) -> String {
    text.trim().chars().take(TITLE_MAX_CHARS).collect()
}
