use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::auth::policy::{self, Action, Actor, Resource};
use crate::chat::functions::FunctionRegistry;
use crate::chat::llm::{ChatMessage, ChatModel, FunctionCall};
use crate::error::AppError;
use crate::model::analytics::{ActionType, LogEntry};
use crate::model::conversation::{
    ConversationSummary, FunctionCallRecord, Message, MessageRole, NewMessage, title_from,
};
use crate::store::{AnalyticsStore, ConversationStore};

pub const SYSTEM_PROMPT: &str = "You are an intelligent HR Assistant for a company. Your role is to help employees with:
- HR policies and procedures
- Leave requests and balance inquiries
- Benefits information
- Onboarding questions
- General workplace queries

Be professional, friendly, and concise. If you need to perform an action (like checking leave balance or submitting a leave request), use the available functions.";

/// Function calls executed per user message. A further call requested
/// after the limit is not dispatched.
pub const MAX_FUNCTION_ROUNDS: usize = 1;

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatReply {
    #[schema(example = 1)]
    pub conversation_id: u64,
    pub message: Message,
}

/// Runs one chat turn: persist the user message, ask the model, execute at
/// most `MAX_FUNCTION_ROUNDS` function calls, persist the reply.
///
/// Messages are written as the turn progresses and are not rolled back if
/// a later step fails.
pub struct ChatOrchestrator {
    conversations: Arc<dyn ConversationStore>,
    analytics: Arc<dyn AnalyticsStore>,
    registry: FunctionRegistry,
    model: Arc<dyn ChatModel>,
    history_limit: u32,
}

impl ChatOrchestrator {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        analytics: Arc<dyn AnalyticsStore>,
        registry: FunctionRegistry,
        model: Arc<dyn ChatModel>,
        history_limit: u32,
    ) -> Self {
        Self {
            conversations,
            analytics,
            registry,
            model,
            history_limit,
        }
    }

    /// Conversations of `user_id`, most recent activity first.
    pub async fn conversations(&self, user_id: u64) -> Result<Vec<ConversationSummary>, AppError> {
        self.conversations.list_conversations(user_id).await
    }

    pub async fn history(&self, actor: Actor, conversation_id: u64) -> Result<Vec<Message>, AppError> {
        self.require_owner(actor, conversation_id, Action::ReadConversation)
            .await?;
        self.conversations.messages(conversation_id).await
    }

    /// Not found and not owned are indistinguishable to the caller.
    pub async fn delete(&self, actor: Actor, conversation_id: u64) -> Result<(), AppError> {
        let owner = self.conversations.conversation_owner(conversation_id).await?;
        let permitted = owner.is_some_and(|owner| {
            policy::authorize(actor, Action::DeleteConversation, Resource::OwnedBy(owner))
                .is_allowed()
        });

        if !permitted {
            return Err(AppError::not_found("Conversation"));
        }
        let deleted = self
            .conversations
            .delete_conversation(conversation_id, actor.user_id)
            .await?;
        if !deleted {
            return Err(AppError::not_found("Conversation"));
        }

        info!(conversation_id, "Conversation deleted");
        Ok(())
    }

    async fn require_owner(
        &self,
        actor: Actor,
        conversation_id: u64,
        action: Action,
    ) -> Result<(), AppError> {
        let resource = match self.conversations.conversation_owner(conversation_id).await? {
            Some(owner) => Resource::OwnedBy(owner),
            // A missing conversation is reported like a foreign one.
            None => Resource::Organization,
        };
        policy::require(actor, action, resource).inspect_err(|_| {
            warn!(conversation_id, user_id = actor.user_id, "Conversation not owned by caller")
        })
    }

    #[instrument(skip(self, text), fields(user_id = actor.user_id))]
    pub async fn send_message(
        &self,
        actor: Actor,
        conversation_id: Option<u64>,
        text: &str,
    ) -> Result<ChatReply, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidInput("Message is required".into()));
        }

        let conversation_id = match conversation_id {
            Some(id) => {
                self.require_owner(actor, id, Action::AppendToConversation)
                    .await?;
                id
            }
            None => {
                let id = self
                    .conversations
                    .create_conversation(actor.user_id, &title_from(text))
                    .await?;
                info!(conversation_id = id, "Conversation created");
                id
            }
        };

        self.conversations
            .append_message(conversation_id, NewMessage::user(text))
            .await?;

        let history = self
            .conversations
            .recent_messages(conversation_id, self.history_limit)
            .await?;

        let mut turns = Vec::with_capacity(history.len() + 3);
        turns.push(ChatMessage::system(SYSTEM_PROMPT));
        turns.extend(history_turns(&history));

        let mut reply = self
            .model
            .complete(&turns, self.registry.declarations())
            .await?;

        let mut rounds = 0;
        while let Some(call) = reply.function_call.clone() {
            if rounds == MAX_FUNCTION_ROUNDS {
                warn!(function = %call.name, "Function call past the round limit treated as text");
                break;
            }
            rounds += 1;

            let arguments = parse_arguments(&call)?;
            let result = self
                .registry
                .dispatch(&call.name, &arguments, actor.user_id)
                .await
                .inspect_err(|e| warn!(function = %call.name, error = %e, "Function call failed"))?;

            self.conversations
                .append_message(
                    conversation_id,
                    NewMessage::function_call(FunctionCallRecord {
                        name: call.name.clone(),
                        arguments,
                        result: result.clone(),
                    }),
                )
                .await?;

            turns.push(reply);
            turns.push(ChatMessage::function_result(&call.name, result.to_string()));

            reply = self.model.complete(&turns, &[]).await?;
        }

        let saved = self
            .conversations
            .append_message(
                conversation_id,
                NewMessage::assistant(reply.content.unwrap_or_default()),
            )
            .await?;

        self.conversations.touch_conversation(conversation_id).await?;

        self.analytics
            .record(LogEntry::new(actor.user_id, ActionType::ChatMessage).with_query(text))
            .await?;

        info!(conversation_id, function_rounds = rounds, "Chat turn completed");
        Ok(ChatReply {
            conversation_id,
            message: saved,
        })
    }
}

fn parse_arguments(call: &FunctionCall) -> Result<Value, AppError> {
    let raw = call.arguments.trim();
    if raw.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw).map_err(|e| {
        warn!(function = %call.name, arguments = %call.arguments, "Unparsable function arguments");
        AppError::MalformedFunctionCall(format!("{}: {e}", call.name))
    })
}

/// Replays stored messages as model turns. A stored function call becomes
/// the assistant's call followed by its result.
fn history_turns(history: &[Message]) -> Vec<ChatMessage> {
    let mut turns = Vec::with_capacity(history.len());
    for message in history {
        match (message.role, &message.function_call) {
            (MessageRole::User, _) => turns.push(ChatMessage::user(&message.content)),
            (MessageRole::Assistant, Some(record)) => {
                turns.push(ChatMessage::function_call(
                    &record.name,
                    record.arguments.to_string(),
                ));
                turns.push(ChatMessage::function_result(
                    &record.name,
                    record.result.to_string(),
                ));
            }
            (MessageRole::Assistant, None) => {
                turns.push(ChatMessage::assistant(&message.content))
            }
            (MessageRole::Function, Some(record)) => turns.push(ChatMessage::function_result(
                &record.name,
                record.result.to_string(),
            )),
            (MessageRole::Function, None) => {}
        }
    }
    turns
}
