//! Scripted stand-in for the hosted model.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::chat::llm::{ChatMessage, ChatModel, FunctionDecl};
use crate::error::AppError;

/// What the orchestrator sent on one call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub function_names: Vec<String>,
}

/// Returns queued replies in order and records every request.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ChatMessage, AppError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<ChatMessage, AppError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn text(reply: &str) -> Self {
        Self::new(vec![Ok(ChatMessage::assistant(reply))])
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        functions: &[FunctionDecl],
    ) -> Result<ChatMessage, AppError> {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            function_names: functions.iter().map(|f| f.name.clone()).collect(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedModel: no reply left for call"))
    }
}
