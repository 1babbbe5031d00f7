//! Client for an OpenAI-compatible chat-completions endpoint using the
//! `functions` / `function_call` request format.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::ModelConfig;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Function,
}

/// Function invocation requested by the model. `arguments` is the raw
/// JSON text exactly as the model produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl ChatMessage {
    fn with_role(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            name: None,
            function_call: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(ChatRole::Assistant, content)
    }

    pub fn function_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: None,
            name: None,
            function_call: Some(FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            }),
        }
    }

    /// Output of a function, fed back to the model.
    pub fn function_result(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Function,
            content: Some(content.into()),
            name: Some(name.into()),
            function_call: None,
        }
    }
}

/// Operation the model may ask to run, with its JSON-schema parameters.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDecl {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One blocking completion round trip.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// With an empty `functions` slice the model can only answer in text.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        functions: &[FunctionDecl],
    ) -> Result<ChatMessage, AppError>;
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

pub struct OpenAiClient {
    config: ModelConfig,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: ModelConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            config: ModelConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
            client,
        })
    }

    fn body(&self, messages: &[ChatMessage], functions: &[FunctionDecl]) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        if !functions.is_empty() {
            body["functions"] = json!(functions);
            body["function_call"] = json!("auto");
        }

        body
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        functions: &[FunctionDecl],
    ) -> Result<ChatMessage, AppError> {
        let url = format!("{}/chat/completions", self.config.base_url);

        debug!(
            model = %self.config.model,
            messages = messages.len(),
            functions = functions.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&self.body(messages, functions))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %error_body, "Model endpoint returned error");
            return Err(AppError::Upstream(format!(
                "model endpoint returned {status}"
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("failed to parse completion: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| AppError::Upstream("no choices in completion".into()))
    }
}
