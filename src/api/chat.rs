use actix_web::{HttpResponse, rt::time::timeout, web};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessage {
    #[serde(default)]
    #[schema(example = "How many vacation days do I have left?")]
    pub message: String,
    /// Omit to start a new conversation.
    #[schema(example = 1)]
    pub conversation_id: Option<u64>,
}

#[utoipa::path(
    post,
    path = "/api/chat/message",
    request_body = SendMessage,
    responses(
        (status = 200, description = "Assistant reply", body = crate::chat::ChatReply),
        (status = 400, description = "Empty message"),
        (status = 403, description = "Conversation belongs to someone else"),
        (status = 502, description = "Model failure"),
        (status = 504, description = "Model timed out")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn send_message(
    auth: AuthUser,
    state: web::Data<AppState>,
    config: web::Data<Config>,
    payload: web::Json<SendMessage>,
) -> Result<HttpResponse, AppError> {
    let turn = state
        .chat
        .send_message(auth.actor(), payload.conversation_id, &payload.message);

    let reply = timeout(config.chat_timeout, turn).await.map_err(|_| {
        warn!(user_id = auth.user_id, "Chat turn exceeded deadline");
        AppError::UpstreamTimeout
    })??;

    Ok(HttpResponse::Ok().json(reply))
}

#[utoipa::path(
    get,
    path = "/api/chat/conversations",
    responses((status = 200, description = "Caller's conversations", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn list_conversations(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let conversations = state.chat.conversations(auth.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "conversations": conversations })))
}

#[utoipa::path(
    get,
    path = "/api/chat/conversations/{id}",
    params(("id" = u64, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Messages, oldest first", body = Object),
        (status = 403, description = "Not the caller's conversation")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn get_conversation(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let messages = state.chat.history(auth.actor(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "messages": messages })))
}

#[utoipa::path(
    delete,
    path = "/api/chat/conversations/{id}",
    params(("id" = u64, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Conversation not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn delete_conversation(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    state.chat.delete(auth.actor(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Conversation deleted successfully" })))
}
