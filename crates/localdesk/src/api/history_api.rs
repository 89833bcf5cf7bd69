//! Chat history for the signed-in user

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{error, info};

use super::{observe, ApiError, ErrorResponse};
use crate::auth::AuthUser;
use crate::db::{Chat, StoredMessage};
use crate::shared_state::AppState;

#[derive(Debug, Serialize)]
pub struct ChatsResponse {
    pub chats: Vec<Chat>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagesResponse {
    pub chat_id: String,
    pub messages: Vec<StoredMessage>,
}

/// GET /api/chats, newest first
pub async fn list_chats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ChatsResponse>, ApiError> {
    let result = match state.database.chats.list_chats(&user.id) {
        Ok(chats) => {
            info!("Fetched {} chats for {}", chats.len(), user.id);
            Ok(Json(ChatsResponse { chats }))
        }
        Err(e) => {
            error!("Failed to list chats for {}: {}", user.id, e);
            Err(ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch chat history"))
        }
    };
    observe("chats_list", result)
}

/// GET /api/chats/:id/messages; 404 unless the chat belongs to the caller
pub async fn get_chat_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(chat_id): Path<String>,
) -> Result<Json<ChatMessagesResponse>, ApiError> {
    let result = match state.database.chats.get_messages(&user.id, &chat_id) {
        Ok(Some(messages)) => Ok(Json(ChatMessagesResponse { chat_id, messages })),
        Ok(None) => Err(ErrorResponse::new(StatusCode::NOT_FOUND, "Chat not found")),
        Err(e) => {
            error!("Failed to fetch messages of chat {}: {}", chat_id, e);
            Err(ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch messages"))
        }
    };
    observe("chat_messages", result)
}
