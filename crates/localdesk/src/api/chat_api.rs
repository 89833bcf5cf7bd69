//! POST /api/chat: retrieval-augmented streaming chat
//!
//! Flow: validate body → retrieve knowledge-base excerpts for the last user
//! message → stream the completion back as plain text → persist the exchange
//! once the stream finishes (signed-in callers only).

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::{ApiError, ErrorResponse};
use crate::auth::AuthUser;
use crate::llm::ChatMessage;
use crate::metrics;
use crate::rag::system_prompt;
use crate::shared_state::AppState;

const ROUTE: &str = "chat";

/// Keeps `active_chat_streams` accurate even when the client disconnects.
struct ActiveStream;

impl ActiveStream {
    fn start() -> Self {
        metrics::inc_streams();
        ActiveStream
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        metrics::dec_streams();
    }
}

pub async fn chat(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    body: Bytes,
) -> Response {
    match start_chat(state, user, &body).await {
        Ok(response) => {
            metrics::inc_request(ROUTE, StatusCode::OK);
            response
        }
        Err((status, body)) => {
            metrics::inc_request(ROUTE, status);
            (status, body).into_response()
        }
    }
}

async fn start_chat(state: AppState, user: Option<AuthUser>, body: &[u8]) -> Result<Response, ApiError> {
    if !state.llm.is_configured() {
        error!("Chat request rejected: OPENAI_API_KEY not configured");
        return Err(ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "OPENAI_API_KEY not configured"));
    }
    let messages = parse_chat_messages(body)?;
    let user_id = user.map(|AuthUser(user)| user.id);
    info!("Chat request: {} messages, {}", messages.len(),
        user_id.as_deref().map(|id| format!("user {}", id)).unwrap_or_else(|| "guest".to_string()));

    let user_message = messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.clone())
        .unwrap_or_default();

    let excerpts = match state
        .retriever
        .search(&user_message, state.config.match_threshold, state.config.match_count)
        .await
    {
        Ok(excerpts) => excerpts,
        Err(e) => {
            warn!("Retrieval failed, answering without knowledge base: {}", e);
            Vec::new()
        }
    };
    debug!("Using {} knowledge-base excerpts", excerpts.len());

    let mut prompt_messages = Vec::with_capacity(messages.len() + 1);
    prompt_messages.push(ChatMessage::system(system_prompt(&excerpts)));
    prompt_messages.extend(messages);

    let deltas = state.llm.stream_chat(&prompt_messages).await.map_err(|e| {
        error!("Chat completion failed to start: {}", e);
        ErrorResponse::new(StatusCode::BAD_GATEWAY, "The language model is unavailable")
    })?;

    let database = state.database.clone();
    let output = async_stream::stream! {
        let _active = ActiveStream::start();
        let mut completion = String::new();
        let mut deltas = deltas;
        let mut interrupted = false;

        while let Some(delta) = deltas.next().await {
            match delta {
                Ok(text) => {
                    completion.push_str(&text);
                    yield Ok::<_, std::io::Error>(text);
                }
                Err(e) => {
                    error!("Chat stream error: {}", e);
                    interrupted = true;
                    break;
                }
            }
        }

        match user_id {
            Some(user_id) if !interrupted && !completion.is_empty() => {
                match database.chats.save_exchange(&user_id, &user_message, &completion) {
                    Ok(chat_id) => debug!("Persisted exchange ({} chars) to chat {}", completion.len(), chat_id),
                    Err(e) => error!("Failed to persist chat for {}: {}", user_id, e),
                }
            }
            Some(_) => warn!("Not persisting incomplete chat response"),
            None => debug!("Guest chat, nothing persisted"),
        }
    };

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(output),
    )
        .into_response())
}

/// Validates `{ messages: [{ role, content }] }` and returns the messages.
pub fn parse_chat_messages(body: &[u8]) -> Result<Vec<ChatMessage>, ApiError> {
    let bad_request = |message: &str| ErrorResponse::new(StatusCode::BAD_REQUEST, message);

    let body: Value = serde_json::from_slice(body)
        .map_err(|_| bad_request("Invalid JSON in request body"))?;
    let raw_messages = body
        .get("messages")
        .and_then(Value::as_array)
        .filter(|messages| !messages.is_empty())
        .ok_or_else(|| bad_request("Invalid request format: messages array required"))?;

    raw_messages
        .iter()
        .map(|message| {
            let role = message.get("role").and_then(Value::as_str);
            let content = message.get("content").and_then(Value::as_str);
            match (role, content) {
                (Some(role @ ("user" | "assistant")), Some(content)) => Ok(ChatMessage {
                    role: role.to_string(),
                    content: content.to_string(),
                }),
                _ => Err(bad_request("Invalid message format")),
            }
        })
        .collect()
}
