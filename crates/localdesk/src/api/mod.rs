//! HTTP handlers

pub mod settings_api;
pub mod profile_api;
pub mod chat_api;
pub mod history_api;
pub mod search_api;
pub mod seo_api;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

pub use settings_api::{get_settings, update_settings};
pub use profile_api::ensure_profile;
pub use chat_api::chat;
pub use history_api::{get_chat_messages, list_chats};
pub use search_api::search_documents;
pub use seo_api::{robots, sitemap};

/// Error body returned by every JSON endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> ApiError {
        (status, Json(ErrorResponse { error: message.into() }))
    }
}

/// Counts the outcome of a handler under `route`.
pub(crate) fn observe<T>(route: &str, result: Result<T, ApiError>) -> Result<T, ApiError> {
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err((status, _)) => *status,
    };
    crate::metrics::inc_request(route, status);
    result
}
