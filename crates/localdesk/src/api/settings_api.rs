//! GET/PUT /api/settings: the signed-in user's settings blob

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde_json::{Map, Value};
use tracing::{error, info};

use super::{observe, ApiError, ErrorResponse};
use crate::auth::AuthUser;
use crate::settings::validate_patch;
use crate::shared_state::AppState;

/// Stored settings, or `{}` when the user has no profile yet.
pub async fn get_settings(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let result = match state.database.profiles.get_metadata(&user.id) {
        Ok(metadata) => Ok(Json(Value::Object(metadata.unwrap_or_default()))),
        Err(e) => {
            error!("[GET /api/settings] Database error for {}: {}", user.id, e);
            Err(ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch settings"))
        }
    };
    observe("settings_get", result)
}

/// Shallow-merges the body into the stored settings and returns the union.
/// The body is only parsed once the caller is authenticated.
pub async fn update_settings(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Bytes,
) -> Result<Json<Map<String, Value>>, ApiError> {
    observe("settings_put", merge_settings(&state, &user.id, &body))
}

fn merge_settings(state: &AppState, user_id: &str, body: &[u8]) -> Result<Json<Map<String, Value>>, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| {
        ErrorResponse::new(StatusCode::BAD_REQUEST, "Invalid JSON in request body")
    })?;
    let patch = validate_patch(value)
        .map_err(|e| ErrorResponse::new(StatusCode::BAD_REQUEST, e.to_string()))?;

    let keys: Vec<String> = patch.keys().cloned().collect();
    match state.database.profiles.merge_metadata(user_id, patch) {
        Ok(merged) => {
            info!("Updated settings for {}: {:?}", user_id, keys);
            Ok(Json(merged))
        }
        Err(e) => {
            error!("[PUT /api/settings] Update error for {}: {}", user_id, e);
            Err(ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update settings"))
        }
    }
}
