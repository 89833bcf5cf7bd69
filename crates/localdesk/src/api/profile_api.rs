//! POST /api/profile: create the caller's profile on first sign-in

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{error, info};

use super::{observe, ApiError, ErrorResponse};
use crate::auth::AuthUser;
use crate::db::Profile;
use crate::shared_state::AppState;

/// Optional seed values, only used when the profile is created
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureProfileRequest {
    pub full_name: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

pub async fn ensure_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Bytes,
) -> Result<Json<Profile>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        Ok(EnsureProfileRequest::default())
    } else {
        serde_json::from_slice::<EnsureProfileRequest>(&body)
            .map_err(|e| ErrorResponse::new(StatusCode::BAD_REQUEST, format!("Invalid profile request: {}", e)))
    };

    let result = request.and_then(|request| {
        state
            .database
            .profiles
            .ensure_profile(&user.id, request.full_name.as_deref(), request.metadata.as_ref())
            .map(|profile| {
                info!("Profile ready for {}", user.id);
                Json(profile)
            })
            .map_err(|e| {
                error!("Failed to ensure profile for {}: {}", user.id, e);
                ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create profile")
            })
    });
    observe("profile_ensure", result)
}
