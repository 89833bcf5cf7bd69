//! POST /api/search: similarity search over the knowledge base

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::{observe, ApiError, ErrorResponse};
use crate::db::DocumentMatch;
use crate::shared_state::AppState;

const MAX_MATCH_COUNT: usize = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    /// Minimum cosine similarity (0.0 - 1.0), defaults to `MATCH_THRESHOLD`
    pub match_threshold: Option<f32>,
    pub match_count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<DocumentMatch>,
    pub total: usize,
}

pub async fn search_documents(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SearchResponse>, ApiError> {
    observe("search", run_search(&state, &body).await)
}

async fn run_search(state: &AppState, body: &[u8]) -> Result<Json<SearchResponse>, ApiError> {
    let payload: SearchRequest = serde_json::from_slice(body).map_err(|e| {
        warn!("Rejected search body: {}", e);
        ErrorResponse::new(StatusCode::BAD_REQUEST, "Invalid search request")
    })?;
    if payload.query.trim().is_empty() {
        return Err(ErrorResponse::new(StatusCode::BAD_REQUEST, "Query cannot be empty"));
    }
    let threshold = payload.match_threshold.unwrap_or(state.config.match_threshold).clamp(0.0, 1.0);
    let count = payload.match_count.unwrap_or(state.config.match_count).clamp(1, MAX_MATCH_COUNT);
    info!("Search request: threshold={:.2}, count={}", threshold, count);

    match state.retriever.search(&payload.query, threshold, count).await {
        Ok(results) => Ok(Json(SearchResponse { total: results.len(), results })),
        Err(e) => {
            error!("Search failed: {}", e);
            Err(ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Search failed"))
        }
    }
}
