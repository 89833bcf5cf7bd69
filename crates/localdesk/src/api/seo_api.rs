//! GET /sitemap.xml and GET /robots.txt

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::error;

use super::ErrorResponse;
use crate::metrics;
use crate::shared_state::AppState;
use crate::site::{render_robots, render_sitemap, sitemap_entries};

pub async fn sitemap(State(state): State<AppState>) -> Response {
    let entries = sitemap_entries(&state.config.site_url, Utc::now().date_naive());
    match render_sitemap(&entries) {
        Ok(xml) => {
            metrics::inc_request("sitemap", StatusCode::OK);
            ([(header::CONTENT_TYPE, "application/xml; charset=utf-8")], xml).into_response()
        }
        Err(e) => {
            error!("Failed to render sitemap: {}", e);
            metrics::inc_request("sitemap", StatusCode::INTERNAL_SERVER_ERROR);
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to render sitemap").into_response()
        }
    }
}

pub async fn robots(State(state): State<AppState>) -> impl IntoResponse {
    metrics::inc_request("robots", StatusCode::OK);
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_robots(&state.config.site_url),
    )
}
