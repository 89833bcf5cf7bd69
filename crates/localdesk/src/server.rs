//! HTTP server startup and routing
//!
//! Every handler reaches its dependencies through `AppState`; the only
//! outbound calls are to the auth service and the model provider.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::{
    api,
    auth::SupabaseAuthenticator,
    config::Config,
    db::Database,
    llm::OpenAIClient,
    metrics,
    shared_state::AppState,
};

/// Request bodies above this size are rejected with 413.
const MAX_BODY_BYTES: usize = 1024 * 1024;

pub async fn run_server(cfg: Config) -> anyhow::Result<()> {
    metrics::init_metrics()?;
    cfg.print_config();

    let database = Arc::new(Database::new(
        &cfg.database_path,
        cfg.embedding_dimensions,
        &cfg.embedding_model,
    )?);

    // Load the ANN index so the first chat does not pay for it
    match database.documents.initialize_index() {
        Ok(0) => warn!("No documents indexed; run `localdesk index` to enable retrieval"),
        Ok(count) => info!("Knowledge base loaded: {} chunks", count),
        Err(e) => warn!("Document index init failed: {} (similarity search will scan)", e),
    }
    metrics::set_indexed_documents(database.documents.count()?);

    let auth = Arc::new(SupabaseAuthenticator::from_config(&cfg)?);
    let llm = Arc::new(OpenAIClient::from_config(&cfg)?);
    let addr = cfg.api_addr()?;
    let state = AppState::new(cfg, database, auth, llm);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let app = build_router(state);

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(state: AppState) -> axum::Router {
    use axum::{
        extract::DefaultBodyLimit,
        routing::{get, post},
        Router,
    };
    use tower_http::{
        cors::{Any, CorsLayer},
        timeout::TimeoutLayer,
        trace::TraceLayer,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST, axum::http::Method::PUT])
        .allow_headers(Any);
    let timeout = Duration::from_secs(state.config.request_timeout_seconds);

    Router::new()
        .route("/api/settings", get(api::get_settings).put(api::update_settings))
        .route("/api/profile", post(api::ensure_profile))
        .route("/api/chat", post(api::chat))
        .route("/api/chats", get(api::list_chats))
        .route("/api/chats/:id/messages", get(api::get_chat_messages))
        .route("/api/search", post(api::search_documents))
        .route("/sitemap.xml", get(api::sitemap))
        .route("/robots.txt", get(api::robots))
        .route("/healthz", get(|| async { "OK" }))
        .route("/metrics", get(metrics::get_metrics))
        // Enforced when a handler buffers the body, after authentication.
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .with_state(state)
}
