// LocalDesk/crates/localdesk/src/lib.rs

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod i18n;
pub mod llm;
pub mod metrics;
pub mod rag;
pub mod server;
pub mod settings;
pub mod shared_state;
pub mod site;
pub mod telemetry;

// Public API exports
pub use config::Config;
pub use db::Database;
pub use server::{build_router, run_server};
pub use shared_state::AppState;
