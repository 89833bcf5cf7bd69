// LocalDesk/crates/localdesk/src/config.rs

use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub api_host: String,
    pub api_port: u16,
    pub database_path: PathBuf,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub match_threshold: f32,
    pub match_count: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub site_url: String,
    pub docs_dir: PathBuf,
    pub messages_dir: PathBuf,
    pub request_timeout_seconds: u64,
    pub auth_cache_ttl_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }

        let chunk_size: usize = env::var("CHUNK_SIZE")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .context("CHUNK_SIZE must be a positive integer")?;
        let chunk_overlap: usize = env::var("CHUNK_OVERLAP")
            .unwrap_or_else(|_| "200".into())
            .parse()
            .context("CHUNK_OVERLAP must be a non-negative integer")?;
        if chunk_overlap >= chunk_size {
            return Err(anyhow::anyhow!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                chunk_overlap,
                chunk_size
            ));
        }

        let config = Self {
            api_host: env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            api_port: env::var("API_PORT").unwrap_or_else(|_| "8000".into()).parse()?,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "./data/localdesk.db".into())
                .into(),
            supabase_url: non_empty_var("SUPABASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            supabase_anon_key: non_empty_var("SUPABASE_ANON_KEY"),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".into())
                .trim_end_matches('/')
                .to_string(),
            chat_model: env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".into()),
            embedding_dimensions: env::var("EMBEDDING_DIMENSIONS")
                .unwrap_or_else(|_| "1536".into())
                .parse()?,
            match_threshold: env::var("MATCH_THRESHOLD")
                .unwrap_or_else(|_| "0.7".into())
                .parse()?,
            match_count: env::var("MATCH_COUNT").unwrap_or_else(|_| "5".into()).parse()?,
            chunk_size,
            chunk_overlap,
            site_url: env::var("SITE_URL")
                .unwrap_or_else(|_| "https://localdesk.dk".into())
                .trim_end_matches('/')
                .to_string(),
            docs_dir: env::var("DOCS_DIR")
                .unwrap_or_else(|_| "docs/denmark-living".into())
                .into(),
            messages_dir: env::var("MESSAGES_DIR").unwrap_or_else(|_| "messages".into()).into(),
            request_timeout_seconds: env::var("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "120".into())
                .parse()?,
            auth_cache_ttl_seconds: env::var("AUTH_CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "30".into())
                .parse()?,
        };

        if config.openai_api_key.is_none() {
            warn!("OPENAI_API_KEY not set; chat, search and indexing will be unavailable");
        }

        Ok(config)
    }

    pub fn print_config(&self) {
        info!("Configuration:");
        info!("  API: {}:{}", self.api_host, self.api_port);
        info!("  Database: {}", self.database_path.display());
        info!("  Auth service: {}", self.supabase_url.as_deref().unwrap_or("<not configured>"));
        info!("  Provider: {} (chat: {}, embeddings: {} x{})",
            self.openai_base_url, self.chat_model, self.embedding_model, self.embedding_dimensions);
        info!("  Retrieval: threshold {}, top {}", self.match_threshold, self.match_count);
        info!("  Chunking: {} chars, {} overlap", self.chunk_size, self.chunk_overlap);
        info!("  Site URL: {}", self.site_url);
    }

    pub fn api_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.api_host, self.api_port)
            .parse()
            .with_context(|| format!("Invalid API address {}:{}", self.api_host, self.api_port))
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        api_host: "127.0.0.1".to_string(),
        api_port: 8000,
        database_path: PathBuf::from("./data/test.db"),
        supabase_url: Some("http://127.0.0.1:54321".to_string()),
        supabase_anon_key: Some("anon-key".to_string()),
        openai_api_key: Some("sk-test".to_string()),
        openai_base_url: "http://127.0.0.1:9".to_string(),
        chat_model: "gpt-4o-mini".to_string(),
        embedding_model: "text-embedding-3-small".to_string(),
        embedding_dimensions: 4,
        match_threshold: 0.7,
        match_count: 5,
        chunk_size: 1000,
        chunk_overlap: 200,
        site_url: "https://localdesk.dk".to_string(),
        docs_dir: PathBuf::from("docs/denmark-living"),
        messages_dir: PathBuf::from("messages"),
        request_timeout_seconds: 120,
        auth_cache_ttl_seconds: 30,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_addr_parsing() {
        let config = test_config();
        let addr = config.api_addr().unwrap();

        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8000);
    }

    #[test]
    fn test_api_addr_with_zero_address() {
        let mut config = test_config();
        config.api_host = "0.0.0.0".to_string();
        config.api_port = 5000;

        let addr = config.api_addr().unwrap();
        assert_eq!(addr.port(), 5000);
        assert_eq!(addr.ip().to_string(), "0.0.0.0");
    }

    #[test]
    fn test_api_addr_rejects_hostname_garbage() {
        let mut config = test_config();
        config.api_host = "not an address".to_string();

        assert!(config.api_addr().is_err());
    }

    #[test]
    fn test_chunk_overlap_smaller_than_window() {
        let config = test_config();
        assert!(config.chunk_overlap < config.chunk_size);
    }

    #[test]
    fn test_non_empty_var_ignores_blank_values() {
        env::set_var("LOCALDESK_TEST_BLANK", "   ");
        env::set_var("LOCALDESK_TEST_SET", "value");

        assert_eq!(non_empty_var("LOCALDESK_TEST_BLANK"), None);
        assert_eq!(non_empty_var("LOCALDESK_TEST_SET").as_deref(), Some("value"));
        assert_eq!(non_empty_var("LOCALDESK_TEST_MISSING"), None);
    }
}
