//! Bearer-token authentication against the managed auth service
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, StatusCode};
use axum::Json;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::ErrorResponse;
use crate::config::Config;
use crate::shared_state::AppState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Resolves an access token to the user it was issued for. `Ok(None)` means
/// the token is not valid.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn verify(&self, token: &str) -> anyhow::Result<Option<AuthenticatedUser>>;
}

/// Verifies tokens with `GET {SUPABASE_URL}/auth/v1/user`. Accepted tokens
/// are cached for a short TTL.
pub struct SupabaseAuthenticator {
    base_url: Option<String>,
    anon_key: String,
    http_client: reqwest::Client,
    cache: Cache<String, AuthenticatedUser>,
}

impl SupabaseAuthenticator {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        if config.supabase_url.is_none() {
            warn!("SUPABASE_URL not set; every authenticated route will answer 401");
        }
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(config.auth_cache_ttl_seconds))
            .build();
        Ok(Self {
            base_url: config.supabase_url.as_ref().map(|url| url.trim_end_matches('/').to_string()),
            anon_key: config.supabase_anon_key.clone().unwrap_or_default(),
            http_client,
            cache,
        })
    }
}

#[async_trait]
impl Authenticator for SupabaseAuthenticator {
    async fn verify(&self, token: &str) -> anyhow::Result<Option<AuthenticatedUser>> {
        let Some(base_url) = &self.base_url else {
            return Ok(None);
        };
        if let Some(user) = self.cache.get(token).await {
            return Ok(Some(user));
        }

        let response = self.http_client
            .get(format!("{}/auth/v1/user", base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Auth service request failed: {}", e))?;
        if !response.status().is_success() {
            debug!("Auth service rejected token with {}", response.status());
            return Ok(None);
        }

        let user: AuthenticatedUser = response.json().await
            .map_err(|e| anyhow::anyhow!("Failed to parse auth service user: {}", e))?;
        self.cache.insert(token.to_string(), user.clone()).await;
        Ok(Some(user))
    }
}

pub fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Extractor for routes that require a signed-in user.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthenticatedUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let unauthorized = || ErrorResponse::new(StatusCode::UNAUTHORIZED, "Unauthorized");
        let token = bearer_token(parts).ok_or_else(unauthorized)?;
        match state.auth.verify(token).await {
            Ok(Some(user)) => Ok(AuthUser(user)),
            Ok(None) => Err(unauthorized()),
            Err(e) => {
                warn!("Token verification failed: {}", e);
                Err(unauthorized())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Accepts `Bearer token-<id>` as user `<id>`.
    pub struct StaticAuthenticator;

    #[async_trait]
    impl Authenticator for StaticAuthenticator {
        async fn verify(&self, token: &str) -> anyhow::Result<Option<AuthenticatedUser>> {
            Ok(token.strip_prefix("token-").map(|id| AuthenticatedUser {
                id: id.to_string(),
                email: None,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use axum::http::Request;

    fn authenticator_for(server: &mockito::ServerGuard) -> SupabaseAuthenticator {
        let mut config = test_config();
        config.supabase_url = Some(server.url());
        SupabaseAuthenticator::from_config(&config).unwrap()
    }

    #[test]
    fn test_bearer_token_parsing() {
        let parts = |value: &str| {
            Request::builder()
                .header("authorization", value)
                .body(())
                .unwrap()
                .into_parts()
                .0
        };
        assert_eq!(bearer_token(&parts("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&parts("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&parts("Basic abc")), None);
        assert_eq!(bearer_token(&parts("Bearer ")), None);
    }

    #[tokio::test]
    async fn test_valid_token_is_verified_once_then_cached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/auth/v1/user")
            .match_header("apikey", "anon-key")
            .match_header("authorization", "Bearer good-token")
            .with_status(200)
            .with_body(r#"{"id":"user-1","email":"anna@example.com","aud":"authenticated"}"#)
            .expect(1)
            .create_async()
            .await;
        let auth = authenticator_for(&server);

        let first = auth.verify("good-token").await.unwrap().unwrap();
        let second = auth.verify("good-token").await.unwrap().unwrap();

        assert_eq!(first.id, "user-1");
        assert_eq!(first.email.as_deref(), Some("anna@example.com"));
        assert_eq!(first, second);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_token_is_unauthenticated() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/auth/v1/user")
            .with_status(401)
            .with_body(r#"{"msg":"invalid JWT"}"#)
            .create_async()
            .await;
        let auth = authenticator_for(&server);

        assert_eq!(auth.verify("expired").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unconfigured_service_rejects_everything() {
        let mut config = test_config();
        config.supabase_url = None;
        let auth = SupabaseAuthenticator::from_config(&config).unwrap();

        assert_eq!(auth.verify("anything").await.unwrap(), None);
    }
}
