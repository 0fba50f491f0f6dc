//! OAuth2 client-credentials authentication for the Microsoft identity platform.
//!
//! [`TokenProvider`] talks to Azure AD's `/oauth2/v2.0/token` endpoint and
//! caches the bearer token with its expiry. [`CredentialManager`] owns the
//! tenant/application identity, builds the provider exactly once, and hands
//! out currently-valid tokens to the Graph client.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{GraphError, Result};

/// Default Azure AD authority. The tenant id and token path are appended.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Requests whatever application permissions the app registration was granted.
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Token requests are small; 30 seconds covers a slow identity provider.
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Safety buffer subtracted from `expires_in` so a token is refreshed
/// before it actually expires. Never more than half the token's lifetime.
const EXPIRY_BUFFER_SECS: u64 = 60;

/// Form body sent to the token endpoint.
#[derive(Serialize)]
pub struct TokenRequest<'a> {
    client_id: &'a str,
    scope: &'a str,
    client_secret: &'a str,
    grant_type: &'a str,
}

/// Subset of the Azure AD token response that we need.
#[derive(Deserialize)]
pub struct TokenResponse {
    /// The bearer token.
    pub access_token: String,
    /// Always `Bearer` for this grant.
    pub token_type: String,
    /// Lifetime in seconds from issuance.
    pub expires_in: u64,
}

/// Builds the v2.0 token endpoint for `tenant_id` under `authority`.
pub fn token_url(authority: &str, tenant_id: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        authority.trim_end_matches('/'),
        tenant_id
    )
}

/// Acquires and caches app-only tokens.
///
/// Invariants:
/// - `response` is `None` until the first successful `refresh_token()`.
/// - `acquired_at` is `Some` whenever `response` is `Some`.
/// - A cached token is never empty.
pub struct TokenProvider {
    client: reqwest::Client,
    token_url: String,
    scope: String,
    client_id: String,
    client_secret: String,
    response: Option<TokenResponse>,
    acquired_at: Option<Instant>,
}

impl TokenProvider {
    /// Provider for `settings` against `authority`. No request is made until
    /// [`TokenProvider::refresh_token`].
    pub fn new(authority: &str, settings: &Settings, scope: &str) -> Self {
        TokenProvider {
            client: build_token_client(),
            token_url: token_url(authority, settings.tenant_id()),
            scope: scope.to_string(),
            client_id: settings.client_id().to_string(),
            client_secret: settings.client_secret().to_string(),
            response: None,
            acquired_at: None,
        }
    }

    /// Creates a provider with a pre-set token, bypassing Azure AD.
    /// Used by tests; the token is treated as freshly acquired (3600s).
    pub fn with_token(token: &str) -> Self {
        TokenProvider {
            client: build_token_client(),
            token_url: String::new(),
            scope: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            response: Some(TokenResponse {
                access_token: token.to_string(),
                token_type: "Bearer".to_string(),
                expires_in: 3600,
            }),
            acquired_at: Some(Instant::now()),
        }
    }

    /// Fetches a new token from Azure AD and caches it.
    ///
    /// The body is read as text before the status check so the AADSTS
    /// diagnostic survives into the error.
    pub async fn refresh_token(&mut self) -> Result<()> {
        let body = TokenRequest {
            client_id: &self.client_id,
            scope: &self.scope,
            client_secret: &self.client_secret,
            grant_type: "client_credentials",
        };

        debug!(url = %self.token_url, "requesting app-only token");
        let response = self
            .client
            .post(&self.token_url)
            .form(&body)
            .send()
            .await
            .map_err(|e| GraphError::Auth {
                message: "token request could not be sent".to_string(),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| GraphError::Auth {
            message: "token response body could not be read".to_string(),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            return Err(GraphError::auth(format!(
                "token request failed ({status}): {body}"
            )));
        }

        let resp: TokenResponse = serde_json::from_str(&body).map_err(|e| GraphError::Auth {
            message: "failed to parse token response".to_string(),
            source: Some(Box::new(e)),
        })?;
        if resp.access_token.is_empty() {
            return Err(GraphError::auth("identity provider returned an empty token"));
        }

        self.acquired_at = Some(Instant::now());
        self.response = Some(resp);
        Ok(())
    }

    fn is_expired(&self) -> bool {
        match (&self.response, self.acquired_at) {
            (Some(resp), Some(acquired)) => {
                let buffer = EXPIRY_BUFFER_SECS.min(resp.expires_in / 2);
                let lifetime = resp.expires_in - buffer;
                acquired.elapsed().as_secs() >= lifetime
            }
            _ => false,
        }
    }

    /// Returns the cached access token, or `None` if there is none or it has
    /// expired (with the safety buffer applied).
    pub fn token(&self) -> Option<&str> {
        if self.is_expired() {
            return None;
        }
        self.response.as_ref().map(|ret| ret.access_token.as_str())
    }

    /// Drops the cached token so the next access refreshes.
    pub fn invalidate(&mut self) {
        self.response = None;
        self.acquired_at = None;
    }
}

fn build_token_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(TOKEN_REQUEST_TIMEOUT)
        .build()
        .unwrap_or_default()
}

struct Credential {
    settings: Settings,
    provider: Mutex<TokenProvider>,
}

/// Owns the app registration identity and its token provider.
///
/// `initialize` builds the credential at most once; later calls with the
/// same settings are no-ops. The provider is guarded by an async mutex that
/// is held only for the token check or refresh.
pub struct CredentialManager {
    authority: String,
    credential: OnceCell<Credential>,
}

impl Default for CredentialManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialManager {
    /// Manager against the public Azure AD authority.
    pub fn new() -> Self {
        Self::with_authority(DEFAULT_AUTHORITY)
    }

    /// Uses a custom authority, e.g. a mock token endpoint in tests.
    pub fn with_authority(authority: &str) -> Self {
        CredentialManager {
            authority: authority.to_string(),
            credential: OnceCell::new(),
        }
    }

    /// An already-initialized manager serving a fixed token. Tests only.
    pub fn with_token(token: &str) -> Self {
        let manager = Self::new();
        let _ = manager.credential.set(Credential {
            settings: Settings::new("static", "static", "static"),
            provider: Mutex::new(TokenProvider::with_token(token)),
        });
        manager
    }

    /// Validates `settings` and builds the credential on first call.
    ///
    /// Re-initializing with identical settings is a no-op. Different
    /// settings are rejected and the existing credential stays in use.
    pub fn initialize(&self, settings: &Settings) -> Result<()> {
        settings.validate()?;

        let mut created = false;
        let credential = self.credential.get_or_init(|| {
            created = true;
            Credential {
                settings: settings.clone(),
                provider: Mutex::new(TokenProvider::new(
                    &self.authority,
                    settings,
                    GRAPH_DEFAULT_SCOPE,
                )),
            }
        });

        if created {
            info!(
                tenant_id = settings.tenant_id(),
                client_id = settings.client_id(),
                "initialized graph for app-only auth"
            );
            return Ok(());
        }
        if credential.settings != *settings {
            warn!("ignoring re-initialization with different settings");
            return Err(GraphError::Configuration(
                "credential already initialized with different settings".to_string(),
            ));
        }
        debug!("credential already initialized");
        Ok(())
    }

    /// True once [`CredentialManager::initialize`] has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.credential.get().is_some()
    }

    fn credential(&self) -> Result<&Credential> {
        self.credential
            .get()
            .ok_or_else(|| GraphError::Auth {
                message: "credential manager has not been initialized".to_string(),
                source: Some(Box::new(GraphError::NotInitialized)),
            })
    }

    /// Returns a currently-valid bearer token, refreshing when none is cached
    /// or the cached one has expired.
    pub async fn get_token(&self) -> Result<String> {
        let credential = self.credential()?;
        let mut provider = credential.provider.lock().await;
        if provider.token().is_none() {
            provider.refresh_token().await?;
        }
        provider
            .token()
            .map(str::to_owned)
            .ok_or_else(|| GraphError::auth("token missing after refresh"))
    }

    /// Discards the cached token and acquires a fresh one. Called when Graph
    /// rejects a token our local expiry tracking still considered valid.
    pub async fn force_refresh(&self) -> Result<String> {
        let credential = self.credential()?;
        let mut provider = credential.provider.lock().await;
        provider.invalidate();
        provider.refresh_token().await?;
        provider
            .token()
            .map(str::to_owned)
            .ok_or_else(|| GraphError::auth("token missing after forced refresh"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::new("tenant", "client", "secret")
    }

    #[test]
    fn token_is_none_before_refresh() {
        let tp = TokenProvider::new(DEFAULT_AUTHORITY, &settings(), GRAPH_DEFAULT_SCOPE);
        assert!(tp.token().is_none());
    }

    #[test]
    fn token_url_interpolation() {
        assert_eq!(
            token_url(DEFAULT_AUTHORITY, "abc-123"),
            "https://login.microsoftonline.com/abc-123/oauth2/v2.0/token"
        );
        assert_eq!(
            token_url("http://127.0.0.1:9000/", "t"),
            "http://127.0.0.1:9000/t/oauth2/v2.0/token"
        );
    }

    #[test]
    fn token_request_serializes_as_form() {
        let req = TokenRequest {
            client_id: "cid",
            scope: GRAPH_DEFAULT_SCOPE,
            client_secret: "secret~value",
            grant_type: "client_credentials",
        };
        let encoded = serde_urlencoded::to_string(&req).unwrap();
        assert!(encoded.contains("client_id=cid"));
        assert!(encoded.contains("grant_type=client_credentials"));
        assert!(encoded.contains("scope=https%3A%2F%2Fgraph.microsoft.com%2F.default"));
    }

    #[test]
    fn token_response_ignores_unknown_fields() {
        let json = r#"{
            "token_type": "Bearer",
            "expires_in": 3599,
            "ext_expires_in": 3599,
            "access_token": "eyJ0eXAi.test.token"
        }"#;
        let resp: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.access_token, "eyJ0eXAi.test.token");
        assert_eq!(resp.expires_in, 3599);
    }

    #[test]
    fn expired_token_returns_none() {
        let mut tp = TokenProvider::with_token("test-token");
        tp.acquired_at = Some(Instant::now() - Duration::from_secs(7200));
        assert!(tp.token().is_none());
    }

    #[test]
    fn token_within_buffer_returns_none() {
        // expires_in=150 with a 60s buffer leaves a 90s effective lifetime.
        let mut tp = TokenProvider::with_token("test-token");
        tp.response.as_mut().unwrap().expires_in = 150;
        tp.acquired_at = Some(Instant::now() - Duration::from_secs(91));
        assert!(tp.token().is_none());

        tp.acquired_at = Some(Instant::now() - Duration::from_secs(10));
        assert!(tp.token().is_some());
    }

    #[test]
    fn short_lived_token_is_usable_when_fresh() {
        // expires_in=45 clamps the buffer to 22s, leaving 23s.
        let mut tp = TokenProvider::with_token("short-lived");
        tp.response.as_mut().unwrap().expires_in = 45;
        assert_eq!(tp.token(), Some("short-lived"));

        tp.acquired_at = Some(Instant::now() - Duration::from_secs(23));
        assert!(tp.token().is_none());
    }

    #[test]
    fn invalidate_clears_token() {
        let mut tp = TokenProvider::with_token("test-token");
        tp.invalidate();
        assert!(tp.token().is_none());
    }

    #[test]
    fn initialize_rejects_empty_fields() {
        let manager = CredentialManager::new();
        let err = manager
            .initialize(&Settings::new("tenant", "", "secret"))
            .unwrap_err();
        assert!(matches!(err, GraphError::Configuration(_)));
        assert!(!manager.is_initialized());
    }

    #[test]
    fn initialize_is_idempotent_for_same_settings() {
        let manager = CredentialManager::new();
        manager.initialize(&settings()).unwrap();
        manager.initialize(&settings()).unwrap();
        assert!(manager.is_initialized());
    }

    #[test]
    fn initialize_rejects_different_settings() {
        let manager = CredentialManager::new();
        manager.initialize(&settings()).unwrap();
        let err = manager
            .initialize(&Settings::new("other-tenant", "client", "secret"))
            .unwrap_err();
        assert!(matches!(err, GraphError::Configuration(_)));
    }

    #[tokio::test]
    async fn get_token_before_initialize_is_auth_error() {
        let manager = CredentialManager::new();
        let err = manager.get_token().await.unwrap_err();
        assert!(matches!(err, GraphError::Auth { .. }));
        assert!(err.is_not_initialized());
        let err = manager.force_refresh().await.unwrap_err();
        assert!(err.is_not_initialized());
    }

    #[tokio::test]
    async fn with_token_serves_static_token() {
        let manager = CredentialManager::with_token("static-token");
        assert_eq!(manager.get_token().await.unwrap(), "static-token");
    }
}
