//! Authenticated HTTP client for the Microsoft Graph REST API.
//!
//! `GraphClient` pairs a `reqwest::Client` with the shared
//! [`CredentialManager`] and offers JSON and raw-byte GET helpers that apply
//! a [`GraphQuery`].
//!
//! Token lifecycle:
//! - Every request asks the credential manager for a token; the manager
//!   refreshes lazily when its cached token is absent or expired.
//! - One-shot 401 retry: if Graph answers `401 Unauthorized`, the client
//!   forces a refresh and retries exactly once. A second 401 is returned to
//!   the caller as an `Api` error.

use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::CredentialManager;
use crate::error::{GraphError, Result};
use crate::query::GraphQuery;

/// Graph v1.0 endpoint. Paths are appended without a leading slash.
pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0/";

/// Covers TCP + TLS handshake only.
const API_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for a whole request including the body download.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn build_api_client(request_timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .connect_timeout(API_CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .build()?)
}

/// Authenticated HTTP client for Graph.
///
/// `base_url` is a `String` so tests can point it at a wiremock server.
pub struct GraphClient {
    client: Client,
    base_url: String,
    credentials: Arc<CredentialManager>,
}

impl GraphClient {
    /// Client for the public Graph v1.0 endpoint with the default deadline.
    pub fn new(credentials: Arc<CredentialManager>) -> Result<Self> {
        Self::with_base_url(credentials, GRAPH_BASE_URL, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Client for `base_url`; a trailing slash is added if missing.
    pub fn with_base_url(
        credentials: Arc<CredentialManager>,
        base_url: &str,
        request_timeout: Duration,
    ) -> Result<Self> {
        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        Ok(GraphClient {
            client: build_api_client(request_timeout)?,
            base_url,
            credentials,
        })
    }

    /// Base URL, always ending in `/`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    fn build_request(&self, url: &str, token: &str, query: &GraphQuery) -> RequestBuilder {
        let mut req = self.client.get(url).bearer_auth(token);
        let pairs = query.to_pairs();
        if !pairs.is_empty() {
            req = req.query(&pairs);
        }
        for (name, value) in query.headers() {
            req = req.header(name, value);
        }
        req
    }

    /// Sends an authenticated GET, retrying once on 401 with a fresh token.
    /// The returned response has not been status-checked.
    async fn send(&self, url: &str, query: &GraphQuery) -> Result<Response> {
        debug!(url, query = ?query.to_pairs(), "graph GET");
        let token = self.credentials.get_token().await?;
        let resp = self.build_request(url, &token, query).send().await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!(url, "graph rejected token, refreshing and retrying once");
            let fresh_token = self.credentials.force_refresh().await?;
            return Ok(self.build_request(url, &fresh_token, query).send().await?);
        }
        Ok(resp)
    }

    /// GET `path` (relative to the base URL) and deserialize the JSON body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &GraphQuery) -> Result<T> {
        let resp = self.send(&self.url(path), query).await?;
        parse_json(ensure_success(resp).await?).await
    }

    /// GET an absolute URL, e.g. an `@odata.nextLink`, which already
    /// carries its query string.
    pub async fn get_url<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self.send(url, &GraphQuery::new()).await?;
        parse_json(ensure_success(resp).await?).await
    }

    /// GET raw bytes. `404 Not Found` yields `Ok(None)`.
    pub async fn get_bytes(&self, path: &str) -> Result<Option<Bytes>> {
        let resp = self.send(&self.url(path), &GraphQuery::new()).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = ensure_success(resp).await?;
        Ok(Some(resp.bytes().await?))
    }
}

/// Converts a non-success response into [`GraphError::Api`] with its body.
async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(GraphError::Api { status, body })
}

async fn parse_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let body = resp.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> GraphClient {
        GraphClient::with_base_url(
            Arc::new(CredentialManager::with_token("t")),
            base_url,
            DEFAULT_REQUEST_TIMEOUT,
        )
        .unwrap()
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        assert_eq!(client("http://localhost:1234").base_url(), "http://localhost:1234/");
        assert_eq!(client(GRAPH_BASE_URL).base_url(), GRAPH_BASE_URL);
    }

    #[test]
    fn url_joins_without_double_slash() {
        let c = client(GRAPH_BASE_URL);
        assert_eq!(c.url("users"), "https://graph.microsoft.com/v1.0/users");
        assert_eq!(
            c.url("/groups/g1/members"),
            "https://graph.microsoft.com/v1.0/groups/g1/members"
        );
    }
}
