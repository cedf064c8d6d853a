//! Bearer-token sources for Earth Engine calls.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, instrument};

use floodtile_core::constants::{DEFAULT_METADATA_URL, EARTHENGINE_SCOPE};
use floodtile_core::error::{FloodtileError, Result};

/// Tokens are refreshed this long before the server says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Supplies OAuth access tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a token valid for at least the next request.
    async fn access_token(&self) -> Result<String>;
}

/// A fixed token, e.g. from `gcloud auth print-access-token`.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wraps a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(..)")
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        if self.0.is_empty() {
            return Err(FloodtileError::AuthError("access token is empty".into()));
        }
        Ok(self.0.clone())
    }
}

/// Service-account tokens from the GCE metadata server.
///
/// Tokens are cached until shortly before they expire.
pub struct MetadataServerToken {
    metadata_url: String,
    scopes: Vec<String>,
    http_client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: u64,
}

impl MetadataServerToken {
    /// Creates a provider for the default metadata server and the Earth
    /// Engine scope.
    pub fn new(http_client: reqwest::Client) -> Self {
        Self::with_url(http_client, DEFAULT_METADATA_URL)
    }

    /// Creates a provider for a specific metadata server.
    pub fn with_url(http_client: reqwest::Client, metadata_url: impl Into<String>) -> Self {
        Self {
            metadata_url: metadata_url.into(),
            scopes: vec![EARTHENGINE_SCOPE.into()],
            http_client,
            cached: Mutex::new(None),
        }
    }

    fn cached_token(&self) -> Option<String> {
        self.cached
            .lock()
            .as_ref()
            .filter(|c| Instant::now() < c.refresh_at)
            .map(|c| c.token.clone())
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<MetadataTokenResponse> {
        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/token",
            self.metadata_url.trim_end_matches('/')
        );

        let response = self
            .http_client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .query(&[("scopes", self.scopes.join(","))])
            .send()
            .await
            .map_err(|e| FloodtileError::AuthError(format!("metadata server unreachable: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(FloodtileError::AuthError(format!(
                "metadata server returned {}: {}",
                status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| FloodtileError::AuthError(format!("invalid token response: {e}")))
    }
}

#[async_trait]
impl TokenProvider for MetadataServerToken {
    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let fetched = self.fetch().await?;
        let lifetime = Duration::from_secs(fetched.expires_in).saturating_sub(EXPIRY_MARGIN);
        debug!(expires_in = fetched.expires_in, "Fetched access token");

        *self.cached.lock() = Some(CachedToken {
            token: fetched.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(fetched.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

    #[tokio::test]
    async fn test_static_token() {
        let provider = StaticToken::new("ya29.test");
        assert_eq!(provider.access_token().await.unwrap(), "ya29.test");
    }

    #[tokio::test]
    async fn test_static_token_empty() {
        let err = StaticToken::new("").access_token().await.unwrap_err();
        assert!(matches!(err, FloodtileError::AuthError(_)));
    }

    #[test]
    fn test_static_token_debug_hides_value() {
        let debug = format!("{:?}", StaticToken::new("secret"));
        assert!(!debug.contains("secret"));
    }

    #[tokio::test]
    async fn test_metadata_token_fetched_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TOKEN_PATH))
            .and(header("Metadata-Flavor", "Google"))
            .and(query_param("scopes", EARTHENGINE_SCOPE))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.meta",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = MetadataServerToken::with_url(reqwest::Client::new(), server.uri());
        assert_eq!(provider.access_token().await.unwrap(), "ya29.meta");
        assert_eq!(provider.access_token().await.unwrap(), "ya29.meta");
    }

    #[tokio::test]
    async fn test_metadata_short_lived_token_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.short",
                "expires_in": 30
            })))
            .expect(2)
            .mount(&server)
            .await;

        let provider = MetadataServerToken::with_url(reqwest::Client::new(), server.uri());
        provider.access_token().await.unwrap();
        provider.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_metadata_error_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_string("not on GCE"))
            .mount(&server)
            .await;

        let provider = MetadataServerToken::with_url(reqwest::Client::new(), server.uri());
        let err = provider.access_token().await.unwrap_err();
        assert!(matches!(err, FloodtileError::AuthError(_)));
        assert!(err.is_computation_error());
        assert!(err.to_string().contains("404"));
    }
}
