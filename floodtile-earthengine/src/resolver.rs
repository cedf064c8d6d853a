//! Flood-map resolver: algorithm + credentials + REST client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use floodtile_core::constants::DEFAULT_METADATA_URL;
use floodtile_core::error::{FloodtileError, Result};
use floodtile_core::traits::MapResolver;
use floodtile_core::types::MapDescriptor;

use crate::auth::{MetadataServerToken, StaticToken, TokenProvider};
use crate::client::{CreateMapRequest, EarthEngineClient, EarthEngineConfig};
use crate::expression::FloodAlgorithm;

/// Where bearer tokens come from.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Credentials {
    /// A fixed access token
    Static {
        /// The token
        token: String,
    },
    /// The GCE metadata server's default service account
    MetadataServer {
        /// Metadata server root
        url: String,
    },
}

impl Default for Credentials {
    fn default() -> Self {
        Credentials::MetadataServer {
            url: DEFAULT_METADATA_URL.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Static { .. } => f.write_str("Static { .. }"),
            Credentials::MetadataServer { url } => {
                f.debug_struct("MetadataServer").field("url", url).finish()
            }
        }
    }
}

/// Resolver configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Earth Engine client configuration
    pub earthengine: EarthEngineConfig,
    /// Pipeline parameters
    pub algorithm: FloodAlgorithm,
    /// Token source
    pub credentials: Credentials,
}

impl ResolverConfig {
    /// Uses a fixed access token instead of the metadata server.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.credentials = Credentials::Static {
            token: token.into(),
        };
        self
    }

    /// Uses the metadata server at `url`.
    pub fn with_metadata_server(mut self, url: impl Into<String>) -> Self {
        self.credentials = Credentials::MetadataServer { url: url.into() };
        self
    }

    /// Replaces the pipeline parameters.
    pub fn with_algorithm(mut self, algorithm: FloodAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Replaces the Earth Engine client configuration.
    pub fn with_earthengine(mut self, earthengine: EarthEngineConfig) -> Self {
        self.earthengine = earthengine;
        self
    }
}

/// Computes the flood map on Earth Engine.
///
/// The request body is built once at construction; every [`resolve`] posts
/// the same expression and yields a new map resource.
///
/// [`resolve`]: MapResolver::resolve
pub struct EarthEngineResolver {
    client: EarthEngineClient,
    request: CreateMapRequest,
}

impl EarthEngineResolver {
    /// Creates a resolver from a client and pipeline parameters.
    pub fn new(client: EarthEngineClient, algorithm: &FloodAlgorithm) -> Result<Self> {
        algorithm.validate()?;
        let request = CreateMapRequest::new(algorithm.expression(), algorithm.palette.clone());
        Ok(Self { client, request })
    }

    /// Creates a resolver, its HTTP client and its token source from `config`.
    pub fn with_config(config: ResolverConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.earthengine.timeout_seconds))
            .build()
            .map_err(|e| FloodtileError::ConfigError(format!("HTTP client: {e}")))?;

        let tokens: Arc<dyn TokenProvider> = match &config.credentials {
            Credentials::Static { token } => Arc::new(StaticToken::new(token.clone())),
            Credentials::MetadataServer { url } => {
                Arc::new(MetadataServerToken::with_url(http_client.clone(), url.clone()))
            }
        };

        let client = EarthEngineClient::with_http_client(config.earthengine, tokens, http_client)?;
        Self::new(client, &config.algorithm)
    }

    /// Returns the request body posted on every resolve.
    pub fn request(&self) -> &CreateMapRequest {
        &self.request
    }

    /// Returns the REST API root tiles are served from.
    pub fn api_root(&self) -> &str {
        &self.client.config().api_root
    }
}

#[async_trait]
impl MapResolver for EarthEngineResolver {
    #[instrument(skip(self))]
    async fn resolve(&self) -> Result<MapDescriptor> {
        let map = self.client.create_map(&self.request).await?;
        info!(mapid = %map.mapid, "Computed flood map");
        Ok(map)
    }
}
