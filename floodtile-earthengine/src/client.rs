//! Earth Engine REST client for map creation.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use floodtile_core::constants::{DEFAULT_EE_API_ROOT, DEFAULT_EE_PROJECT, DEFAULT_EE_TIMEOUT_SECS};
use floodtile_core::error::{FloodtileError, Result};
use floodtile_core::types::MapDescriptor;

use crate::auth::TokenProvider;
use crate::expression::Expression;

/// Earth Engine client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EarthEngineConfig {
    /// REST API root, e.g. "https://earthengine.googleapis.com/v1"
    pub api_root: String,
    /// Cloud project the maps are billed to
    pub project: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for EarthEngineConfig {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_EE_API_ROOT.into(),
            project: DEFAULT_EE_PROJECT.into(),
            timeout_seconds: DEFAULT_EE_TIMEOUT_SECS,
        }
    }
}

impl EarthEngineConfig {
    /// Sets the API root.
    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    /// Sets the project.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// Checks the API root is an absolute http(s) URL and the project is set.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.api_root).map_err(|e| {
            FloodtileError::ConfigError(format!("invalid API root {:?}: {}", self.api_root, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FloodtileError::ConfigError(format!(
                "API root must be http(s), got {}",
                url.scheme()
            )));
        }
        if self.project.trim().is_empty() {
            return Err(FloodtileError::ConfigError("project is empty".into()));
        }
        Ok(())
    }

    fn maps_url(&self) -> String {
        format!(
            "{}/projects/{}/maps",
            self.api_root.trim_end_matches('/'),
            self.project
        )
    }
}

/// Rendering options for a map.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationOptions {
    /// CSS color strings for the palette ramp
    pub palette_colors: Vec<String>,
}

/// Body of a `projects.maps.create` call.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMapRequest {
    /// The computation
    pub expression: Expression,
    /// Tile encoding
    pub file_format: String,
    /// Rendering options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization_options: Option<VisualizationOptions>,
}

impl CreateMapRequest {
    /// Creates a request with automatic JPEG/PNG tiles and a palette.
    pub fn new(expression: Expression, palette: Vec<String>) -> Self {
        Self {
            expression,
            file_format: "AUTO_JPEG_PNG".into(),
            visualization_options: Some(VisualizationOptions {
                palette_colors: palette,
            }),
        }
    }
}

#[derive(Deserialize)]
struct MapResponse {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct GoogleErrorResponse {
    error: GoogleErrorBody,
}

#[derive(Deserialize)]
struct GoogleErrorBody {
    message: String,
}

/// Client for the Earth Engine REST API.
pub struct EarthEngineClient {
    config: EarthEngineConfig,
    tokens: Arc<dyn TokenProvider>,
    http_client: reqwest::Client,
}

impl EarthEngineClient {
    /// Creates a client with its own HTTP connection pool.
    pub fn new(config: EarthEngineConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| FloodtileError::ConfigError(format!("HTTP client: {e}")))?;
        Self::with_http_client(config, tokens, http_client)
    }

    /// Creates a client sharing an existing HTTP client.
    pub fn with_http_client(
        config: EarthEngineConfig,
        tokens: Arc<dyn TokenProvider>,
        http_client: reqwest::Client,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tokens,
            http_client,
        })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &EarthEngineConfig {
        &self.config
    }

    /// Creates a map and returns its descriptor.
    ///
    /// The returned `mapid` is the map resource name; tiles live under
    /// `<api_root>/<mapid>/tiles/...`.
    #[instrument(skip(self, request))]
    pub async fn create_map(&self, request: &CreateMapRequest) -> Result<MapDescriptor> {
        let token = self.tokens.access_token().await?;

        let response = self
            .http_client
            .post(self.config.maps_url())
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| FloodtileError::HttpError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FloodtileError::HttpError(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GoogleErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(FloodtileError::RemoteError {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MapResponse = serde_json::from_str(&body)?;
        if parsed.name.is_empty() {
            return Err(FloodtileError::MalformedResponse(
                "map response has no name".into(),
            ));
        }
        // The name ends up in a Location header.
        if reqwest::header::HeaderValue::from_str(&parsed.name).is_err() {
            return Err(FloodtileError::MalformedResponse(format!(
                "map name {:?} is not usable in a URL",
                parsed.name
            )));
        }

        debug!(mapid = %parsed.name, "Created map");
        Ok(MapDescriptor::new(parsed.name))
    }
}
