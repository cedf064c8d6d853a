//! App state: map cache and config.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use chrono::NaiveDate;

use floodtile_cache::{CacheConfig, MapCache};
use floodtile_core::constants::{
    DEFAULT_CACHE_MAX_AGE_SECS, DEFAULT_CORS_ORIGINS, DEFAULT_EE_API_ROOT, DEFAULT_EE_PROJECT,
    DEFAULT_EE_TIMEOUT_SECS, DEFAULT_METADATA_URL,
};
use floodtile_core::error::{FloodtileError, Result};
use floodtile_core::traits::MapResolver;
use floodtile_earthengine::{EarthEngineConfig, EarthEngineResolver, FloodAlgorithm, ResolverConfig};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Earth Engine REST root; tile redirects point below it
    pub api_root: String,
    /// Cloud project maps are created in
    pub project: String,
    /// Fixed access token; the metadata server is used when unset
    pub access_token: Option<String>,
    /// Metadata server root
    pub metadata_url: String,
    /// Maximum age of the cached map
    pub cache_max_age: Duration,
    /// Browser origins allowed by CORS
    pub cors_origins: Vec<String>,
    /// Earth Engine request timeout in seconds
    pub timeout_seconds: u64,
    /// Pipeline parameters
    pub algorithm: FloodAlgorithm,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_EE_API_ROOT.into(),
            project: DEFAULT_EE_PROJECT.into(),
            access_token: None,
            metadata_url: DEFAULT_METADATA_URL.into(),
            cache_max_age: Duration::from_secs(DEFAULT_CACHE_MAX_AGE_SECS),
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            timeout_seconds: DEFAULT_EE_TIMEOUT_SECS,
            algorithm: FloodAlgorithm::default(),
        }
    }
}

impl ApiConfig {
    /// Reads configuration from the environment (and `.env` if present).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, falling back to defaults for
    /// unset or blank variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let mut algorithm = defaults.algorithm;
        if let Some(stop) = var("FLOOD_STOP_DATE") {
            algorithm.stop_date = parse_date("FLOOD_STOP_DATE", &stop)?;
        }
        if let Some(start) = var("FLOOD_BASELINE_START") {
            algorithm.baseline_start = parse_date("FLOOD_BASELINE_START", &start)?;
        }
        if let Some(end) = var("FLOOD_BASELINE_END") {
            algorithm.baseline_end = parse_date("FLOOD_BASELINE_END", &end)?;
        }

        let api_root = var("EE_API_ROOT")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_root);
        // Tile URLs are sent back as Location headers.
        if HeaderValue::from_str(&api_root).is_err() {
            return Err(FloodtileError::ConfigError(format!(
                "EE_API_ROOT={api_root:?} is not usable in a URL"
            )));
        }

        Ok(Self {
            api_root,
            project: var("EE_PROJECT").unwrap_or(defaults.project),
            access_token: var("EE_ACCESS_TOKEN"),
            metadata_url: var("EE_METADATA_URL").unwrap_or(defaults.metadata_url),
            cache_max_age: var("CACHE_MAX_AGE_SECS")
                .map(|v| parse_u64("CACHE_MAX_AGE_SECS", &v).map(Duration::from_secs))
                .transpose()?
                .unwrap_or(defaults.cache_max_age),
            cors_origins: var("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            timeout_seconds: var("EE_TIMEOUT_SECS")
                .map(|v| parse_u64("EE_TIMEOUT_SECS", &v))
                .transpose()?
                .unwrap_or(defaults.timeout_seconds),
            algorithm,
        })
    }

    /// Builds the resolver configuration this server config implies.
    pub fn resolver_config(&self) -> ResolverConfig {
        let mut earthengine = EarthEngineConfig::default()
            .with_api_root(self.api_root.clone())
            .with_project(self.project.clone());
        earthengine.timeout_seconds = self.timeout_seconds;

        let config = ResolverConfig::default()
            .with_earthengine(earthengine)
            .with_algorithm(self.algorithm.clone());

        match &self.access_token {
            Some(token) => config.with_token(token.clone()),
            None => config.with_metadata_server(self.metadata_url.clone()),
        }
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|e| FloodtileError::ConfigError(format!("{key}={raw:?}: {e}")))
}

fn parse_date(key: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| FloodtileError::ConfigError(format!("{key}={raw:?}: {e}")))
}

/// Shared state handed to every request.
pub struct AppState {
    /// Server configuration
    pub config: ApiConfig,
    /// The one cached map
    pub cache: MapCache,
}

impl AppState {
    /// Creates state backed by the Earth Engine resolver.
    pub fn new(config: ApiConfig) -> Result<Self> {
        let resolver = EarthEngineResolver::with_config(config.resolver_config())?;
        Ok(Self::with_resolver(config, Arc::new(resolver)))
    }

    /// Creates state backed by any resolver.
    pub fn with_resolver(config: ApiConfig, resolver: Arc<dyn MapResolver>) -> Self {
        let cache = MapCache::with_config(resolver, CacheConfig::with_max_age(config.cache_max_age));
        Self::with_cache(config, cache)
    }

    /// Creates state around an existing cache.
    pub fn with_cache(config: ApiConfig, cache: MapCache) -> Self {
        Self { config, cache }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use floodtile_earthengine::Credentials;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_root, "https://earthengine.googleapis.com/v1");
        assert_eq!(config.cache_max_age, Duration::from_secs(3 * 60 * 60));
        assert_eq!(config.cors_origins.len(), 6);
        assert!(config.access_token.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("EE_API_ROOT", "http://localhost:9000/v1/"),
            ("EE_PROJECT", "flood-demo"),
            ("CACHE_MAX_AGE_SECS", "60"),
            ("CORS_ORIGINS", "https://a.example, https://b.example,"),
            ("FLOOD_STOP_DATE", "2024-10-01"),
        ]))
        .unwrap();

        assert_eq!(config.api_root, "http://localhost:9000/v1");
        assert_eq!(config.project, "flood-demo");
        assert_eq!(config.cache_max_age, Duration::from_secs(60));
        assert_eq!(config.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(config.algorithm.stop_date, NaiveDate::from_ymd_opt(2024, 10, 1).unwrap());
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = ApiConfig::from_lookup(lookup(&[("EE_ACCESS_TOKEN", "  ")])).unwrap();
        assert!(config.access_token.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ApiConfig::from_lookup(lookup(&[("CACHE_MAX_AGE_SECS", "3h")])).unwrap_err();
        assert!(err.to_string().contains("CACHE_MAX_AGE_SECS"));

        let err = ApiConfig::from_lookup(lookup(&[("FLOOD_STOP_DATE", "Feb 2023")])).unwrap_err();
        assert!(matches!(err, FloodtileError::ConfigError(_)));
    }

    #[test]
    fn test_api_root_with_control_character_rejected() {
        let err = ApiConfig::from_lookup(lookup(&[("EE_API_ROOT", "http://ee.example/v1\u{7f}")]))
            .unwrap_err();
        assert!(matches!(err, FloodtileError::ConfigError(_)));
        assert!(err.to_string().contains("EE_API_ROOT"));
    }

    #[test]
    fn test_resolver_config_credentials() {
        let with_token = ApiConfig {
            access_token: Some("ya29.env".into()),
            ..Default::default()
        };
        assert!(matches!(
            with_token.resolver_config().credentials,
            Credentials::Static { .. }
        ));

        let ambient = ApiConfig::default();
        assert!(matches!(
            ambient.resolver_config().credentials,
            Credentials::MetadataServer { .. }
        ));
    }
}
