//! DTOs for API requests and responses.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use floodtile_cache::CacheEntry;

/// Query string of `GET /get-map`.
///
/// Values stay raw strings so malformed numbers surface as our own request
/// error instead of the extractor's rejection.
#[derive(Debug, Default, Deserialize)]
pub struct TileQuery {
    /// Tile column
    pub x: Option<String>,
    /// Tile row
    pub y: Option<String>,
    /// Zoom level
    pub z: Option<String>,
}

/// Response for the health check.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok" when the server answers
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// The cached map, if one has been computed
    pub cached_map: Option<CachedMapDto>,
}

/// The currently cached map.
#[derive(Debug, Serialize)]
pub struct CachedMapDto {
    /// Map identifier
    pub mapid: String,
    /// When the map was computed
    pub created_at: DateTime<Utc>,
    /// Age in whole seconds
    pub age_seconds: u64,
    /// Whether the next tile request will recompute it
    pub stale: bool,
}

impl CachedMapDto {
    /// Describes `entry` as seen at `now`.
    pub fn from_entry(entry: &CacheEntry, now: DateTime<Utc>, max_age: Duration) -> Self {
        let age = entry.age(now);
        Self {
            mapid: entry.descriptor.mapid.clone(),
            created_at: entry.created_at,
            age_seconds: age.as_secs(),
            stale: age > max_age,
        }
    }
}
