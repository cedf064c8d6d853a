//! Domain types: the computed map and the tiles cut from it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FloodtileError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// MAP DESCRIPTOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a remote map computation.
///
/// `mapid` is the Earth Engine map resource name
/// (`projects/<project>/maps/<id>`); tiles are served under it. The type is
/// never mutated after the resolver builds it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDescriptor {
    /// Map identifier used in tile URLs
    pub mapid: String,
    /// Legacy access token; empty for maps created through the REST API
    #[serde(default)]
    pub token: String,
}

impl MapDescriptor {
    /// Creates a descriptor with no legacy token.
    pub fn new(mapid: impl Into<String>) -> Self {
        Self {
            mapid: mapid.into(),
            token: String::new(),
        }
    }

    /// Builds the URL of a single tile of this map.
    ///
    /// Format: `<api_root>/<mapid>/tiles/<z>/<x>/<y>`.
    pub fn tile_url(&self, api_root: &str, coord: TileCoord) -> String {
        format!(
            "{}/{}/tiles/{}/{}/{}",
            api_root.trim_end_matches('/'),
            self.mapid,
            coord.z,
            coord.x,
            coord.y
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TILE COORDINATES
// ═══════════════════════════════════════════════════════════════════════════════

/// Slippy-map tile address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column
    pub x: u32,
    /// Row
    pub y: u32,
}

impl TileCoord {
    /// Creates a coordinate from zoom, column and row.
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Parses a coordinate from raw query values.
    ///
    /// Surrounding whitespace is ignored. Anything that is not a non-negative
    /// integer is a request error.
    pub fn from_query(x: Option<&str>, y: Option<&str>, z: Option<&str>) -> Result<Self> {
        Ok(Self {
            z: parse_component("z", z)?,
            x: parse_component("x", x)?,
            y: parse_component("y", y)?,
        })
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

fn parse_component(name: &str, raw: Option<&str>) -> Result<u32> {
    let raw = raw.ok_or_else(|| FloodtileError::MissingParameter(name.to_string()))?;
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
    trimmed
        .parse::<u32>()
        .map_err(|e| FloodtileError::InvalidCoordinate {
            name: name.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}
