//! Service constants for floodtile.
//!
//! Everything here is a default; the API crate lets the environment override
//! the values that vary between deployments.

// ═══════════════════════════════════════════════════════════════════════════════
// EARTH ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Root of the Earth Engine REST API. Tile URLs hang off this root.
pub const DEFAULT_EE_API_ROOT: &str = "https://earthengine.googleapis.com/v1";

/// Cloud project that owns computed maps when none is configured.
pub const DEFAULT_EE_PROJECT: &str = "earthengine-legacy";

/// OAuth scope required for Earth Engine calls.
pub const EARTHENGINE_SCOPE: &str = "https://www.googleapis.com/auth/earthengine";

/// GCE metadata server used for ambient service-account credentials.
pub const DEFAULT_METADATA_URL: &str = "http://metadata.google.internal";

/// Request timeout for Earth Engine calls, in seconds.
/// Map creation evaluates the whole expression graph server side.
pub const DEFAULT_EE_TIMEOUT_SECS: u64 = 60;

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum age of a cached map descriptor (3 hours).
pub const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 3 * 60 * 60;

// ═══════════════════════════════════════════════════════════════════════════════
// HTTP SERVER
// ═══════════════════════════════════════════════════════════════════════════════

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

/// Browser origins allowed to fetch tiles through the proxy.
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://earth.google.com",
    "https://earth.google.com",
    "http://storage.googleapis.com",
    "https://storage.googleapis.com",
    "http://localhost",
    "http://localhost:5173",
];
