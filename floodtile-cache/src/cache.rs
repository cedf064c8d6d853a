//! Single-slot map cache with a maximum age.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use floodtile_core::constants::DEFAULT_CACHE_MAX_AGE_SECS;
use floodtile_core::error::Result;
use floodtile_core::traits::MapResolver;
use floodtile_core::types::MapDescriptor;

use crate::clock::{Clock, SystemClock};

/// A cached descriptor and the time it was produced.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    /// The cached map
    pub descriptor: Arc<MapDescriptor>,
    /// When the resolver call that produced it started
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Age of the entry at `now`. Zero if the clock went backwards.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }

    fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) > max_age
    }
}

/// Cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum age of the cached map
    pub max_age: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(DEFAULT_CACHE_MAX_AGE_SECS),
        }
    }
}

impl CacheConfig {
    /// Creates a config with the given maximum age.
    pub fn with_max_age(max_age: Duration) -> Self {
        Self { max_age }
    }
}

/// Lazily refreshed holder of the one computed map.
///
/// Reads of a fresh entry only take a read lock. Refreshes are serialized:
/// the first caller to see a stale or empty slot calls the resolver while the
/// others wait, then re-check and pick up the new entry instead of calling
/// the resolver again. A failed refresh leaves the previous entry in place.
pub struct MapCache {
    resolver: Arc<dyn MapResolver>,
    clock: Arc<dyn Clock>,
    entry: RwLock<Option<CacheEntry>>,
    refresh: Mutex<()>,
    max_age: Duration,
}

impl MapCache {
    /// Creates an empty cache with default configuration.
    pub fn new(resolver: Arc<dyn MapResolver>) -> Self {
        Self::with_config(resolver, CacheConfig::default())
    }

    /// Creates an empty cache with custom configuration.
    pub fn with_config(resolver: Arc<dyn MapResolver>, config: CacheConfig) -> Self {
        Self::with_clock(resolver, config, Arc::new(SystemClock))
    }

    /// Creates an empty cache reading time from `clock`.
    pub fn with_clock(
        resolver: Arc<dyn MapResolver>,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver,
            clock,
            entry: RwLock::new(None),
            refresh: Mutex::new(()),
            max_age: config.max_age,
        }
    }

    /// Returns the cached map, recomputing it first if it is missing or
    /// older than the maximum age.
    pub async fn get(&self) -> Result<Arc<MapDescriptor>> {
        if let Some(descriptor) = self.fresh(self.clock.now()) {
            debug!(mapid = %descriptor.mapid, "Cache hit");
            return Ok(descriptor);
        }

        let _guard = self.refresh.lock().await;

        // Another caller may have refreshed while we waited.
        let now = self.clock.now();
        if let Some(descriptor) = self.fresh(now) {
            debug!(mapid = %descriptor.mapid, "Refreshed by concurrent caller");
            return Ok(descriptor);
        }

        debug!("Cache miss, resolving map");

        match self.resolver.resolve().await {
            Ok(descriptor) => {
                let descriptor = Arc::new(descriptor);
                *self.entry.write() = Some(CacheEntry {
                    descriptor: Arc::clone(&descriptor),
                    created_at: now,
                });
                info!(mapid = %descriptor.mapid, created_at = %now, "Cached new map");
                Ok(descriptor)
            }
            Err(err) => {
                warn!(error = %err, "Map refresh failed, keeping previous entry");
                Err(err)
            }
        }
    }

    /// Returns the current entry without refreshing, fresh or not.
    pub fn peek(&self) -> Option<CacheEntry> {
        self.entry.read().clone()
    }

    /// Returns the current time as seen by the cache.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Returns the configured maximum age.
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn fresh(&self, now: DateTime<Utc>) -> Option<Arc<MapDescriptor>> {
        self.entry
            .read()
            .as_ref()
            .filter(|e| !e.is_stale(now, self.max_age))
            .map(|e| Arc::clone(&e.descriptor))
    }
}
