//! Common traits for floodtile.
//!
//! The remote computation sits behind [`MapResolver`] so the cache and the
//! HTTP layer can be exercised against a test double.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::MapDescriptor;

// ═══════════════════════════════════════════════════════════════════════════════
// MAP RESOLVER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Produces a fresh map descriptor from a fixed algorithm.
///
/// Every call consumes quota on the remote service. Implementations do not
/// retry; a failure is terminal for that call and is reported as a
/// computation error.
#[async_trait]
pub trait MapResolver: Send + Sync {
    /// Runs the algorithm and returns the resulting map.
    async fn resolve(&self) -> Result<MapDescriptor>;
}

#[async_trait]
impl<T: MapResolver + ?Sized> MapResolver for Arc<T> {
    async fn resolve(&self) -> Result<MapDescriptor> {
        (**self).resolve().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl MapResolver for Fixed {
        async fn resolve(&self) -> Result<MapDescriptor> {
            Ok(MapDescriptor::new("fixed"))
        }
    }

    #[tokio::test]
    async fn test_arc_delegates() {
        let resolver: Arc<dyn MapResolver> = Arc::new(Fixed);
        let map = resolver.resolve().await.unwrap();
        assert_eq!(map.mapid, "fixed");
    }
}
