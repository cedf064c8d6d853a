//! API route configuration.

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers;
use crate::state::AppState;

/// Creates the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))

        // Tiles
        .route("/get-map", get(handlers::get_map))

        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use tower::ServiceExt;

    use floodtile_cache::{CacheConfig, ManualClock, MapCache};
    use floodtile_core::error::{FloodtileError, Result};
    use floodtile_core::traits::MapResolver;
    use floodtile_core::types::MapDescriptor;

    use crate::state::ApiConfig;

    struct CountingResolver {
        mapid: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MapResolver for CountingResolver {
        async fn resolve(&self) -> Result<MapDescriptor> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(MapDescriptor::new(self.mapid))
        }
    }

    struct FailingResolver;

    #[async_trait]
    impl MapResolver for FailingResolver {
        async fn resolve(&self) -> Result<MapDescriptor> {
            Err(FloodtileError::RemoteError {
                status: 403,
                message: "Earth Engine access denied".into(),
            })
        }
    }

    fn counting_app() -> (Router, Arc<CountingResolver>) {
        let resolver = Arc::new(CountingResolver {
            mapid: "abc123",
            calls: AtomicUsize::new(0),
        });
        let state = AppState::with_resolver(ApiConfig::default(), resolver.clone());
        (create_router(Arc::new(state)), resolver)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (app, _) = counting_app();

        let response = app.oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert!(body["cached_map"].is_null());
    }

    #[tokio::test]
    async fn test_get_map_redirects_to_tile() {
        let (app, _) = counting_app();

        let response = app.oneshot(get("/get-map?x=1&y=2&z=3")).await.unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://earthengine.googleapis.com/v1/abc123/tiles/3/1/2"
        );
    }

    #[tokio::test]
    async fn test_get_map_uses_cache() {
        let (app, resolver) = counting_app();

        for (x, y) in [(1, 2), (5, 6), (7, 8)] {
            let uri = format!("/get-map?x={x}&y={y}&z=10");
            let response = app.clone().oneshot(get(&uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        }

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);

        let response = app.oneshot(get("/health")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["cached_map"]["mapid"], "abc123");
        assert_eq!(body["cached_map"]["stale"], false);
    }

    #[tokio::test]
    async fn test_get_map_non_integer_is_bad_request() {
        let (app, resolver) = counting_app();

        let response = app.oneshot(get("/get-map?x=abc&y=2&z=3")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().contains("abc"));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_get_map_missing_coordinate_is_bad_request() {
        let (app, _) = counting_app();

        let response = app.oneshot(get("/get-map?x=1&y=2")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_map_computation_failure_is_server_error() {
        let state = AppState::with_resolver(ApiConfig::default(), Arc::new(FailingResolver));
        let app = create_router(Arc::new(state));

        let response = app.oneshot(get("/get-map?x=1&y=2&z=3")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .contains("Earth Engine access denied"));
        assert_eq!(body["code"], "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_unusable_mapid_is_server_error() {
        let resolver = Arc::new(CountingResolver {
            mapid: "projects/earthengine-legacy/maps/a\nb",
            calls: AtomicUsize::new(0),
        });
        let app = create_router(Arc::new(AppState::with_resolver(ApiConfig::default(), resolver)));

        let response = app.oneshot(get("/get-map?x=1&y=2&z=3")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["code"], "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_duplicate_parameter_is_json_bad_request() {
        let (app, resolver) = counting_app();

        let response = app.oneshot(get("/get-map?x=1&x=2&y=2&z=3")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "BAD_REQUEST");
        assert!(body["detail"].as_str().unwrap().contains("duplicate"));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_health_uses_cache_clock() {
        let resolver = Arc::new(CountingResolver {
            mapid: "abc123",
            calls: AtomicUsize::new(0),
        });
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let config = ApiConfig::default();
        let cache = MapCache::with_clock(
            resolver,
            CacheConfig::with_max_age(config.cache_max_age),
            clock.clone(),
        );
        let app = create_router(Arc::new(AppState::with_cache(config, cache)));

        let response = app.clone().oneshot(get("/get-map?x=1&y=2&z=3")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

        clock.advance(chrono::Duration::hours(4));
        let body = body_json(app.oneshot(get("/health")).await.unwrap()).await;
        assert_eq!(body["cached_map"]["age_seconds"], 4 * 60 * 60);
        assert_eq!(body["cached_map"]["stale"], true);
    }

    #[tokio::test]
    async fn test_custom_api_root() {
        let config = ApiConfig {
            api_root: "http://localhost:9000/v1".into(),
            ..Default::default()
        };
        let resolver = Arc::new(CountingResolver {
            mapid: "projects/earthengine-legacy/maps/f00d",
            calls: AtomicUsize::new(0),
        });
        let app = create_router(Arc::new(AppState::with_resolver(config, resolver)));

        let response = app.oneshot(get("/get-map?x=0&y=0&z=0")).await.unwrap();

        assert_eq!(
            response.headers()[header::LOCATION],
            "http://localhost:9000/v1/projects/earthengine-legacy/maps/f00d/tiles/0/0/0"
        );
    }
}
