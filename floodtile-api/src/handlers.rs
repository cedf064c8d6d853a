//! API route handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error};

use floodtile_core::types::TileCoord;

use crate::dto::{CachedMapDto, HealthResponse, TileQuery};
use crate::error::ApiError;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let cached_map = state
        .cache
        .peek()
        .map(|entry| CachedMapDto::from_entry(&entry, state.cache.now(), state.cache.max_age()));

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        cached_map,
    })
}

/// GET /get-map?x=&y=&z=
///
/// Redirects to the tile of the cached map, computing the map first when
/// the cache is empty or stale.
pub async fn get_map(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<TileQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let coord = TileCoord::from_query(query.x.as_deref(), query.y.as_deref(), query.z.as_deref())?;

    let map = state.cache.get().await?;
    let url = map.tile_url(&state.config.api_root, coord);

    let location = HeaderValue::from_str(&url).map_err(|_| {
        error!(%url, "Tile URL is not a valid header value");
        ApiError::internal(format!("tile URL {url:?} is not a valid header value"))
    })?;

    debug!(tile = %coord, mapid = %map.mapid, "Redirecting tile request");
    Ok((StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, location)]).into_response())
}
