//! # floodtile core
//!
//! Shared vocabulary for the floodtile workspace:
//!
//! - **Types**: the map descriptor produced by Earth Engine and tile coordinates
//! - **Errors**: computation, request and configuration failures
//! - **Constants**: API roots, scopes and cache defaults
//! - **Traits**: the resolver seam the cache is built on
//!
//! ## Example
//!
//! ```rust
//! use floodtile_core::{MapDescriptor, TileCoord};
//!
//! let map = MapDescriptor::new("abc123");
//! let url = map.tile_url("https://earthengine.googleapis.com/v1", TileCoord::new(3, 1, 2));
//! assert_eq!(url, "https://earthengine.googleapis.com/v1/abc123/tiles/3/1/2");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{ErrorKind, FloodtileError, Result};
pub use traits::*;
pub use types::*;
