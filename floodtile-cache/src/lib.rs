//! Bounded-staleness cache for the computed flood map.
//!
//! Holds at most one map descriptor and refreshes it through a
//! [`MapResolver`](floodtile_core::MapResolver) once it is older than the
//! configured maximum age.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cache;
mod clock;

pub use cache::{CacheConfig, CacheEntry, MapCache};
pub use clock::{Clock, ManualClock, SystemClock};
