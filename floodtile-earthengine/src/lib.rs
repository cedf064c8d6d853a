//! # floodtile Earth Engine integration
//!
//! Computes the flood map on Earth Engine through its REST API.
//!
//! - [`FloodAlgorithm`] builds the expression graph for the fixed pipeline
//! - [`TokenProvider`] implementations supply bearer tokens
//! - [`EarthEngineClient`] posts map-creation requests
//! - [`EarthEngineResolver`] ties them together behind
//!   [`MapResolver`](floodtile_core::MapResolver)

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod auth;
mod client;
mod expression;
mod resolver;

pub use auth::{MetadataServerToken, StaticToken, TokenProvider};
pub use client::{CreateMapRequest, EarthEngineClient, EarthEngineConfig, VisualizationOptions};
pub use expression::{Expression, FloodAlgorithm, ValueNode};
pub use resolver::{Credentials, EarthEngineResolver, ResolverConfig};
