//! Wayfinder - client core for an interactive web map
//!
//! This library provides the client-side layer of a map application backed by
//! a thin proxy to geocoding, weather and routing providers:
//!
//! - a bounded TTL cache with request coalescing for every lookup type,
//! - a geolocation tracker that refines accuracy with a progressive timeout,
//! - an address pipeline that reverse-geocodes accepted fixes and cancels
//!   superseded lookups.
//!
//! # High-Level API
//!
//! The [`app`] module wires everything together:
//!
//! ```ignore
//! use wayfinder::app::AppContext;
//! use wayfinder::config::WayfinderConfig;
//!
//! let ctx = AppContext::with_proxy(WayfinderConfig::load()?, source)?;
//! let paris = ctx.services().geocode("Paris").await?;
//! ```

pub mod app;
pub mod cache;
pub mod coalesce;
pub mod config;
pub mod distance;
pub mod error;
pub mod geolocation;
pub mod logging;
pub mod services;
pub mod status;

pub use error::{ErrorCategory, MapError, MapResult};
