//! CLI command implementations.
//!
//! Each submodule owns one command (or command group):
//! - `lookup` - geocode, reverse, weather and route queries through the proxy
//! - `distance` - great-circle measurement over a list of points
//! - `locate` - replay a simulated geolocation session
//! - `config` - configuration file management

pub mod common;
pub mod config;
pub mod distance;
pub mod locate;
pub mod lookup;
