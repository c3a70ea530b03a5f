//! Wayfinder CLI - location search, weather and routing from the terminal.
//!
//! Lookups go through the Wayfinder proxy configured in
//! `~/.wayfinder/config.ini`. Results are cached and identical concurrent
//! requests are coalesced by the library.

mod commands;
mod error;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::debug;
use wayfinder::logging::{init_logging, LoggingGuard};
use wayfinder::services::{RouteOptions, RouteType};

use commands::common::{load_config, parse_bounds, parse_latlng};
use commands::config::ConfigAction;
use commands::locate::{LocateOptions, DEFAULT_ORIGIN};
use commands::lookup::Lookup;
use error::CliError;

const CLI_LOG_FILTER: &str = "warn";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "wayfinder")]
#[command(about = "Search places, reverse geocode, check weather and plan routes")]
#[command(version)]
struct Cli {
    /// Path to the config file (default: ~/.wayfinder/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find coordinates for a place name or address
    Geocode {
        /// Free-text query, e.g. "Eiffel Tower"
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Find the address at a coordinate
    Reverse {
        /// Coordinate as "lat,lng"
        #[arg(allow_hyphen_values = true)]
        at: String,
    },

    /// Current weather at a coordinate
    Weather {
        /// Coordinate as "lat,lng"
        #[arg(allow_hyphen_values = true)]
        at: String,
    },

    /// Plan a route between two coordinates
    Route {
        /// Start coordinate as "lat,lng"
        #[arg(allow_hyphen_values = true)]
        from: String,

        /// End coordinate as "lat,lng"
        #[arg(allow_hyphen_values = true)]
        to: String,

        /// Routing objective: fastest or shortest
        #[arg(long = "type", default_value = "fastest")]
        route_type: RouteType,

        /// Account for live traffic
        #[arg(long)]
        traffic: bool,
    },

    /// Traffic incidents inside a viewport
    Traffic {
        /// South-west corner as "lat,lng"
        #[arg(long, allow_hyphen_values = true)]
        sw: String,

        /// North-east corner as "lat,lng"
        #[arg(long, allow_hyphen_values = true)]
        ne: String,
    },

    /// Search points of interest inside a viewport
    Places {
        /// Free-text query, e.g. "museum"
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// South-west corner as "lat,lng"
        #[arg(long, allow_hyphen_values = true)]
        sw: String,

        /// North-east corner as "lat,lng"
        #[arg(long, allow_hyphen_values = true)]
        ne: String,
    },

    /// Measure the great-circle length of a path
    Distance {
        /// Two or more coordinates as "lat,lng"
        #[arg(required = true, num_args = 2.., allow_hyphen_values = true)]
        points: Vec<String>,
    },

    /// Replay a simulated geolocation session
    Locate {
        /// Walk origin as "lat,lng"
        #[arg(long, allow_hyphen_values = true)]
        origin: Option<String>,

        /// Milliseconds between simulated readings
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();

    // Config commands work on the file itself and must not fail on its contents.
    if let Commands::Config { action } = cli.command {
        return commands::config::run(action, config_path);
    }

    let config = load_config(config_path)?;
    // Progress logs would interleave with command output; RUST_LOG overrides.
    let logging = config.logging_config().with_default_filter(CLI_LOG_FILTER);
    let _logging_guard: LoggingGuard = init_logging(&logging).map_err(CliError::LoggingInit)?;
    debug!(base_url = %config.proxy.base_url, "Configuration loaded");

    match cli.command {
        Commands::Geocode { query } => {
            commands::lookup::run(config, Lookup::Geocode(query.join(" ")))
        }
        Commands::Reverse { at } => {
            commands::lookup::run(config, Lookup::Reverse(parse_latlng(&at)?))
        }
        Commands::Weather { at } => {
            commands::lookup::run(config, Lookup::Weather(parse_latlng(&at)?))
        }
        Commands::Route {
            from,
            to,
            route_type,
            traffic,
        } => commands::lookup::run(
            config,
            Lookup::Route {
                start: parse_latlng(&from)?,
                end: parse_latlng(&to)?,
                options: RouteOptions {
                    route_type,
                    traffic,
                },
            },
        ),
        Commands::Traffic { sw, ne } => {
            commands::lookup::run(config, Lookup::Traffic(parse_bounds(&sw, &ne)?))
        }
        Commands::Places { query, sw, ne } => commands::lookup::run(
            config,
            Lookup::Places {
                query: query.join(" "),
                bounds: parse_bounds(&sw, &ne)?,
            },
        ),
        Commands::Distance { points } => commands::distance::run(&points),
        Commands::Locate {
            origin,
            interval_ms,
        } => {
            let origin = match origin {
                Some(raw) => parse_latlng(&raw)?,
                None => DEFAULT_ORIGIN,
            };
            commands::locate::run(
                config,
                LocateOptions {
                    origin,
                    interval: Duration::from_millis(interval_ms),
                },
            )
        }
        Commands::Config { .. } => Ok(()),
    }
}
