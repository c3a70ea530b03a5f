//! Proxy-backed lookups.

use std::sync::Arc;

use console::style;
use tracing::debug;
use wayfinder::app::AppContext;
use wayfinder::config::WayfinderConfig;
use wayfinder::distance::{format_distance, format_duration};
use wayfinder::geolocation::SimulatedPositionSource;
use wayfinder::services::{
    Bounds, LatLng, Place, RouteOptions, RouteResult, TrafficIncident, WeatherReport,
};

use super::common::runtime;
use crate::error::CliError;

/// A single lookup to run.
#[derive(Debug, Clone)]
pub enum Lookup {
    Geocode(String),
    Reverse(LatLng),
    Weather(LatLng),
    Route {
        start: LatLng,
        end: LatLng,
        options: RouteOptions,
    },
    Traffic(Bounds),
    Places {
        query: String,
        bounds: Bounds,
    },
}

/// Run one lookup against the configured proxy and print the result.
pub fn run(config: WayfinderConfig, lookup: Lookup) -> Result<(), CliError> {
    let rt = runtime()?;
    rt.block_on(async move {
        let ctx = AppContext::with_proxy(config, Arc::new(SimulatedPositionSource::new()))?;
        debug!(?lookup, "Running lookup");
        let services = ctx.services();

        match lookup {
            Lookup::Geocode(query) => {
                let result = services.geocode(&query).await?;
                println!("{}", style(&result.display_name).bold());
                println!("  {}", result.position());
            }
            Lookup::Reverse(point) => {
                let result = services.reverse_geocode(point.lat, point.lng).await?;
                if !result.short_text.is_empty() {
                    println!("{}", style(&result.short_text).bold());
                }
                println!("  {}", result.full_text);
            }
            Lookup::Weather(point) => {
                let report = services.weather(point.lat, point.lng).await?;
                print_weather(&report);
            }
            Lookup::Route {
                start,
                end,
                options,
            } => {
                let route = services.route(start, end, options).await?;
                print_route(&route, options);
            }
            Lookup::Traffic(bounds) => {
                let incidents = services.traffic_incidents(bounds).await?;
                print_incidents(&incidents);
            }
            Lookup::Places { query, bounds } => {
                let places = services.search_places(&query, bounds).await?;
                print_places(&places);
            }
        }

        ctx.shutdown();
        Ok::<(), CliError>(())
    })
}

fn print_weather(report: &WeatherReport) {
    println!(
        "{} {}",
        style(format!("{:.1}°C", report.temperature)).bold(),
        report.description
    );
    if let Some(feels_like) = report.feels_like {
        println!("  Feels like: {:.1}°C", feels_like);
    }
    println!("  Humidity:   {:.0}%", report.humidity);
    println!("  Wind:       {:.1} m/s", report.wind_speed);
    if let Some(pressure) = report.pressure {
        println!("  Pressure:   {:.0} hPa", pressure);
    }
}

fn print_route(route: &RouteResult, options: RouteOptions) {
    println!(
        "{} {}",
        style(format_distance(route.distance_meters)).bold(),
        style(format!("({})", format_duration(route.duration_seconds))).dim()
    );
    println!("  Type:    {}", options.route_type);
    if options.traffic && route.traffic_delay_seconds > 0.0 {
        println!(
            "  Traffic: +{}",
            format_duration(route.traffic_delay_seconds)
        );
    }
    println!("  Points:  {}", route.points.len());
}

fn print_incidents(incidents: &[TrafficIncident]) {
    if incidents.is_empty() {
        println!("No traffic incidents reported");
        return;
    }
    for incident in incidents {
        println!("{} {}", style(&incident.kind).bold(), incident.description);
        if !incident.location.is_empty() {
            println!("  {}", incident.location);
        }
        if let Some(delay) = incident.delay_seconds.filter(|d| *d > 0.0) {
            println!("  Delay: +{}", format_duration(delay));
        }
    }
}

fn print_places(places: &[Place]) {
    println!("Found {} locations", places.len());
    for place in places {
        match &place.category {
            Some(category) => println!(
                "{} {}",
                style(&place.name).bold(),
                style(format!("({})", category)).dim()
            ),
            None => println!("{}", style(&place.name).bold()),
        }
        if !place.address.is_empty() && place.address != place.name {
            println!("  {}", place.address);
        }
        println!("  {}", place.position);
    }
}
