//! Simulated geolocation session.
//!
//! Replays a short walk of converging fixes through the tracker so the
//! accuracy filter, the progressive timeout and address resolution can be
//! observed without a positioning device.

use std::sync::Arc;
use std::time::Duration;

use console::style;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use wayfinder::app::AppContext;
use wayfinder::config::WayfinderConfig;
use wayfinder::geolocation::{
    suggested_zoom, PositionFix, ScriptedReading, SimulatedPositionSource, StopReason,
    TrackerEvent,
};
use wayfinder::services::LatLng;
use wayfinder::MapError;

use super::common::runtime;
use crate::error::CliError;

/// Default walk origin (Champ de Mars, Paris).
pub const DEFAULT_ORIGIN: LatLng = LatLng::new(48.8556, 2.2986);

/// How long to wait for address lookups still in flight after the session ends.
const ADDRESS_GRACE: Duration = Duration::from_secs(2);

/// Accuracy radii of the replayed readings. `None` marks a provider error.
const WALK_ACCURACY_M: [Option<f64>; 7] = [
    Some(32.0),
    Some(18.0),
    None,
    Some(21.0),
    Some(9.0),
    Some(6.5),
    Some(4.0),
];

/// Options for the `locate` command.
#[derive(Debug, Clone, Copy)]
pub struct LocateOptions {
    pub origin: LatLng,
    pub interval: Duration,
}

enum AddressNote {
    Resolved(String),
    Failed(MapError),
}

/// Build the replay script for a walk starting at `origin`.
///
/// Each reading moves a few metres north-east of the previous one.
pub fn walk_script(origin: LatLng, interval: Duration) -> Vec<ScriptedReading> {
    WALK_ACCURACY_M
        .iter()
        .enumerate()
        .map(|(step, accuracy)| {
            let reading = match accuracy {
                Some(accuracy_m) => {
                    let drift = 0.00004 * (step as f64 + 1.0);
                    Ok(
                        PositionFix::new(origin.lat + drift, origin.lng + drift, *accuracy_m)
                            .with_motion(None, Some(45.0), Some(1.4)),
                    )
                }
                None => Err(MapError::Timeout("position unavailable".to_string())),
            };
            ScriptedReading::new(interval, reading)
        })
        .collect()
}

/// Run a simulated tracking session until it stops or Ctrl+C is pressed.
pub fn run(config: WayfinderConfig, options: LocateOptions) -> Result<(), CliError> {
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    ctrlc::set_handler(move || signal_token.cancel())
        .map_err(|e| CliError::Signal(e.to_string()))?;

    let rt = runtime()?;
    rt.block_on(async move {
        let source = Arc::new(SimulatedPositionSource::new());
        let ctx = AppContext::with_proxy(config, source.clone())?;

        let (note_tx, mut notes) = mpsc::unbounded_channel();
        let resolved_tx = note_tx.clone();
        ctx.pipeline().on_resolved(move |address| {
            let _ = resolved_tx.send(AddressNote::Resolved(address.to_string()));
        });
        ctx.pipeline().on_failed(move |failure| {
            let _ = note_tx.send(AddressNote::Failed(failure.error.clone()));
        });

        let mut events = ctx.tracker().subscribe();
        source.queue_current(Ok(PositionFix::new(
            options.origin.lat,
            options.origin.lng,
            45.0,
        )));

        println!(
            "{} near {}  (Ctrl+C to stop)",
            style("Locating").bold(),
            options.origin
        );
        info!(origin = %options.origin, "Starting simulated session");
        ctx.start_tracking();
        let replay = source.spawn_replay(walk_script(options.origin, options.interval));

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    ctx.stop_tracking();
                    println!("{}", style("Interrupted").yellow());
                    break;
                }

                event = events.recv() => match event {
                    Ok(TrackerEvent::FixUpdate(fix)) => {
                        println!(
                            "  {} {:.6}, {:.6}  ±{:.0}m  timeout {}s",
                            style("fix").green(),
                            fix.lat,
                            fix.lng,
                            fix.accuracy_m,
                            ctx.tracker().timeout().as_secs()
                        );
                    }
                    Ok(TrackerEvent::Error(e)) => {
                        if let Some(msg) = ctx.status_for(&e) {
                            println!("  {}", style(msg).red());
                        }
                    }
                    Ok(TrackerEvent::Stopped(reason)) => {
                        println!("{} {}", style("Stopped:").bold(), describe(reason));
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },

                Some(note) = notes.recv() => print_note(note),
            }
        }

        replay.abort();

        if let Some(best) = ctx.tracker().best_fix() {
            println!(
                "  Best: {:.6}, {:.6}  ±{:.0}m ({}, zoom {})",
                best.lat,
                best.lng,
                best.accuracy_m,
                best.accuracy_level().label(),
                suggested_zoom(best.accuracy_m)
            );
        }

        while ctx.pipeline().pending_count() > 0 {
            match tokio::time::timeout(ADDRESS_GRACE, notes.recv()).await {
                Ok(Some(note)) => print_note(note),
                _ => break,
            }
        }

        ctx.shutdown();
        Ok::<(), CliError>(())
    })
}

fn print_note(note: AddressNote) {
    match note {
        AddressNote::Resolved(address) => println!("  {} {}", style("address").cyan(), address),
        AddressNote::Failed(e) => println!("  {} {}", style("address").red(), e),
    }
}

fn describe(reason: StopReason) -> &'static str {
    match reason {
        StopReason::Requested => "stopped by user",
        StopReason::Restarted => "restarted",
        StopReason::AccuracyReached => "excellent accuracy reached",
        StopReason::MaxWaitElapsed => "maximum wait elapsed",
    }
}
