//! Distance measurement command.

use console::style;
use wayfinder::distance::{bearing_deg, format_distance, DistanceMeasurement};

use super::common::parse_latlng;
use crate::error::CliError;

/// Measure the path through `points` and print each leg.
pub fn run(points: &[String]) -> Result<(), CliError> {
    if points.len() < 2 {
        return Err(CliError::InvalidArgument(
            "at least two points are required".to_string(),
        ));
    }

    let mut measurement = DistanceMeasurement::new();
    for raw in points {
        let point = parse_latlng(raw)?;
        measurement.add_point(point);
        if let (Some(segment), [.., from, to]) =
            (measurement.last_segment_m(), measurement.points())
        {
            println!(
                "  {} -> {}  {:>9}  {:>5.1}°",
                from,
                to,
                format_distance(segment),
                bearing_deg(*from, *to)
            );
        }
    }

    println!(
        "{} {}",
        style("Total:").bold(),
        style(format_distance(measurement.total_m())).bold()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_two_points() {
        let result = run(&["48.8566,2.3522".to_string()]);
        assert!(matches!(result, Err(CliError::InvalidArgument(_))));
    }

    #[test]
    fn test_rejects_bad_point() {
        let result = run(&["48.8566,2.3522".to_string(), "somewhere".to_string()]);
        assert!(matches!(result, Err(CliError::InvalidArgument(_))));
    }

    #[test]
    fn test_measures_path() {
        let result = run(&["48.8566,2.3522".to_string(), "51.5074,-0.1278".to_string()]);
        assert!(result.is_ok());
    }
}
