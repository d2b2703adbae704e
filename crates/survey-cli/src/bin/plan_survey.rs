//! CLI tool to preview a survey flight path offline.
//!
//! Generates waypoints for a boundary without contacting the server and
//! prints the plan summary.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use survey_core::models::{Boundary, FlightParameters, PatternType};
use survey_core::path_generator::generate;
use survey_core::spatial::summarize;

/// Preview a survey flight path
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON file holding a boundary ({"coordinates": [[lng, lat], ...]} or a bare ring)
    #[arg(long, conflicts_with = "bbox")]
    boundary: Option<String>,

    /// Rectangle as min_lng,min_lat,max_lng,max_lat
    #[arg(long, value_delimiter = ',', num_args = 4)]
    bbox: Option<Vec<f64>>,

    /// Coverage pattern: grid, crosshatch, perimeter or custom
    #[arg(long, default_value = "grid")]
    pattern: String,

    /// Flight altitude in meters
    #[arg(long, default_value_t = 40.0)]
    altitude: f64,

    /// Ground speed in m/s
    #[arg(long, default_value_t = 5.0)]
    speed: f64,

    /// Overlap between adjacent rows in percent
    #[arg(long, default_value_t = 30.0)]
    overlap: f64,

    /// Write the generated waypoints to this file as JSON
    #[arg(long)]
    output: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let boundary = load_boundary(&args)?;
    let pattern: PatternType = serde_json::from_value(Value::String(args.pattern.to_lowercase()))
        .with_context(|| format!("unknown pattern {:?}", args.pattern))?;
    let parameters = FlightParameters::new(args.altitude, args.speed).with_overlap(args.overlap);

    let waypoints = generate(&boundary, pattern, &parameters)?;
    let summary = summarize(&waypoints, parameters.speed_mps);

    println!("Survey plan ({:?})", pattern);
    println!("  Waypoints: {} ({} captures)", summary.waypoint_count, summary.capture_count);
    println!("  Distance:  {:.0} m", summary.total_distance_m);
    println!(
        "  Duration:  {:.0} s ({:.1} min)",
        summary.estimated_duration_s,
        summary.estimated_duration_s / 60.0
    );
    if let Some(bbox) = summary.bounding_box {
        println!(
            "  Extent:    lat {:.6}..{:.6}, lng {:.6}..{:.6}",
            bbox.min_lat, bbox.max_lat, bbox.min_lng, bbox.max_lng
        );
    }

    if let Some(path) = args.output {
        let json = serde_json::to_string_pretty(&waypoints)?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path))?;
        println!("Wrote {} waypoints to {}", waypoints.len(), path);
    }

    Ok(())
}

fn load_boundary(args: &Args) -> Result<Boundary> {
    if let Some(path) = &args.boundary {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
        let value: Value = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path))?;
        let boundary = match value {
            Value::Array(_) => Boundary::new(serde_json::from_value(value)?),
            other => serde_json::from_value(other)?,
        };
        return Ok(boundary);
    }

    match args.bbox.as_deref() {
        Some([min_lng, min_lat, max_lng, max_lat]) => Ok(Boundary::closed(vec![
            [*min_lng, *min_lat],
            [*max_lng, *min_lat],
            [*max_lng, *max_lat],
            [*min_lng, *max_lat],
        ])),
        Some(other) => bail!("--bbox needs 4 values, got {}", other.len()),
        None => bail!("either --boundary or --bbox is required"),
    }
}
