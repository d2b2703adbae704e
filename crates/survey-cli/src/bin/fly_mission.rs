//! CLI tool to fly a simulated drone through a survey mission.
//!
//! Starts the mission, streams progress and telemetry while following the
//! planned waypoints, then completes (or aborts) it.

use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use survey_cli::sim::{FlightPath, WaypointTrack};
use survey_cli::{Identity, SurveyClient};
use survey_core::models::{
    Boundary, FlightParameters, Mission, MissionDraft, PatternType, Position, ProgressUpdate,
    RegisterDroneRequest, TelemetryReport,
};
use tokio::time;

/// Fly a survey mission against the survey server
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Survey server URL
    #[arg(long, default_value = "http://localhost:3000")]
    url: String,

    #[arg(long, default_value = "org-demo")]
    organization: String,

    #[arg(long, default_value = "pilot-demo")]
    user: String,

    #[arg(long, default_value = "operator")]
    role: String,

    /// Existing planned mission to fly; a demo mission is planned when omitted
    #[arg(long)]
    mission_id: Option<String>,

    /// Demo survey area center latitude (default: UCI)
    #[arg(long, default_value_t = 33.6846)]
    lat: f64,

    /// Demo survey area center longitude (default: UCI)
    #[arg(long, default_value_t = -117.8265)]
    lon: f64,

    /// Simulated seconds per wall-clock second
    #[arg(long, default_value_t = 10.0)]
    speedup: f64,

    /// Update rate in Hz
    #[arg(long, default_value_t = 1.0)]
    rate: f64,

    /// Abort once this percentage is reached
    #[arg(long)]
    abort_at: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if args.rate <= 0.0 || args.speedup <= 0.0 {
        bail!("--rate and --speedup must be positive");
    }

    println!("Connecting to survey server at {}...", args.url);
    let client = SurveyClient::new(
        &args.url,
        Identity {
            organization_id: args.organization.clone(),
            user_id: args.user.clone(),
            role: args.role.clone(),
        },
    );

    let mission = match &args.mission_id {
        Some(id) => client.get_mission(id).await?,
        None => plan_demo_mission(&client, &args).await?,
    };
    let mission_id = mission.mission_id.clone();

    let track = WaypointTrack::new(mission.waypoints.clone(), mission.parameters.speed_mps);
    println!("Flying mission {} ({})", mission_id, mission.name);
    println!(
        "  Waypoints: {}, planned flight time: {:.0}s",
        track.waypoint_count(),
        track.duration_s()
    );
    println!("  Speedup: {}x, Update rate: {}Hz", args.speedup, args.rate);
    println!();

    client.control(&mission_id, "start").await?;

    let start = time::Instant::now();
    let mut update_count = 0u32;
    let mut interval = time::interval(Duration::from_secs_f64(1.0 / args.rate));

    loop {
        interval.tick().await;

        let t = (start.elapsed().as_secs_f64() * args.speedup).min(track.duration_s());
        let (latitude, longitude, altitude) = track.get_position(t);
        let percent = track.percent_complete(t);

        let update = ProgressUpdate {
            percent_complete: Some(percent),
            current_waypoint: Some(track.current_waypoint(t) as u32),
            estimated_time_remaining_s: Some(track.remaining_s(t)),
            telemetry: Some(TelemetryReport {
                position: Position {
                    latitude,
                    longitude,
                    altitude,
                },
                battery_level: Some(100.0 - percent * 0.6),
                speed: Some(track.get_speed_mps()),
                heading: Some(track.get_heading(t)),
            }),
        };

        match client.report_progress(&mission_id, &update).await {
            Ok(_) => {
                update_count += 1;
                println!(
                    "[{:3}] {:5.1}% wp {:3} ({:.6}, {:.6}) -> OK",
                    update_count,
                    percent,
                    track.current_waypoint(t),
                    latitude,
                    longitude
                );
            }
            Err(e) => eprintln!("Error sending progress: {}", e),
        }

        if let Some(limit) = args.abort_at {
            if percent >= limit {
                let aborted = client
                    .abort(&mission_id, Some("Simulated abort threshold reached"))
                    .await?;
                println!("\nMission {}: {}", aborted.status, mission_id);
                return Ok(());
            }
        }

        if t >= track.duration_s() {
            break;
        }
    }

    let completed = client.control(&mission_id, "complete").await?;
    println!(
        "\nMission {} after {} progress updates.",
        completed.status, update_count
    );
    Ok(())
}

/// Register a drone and plan a small grid survey around the given center.
async fn plan_demo_mission(client: &SurveyClient, args: &Args) -> Result<Mission> {
    let drone = client
        .register_drone(&RegisterDroneRequest {
            name: "Sim Surveyor".into(),
            serial_number: format!("SIM-{}", chrono::Utc::now().timestamp()),
            model: "Simulated Quad".into(),
        })
        .await?;
    println!("Registered drone: {}", drone.drone_id);

    let half = 0.0005;
    let draft = MissionDraft {
        name: "Demo grid survey".into(),
        description: Some("Planned by fly_mission".into()),
        drone_id: drone.drone_id,
        mission_type: Default::default(),
        pattern_type: PatternType::Grid,
        parameters: FlightParameters::new(40.0, 8.0).with_overlap(50.0),
        boundary: Boundary::closed(vec![
            [args.lon - half, args.lat - half],
            [args.lon + half, args.lat - half],
            [args.lon + half, args.lat + half],
            [args.lon - half, args.lat + half],
        ]),
        location: None,
        schedule: None,
        waypoints: None,
    };
    let mission = client.plan_mission(&draft).await?;
    println!("Planned mission: {}", mission.mission_id);
    Ok(mission)
}
