use anyhow::{Context, Result};
use clap::Parser;
use route_playback::core::GeoPoint;
use route_playback::input::load_route_file;
use route_playback::playback::{spawn_player, PlayerEvent, RouteSummary};
use route_playback::routing::{travel_secs, StraightLineProvider};
use route_playback::{PlaybackConfig, PlaybackEngine, TelemetrySnapshot};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "route-playback",
    about = "Play a simulated vehicle along a route and print telemetry as JSON lines"
)]
struct Args {
    /// Waypoint as "lat,lon"; repeat for each stop (at least two)
    #[arg(long = "via", value_name = "LAT,LON")]
    via: Vec<String>,

    /// Recorded route file (CSV or JSON) instead of waypoints
    #[arg(long, conflicts_with = "via")]
    route: Option<PathBuf>,

    /// Playback speed multiplier
    #[arg(long)]
    speed: Option<f64>,

    /// How long to play, in seconds of wall time
    #[arg(long, default_value_t = 15.0)]
    seconds: f64,

    /// Intermediate points per straight leg
    #[arg(long, default_value_t = 4)]
    densify: usize,

    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Save the effective config to the user config directory
    #[arg(long)]
    write_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PlaybackConfig::load_from(path)?,
        None => PlaybackConfig::load(),
    };
    if let Some(speed) = args.speed {
        config.default_speed = speed;
    }
    config.validate()?;

    if args.write_config {
        let path = config.save()?;
        info!("Config written to {}", path.display());
    }

    if !(args.seconds.is_finite() && args.seconds > 0.0) {
        anyhow::bail!("--seconds must be a positive number");
    }

    let (telemetry_tx, mut telemetry) = mpsc::channel::<TelemetrySnapshot>(config.telemetry_buffer);
    let engine = PlaybackEngine::new(&config, telemetry_tx);
    let provider = Arc::new(StraightLineProvider::new(args.densify));
    let (player, mut events, task) = spawn_player(engine, provider, config.frame_interval());

    match &args.route {
        Some(path) => {
            let route = load_route_file(path)?;
            info!("Read {} points from {}", route.path.len(), path.display());
            player.load_route(route).await?;
        }
        None => {
            let waypoints = args
                .via
                .iter()
                .map(|s| GeoPoint::parse_pair(s))
                .collect::<Result<Vec<_>>>()
                .context("Invalid --via waypoint")?;
            if waypoints.len() < 2 {
                anyhow::bail!("Provide --route FILE or at least two --via LAT,LON waypoints");
            }
            player.request_route(waypoints).await?;
        }
    }

    let summary = wait_for_route(&mut events).await?;
    print_summary(&summary);

    player.start().await?;

    let deadline = tokio::time::sleep(Duration::from_secs_f64(args.seconds));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            Some(snapshot) = telemetry.recv() => {
                println!("{}", serde_json::to_string(&snapshot)?);
            }
            Some(event) = events.recv() => {
                if let PlayerEvent::Error(message) = event {
                    warn!("{}", message);
                }
            }
        }
    }

    player.shutdown().await?;
    task.await.context("Player task panicked")?;
    Ok(())
}

async fn wait_for_route(events: &mut mpsc::UnboundedReceiver<PlayerEvent>) -> Result<RouteSummary> {
    while let Some(event) = events.recv().await {
        match event {
            PlayerEvent::RouteLoaded(summary) => return Ok(summary),
            PlayerEvent::Error(message) => anyhow::bail!("Could not load route: {}", message),
            PlayerEvent::StatusChanged(_) => {}
        }
    }
    anyhow::bail!("Player exited before a route was loaded")
}

fn print_summary(summary: &RouteSummary) {
    info!(
        "Route: {} points, {:.2} km, {:.1}s per cycle",
        summary.points, summary.total_km, summary.duration_secs
    );
    let travel = travel_secs(&summary.steps);
    if travel > 0.0 {
        info!("Estimated travel time: {:.0} min", travel / 60.0);
    }
    for (i, step) in summary.steps.iter().enumerate() {
        info!(
            "  {:>2}. {} ({:.0} m, {:.0} s)",
            i + 1,
            step.instruction,
            step.distance_meters,
            step.duration_secs
        );
    }
}
