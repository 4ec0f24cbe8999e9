//! Background task that owns a [`PlaybackEngine`] and drives it frame by frame
//!
//! Commands arrive over an mpsc channel, frames come from a tokio interval and
//! route lookups run on their own task so the current route keeps playing
//! while a new one is fetched.

use crate::core::GeoPoint;
use crate::playback::engine::PlaybackEngine;
use crate::playback::{PlaybackError, PlaybackStatus};
use crate::routing::{ProviderResult, Route, RouteProvider, RouteStep};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Commands accepted by the player task
#[derive(Debug, Clone)]
pub enum PlayerCommand {
    /// Install a route directly
    LoadRoute(Route),
    /// Look up a route through the waypoints, then install it
    RequestRoute(Vec<GeoPoint>),
    Start,
    Pause,
    Reset,
    SetSpeed(f64),
    Shutdown,
}

/// Description of a freshly loaded route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    pub points: usize,
    pub total_km: f64,
    pub duration_secs: f64,
    pub steps: Vec<RouteStep>,
}

/// Notifications from the player task
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    RouteLoaded(RouteSummary),
    StatusChanged(PlaybackStatus),
    /// A command or lookup failed; playback state is unchanged
    Error(String),
}

/// Sending side of a running player
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    commands: mpsc::Sender<PlayerCommand>,
}

impl PlayerHandle {
    pub async fn send(&self, command: PlayerCommand) -> Result<(), PlaybackError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| PlaybackError::PlayerClosed)
    }

    pub async fn load_route(&self, route: Route) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::LoadRoute(route)).await
    }

    pub async fn request_route(&self, waypoints: Vec<GeoPoint>) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::RequestRoute(waypoints)).await
    }

    pub async fn start(&self) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::Start).await
    }

    pub async fn pause(&self) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::Pause).await
    }

    pub async fn reset(&self) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::Reset).await
    }

    pub async fn set_speed(&self, speed: f64) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::SetSpeed(speed)).await
    }

    pub async fn shutdown(&self) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::Shutdown).await
    }
}

/// Spawn the player loop on the current tokio runtime
///
/// Telemetry flows through the engine's own sink; route and status
/// notifications come out of the returned event receiver.
pub fn spawn_player(
    engine: PlaybackEngine,
    provider: Arc<dyn RouteProvider>,
    frame_interval: Duration,
) -> (PlayerHandle, mpsc::UnboundedReceiver<PlayerEvent>, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::channel::<PlayerCommand>(64);
    let (event_tx, event_rx) = mpsc::unbounded_channel::<PlayerEvent>();

    let task = tokio::spawn(run_player(engine, provider, frame_interval, cmd_rx, event_tx));

    (PlayerHandle { commands: cmd_tx }, event_rx, task)
}

/// Hands out route lookups and remembers which one is the newest
///
/// Every route request, direct or looked up, bumps the generation. A lookup
/// result is only installed when its generation is still the current one.
struct Lookups {
    generation: u64,
    results: mpsc::UnboundedSender<(u64, ProviderResult<Route>)>,
}

impl Lookups {
    /// Invalidate every lookup still in flight
    fn supersede(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn spawn(&mut self, provider: Arc<dyn RouteProvider>, waypoints: Vec<GeoPoint>) {
        let generation = self.supersede();
        let results = self.results.clone();
        tokio::spawn(async move {
            let result = provider.route(&waypoints).await;
            let _ = results.send((generation, result));
        });
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }
}

async fn run_player(
    mut engine: PlaybackEngine,
    provider: Arc<dyn RouteProvider>,
    frame_interval: Duration,
    mut commands: mpsc::Receiver<PlayerCommand>,
    events: mpsc::UnboundedSender<PlayerEvent>,
) {
    let (lookup_tx, mut results) = mpsc::unbounded_channel::<(u64, ProviderResult<Route>)>();
    let mut lookups = Lookups {
        generation: 0,
        results: lookup_tx,
    };
    let mut frames = tokio::time::interval(frame_interval);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Player started ({}ms frames, provider: {})", frame_interval.as_millis(), provider.name());

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("All player handles dropped");
                    break;
                };
                if matches!(command, PlayerCommand::Shutdown) {
                    break;
                }
                handle_command(&mut engine, command, &provider, &mut lookups, &events);
            }
            Some((generation, result)) = results.recv() => {
                if !lookups.is_current(generation) {
                    debug!("Dropping superseded route lookup #{}", generation);
                    continue;
                }
                match result {
                    Ok(route) => install_route(&mut engine, route, &events),
                    Err(e) => {
                        warn!("Route lookup failed: {}", e);
                        let _ = events.send(PlayerEvent::Error(e.to_string()));
                    }
                }
            }
            _ = frames.tick() => {
                engine.frame();
            }
        }
    }

    engine.reset();
    info!("Player stopped");
}

fn handle_command(
    engine: &mut PlaybackEngine,
    command: PlayerCommand,
    provider: &Arc<dyn RouteProvider>,
    lookups: &mut Lookups,
    events: &mpsc::UnboundedSender<PlayerEvent>,
) {
    match command {
        PlayerCommand::LoadRoute(route) => {
            lookups.supersede();
            install_route(engine, route, events);
        }
        PlayerCommand::RequestRoute(waypoints) => lookups.spawn(provider.clone(), waypoints),
        PlayerCommand::Start => {
            engine.start();
            let _ = events.send(PlayerEvent::StatusChanged(engine.state().status()));
        }
        PlayerCommand::Pause => {
            engine.pause();
            let _ = events.send(PlayerEvent::StatusChanged(PlaybackStatus::Stopped));
        }
        PlayerCommand::Reset => {
            engine.reset();
            let _ = events.send(PlayerEvent::StatusChanged(PlaybackStatus::Stopped));
        }
        PlayerCommand::SetSpeed(speed) => {
            if let Err(e) = engine.set_speed_multiplier(speed) {
                let _ = events.send(PlayerEvent::Error(e.to_string()));
            }
        }
        PlayerCommand::Shutdown => {}
    }
}

fn install_route(engine: &mut PlaybackEngine, route: Route, events: &mpsc::UnboundedSender<PlayerEvent>) {
    let result = engine.load(route);
    let _ = events.send(PlayerEvent::StatusChanged(PlaybackStatus::Stopped));
    match result {
        Ok(()) => {
            let _ = events.send(PlayerEvent::RouteLoaded(RouteSummary {
                points: engine.path().len(),
                total_km: engine.segment_table().total_km(),
                duration_secs: engine.total_duration_secs(),
                steps: engine.steps().to_vec(),
            }));
        }
        Err(e) => {
            let _ = events.send(PlayerEvent::Error(e.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaybackConfig;
    use crate::core::TelemetrySnapshot;
    use crate::routing::MockRouteProvider;
    use async_trait::async_trait;

    fn line() -> Vec<GeoPoint> {
        vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0)]
    }

    fn line_at(lat: f64) -> Vec<GeoPoint> {
        vec![GeoPoint::new(lat, 0.0), GeoPoint::new(lat, 1.0)]
    }

    /// Slow for routes starting on the equator, quick for everything else
    struct SlowEquatorProvider;

    #[async_trait]
    impl RouteProvider for SlowEquatorProvider {
        fn name(&self) -> &str {
            "slow-equator"
        }

        async fn route(&self, waypoints: &[GeoPoint]) -> ProviderResult<Route> {
            let delay = if waypoints[0].lat == 0.0 { 2000 } else { 100 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(Route::from_points(waypoints.to_vec()))
        }
    }

    fn spawn_slow() -> (PlayerHandle, mpsc::UnboundedReceiver<PlayerEvent>, JoinHandle<()>) {
        let config = PlaybackConfig::default();
        let (tx, _telemetry) = mpsc::unbounded_channel::<TelemetrySnapshot>();
        let engine = PlaybackEngine::new(&config, tx);
        spawn_player(engine, Arc::new(SlowEquatorProvider), config.frame_interval())
    }

    fn loaded_routes(events: &mut mpsc::UnboundedReceiver<PlayerEvent>) -> Vec<RouteSummary> {
        let mut loaded = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let PlayerEvent::RouteLoaded(summary) = event {
                loaded.push(summary);
            }
        }
        loaded
    }

    fn spawn(
        provider: Arc<MockRouteProvider>,
    ) -> (
        PlayerHandle,
        mpsc::UnboundedReceiver<PlayerEvent>,
        mpsc::UnboundedReceiver<TelemetrySnapshot>,
        JoinHandle<()>,
    ) {
        let config = PlaybackConfig::default();
        let (tx, telemetry) = mpsc::unbounded_channel::<TelemetrySnapshot>();
        let engine = PlaybackEngine::new(&config, tx);
        let (handle, events, task) = spawn_player(engine, provider, config.frame_interval());
        (handle, events, telemetry, task)
    }

    async fn next_loaded(events: &mut mpsc::UnboundedReceiver<PlayerEvent>) -> RouteSummary {
        loop {
            match events.recv().await {
                Some(PlayerEvent::RouteLoaded(summary)) => return summary,
                Some(PlayerEvent::Error(e)) => panic!("unexpected error: {}", e),
                Some(_) => continue,
                None => panic!("player exited"),
            }
        }
    }

    async fn next_error(events: &mut mpsc::UnboundedReceiver<PlayerEvent>) -> String {
        loop {
            match events.recv().await {
                Some(PlayerEvent::Error(e)) => return e,
                Some(_) => continue,
                None => panic!("player exited"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_player_streams_telemetry() {
        let (handle, mut events, mut telemetry, task) = spawn(Arc::new(MockRouteProvider::new()));

        handle.request_route(line()).await.unwrap();
        let summary = next_loaded(&mut events).await;
        assert_eq!(summary.points, 2);
        assert_eq!(summary.duration_secs, 10.0);

        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        let mut last = None;
        while let Ok(snap) = telemetry.try_recv() {
            last = Some(snap);
        }
        let last = last.expect("no telemetry received");
        assert!(last.elapsed_secs >= 4 && last.elapsed_secs <= 5, "got {}", last.elapsed_secs);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_lookup_keeps_playing() {
        let provider = Arc::new(MockRouteProvider::new());
        let (handle, mut events, mut telemetry, task) = spawn(provider.clone());

        handle.load_route(Route::from_points(line())).await.unwrap();
        next_loaded(&mut events).await;
        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        provider.fail_with("offline");
        handle
            .request_route(vec![GeoPoint::new(5.0, 5.0), GeoPoint::new(6.0, 6.0)])
            .await
            .unwrap();
        let err = next_error(&mut events).await;
        assert!(err.contains("offline"));

        while telemetry.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(500)).await;
        let snap = telemetry.try_recv().expect("playback stopped after failed lookup");
        assert!(snap.position.lat.abs() < 1e-9);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_point_route_is_reported() {
        let (handle, mut events, mut telemetry, task) = spawn(Arc::new(MockRouteProvider::new()));

        handle
            .load_route(Route::from_points(vec![GeoPoint::new(1.0, 1.0)]))
            .await
            .unwrap();
        let err = next_error(&mut events).await;
        assert!(err.contains("at least 2"));

        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(telemetry.try_recv().is_err());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_speed_reported() {
        let (handle, mut events, _telemetry, task) = spawn(Arc::new(MockRouteProvider::new()));
        handle.set_speed(0.0).await.unwrap();
        let err = next_error(&mut events).await;
        assert!(err.contains("positive"));

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_older_lookup_never_replaces_newer_one() {
        let (handle, mut events, task) = spawn_slow();

        handle.request_route(line_at(0.0)).await.unwrap();
        handle.request_route(line_at(5.0)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;

        let loaded = loaded_routes(&mut events);
        assert_eq!(loaded.len(), 1, "got {:?}", loaded);
        let expected = crate::core::distance_km(line_at(5.0)[0], line_at(5.0)[1]);
        assert!((loaded[0].total_km - expected).abs() < 1e-9);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_load_supersedes_pending_lookup() {
        let (handle, mut events, task) = spawn_slow();

        handle.request_route(line_at(0.0)).await.unwrap();
        let direct = vec![GeoPoint::new(10.0, 10.0), GeoPoint::new(10.0, 11.0), GeoPoint::new(11.0, 11.0)];
        handle.load_route(Route::from_points(direct)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;

        let loaded = loaded_routes(&mut events);
        assert_eq!(loaded.len(), 1, "got {:?}", loaded);
        assert_eq!(loaded[0].points, 3);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
