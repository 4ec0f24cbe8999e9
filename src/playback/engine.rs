use crate::config::PlaybackConfig;
use crate::core::{GeoPoint, MeasuredPath, Path, SegmentTable, TelemetrySnapshot};
use crate::playback::clock::PlaybackClock;
use crate::playback::duration::DurationPolicy;
use crate::playback::emitter::{TelemetryEmitter, TelemetrySink};
use crate::playback::scheduler::{FrameScheduler, MonotonicTimeSource, Scheduler, TickHandle, TimeSource};
use crate::playback::{PlaybackError, PlaybackState};
use crate::routing::{Route, RouteProvider, RouteStep};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Playback engine for routes
///
/// Owns the current route with its segment table, the playback clock and the
/// telemetry emitter. Loading a route stops playback and swaps the path and
/// its table together.
pub struct PlaybackEngine {
    route: MeasuredPath,
    steps: Vec<RouteStep>,
    total_duration_secs: f64,
    clock: PlaybackClock,
    emitter: TelemetryEmitter,
    duration_policy: Box<dyn DurationPolicy>,
    min_duration_secs: f64,
}

impl PlaybackEngine {
    /// Engine driven by frame ticks and the monotonic clock
    pub fn new(config: &PlaybackConfig, sink: impl TelemetrySink + 'static) -> Self {
        Self::with_parts(
            config,
            Box::new(FrameScheduler::new()),
            Arc::new(MonotonicTimeSource::new()),
            Box::new(sink),
        )
    }

    /// Engine with explicit scheduler and time source
    pub fn with_parts(
        config: &PlaybackConfig,
        scheduler: Box<dyn Scheduler>,
        time: Arc<dyn TimeSource>,
        sink: Box<dyn TelemetrySink>,
    ) -> Self {
        let mut clock = PlaybackClock::new(scheduler, time, config.resume_mode);
        if let Err(e) = clock.set_speed_multiplier(config.default_speed) {
            warn!("Ignoring configured default speed: {}", e);
        }

        Self {
            route: MeasuredPath::default(),
            steps: Vec::new(),
            total_duration_secs: 0.0,
            clock,
            emitter: TelemetryEmitter::new(sink, config.speed_display_factor),
            duration_policy: config.duration_policy(),
            min_duration_secs: config.min_duration_secs,
        }
    }

    /// Replace the cycle duration policy; applies to the current route immediately
    pub fn set_duration_policy(&mut self, policy: Box<dyn DurationPolicy>) {
        self.duration_policy = policy;
        self.total_duration_secs = self.compute_duration();
    }

    /// Load a bare list of points as the new route
    pub fn load_route(&mut self, points: Vec<GeoPoint>) -> Result<(), PlaybackError> {
        self.load(Route::from_points(points))
    }

    /// Install a new route and stop playback
    ///
    /// The pending tick is cancelled before the path and table are swapped, so
    /// no tick ever samples the new path with stale state. A route with fewer
    /// than two points is installed anyway (disabling playback) and reported
    /// as `NotEnoughPoints`.
    pub fn load(&mut self, route: Route) -> Result<(), PlaybackError> {
        self.clock.reset();

        self.route = MeasuredPath::new(route.path);
        self.steps = route.steps;
        self.total_duration_secs = self.compute_duration();

        if !self.route.is_playable() {
            warn!("Loaded route with {} point(s); playback disabled", self.route.path.len());
            return Err(PlaybackError::NotEnoughPoints {
                got: self.route.path.len(),
            });
        }

        info!(
            "Loaded route: {} points, {:.2} km, {:.1}s cycle, {} steps",
            self.route.path.len(),
            self.route.table.total_km(),
            self.total_duration_secs,
            self.steps.len()
        );
        Ok(())
    }

    /// Look up a route and load it
    ///
    /// On failure the current route and playback state are left untouched.
    pub async fn request_route(
        &mut self,
        provider: &dyn RouteProvider,
        waypoints: &[GeoPoint],
    ) -> Result<(), PlaybackError> {
        let route = provider.route(waypoints).await.map_err(|e| {
            warn!("Route lookup via {} failed: {}", provider.name(), e);
            e
        })?;
        self.load(route)
    }

    /// Start or resume playback; ignored without a playable route
    pub fn start(&mut self) {
        if !self.route.is_playable() {
            debug!("Start ignored: no playable route");
            return;
        }
        self.clock.start();
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn reset(&mut self) {
        self.clock.reset();
    }

    pub fn set_speed_multiplier(&mut self, speed: f64) -> Result<(), PlaybackError> {
        self.clock.set_speed_multiplier(speed)
    }

    /// Deliver the tick due on this frame, if any
    pub fn frame(&mut self) -> Option<TelemetrySnapshot> {
        let handle = self.clock.poll_due()?;
        self.tick(handle)
    }

    /// Handle one scheduled tick; stale handles are ignored
    pub fn tick(&mut self, handle: TickHandle) -> Option<TelemetrySnapshot> {
        if !self.route.is_playable() {
            return None;
        }
        let tick = self.clock.tick(handle)?;
        self.emitter.emit(
            &self.route,
            self.total_duration_secs,
            tick.simulated_elapsed_secs,
            tick.now,
        )
    }

    /// Steps of the current route, exactly as the provider returned them
    pub fn steps(&self) -> &[RouteStep] {
        &self.steps
    }

    pub fn path(&self) -> &Path {
        &self.route.path
    }

    pub fn segment_table(&self) -> &SegmentTable {
        &self.route.table
    }

    pub fn state(&self) -> &PlaybackState {
        self.clock.state()
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn total_duration_secs(&self) -> f64 {
        self.total_duration_secs
    }

    pub fn pending_tick(&self) -> Option<TickHandle> {
        self.clock.pending_tick()
    }

    fn compute_duration(&self) -> f64 {
        let secs = self
            .duration_policy
            .total_duration_secs(&self.route.path, &self.steps);
        if secs.is_finite() && secs > 0.0 {
            secs
        } else {
            warn!(
                "Duration policy returned {}; using {}s",
                secs, self.min_duration_secs
            );
            self.min_duration_secs
        }
    }
}
