pub mod clock;
pub mod driver;
pub mod duration;
pub mod emitter;
pub mod engine;
pub mod sampler;
pub mod scheduler;

pub use clock::PlaybackClock;
pub use driver::{spawn_player, PlayerCommand, PlayerEvent, PlayerHandle, RouteSummary};
pub use duration::{DurationPolicy, PointCountDuration, ProviderDuration};
pub use emitter::{Delivery, TelemetryEmitter, TelemetrySink};
pub use engine::PlaybackEngine;
pub use sampler::sample;
pub use scheduler::{
    FrameScheduler, ManualTimeSource, MonotonicTimeSource, Scheduler, SystemTimeSource, TickHandle,
    TimeSource,
};

use crate::routing::ProviderError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Playback status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackStatus {
    Stopped,
    Running,
}

/// What `start()` does with time accumulated before a pause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeMode {
    /// The timeline starts over from zero on every start
    #[default]
    Restart,
    /// The timeline picks up where it was paused
    Continue,
}

/// Clock state, owned by `PlaybackClock`
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub running: bool,
    pub speed_multiplier: f64,
    pub simulated_elapsed_secs: f64,
    /// Wall-clock time the simulated timeline was last advanced to
    pub anchor: Option<DateTime<Utc>>,
}

impl PlaybackState {
    pub fn status(&self) -> PlaybackStatus {
        if self.running {
            PlaybackStatus::Running
        } else {
            PlaybackStatus::Stopped
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            running: false,
            speed_multiplier: 1.0,
            simulated_elapsed_secs: 0.0,
            anchor: None,
        }
    }
}

/// Errors surfaced by the playback engine
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("route has {got} point(s); playback needs at least 2")]
    NotEnoughPoints { got: usize },

    #[error("speed multiplier must be a positive number, got {0}")]
    InvalidSpeed(f64),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("player task has shut down")]
    PlayerClosed,
}
