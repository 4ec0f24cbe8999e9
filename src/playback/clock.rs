use crate::playback::scheduler::{Scheduler, TickHandle, TimeSource};
use crate::playback::{PlaybackError, PlaybackState, ResumeMode};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Maps wall-clock time, scaled by a speed multiplier, onto a simulated timeline
///
/// Stopped/Running state machine. While running it keeps exactly one tick
/// scheduled; each tick advances the timeline and schedules the next one.
/// Ticks arriving with any handle other than the pending one are dropped.
pub struct PlaybackClock {
    state: PlaybackState,
    resume_mode: ResumeMode,
    pending: Option<TickHandle>,
    scheduler: Box<dyn Scheduler>,
    time: Arc<dyn TimeSource>,
}

/// Result of an accepted tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub now: DateTime<Utc>,
    pub simulated_elapsed_secs: f64,
}

impl PlaybackClock {
    pub fn new(
        scheduler: Box<dyn Scheduler>,
        time: Arc<dyn TimeSource>,
        resume_mode: ResumeMode,
    ) -> Self {
        Self {
            state: PlaybackState::default(),
            resume_mode,
            pending: None,
            scheduler,
            time,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn speed_multiplier(&self) -> f64 {
        self.state.speed_multiplier
    }

    pub fn resume_mode(&self) -> ResumeMode {
        self.resume_mode
    }

    /// Handle of the tick currently scheduled, if any
    pub fn pending_tick(&self) -> Option<TickHandle> {
        self.pending
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    /// Stopped -> Running
    pub fn start(&mut self) {
        if self.state.running {
            return;
        }
        if self.resume_mode == ResumeMode::Restart {
            self.state.simulated_elapsed_secs = 0.0;
        }
        self.state.running = true;
        self.state.anchor = Some(self.time.now());
        self.schedule_next();
        debug!(
            "Clock started at {:.2}s (speed x{})",
            self.state.simulated_elapsed_secs, self.state.speed_multiplier
        );
    }

    /// Running -> Stopped, keeping the elapsed time
    pub fn pause(&mut self) {
        self.cancel_pending();
        if self.state.running {
            debug!("Clock paused at {:.2}s", self.state.simulated_elapsed_secs);
        }
        self.state.running = false;
        self.state.anchor = None;
    }

    /// Any -> Stopped with the timeline back at zero
    pub fn reset(&mut self) {
        self.cancel_pending();
        self.state.running = false;
        self.state.anchor = None;
        self.state.simulated_elapsed_secs = 0.0;
    }

    /// Change the speed multiplier; applies from the next tick on
    pub fn set_speed_multiplier(&mut self, speed: f64) -> Result<(), PlaybackError> {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(PlaybackError::InvalidSpeed(speed));
        }
        self.state.speed_multiplier = speed;
        Ok(())
    }

    /// Hand out the tick that is due on this frame
    pub fn poll_due(&mut self) -> Option<TickHandle> {
        self.scheduler.poll_due()
    }

    /// Advance the timeline for a delivered tick
    ///
    /// Returns `None` (and does nothing) when stopped or when `handle` is stale.
    pub fn tick(&mut self, handle: TickHandle) -> Option<Tick> {
        if !self.state.running || self.pending != Some(handle) {
            return None;
        }
        self.pending = None;

        let now = self.time.now();
        if let Some(anchor) = self.state.anchor {
            let wall_secs = (now - anchor).to_std().map(|d| d.as_secs_f64()).unwrap_or(0.0);
            self.state.simulated_elapsed_secs += wall_secs * self.state.speed_multiplier;
        }
        self.state.anchor = Some(now);
        self.schedule_next();

        Some(Tick {
            now,
            simulated_elapsed_secs: self.state.simulated_elapsed_secs,
        })
    }

    fn schedule_next(&mut self) {
        let handle = self.scheduler.schedule();
        if let Some(previous) = self.pending.replace(handle) {
            self.scheduler.cancel(previous);
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel(handle);
        }
    }
}
