//! Injected capabilities that drive the playback clock
//!
//! The clock never sleeps or reads the system time directly. It asks a
//! [`Scheduler`] for the next tick and a [`TimeSource`] for the current time,
//! which lets tests step playback by hand.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

/// Identifies one scheduled tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickHandle(u64);

/// Frame scheduling capability
pub trait Scheduler: Send {
    /// Request one tick on the next frame
    fn schedule(&mut self) -> TickHandle;

    /// Withdraw a scheduled tick. Cancelling an unknown or already fired handle is a no-op.
    fn cancel(&mut self, handle: TickHandle);

    /// Called by the frame driver: hands out the tick that is due, if any
    fn poll_due(&mut self) -> Option<TickHandle>;
}

/// Single-slot scheduler: at most one tick is outstanding at a time
///
/// Scheduling replaces whatever was pending, so a frame can never deliver
/// two ticks.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    next_id: u64,
    pending: Option<TickHandle>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<TickHandle> {
        self.pending
    }
}

impl Scheduler for FrameScheduler {
    fn schedule(&mut self) -> TickHandle {
        self.next_id += 1;
        let handle = TickHandle(self.next_id);
        self.pending = Some(handle);
        handle
    }

    fn cancel(&mut self, handle: TickHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }

    fn poll_due(&mut self) -> Option<TickHandle> {
        self.pending.take()
    }
}

/// Source of wall-clock time
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall-clock time that only moves forward
///
/// Anchored to the system clock once, then advanced with tokio's monotonic
/// `Instant`, so a paused tokio test clock also pauses playback.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTimeSource {
    base_utc: DateTime<Utc>,
    base_instant: tokio::time::Instant,
}

impl MonotonicTimeSource {
    pub fn new() -> Self {
        Self {
            base_utc: Utc::now(),
            base_instant: tokio::time::Instant::now(),
        }
    }
}

impl Default for MonotonicTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTimeSource {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.base_instant.elapsed();
        chrono::Duration::from_std(elapsed)
            .map(|d| self.base_utc + d)
            .unwrap_or(self.base_utc)
    }
}

/// Hand-driven clock for tests and offline replays
///
/// Clones share the same time, so a test can keep one and hand another to the engine.
#[derive(Debug, Clone)]
pub struct ManualTimeSource {
    micros: Arc<AtomicI64>,
}

impl ManualTimeSource {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            micros: Arc::new(AtomicI64::new(start.timestamp_micros())),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: StdDuration) {
        let micros = i64::try_from(by.as_micros()).unwrap_or(i64::MAX);
        self.micros.fetch_add(micros, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: f64) {
        self.advance(StdDuration::from_secs_f64(secs));
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.micros.store(to.timestamp_micros(), Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_scheduler_single_slot() {
        let mut sched = FrameScheduler::new();
        assert_eq!(sched.poll_due(), None);

        let first = sched.schedule();
        let second = sched.schedule();
        assert_ne!(first, second);
        assert_eq!(sched.pending(), Some(second));

        // Cancelling a handle that was already replaced does nothing
        sched.cancel(first);
        assert_eq!(sched.pending(), Some(second));

        assert_eq!(sched.poll_due(), Some(second));
        assert_eq!(sched.poll_due(), None);
    }

    #[test]
    fn test_frame_scheduler_cancel_is_idempotent() {
        let mut sched = FrameScheduler::new();
        let handle = sched.schedule();
        sched.cancel(handle);
        sched.cancel(handle);
        assert_eq!(sched.poll_due(), None);
    }

    #[test]
    fn test_manual_time_source_shared_between_clones() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let time = ManualTimeSource::new(start);
        let other = time.clone();

        time.advance_secs(1.5);
        let elapsed = other.now() - start;
        assert_eq!(elapsed.num_milliseconds(), 1500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monotonic_time_follows_tokio_clock() {
        let time = MonotonicTimeSource::new();
        let before = time.now();
        tokio::time::advance(StdDuration::from_secs(3)).await;
        let after = time.now();
        assert_eq!((after - before).num_seconds(), 3);
    }
}
