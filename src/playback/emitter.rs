use crate::core::{MeasuredPath, TelemetrySnapshot};
use crate::playback::sampler::locate;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What became of a published snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The subscriber is behind; this snapshot was skipped
    Dropped,
    /// The subscriber is gone for good
    Closed,
}

/// Receiver side of the telemetry stream (renderer, UI, logger...)
pub trait TelemetrySink: Send {
    fn publish(&mut self, snapshot: TelemetrySnapshot) -> Delivery;
}

impl TelemetrySink for mpsc::UnboundedSender<TelemetrySnapshot> {
    fn publish(&mut self, snapshot: TelemetrySnapshot) -> Delivery {
        match self.send(snapshot) {
            Ok(()) => Delivery::Sent,
            Err(_) => Delivery::Closed,
        }
    }
}

impl TelemetrySink for mpsc::Sender<TelemetrySnapshot> {
    fn publish(&mut self, snapshot: TelemetrySnapshot) -> Delivery {
        match self.try_send(snapshot) {
            Ok(()) => Delivery::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Telemetry channel full; snapshot dropped");
                Delivery::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

/// Turns clock time into telemetry snapshots
///
/// Once the sink reports it is closed, snapshots are still built but no
/// longer published.
pub struct TelemetryEmitter {
    sink: Box<dyn TelemetrySink>,
    speed_display_factor: f64,
    sink_closed: bool,
}

impl TelemetryEmitter {
    pub fn new(sink: Box<dyn TelemetrySink>, speed_display_factor: f64) -> Self {
        Self {
            sink,
            speed_display_factor,
            sink_closed: false,
        }
    }

    pub fn is_sink_closed(&self) -> bool {
        self.sink_closed
    }

    /// Build a snapshot and hand it to the sink
    ///
    /// Emits nothing when the route cannot be played.
    pub fn emit(
        &mut self,
        route: &MeasuredPath,
        total_duration_secs: f64,
        elapsed_secs: f64,
        now: DateTime<Utc>,
    ) -> Option<TelemetrySnapshot> {
        let snapshot = snapshot_at(
            route,
            total_duration_secs,
            elapsed_secs,
            now,
            self.speed_display_factor,
        )?;
        if !self.sink_closed && self.sink.publish(snapshot) == Delivery::Closed {
            warn!("Telemetry receiver dropped; further snapshots are discarded");
            self.sink_closed = true;
        }
        Some(snapshot)
    }
}

/// Snapshot for a moment of simulated time, wrapping around the cycle
///
/// The reported speed is the current segment's length over an even per-point
/// time slice, scaled by `speed_display_factor`. It only needs to look plausible.
pub fn snapshot_at(
    route: &MeasuredPath,
    total_duration_secs: f64,
    elapsed_secs: f64,
    now: DateTime<Utc>,
    speed_display_factor: f64,
) -> Option<TelemetrySnapshot> {
    if !route.is_playable() || !(total_duration_secs.is_finite() && total_duration_secs > 0.0) {
        return None;
    }

    let cycle_secs = elapsed_secs.max(0.0).rem_euclid(total_duration_secs);
    let fraction = cycle_secs / total_duration_secs;
    let sample = locate(&route.path, &route.table, fraction)?;

    let slice_secs = total_duration_secs / route.path.len() as f64;
    let speed_kmh =
        route.table.segment_km(sample.segment) / slice_secs * 3600.0 * speed_display_factor;

    Some(TelemetrySnapshot {
        position: sample.position,
        elapsed_secs: (fraction * total_duration_secs).floor() as u64,
        speed_kmh,
        timestamp: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GeoPoint, Path};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn route(raw: &[(f64, f64)]) -> MeasuredPath {
        MeasuredPath::new(Path::new(
            raw.iter().map(|&(lat, lon)| GeoPoint::new(lat, lon)).collect(),
        ))
    }

    #[test]
    fn test_snapshot_wraps_around_cycle() {
        let route = route(&[(0.0, 0.0), (0.0, 1.0)]);
        let now = Utc::now();

        let a = snapshot_at(&route, 10.0, 5.0, now, 3.0).unwrap();
        let b = snapshot_at(&route, 10.0, 25.0, now, 3.0).unwrap();
        assert_eq!(a.position, GeoPoint::new(0.0, 0.5));
        assert_eq!(b.position, a.position);
        assert_eq!(a.elapsed_secs, 5);
        assert_eq!(b.elapsed_secs, 5);
        assert_eq!(a.timestamp, now);

        let start = snapshot_at(&route, 10.0, 20.0, now, 3.0).unwrap();
        assert_eq!(start.position, GeoPoint::new(0.0, 0.0));
        assert_eq!(start.elapsed_secs, 0);
    }

    #[test]
    fn test_elapsed_is_floored() {
        let route = route(&[(0.0, 0.0), (0.0, 1.0)]);
        let snap = snapshot_at(&route, 10.0, 7.9, Utc::now(), 3.0).unwrap();
        assert_eq!(snap.elapsed_secs, 7);
    }

    #[test]
    fn test_speed_formula() {
        // Two points, 10 s cycle: 5 s per point slice
        let route = route(&[(0.0, 0.0), (0.0, 1.0)]);
        let seg = route.table.segment_km(0);
        let snap = snapshot_at(&route, 10.0, 1.0, Utc::now(), 3.0).unwrap();
        let expected = seg / 5.0 * 3600.0 * 3.0;
        assert!((snap.speed_kmh - expected).abs() < 1e-9);

        let plain = snapshot_at(&route, 10.0, 1.0, Utc::now(), 1.0).unwrap();
        assert!((plain.speed_kmh * 3.0 - snap.speed_kmh).abs() < 1e-9);
    }

    #[test]
    fn test_zero_length_segment_speed_is_zero() {
        let route = route(&[(0.0, 0.0), (0.0, 0.0), (0.0, 1.0)]);
        let snap = snapshot_at(&route, 10.0, 0.0, Utc::now(), 3.0).unwrap();
        assert_eq!(snap.speed_kmh, 0.0);
        assert!(!snap.speed_kmh.is_nan());
    }

    #[test]
    fn test_unplayable_route_emits_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel::<TelemetrySnapshot>();
        let mut emitter = TelemetryEmitter::new(Box::new(tx), 3.0);

        assert!(emitter.emit(&route(&[(1.0, 1.0)]), 10.0, 1.0, Utc::now()).is_none());
        assert!(emitter.emit(&route(&[]), 10.0, 1.0, Utc::now()).is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_publishes_to_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel::<TelemetrySnapshot>();
        let mut emitter = TelemetryEmitter::new(Box::new(tx), 3.0);
        let route = route(&[(0.0, 0.0), (0.0, 1.0)]);

        let emitted = emitter.emit(&route, 10.0, 2.0, Utc::now()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), emitted);
    }

    #[test]
    fn test_bounded_sink_drops_when_full() {
        let (tx, mut rx) = mpsc::channel::<TelemetrySnapshot>(1);
        let mut emitter = TelemetryEmitter::new(Box::new(tx), 3.0);
        let route = route(&[(0.0, 0.0), (0.0, 1.0)]);

        emitter.emit(&route, 10.0, 1.0, Utc::now()).unwrap();
        emitter.emit(&route, 10.0, 2.0, Utc::now()).unwrap();
        assert_eq!(rx.try_recv().unwrap().elapsed_secs, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_sink_is_harmless() {
        let (tx, rx) = mpsc::unbounded_channel::<TelemetrySnapshot>();
        drop(rx);
        let mut emitter = TelemetryEmitter::new(Box::new(tx), 3.0);
        let route = route(&[(0.0, 0.0), (0.0, 1.0)]);
        assert!(emitter.emit(&route, 10.0, 1.0, Utc::now()).is_some());
        assert!(emitter.is_sink_closed());
    }

    /// Counts publish calls and always reports the receiver as gone
    struct ClosedSink {
        calls: Arc<AtomicUsize>,
    }

    impl TelemetrySink for ClosedSink {
        fn publish(&mut self, _snapshot: TelemetrySnapshot) -> Delivery {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Delivery::Closed
        }
    }

    #[test]
    fn test_closed_sink_is_not_retried_every_frame() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut emitter = TelemetryEmitter::new(Box::new(ClosedSink { calls: calls.clone() }), 3.0);
        let route = route(&[(0.0, 0.0), (0.0, 1.0)]);

        for i in 0..60 {
            assert!(emitter.emit(&route, 10.0, i as f64 * 0.016, Utc::now()).is_some());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bounded_sink_reports_delivery() {
        let (mut tx, rx) = mpsc::channel::<TelemetrySnapshot>(1);
        let snap = snapshot_at(&route(&[(0.0, 0.0), (0.0, 1.0)]), 10.0, 1.0, Utc::now(), 3.0).unwrap();

        assert_eq!(tx.publish(snap), Delivery::Sent);
        assert_eq!(tx.publish(snap), Delivery::Dropped);
        drop(rx);
        assert_eq!(tx.publish(snap), Delivery::Closed);
    }
}
