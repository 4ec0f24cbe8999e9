use crate::core::geo::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time status of the simulated object
///
/// Produced fresh on every tick and never modified afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Current position on the path
    pub position: GeoPoint,

    /// Whole seconds into the current playback cycle
    pub elapsed_secs: u64,

    /// Display speed in km/h (approximate, not a physical measurement)
    pub speed_kmh: f64,

    /// Wall-clock time the snapshot was taken
    pub timestamp: DateTime<Utc>,
}
