use crate::core::Path;
use crate::routing::{travel_secs, RouteStep};

/// Decides how long one playback cycle of a route lasts, in seconds
pub trait DurationPolicy: Send + Sync {
    fn total_duration_secs(&self, path: &Path, steps: &[RouteStep]) -> f64;
}

impl<F> DurationPolicy for F
where
    F: Fn(&Path, &[RouteStep]) -> f64 + Send + Sync,
{
    fn total_duration_secs(&self, path: &Path, steps: &[RouteStep]) -> f64 {
        self(path, steps)
    }
}

/// Fixed time per path point with a floor: `max(min_secs, points * secs_per_point)`
///
/// Ignores how long the route would really take; dense paths simply play longer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointCountDuration {
    pub secs_per_point: f64,
    pub min_secs: f64,
}

impl Default for PointCountDuration {
    fn default() -> Self {
        Self {
            secs_per_point: 0.5,
            min_secs: 10.0,
        }
    }
}

impl DurationPolicy for PointCountDuration {
    fn total_duration_secs(&self, path: &Path, _steps: &[RouteStep]) -> f64 {
        (path.len() as f64 * self.secs_per_point).max(self.min_secs)
    }
}

/// Uses the travel time reported by the route provider
///
/// Falls back to the point-count policy when the steps carry no time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProviderDuration {
    pub fallback: PointCountDuration,
}

impl DurationPolicy for ProviderDuration {
    fn total_duration_secs(&self, path: &Path, steps: &[RouteStep]) -> f64 {
        let total = travel_secs(steps);
        if total > 0.0 {
            total
        } else {
            self.fallback.total_duration_secs(path, steps)
        }
    }
}
