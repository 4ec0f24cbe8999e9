use async_trait::async_trait;
use crate::core::{GeoPoint, Path};
use serde::{Deserialize, Serialize};

/// Result type for route lookups
pub type ProviderResult<T> = Result<T, ProviderError>;

/// One turn-by-turn instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    /// Human readable instruction
    pub instruction: String,

    /// Length of this step in meters
    #[serde(alias = "distance", alias = "distanceMeters")]
    pub distance_meters: f64,

    /// Expected travel time of this step in seconds
    #[serde(alias = "duration", alias = "durationSeconds")]
    pub duration_secs: f64,
}

/// A provider's answer: the polyline to follow and the steps describing it
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Route {
    pub path: Path,
    #[serde(default)]
    pub steps: Vec<RouteStep>,
}

impl Route {
    pub fn new(path: Path, steps: Vec<RouteStep>) -> Self {
        Self { path, steps }
    }

    /// A route made of bare points, without steps
    pub fn from_points(points: Vec<GeoPoint>) -> Self {
        Self {
            path: Path::new(points),
            steps: Vec::new(),
        }
    }
}

/// Travel time reported by `steps`, in seconds
///
/// Steps with a missing (zero), negative or non-finite duration add nothing.
pub fn travel_secs(steps: &[RouteStep]) -> f64 {
    steps
        .iter()
        .map(|s| s.duration_secs)
        .filter(|d| d.is_finite() && *d > 0.0)
        .sum()
}

/// Route lookup failures
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("routing needs at least 2 waypoints, got {got}")]
    TooFewWaypoints { got: usize },

    #[error("invalid waypoint #{index}: ({lat}, {lon})")]
    InvalidWaypoint { index: usize, lat: f64, lon: f64 },

    #[error("routing service error: {0}")]
    Service(String),

    #[error("no route found between the waypoints")]
    NoRoute,
}

/// Trait for route lookup back ends
///
/// Implementations:
/// - Straight-line router (joins waypoints directly)
/// - Mock router for tests
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Name of this provider, for logs
    fn name(&self) -> &str;

    /// Look up a route through `waypoints`, in order
    async fn route(&self, waypoints: &[GeoPoint]) -> ProviderResult<Route>;
}

/// Checks shared by every provider: count and coordinate ranges
pub fn validate_waypoints(waypoints: &[GeoPoint]) -> ProviderResult<()> {
    if waypoints.len() < 2 {
        return Err(ProviderError::TooFewWaypoints { got: waypoints.len() });
    }
    for (index, p) in waypoints.iter().enumerate() {
        let lat_ok = p.lat.is_finite() && (-90.0..=90.0).contains(&p.lat);
        let lon_ok = p.lon.is_finite() && (-180.0..=180.0).contains(&p.lon);
        if !(lat_ok && lon_ok) {
            return Err(ProviderError::InvalidWaypoint {
                index,
                lat: p.lat,
                lon: p.lon,
            });
        }
    }
    Ok(())
}
