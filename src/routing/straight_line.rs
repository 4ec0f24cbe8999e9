use async_trait::async_trait;
use crate::core::{bearing_deg, compass_point, distance_km, GeoPoint, Path};
use crate::routing::route_provider::{validate_waypoints, ProviderResult, Route, RouteProvider, RouteStep};
use tracing::debug;

/// Default cruise speed used to estimate step durations, km/h
pub const DEFAULT_CRUISE_KMH: f64 = 50.0;

/// Offline router that joins consecutive waypoints with straight legs
///
/// Each leg is split into `densify + 1` pieces so playback has intermediate
/// points to move through. Steps get a haversine distance and a duration at
/// a fixed cruise speed.
#[derive(Debug, Clone)]
pub struct StraightLineProvider {
    name: String,
    densify: usize,
    cruise_kmh: f64,
}

impl StraightLineProvider {
    pub fn new(densify: usize) -> Self {
        Self {
            name: "straight-line".to_string(),
            densify,
            cruise_kmh: DEFAULT_CRUISE_KMH,
        }
    }

    pub fn with_cruise_speed(mut self, kmh: f64) -> Self {
        if kmh.is_finite() && kmh > 0.0 {
            self.cruise_kmh = kmh;
        }
        self
    }

    fn build(&self, waypoints: &[GeoPoint]) -> Route {
        let mut points = Vec::with_capacity((waypoints.len() - 1) * (self.densify + 1) + 1);
        let mut steps = Vec::with_capacity(waypoints.len());

        for (leg, pair) in waypoints.windows(2).enumerate() {
            let (from, to) = (pair[0], pair[1]);
            let pieces = self.densify + 1;
            for i in 0..pieces {
                points.push(from.lerp(to, i as f64 / pieces as f64));
            }

            let km = distance_km(from, to);
            let instruction = if leg == 0 {
                format!("Head {} for {:.1} km", compass_point(bearing_deg(from, to)), km)
            } else {
                format!("Continue {} for {:.1} km", compass_point(bearing_deg(from, to)), km)
            };
            steps.push(RouteStep {
                instruction,
                distance_meters: km * 1000.0,
                duration_secs: km / self.cruise_kmh * 3600.0,
            });
        }

        if let Some(&last) = waypoints.last() {
            points.push(last);
        }
        steps.push(RouteStep {
            instruction: "You have arrived at your destination".to_string(),
            distance_meters: 0.0,
            duration_secs: 0.0,
        });

        Route::new(Path::new(points), steps)
    }
}

impl Default for StraightLineProvider {
    fn default() -> Self {
        Self::new(4)
    }
}

#[async_trait]
impl RouteProvider for StraightLineProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn route(&self, waypoints: &[GeoPoint]) -> ProviderResult<Route> {
        validate_waypoints(waypoints)?;
        let route = self.build(waypoints);
        debug!(
            "{}: {} waypoints -> {} points, {} steps",
            self.name,
            waypoints.len(),
            route.path.len(),
            route.steps.len()
        );
        Ok(route)
    }
}
