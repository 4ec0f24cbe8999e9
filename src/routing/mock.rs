use async_trait::async_trait;
use crate::core::GeoPoint;
use crate::routing::route_provider::{validate_waypoints, ProviderError, ProviderResult, Route, RouteProvider};
use std::sync::{Mutex, PoisonError};

/// Mock route provider for testing without a routing service
///
/// Answers with a canned route, or with the waypoints themselves when no
/// route was set. Failures can be injected, and every request is recorded.
#[derive(Debug, Default)]
pub struct MockRouteProvider {
    canned: Mutex<Option<Route>>,
    failure: Mutex<Option<String>>,
    requests: Mutex<Vec<Vec<GeoPoint>>>,
}

impl MockRouteProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request with `route`
    pub fn with_route(route: Route) -> Self {
        let provider = Self::new();
        provider.set_route(Some(route));
        provider
    }

    pub fn set_route(&self, route: Option<Route>) {
        *self.canned.lock().unwrap_or_else(PoisonError::into_inner) = route;
    }

    /// Make every following request fail with a service error
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.to_string());
    }

    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Waypoints of every request received so far
    pub fn requests(&self) -> Vec<Vec<GeoPoint>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl RouteProvider for MockRouteProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn route(&self, waypoints: &[GeoPoint]) -> ProviderResult<Route> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(waypoints.to_vec());

        if let Some(message) = self.failure.lock().unwrap_or_else(PoisonError::into_inner).clone() {
            return Err(ProviderError::Service(message));
        }

        let canned = self.canned.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match canned {
            Some(route) => Ok(route),
            None => {
                validate_waypoints(waypoints)?;
                Ok(Route::from_points(waypoints.to_vec()))
            }
        }
    }
}
