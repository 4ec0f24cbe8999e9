pub mod mock;
pub mod route_provider;
pub mod straight_line;

pub use mock::MockRouteProvider;
pub use route_provider::{
    travel_secs, validate_waypoints, ProviderError, ProviderResult, Route, RouteProvider,
    RouteStep,
};
pub use straight_line::StraightLineProvider;
