pub mod geo;
pub mod path;
pub mod telemetry;

pub use geo::{bearing_deg, compass_point, distance_km, GeoPoint};
pub use path::{MeasuredPath, Path, SegmentTable};
pub use telemetry::TelemetrySnapshot;
