//! Route playback engine
//!
//! Plays a simulated object along a geographic path. A route (from a
//! [`routing::RouteProvider`] or a file) is measured once, then a speed-scaled,
//! looping clock samples positions along it and publishes
//! [`core::TelemetrySnapshot`]s to a subscriber.

pub mod config;
pub mod core;
pub mod input;
pub mod playback;
pub mod routing;

pub use crate::config::PlaybackConfig;
pub use crate::core::{GeoPoint, Path, SegmentTable, TelemetrySnapshot};
pub use crate::playback::{PlaybackEngine, PlaybackError};
pub use crate::routing::{Route, RouteProvider, RouteStep};
