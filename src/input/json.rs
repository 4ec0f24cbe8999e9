use anyhow::{Context, Result};
use crate::core::{GeoPoint, Path as RoutePath};
use crate::routing::{Route, RouteStep};
use serde::Deserialize;
use std::path::Path;

/// A point written either as `[lat, lon]` or `{"lat": .., "lon": ..}`
#[derive(Deserialize)]
#[serde(untagged)]
enum PointRepr {
    Pair([f64; 2]),
    Object {
        lat: f64,
        #[serde(alias = "lng")]
        lon: f64,
    },
}

impl From<PointRepr> for GeoPoint {
    fn from(repr: PointRepr) -> Self {
        match repr {
            PointRepr::Pair([lat, lon]) => GeoPoint::new(lat, lon),
            PointRepr::Object { lat, lon } => GeoPoint::new(lat, lon),
        }
    }
}

#[derive(Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Vec<[f64; 2]>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RouteDocument {
    /// Our own recording format: path plus optional steps
    Recorded {
        path: Vec<PointRepr>,
        #[serde(default)]
        steps: Vec<RouteStep>,
    },
    /// GeoJSON Feature wrapping a LineString
    Feature { geometry: Geometry },
    /// Bare GeoJSON LineString
    Geometry(Geometry),
    /// Just a list of points
    Points(Vec<PointRepr>),
}

/// Load a route from a JSON file
pub fn load_json(path: &Path) -> Result<Route> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_json(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Parse a route document
///
/// Accepts `{"path": [...], "steps": [...]}`, a GeoJSON LineString (bare or
/// inside a Feature, coordinates in `[lon, lat]` order) or a plain point list.
pub fn parse_json(contents: &str) -> Result<Route> {
    let doc: RouteDocument = serde_json::from_str(contents)
        .context("Expected a route object, a GeoJSON LineString or a list of points")?;

    let route = match doc {
        RouteDocument::Recorded { path, steps } => {
            Route::new(RoutePath::new(path.into_iter().map(GeoPoint::from).collect()), steps)
        }
        RouteDocument::Feature { geometry } | RouteDocument::Geometry(geometry) => {
            from_line_string(geometry)?
        }
        RouteDocument::Points(points) => {
            Route::from_points(points.into_iter().map(GeoPoint::from).collect())
        }
    };

    if let Some(bad) = route.path.points().iter().find(|p| !(p.lat.is_finite() && p.lon.is_finite())) {
        anyhow::bail!("Non-finite coordinate in route: {:?}", bad);
    }
    Ok(route)
}

fn from_line_string(geometry: Geometry) -> Result<Route> {
    if geometry.kind != "LineString" {
        anyhow::bail!("Unsupported geometry type '{}', expected LineString", geometry.kind);
    }
    let points = geometry
        .coordinates
        .into_iter()
        .map(|[lon, lat]| GeoPoint::new(lat, lon))
        .collect();
    Ok(Route::from_points(points))
}
