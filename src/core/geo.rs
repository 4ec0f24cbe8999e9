use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula, in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A geographic coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees
    pub lat: f64,

    /// Longitude in degrees
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Planar interpolation between two points, `t` in `[0, 1]`
    ///
    /// This is a straight line in lat/lon space, not a great-circle arc.
    pub fn lerp(self, other: GeoPoint, t: f64) -> GeoPoint {
        GeoPoint {
            lat: self.lat + (other.lat - self.lat) * t,
            lon: self.lon + (other.lon - self.lon) * t,
        }
    }

    /// Parse a "lat,lon" pair
    pub fn parse_pair(s: &str) -> anyhow::Result<GeoPoint> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| anyhow::anyhow!("Expected 'lat,lon', got '{}'", s))?;
        let lat: f64 = lat.trim().parse()
            .map_err(|e| anyhow::anyhow!("Bad latitude '{}': {}", lat.trim(), e))?;
        let lon: f64 = lon.trim().parse()
            .map_err(|e| anyhow::anyhow!("Bad longitude '{}': {}", lon.trim(), e))?;
        Ok(GeoPoint::new(lat, lon))
    }
}

/// Great-circle distance between two points in kilometers (haversine, spherical Earth)
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    // Rounding can push h a hair past 1 for antipodal points
    2.0 * EARTH_RADIUS_KM * h.clamp(0.0, 1.0).sqrt().asin()
}

/// Initial bearing from `a` towards `b`, degrees clockwise from north in `[0, 360)`
pub fn bearing_deg(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let x = dlon.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    x.atan2(y).to_degrees().rem_euclid(360.0)
}

/// Eight-point compass name for a bearing in degrees
pub fn compass_point(bearing: f64) -> &'static str {
    const POINTS: [&str; 8] = [
        "north", "northeast", "east", "southeast", "south", "southwest", "west", "northwest",
    ];
    let idx = ((bearing.rem_euclid(360.0) + 22.5) / 45.0) as usize % 8;
    POINTS[idx]
}
