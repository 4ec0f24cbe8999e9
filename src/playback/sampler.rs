use crate::core::{GeoPoint, Path, SegmentTable};

/// A sampled position and the segment it lies on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub position: GeoPoint,
    pub segment: usize,
}

/// Position at `fraction` of the total path length
///
/// `fraction` is expected in `[0, 1)` and is clamped into `[0, 1]`. The point is
/// interpolated linearly in lat/lon between the ends of the segment it falls on.
/// Returns `None` for paths with fewer than two points.
pub fn sample(path: &Path, table: &SegmentTable, fraction: f64) -> Option<GeoPoint> {
    locate(path, table, fraction).map(|s| s.position)
}

/// Like [`sample`], but also reports which segment the position is on
pub fn locate(path: &Path, table: &SegmentTable, fraction: f64) -> Option<Sample> {
    let points = path.points();
    if points.len() < 2 || table.len() != points.len() - 1 {
        return None;
    }

    let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
    let target = fraction * table.total_km();

    let segment = table.segment_at(target)?;
    let len = table.segment_km(segment);
    let local_t = if len > 0.0 {
        ((target - table.start_of(segment)) / len).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Some(Sample {
        position: points[segment].lerp(points[segment + 1], local_t),
        segment,
    })
}
