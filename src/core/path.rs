use crate::core::geo::{distance_km, GeoPoint};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An ordered, immutable sequence of points describing a route polyline
///
/// A new route always produces a new `Path`; there is no way to edit one in place.
/// Clones share the underlying points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<GeoPoint>", into = "Vec<GeoPoint>")]
pub struct Path {
    points: Arc<[GeoPoint]>,
}

impl Path {
    pub fn new(points: Vec<GeoPoint>) -> Self {
        Self { points: points.into() }
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// A path needs at least one segment to be played back
    pub fn is_playable(&self) -> bool {
        self.points.len() >= 2
    }

    pub fn first(&self) -> Option<GeoPoint> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<GeoPoint> {
        self.points.last().copied()
    }
}

impl Default for Path {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl From<Vec<GeoPoint>> for Path {
    fn from(points: Vec<GeoPoint>) -> Self {
        Self::new(points)
    }
}

impl From<Path> for Vec<GeoPoint> {
    fn from(path: Path) -> Self {
        path.points.to_vec()
    }
}

/// Per-segment lengths of a path and their running totals, in kilometers
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SegmentTable {
    segments: Vec<f64>,
    /// `cumulative[i]` is the distance from the path start to the end of segment `i`
    cumulative: Vec<f64>,
    total: f64,
}

impl SegmentTable {
    /// Measure every segment of `path`
    ///
    /// Paths with fewer than two points give an empty table with a total of zero.
    pub fn build(path: &Path) -> Self {
        if !path.is_playable() {
            return Self::default();
        }

        let segments: Vec<f64> = path
            .points()
            .windows(2)
            .map(|w| distance_km(w[0], w[1]))
            .collect();

        let mut cumulative = Vec::with_capacity(segments.len());
        let mut total = 0.0;
        for len in &segments {
            total += len;
            cumulative.push(total);
        }

        Self { segments, cumulative, total }
    }

    pub fn segments(&self) -> &[f64] {
        &self.segments
    }

    pub fn cumulative(&self) -> &[f64] {
        &self.cumulative
    }

    pub fn total_km(&self) -> f64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Length of segment `i`, zero when out of range
    pub fn segment_km(&self, i: usize) -> f64 {
        self.segments.get(i).copied().unwrap_or(0.0)
    }

    /// Distance from the path start to the beginning of segment `i`
    pub fn start_of(&self, i: usize) -> f64 {
        match i {
            0 => 0.0,
            _ => self.cumulative.get(i - 1).copied().unwrap_or(self.total),
        }
    }

    /// Index of the first segment whose end lies at or beyond `distance_km`
    ///
    /// Ties go to the earlier segment. Distances past the end map to the last segment.
    pub fn segment_at(&self, distance_km: f64) -> Option<usize> {
        if self.segments.is_empty() {
            return None;
        }
        let idx = self.cumulative.partition_point(|&end| end < distance_km);
        Some(idx.min(self.segments.len() - 1))
    }
}

/// A path together with its measurements
///
/// Built in one step so the two can never disagree.
#[derive(Debug, Clone, Default)]
pub struct MeasuredPath {
    pub path: Path,
    pub table: SegmentTable,
}

impl MeasuredPath {
    pub fn new(path: Path) -> Self {
        let table = SegmentTable::build(&path);
        Self { path, table }
    }

    pub fn is_playable(&self) -> bool {
        self.path.is_playable()
    }
}
