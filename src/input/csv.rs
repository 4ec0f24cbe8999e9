use anyhow::{Context, Result};
use crate::core::{GeoPoint, Path as RoutePath};
use crate::routing::Route;
use std::path::Path;

/// Load a route path from a CSV file
///
/// Columns are found by header name, so extra columns are fine:
/// - lat, latitude, y
/// - lon, lng, long, longitude, x
///
/// CSV files carry no turn-by-turn steps.
pub fn load_csv(path: &Path) -> Result<Route> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let headers = rdr.headers()?.clone();
    let lat_idx = find_column(&headers, &["lat", "latitude", "y"])?;
    let lon_idx = find_column(&headers, &["lon", "lng", "long", "longitude", "x"])?;

    let mut points = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read CSV row {}", row + 1))?;
        let lat = parse_coord(&record, lat_idx).with_context(|| format!("Bad latitude on row {}", row + 1))?;
        let lon = parse_coord(&record, lon_idx).with_context(|| format!("Bad longitude on row {}", row + 1))?;
        points.push(GeoPoint::new(lat, lon));
    }

    Ok(Route::new(RoutePath::new(points), Vec::new()))
}

fn parse_coord(record: &csv::StringRecord, idx: usize) -> Result<f64> {
    let raw = record.get(idx).context("Missing column")?;
    let value: f64 = raw.parse().with_context(|| format!("'{}' is not a number", raw))?;
    if !value.is_finite() {
        anyhow::bail!("'{}' is not a finite number", raw);
    }
    Ok(value)
}

/// Find a column by checking possible names
fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Result<usize> {
    for (idx, header) in headers.iter().enumerate() {
        let header_lower = header.to_lowercase();
        if names.iter().any(|&name| header_lower == name) {
            return Ok(idx);
        }
    }

    anyhow::bail!("Could not find column with names: {:?}", names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::tests::temp_file;

    #[test]
    fn test_load_csv_any_column_order() {
        let path = temp_file(
            "order.csv",
            "name, Longitude, Latitude\nstart, 13.405, 52.52\nend, 13.41, 52.53\n",
        );
        let route = load_csv(&path).unwrap();
        assert_eq!(
            route.path.points(),
            &[GeoPoint::new(52.52, 13.405), GeoPoint::new(52.53, 13.41)]
        );
        assert!(route.steps.is_empty());
    }

    #[test]
    fn test_load_csv_missing_column() {
        let path = temp_file("missing.csv", "lat,height\n1,2\n");
        let err = load_csv(&path).unwrap_err();
        assert!(err.to_string().contains("Could not find column"));
    }

    #[test]
    fn test_load_csv_bad_number() {
        let path = temp_file("bad.csv", "lat,lon\n1.0,2.0\nabc,3.0\n");
        let err = load_csv(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("row 2"));
    }
}
