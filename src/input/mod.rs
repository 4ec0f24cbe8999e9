pub mod csv;
pub mod json;

pub use csv::load_csv;
pub use json::{load_json, parse_json};

use anyhow::{Context, Result};
use crate::routing::Route;
use std::path::Path;

/// Input format detection result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
    Unknown,
}

/// Detect the format of a route file from its contents
pub fn detect_format(data: &[u8]) -> InputFormat {
    if is_json(data) {
        return InputFormat::Json;
    }
    if is_csv(data) {
        return InputFormat::Csv;
    }
    InputFormat::Unknown
}

fn is_json(data: &[u8]) -> bool {
    data.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'{' || b == b'[')
}

fn is_csv(data: &[u8]) -> bool {
    // A header line with at least one comma in the first few hundred bytes
    let text = String::from_utf8_lossy(&data[..data.len().min(500)]);
    text.lines().take(5).any(|line| line.contains(','))
}

/// Load a recorded route, auto-detecting the format
pub fn load_route_file(path: &Path) -> Result<Route> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    match detect_format(&data) {
        InputFormat::Csv => load_csv(path),
        InputFormat::Json => load_json(path),
        InputFormat::Unknown => anyhow::bail!("Unknown route file format: {}", path.display()),
    }
}
