//! # Point Normalizer
//!
//! Converts the supported track payloads into a uniform `Vec<Sample>`.
//!
//! ## Supported schemas (tried in this order)
//! 1. Nested route: `{"track": {"route": [[ts, lat, lon], ...]}}`
//! 2. GeoJSON FeatureCollection with a `LineString`, else a `MultiLineString`
//!    (timestamps synthesized as 0, 1, 2, ...)
//! 3. Array of rows: `[[lat, lon], ...]` or `[[ts, lat, lon], ...]`
//! 4. Array of objects: `[{"lat": .., "lon": .., "time": ..}, ...]`
//!
//! Filled-in counter timestamps are flagged with `Sample::synthetic_time`.
//! The first detector yielding at least one sample wins. Timestamps above
//! 1e12 are treated as milliseconds. A (lat, lon) pair whose latitude is out
//! of range while the longitude would be a valid latitude is swapped.

use crate::{Result, Sample, TraceStitchError};
use log::{debug, info, warn};
use serde_json::Value;
use std::path::Path;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A schema detector: `Some(samples)` only when it recognized at least one point.
type Detector = fn(&Value) -> Option<Vec<Sample>>;

const DETECTORS: &[(&str, Detector)] = &[
    ("nested-route", from_nested_route),
    ("geojson", from_feature_collection),
    ("array-of-arrays", from_array_of_arrays),
    ("array-of-objects", from_array_of_objects),
];

/// Normalize a parsed JSON payload. Returns an empty vector when no schema matches.
pub fn normalize_points(data: &Value) -> Vec<Sample> {
    for (name, detect) in DETECTORS {
        if let Some(samples) = detect(data) {
            debug!("Detected {} schema with {} points", name, samples.len());
            return samples;
        }
    }
    Vec::new()
}

/// Read, parse and normalize one file.
pub fn load_file(path: &Path) -> Result<Vec<Sample>> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|e| TraceStitchError::Io {
        path: display.clone(),
        message: e.to_string(),
    })?;
    let data: Value = serde_json::from_str(&text).map_err(|e| TraceStitchError::Parse {
        path: display.clone(),
        message: e.to_string(),
    })?;

    let samples = normalize_points(&data);
    if samples.is_empty() {
        return Err(TraceStitchError::UnrecognizedSchema { path: display });
    }
    Ok(samples)
}

/// Load every file and concatenate their samples in argument order.
///
/// Files that fail are logged and skipped. Fails only when no files were
/// given or none of them contributed a point.
pub fn load_files<P: AsRef<Path> + Sync>(paths: &[P]) -> Result<Vec<Sample>> {
    if paths.is_empty() {
        return Err(TraceStitchError::NoInputFiles);
    }

    #[cfg(feature = "parallel")]
    let loaded: Vec<Result<Vec<Sample>>> = paths.par_iter().map(|p| load_file(p.as_ref())).collect();

    #[cfg(not(feature = "parallel"))]
    let loaded: Vec<Result<Vec<Sample>>> = paths.iter().map(|p| load_file(p.as_ref())).collect();

    let mut samples = Vec::new();
    for (path, result) in paths.iter().zip(loaded) {
        match result {
            Ok(points) => {
                debug!("{}: {} points", path.as_ref().display(), points.len());
                samples.extend(points);
            }
            Err(e) => warn!("Skipping input: {}", e),
        }
    }

    if samples.is_empty() {
        return Err(TraceStitchError::InsufficientPoints {
            point_count: 0,
            minimum_required: 2,
        });
    }

    info!("Loaded {} points from {} files", samples.len(), paths.len());
    Ok(samples)
}

// ============================================================================
// Detectors
// ============================================================================

fn from_nested_route(data: &Value) -> Option<Vec<Sample>> {
    let route = data.get("track")?.get("route")?.as_array()?;

    let samples: Vec<Sample> = route
        .iter()
        .filter_map(|row| {
            let row = row.as_array()?;
            if row.len() < 3 {
                return None;
            }
            let ts = normalize_timestamp(number(&row[0])?);
            make_sample(number(&row[1])?, number(&row[2])?, ts, false)
        })
        .collect();

    non_empty(samples)
}

fn from_feature_collection(data: &Value) -> Option<Vec<Sample>> {
    if data.get("type")?.as_str()? != "FeatureCollection" {
        return None;
    }
    let features = data.get("features")?.as_array()?;

    let geometry_of = |feature: &Value, kind: &str| -> Option<Vec<Value>> {
        let geometry = feature.get("geometry")?;
        if geometry.get("type")?.as_str()? != kind {
            return None;
        }
        geometry.get("coordinates")?.as_array().cloned()
    };

    for feature in features {
        if let Some(coords) = geometry_of(feature, "LineString") {
            if let Some(samples) = non_empty(counted_positions(coords.iter())) {
                return Some(samples);
            }
        }
    }

    for feature in features {
        if let Some(lines) = geometry_of(feature, "MultiLineString") {
            let positions = lines
                .iter()
                .filter_map(Value::as_array)
                .flat_map(|line| line.iter());
            if let Some(samples) = non_empty(counted_positions(positions)) {
                return Some(samples);
            }
        }
    }

    None
}

fn from_array_of_arrays(data: &Value) -> Option<Vec<Sample>> {
    let rows = data.as_array()?;
    let mut counter = 0i64;
    let mut samples = Vec::new();

    for row in rows.iter().filter_map(Value::as_array) {
        let numeric = |i: usize| row.get(i).and_then(Value::as_f64);

        if let (Some(ts), Some(lat), Some(lon)) = (numeric(0), numeric(1), numeric(2)) {
            samples.extend(make_sample(lat, lon, normalize_timestamp(ts), false));
        } else if let (Some(lat), Some(lon)) = (numeric(0), numeric(1)) {
            samples.extend(make_sample(lat, lon, counter, true));
            counter += 1;
        }
    }

    non_empty(samples)
}

fn from_array_of_objects(data: &Value) -> Option<Vec<Sample>> {
    let items = data.as_array()?;
    if items.is_empty() || !items.iter().all(Value::is_object) {
        return None;
    }

    let mut counter = 0i64;
    let mut samples = Vec::new();

    for item in items {
        let (Some(lat), Some(lon)) = (
            item.get("lat").and_then(number),
            item.get("lon").and_then(number),
        ) else {
            continue;
        };
        let recorded = item.get("time").and_then(number).map(normalize_timestamp);
        let ts = recorded.unwrap_or(counter);

        samples.extend(make_sample(lat, lon, ts, recorded.is_none()));
        counter = counter.saturating_add(1).max(ts.saturating_add(1));
    }

    non_empty(samples)
}

// ============================================================================
// Helpers
// ============================================================================

/// GeoJSON positions are (lon, lat); timestamps count up from zero.
fn counted_positions<'a>(positions: impl Iterator<Item = &'a Value>) -> Vec<Sample> {
    let mut ts = 0i64;
    let mut samples = Vec::new();
    for position in positions {
        let Some(pair) = position.as_array() else {
            continue;
        };
        let (Some(lon), Some(lat)) = (
            pair.first().and_then(Value::as_f64),
            pair.get(1).and_then(Value::as_f64),
        ) else {
            continue;
        };
        if let Some(sample) = make_sample(lat, lon, ts, true) {
            samples.push(sample);
            ts += 1;
        }
    }
    samples
}

/// Numeric JSON value, accepting numeric strings.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Seconds from a raw timestamp; values above 1e12 are milliseconds.
pub fn normalize_timestamp(raw: f64) -> i64 {
    let ts = raw.round() as i64;
    if ts > 1_000_000_000_000 {
        ts / 1000
    } else {
        ts
    }
}

/// Build a sample from a (lat, lon) pair, repairing swapped axes.
fn make_sample(lat: f64, lon: f64, timestamp: i64, synthetic_time: bool) -> Option<Sample> {
    let (lat, lon) = if lat.abs() > 90.0 && lon.abs() <= 90.0 {
        (lon, lat)
    } else {
        (lat, lon)
    };
    let sample = if synthetic_time {
        Sample::untimed(lon, lat, timestamp)
    } else {
        Sample::new(lon, lat, timestamp)
    };
    sample.is_valid().then_some(sample)
}

fn non_empty(samples: Vec<Sample>) -> Option<Vec<Sample>> {
    (!samples.is_empty()).then_some(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_route_milliseconds() {
        let data = json!({"track": {"route": [
            [1_700_000_000_000i64, -23.5, -46.8],
            [1_700_000_005_000i64, -23.6, -46.9]
        ]}});
        let samples = normalize_points(&data);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], Sample::new(-46.8, -23.5, 1_700_000_000));
        assert_eq!(samples[1].timestamp, 1_700_000_005);
    }

    #[test]
    fn test_nested_route_swapped_pair() {
        let data = json!({"track": {"route": [[10, -46.8, -23.5]]}});
        let samples = normalize_points(&data);
        assert_eq!(samples, vec![Sample::new(-46.8, -23.5, 10)]);
    }

    #[test]
    fn test_feature_collection_linestring() {
        let data = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}},
                {"type": "Feature", "geometry": {"type": "LineString",
                    "coordinates": [[-46.8, -23.5], [-46.81, -23.51], [-46.82, -23.52]]}}
            ]
        });
        let samples = normalize_points(&data);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], Sample::untimed(-46.8, -23.5, 0));
        assert_eq!(samples[2].timestamp, 2);
    }

    #[test]
    fn test_feature_collection_multilinestring() {
        let data = json!({
            "type": "FeatureCollection",
            "features": [{"type": "Feature", "geometry": {"type": "MultiLineString",
                "coordinates": [[[0.0, 0.0], [0.0, 0.1]], [[0.0, 0.2]]]}}]
        });
        let samples = normalize_points(&data);
        let ts: Vec<i64> = samples.iter().map(|s| s.timestamp).collect();
        assert_eq!(ts, vec![0, 1, 2]);
        assert_eq!(samples[2].latitude, 0.2);
    }

    #[test]
    fn test_array_of_arrays_mixed_rows() {
        let data = json!([[10.0, -23.5, -46.8], [-23.6, -46.9], [-23.7, -47.0]]);
        let samples = normalize_points(&data);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], Sample::new(-46.8, -23.5, 10));
        // Two-element rows get a counter starting at zero
        assert_eq!(samples[1].timestamp, 0);
        assert_eq!(samples[2].timestamp, 1);
        assert!(!samples[0].synthetic_time);
        assert!(samples[1].synthetic_time && samples[2].synthetic_time);
    }

    #[test]
    fn test_array_of_objects_time_counter() {
        let data = json!([
            {"lat": -23.5, "lon": -46.8, "time": 100},
            {"lat": -23.6, "lon": -46.9},
            {"lat": "-23.7", "lon": "-47.0", "time": "not a number"}
        ]);
        let samples = normalize_points(&data);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].timestamp, 100);
        assert_eq!(samples[1].timestamp, 101);
        assert_eq!(samples[2].timestamp, 102);
        assert_eq!(samples[2].latitude, -23.7);
        let synthetic: Vec<bool> = samples.iter().map(|s| s.synthetic_time).collect();
        assert_eq!(synthetic, vec![false, true, true]);
    }

    #[test]
    fn test_unrecognized_payload_is_empty() {
        assert!(normalize_points(&json!({"foo": "bar"})).is_empty());
        assert!(normalize_points(&json!([])).is_empty());
        assert!(normalize_points(&json!([{"x": 1}])).is_empty());
    }

    #[test]
    fn test_priority_nested_route_wins() {
        // An object can only match the first two detectors; nested route comes first
        let data = json!({
            "type": "FeatureCollection",
            "features": [{"geometry": {"type": "LineString", "coordinates": [[5.0, 5.0]]}}],
            "track": {"route": [[1, 1.0, 2.0]]}
        });
        let samples = normalize_points(&data);
        assert_eq!(samples, vec![Sample::new(2.0, 1.0, 1)]);
    }

    #[test]
    fn test_normalize_timestamp() {
        assert_eq!(normalize_timestamp(1_700_000_000.4), 1_700_000_000);
        assert_eq!(normalize_timestamp(1_700_000_000_123.0), 1_700_000_000);
    }
}
