//! File ingest and configuration loading.

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use trace_stitch::{load_file, load_files, Sample, StitchConfig, TraceStitchError};

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_each_schema_loads() {
    let dir = TempDir::new().unwrap();
    let nested = write(
        &dir,
        "nested.json",
        r#"{"track": {"route": [[1700000000000, -23.50, -46.60], [1700000005000, -23.51, -46.61]]}}"#,
    );
    let geojson = write(
        &dir,
        "line.geojson",
        r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[-46.6, -23.5], [-46.61, -23.51]]}}
        ]}"#,
    );
    let rows = write(&dir, "rows.json", "[[-23.5, -46.6], [-23.51, -46.61]]");
    let objects = write(
        &dir,
        "objects.json",
        r#"[{"lat": -23.5, "lon": -46.6, "time": 100}, {"lat": -23.51, "lon": -46.61}]"#,
    );

    assert_eq!(
        load_file(&nested).unwrap()[0],
        Sample::new(-46.60, -23.50, 1_700_000_000)
    );
    assert_eq!(load_file(&geojson).unwrap()[1].timestamp, 1);
    assert_eq!(load_file(&rows).unwrap()[1], Sample::untimed(-46.61, -23.51, 1));
    let objects = load_file(&objects).unwrap();
    assert_eq!(objects[0].timestamp, 100);
    assert_eq!(objects[1].timestamp, 101);
}

#[test]
fn test_bad_files_are_skipped() {
    let dir = TempDir::new().unwrap();
    let good = write(&dir, "good.json", "[[-23.5, -46.6], [-23.51, -46.61]]");
    let broken = write(&dir, "broken.json", "{not json");
    let unknown = write(&dir, "unknown.json", r#"{"hello": "world"}"#);
    let missing = dir.path().join("missing.json");

    assert!(matches!(load_file(&broken), Err(TraceStitchError::Parse { .. })));
    assert!(matches!(
        load_file(&unknown),
        Err(TraceStitchError::UnrecognizedSchema { .. })
    ));
    assert!(matches!(load_file(&missing), Err(TraceStitchError::Io { .. })));

    let samples = load_files(&[broken, good.clone(), unknown, missing, good]).unwrap();
    assert_eq!(samples.len(), 4);
}

#[test]
fn test_no_usable_input_is_fatal() {
    let dir = TempDir::new().unwrap();
    let broken = write(&dir, "broken.json", "[]");

    assert!(matches!(
        load_files::<PathBuf>(&[]),
        Err(TraceStitchError::NoInputFiles)
    ));
    assert!(matches!(
        load_files(&[broken]),
        Err(TraceStitchError::InsufficientPoints { point_count: 0, .. })
    ));
}

#[test]
fn test_partial_config_file() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "config.json",
        r#"{"osrm_host": "http://osrm:5000", "dedup_epsilon_m": 5.0, "fence": [[0,0],[1,0],[1,1]]}"#,
    );

    let config = StitchConfig::from_json_file(&path).unwrap();
    assert_eq!(config.osrm_host, "http://osrm:5000");
    assert_eq!(config.dedup_epsilon_m, 5.0);
    assert_eq!(config.dp_tolerance_deg, 0.00008);
    assert!(config.fence.is_some());

    let invalid = write(&dir, "invalid.json", r#"{"dedup_epsilon_m": -1}"#);
    assert!(matches!(
        StitchConfig::from_json_file(&invalid),
        Err(TraceStitchError::ConfigError { .. })
    ));
}
