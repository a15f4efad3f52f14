//! # Trace Pipeline
//!
//! Runs one trace end to end:
//!
//! 1. [`prepare_trace`]: sort, repair timestamps, drop sub-epsilon jitter
//! 2. [`segment_trace`]: fence runs, optionally split on gaps
//! 3. [`resolve_segments`]: fallback chain per segment
//! 4. [`stitch_segments`] and [`correct_arrival`]
//! 5. [`smooth_and_densify`]
//!
//! The only fatal outcomes are too few input samples and an empty stitched
//! path. Engine failures are absorbed by step 3.

use crate::backend::RoutingBackend;
use crate::resolver::{resolve_segments, ResolvedSegment};
use crate::sanitize::{dedup_by_radius, sort_and_repair};
use crate::segments::segment_trace;
use crate::smooth::smooth_and_densify;
use crate::stitch::{correct_arrival, stitch_segments, ArrivalOutcome};
use crate::{OptionExt, ResolvedPath, Result, Sample, StitchConfig, TraceStitchError};
use log::info;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Instant;

/// Minimum number of raw samples a trace needs.
const MIN_SAMPLES: usize = 2;

/// Sort, repair and deduplicate raw samples.
pub fn prepare_trace(raw: &[Sample], config: &StitchConfig) -> Result<Vec<Sample>> {
    if raw.len() < MIN_SAMPLES {
        return Err(TraceStitchError::InsufficientPoints {
            point_count: raw.len(),
            minimum_required: MIN_SAMPLES,
        });
    }
    let sorted = sort_and_repair(raw);
    Ok(dedup_by_radius(&sorted, config.dedup_epsilon_m))
}

/// Final stitched line plus the true last raw sample.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalGeometry {
    pub path: ResolvedPath,
    pub final_point: Sample,
}

impl FinalGeometry {
    /// FeatureCollection with the stitched LineString and the final Point.
    pub fn to_geojson(&self) -> Value {
        let coordinates: Vec<[f64; 2]> = self.path.iter().map(|c| [c.x, c.y]).collect();
        json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "stitched": true },
                    "geometry": { "type": "LineString", "coordinates": coordinates },
                },
                {
                    "type": "Feature",
                    "properties": { "final_point": true },
                    "geometry": {
                        "type": "Point",
                        "coordinates": [self.final_point.longitude, self.final_point.latitude],
                    },
                },
            ]
        })
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct TraceOutcome {
    pub geometry: FinalGeometry,
    pub segments: Vec<ResolvedSegment>,
    pub arrival: ArrivalOutcome,
}

/// A backend and configuration ready to process traces.
pub struct TracePipeline<B: RoutingBackend> {
    backend: B,
    config: StitchConfig,
}

impl<B: RoutingBackend> TracePipeline<B> {
    pub fn new(backend: B, config: StitchConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Reconstruct the path for `raw`.
    pub async fn run(&self, raw: &[Sample]) -> Result<TraceOutcome> {
        let started = Instant::now();
        let config = &self.config;

        let trace = prepare_trace(raw, config)?;
        let final_point = *sort_and_repair(raw)
            .last()
            .ok_or_insufficient_points(raw.len(), MIN_SAMPLES)?;

        let segments = segment_trace(&trace, config);
        let resolved = resolve_segments(&self.backend, config, &segments).await;

        let mut path = stitch_segments(&resolved);
        if path.is_empty() {
            return Err(TraceStitchError::EmptyGeometry);
        }
        let arrival = correct_arrival(&mut path, &final_point, &self.backend, config).await;

        let mut path = smooth_and_densify(&path, config);
        path.dedup();

        info!(
            "Trace of {} samples ({} after dedup): {} segments -> {} coords in {:?}",
            raw.len(),
            trace.len(),
            resolved.len(),
            path.len(),
            started.elapsed()
        );

        Ok(TraceOutcome {
            geometry: FinalGeometry { path, final_point },
            segments: resolved,
            arrival,
        })
    }
}

/// Write `value` as pretty-printed JSON.
pub fn write_json(path: &Path, value: &Value) -> Result<()> {
    let output_error = |message: String| TraceStitchError::OutputError {
        path: path.display().to_string(),
        message,
    };
    let text = serde_json::to_string_pretty(value).map_err(|e| output_error(e.to_string()))?;
    std::fs::write(path, text).map_err(|e| output_error(e.to_string()))
}
