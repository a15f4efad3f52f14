//! # Geofence Engine Routing
//!
//! Samples inside the fence polygon are routed to the secondary engine,
//! everything else to the primary engine. The trace is walked once; every
//! change of engine closes the current run and starts a new one that repeats
//! the previous run's last sample, so adjacent segments share a boundary.

use crate::geo_utils::{compute_bounds, Bounds};
use crate::segments::Segment;
use crate::{Engine, Result, Sample, TraceStitchError};
use geo::Coord;
use log::debug;
use serde::{Deserialize, Serialize};

/// Guards the ray-casting division on horizontal edges.
const EDGE_EPSILON: f64 = 1e-15;

/// Polygon of (lon, lat) vertices, implicitly closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f64; 2]>", into = "Vec<[f64; 2]>")]
pub struct Fence {
    vertices: Vec<[f64; 2]>,
    bounds: Bounds,
}

impl Fence {
    /// Create a fence from at least 3 (lon, lat) vertices.
    pub fn new(vertices: Vec<[f64; 2]>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(TraceStitchError::ConfigError {
                message: format!("fence needs at least 3 vertices, got {}", vertices.len()),
            });
        }
        if vertices.iter().any(|v| !(v[0].is_finite() && v[1].is_finite())) {
            return Err(TraceStitchError::ConfigError {
                message: "fence vertices must be finite".to_string(),
            });
        }
        let coords: Vec<Coord<f64>> = vertices.iter().map(|v| Coord { x: v[0], y: v[1] }).collect();
        let bounds = compute_bounds(&coords);
        Ok(Self { vertices, bounds })
    }

    /// Parse `"lon,lat;lon,lat;..."`. Empty pairs are ignored.
    ///
    /// # Example
    /// ```
    /// use trace_stitch::Fence;
    ///
    /// let fence = Fence::parse("-46.8373,-23.5075;-46.8373,-23.5073;-46.8362,-23.5073").unwrap();
    /// assert_eq!(fence.vertices().len(), 3);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let mut vertices = Vec::new();
        for pair in s.trim().split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (lon, lat) = pair.split_once(',').ok_or_else(|| TraceStitchError::ConfigError {
                message: format!("fence vertex '{}' is not 'lon,lat'", pair),
            })?;
            let parse = |v: &str| {
                v.trim().parse::<f64>().map_err(|e| TraceStitchError::ConfigError {
                    message: format!("fence vertex '{}': {}", pair, e),
                })
            };
            vertices.push([parse(lon)?, parse(lat)?]);
        }
        Self::new(vertices)
    }

    pub fn vertices(&self) -> &[[f64; 2]] {
        &self.vertices
    }

    /// Even-odd ray casting test.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if !self.bounds.contains(Coord { x: lon, y: lat }) {
            return false;
        }

        let n = self.vertices.len();
        let mut inside = false;
        for i in 0..n {
            let [x1, y1] = self.vertices[i];
            let [x2, y2] = self.vertices[(i + 1) % n];
            if (y1 > lat) != (y2 > lat) {
                let x_intersect = (x2 - x1) * (lat - y1) / (y2 - y1 + EDGE_EPSILON) + x1;
                if lon < x_intersect {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Engine a sample must be processed by.
    pub fn engine_for(&self, sample: &Sample) -> Engine {
        if self.contains(sample.longitude, sample.latitude) {
            Engine::Valhalla
        } else {
            Engine::Osrm
        }
    }
}

impl TryFrom<Vec<[f64; 2]>> for Fence {
    type Error = TraceStitchError;

    fn try_from(vertices: Vec<[f64; 2]>) -> Result<Self> {
        Fence::new(vertices)
    }
}

impl From<Fence> for Vec<[f64; 2]> {
    fn from(fence: Fence) -> Self {
        fence.vertices
    }
}

/// Split a trace into engine runs.
///
/// Without a fence the whole trace is one segment on the primary engine.
/// Runs shorter than 2 samples are dropped. Traces under 2 samples yield nothing.
pub fn split_by_fence(trace: &[Sample], fence: Option<&Fence>) -> Vec<Segment> {
    if trace.len() < 2 {
        return Vec::new();
    }
    let Some(fence) = fence else {
        return vec![Segment::new(Engine::default(), trace.to_vec())];
    };

    let mut segments = Vec::new();
    let mut current_engine = fence.engine_for(&trace[0]);
    let mut current = vec![trace[0]];

    for sample in &trace[1..] {
        let engine = fence.engine_for(sample);
        if engine == current_engine {
            current.push(*sample);
            continue;
        }

        let boundary = current[current.len() - 1];
        if current.len() >= 2 {
            segments.push(Segment::new(current_engine, std::mem::take(&mut current)));
        }
        current_engine = engine;
        current = vec![boundary, *sample];
    }

    if current.len() >= 2 {
        segments.push(Segment::new(current_engine, current));
    }

    debug!(
        "Fence split {} samples into {} segments",
        trace.len(),
        segments.len()
    );
    segments
}
