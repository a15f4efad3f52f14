//! # Trace Stitch
//!
//! Reconstructs a clean, continuous driving path from a noisy, irregularly
//! sampled GPS trace using OSRM and Valhalla as map-matching engines.
//!
//! This library provides:
//! - Multi-schema track ingest (nested route arrays, GeoJSON, plain arrays)
//! - Temporal sanitation and spatial deduplication
//! - Geofence engine routing and gap segmentation
//! - A per-segment fallback chain (match, split match, bridge, raw)
//! - Path stitching with arrival correction, smoothing and densification
//!
//! ## Features
//!
//! - **`http`** - HTTP client for the OSRM / Valhalla engines (default)
//! - **`parallel`** - Parallel file loading with rayon
//! - **`cli`** - The `trace-stitch` command line tool
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use trace_stitch::{Sample, StitchConfig, prepare_trace, segment_trace};
//!
//! let raw = vec![
//!     Sample::new(-46.6300, -23.5500, 1_700_000_000),
//!     Sample::new(-46.6310, -23.5505, 1_700_000_005),
//!     Sample::new(-46.6320, -23.5510, 1_700_000_010),
//! ];
//!
//! let config = StitchConfig::default();
//! let trace = prepare_trace(&raw, &config).unwrap();
//! let segments = segment_trace(&trace, &config);
//! assert_eq!(segments.len(), 1);
//! ```

use geo::Coord;
use serde::{Deserialize, Serialize};
use std::fmt;

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TraceStitchError};

// Pipeline configuration
pub mod config;
pub use config::{RadiusProfile, StitchConfig};

// Geographic utilities (planar distance, bearing, bounds)
pub mod geo_utils;

// Input schema detection
pub mod normalize;
pub use normalize::{load_file, load_files, normalize_points};

// Timestamp repair and jitter removal
pub mod sanitize;
pub use sanitize::{dedup_by_radius, sort_and_repair};

// Geofence engine routing
pub mod fence;
pub use fence::{split_by_fence, Fence};

// Gap segmentation with hysteresis
pub mod gaps;
pub use gaps::{split_on_gaps, GapThresholds};

// Segment model and composed segmentation
pub mod segments;
pub use segments::{segment_trace, Segment, SegmentRole};

// Douglas-Peucker simplification
pub mod simplify;
pub use simplify::{douglas_peucker, simplify_for_matching};

// Map-matching request construction
pub mod request;
pub use request::{GapPolicy, MatchRequest};

// Engine abstraction and response parsing
pub mod backend;
pub use backend::{EngineResult, Failure, LocatedEdge, LocationKind, RoutingBackend, ViaLocation};

// HTTP client for OSRM / Valhalla
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::EngineClient;

// Fallback chain per segment
pub mod resolver;
pub use resolver::{resolve_segments, ResolvedSegment, SegmentResolver, Strategy};

// Path concatenation and arrival correction
pub mod stitch;
pub use stitch::{correct_arrival, stitch_segments, ArrivalOutcome};

// Corner-preserving smoothing and densification
pub mod smooth;
pub use smooth::{densify, smooth_and_densify, smooth_corners};

// End-to-end pipeline
pub mod pipeline;
pub use pipeline::{prepare_trace, write_json, FinalGeometry, TraceOutcome, TracePipeline};

// Waypoint routing through validated via points
pub mod via;
pub use via::{build_via_route, ViaRoute};

// ============================================================================
// Core Types
// ============================================================================

/// A single GPS fix: longitude, latitude and a timestamp in whole seconds.
///
/// Inputs without times get counter timestamps (0, 1, 2, ...) so ordering
/// still works; those samples carry `synthetic_time`.
///
/// # Example
/// ```
/// use trace_stitch::Sample;
/// let sample = Sample::new(-46.8370, -23.5074, 1_700_000_000);
/// assert!(sample.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub longitude: f64,
    pub latitude: f64,
    pub timestamp: i64,
    /// The timestamp is a counter filled in by the normalizer, not a recorded time
    #[serde(default)]
    pub synthetic_time: bool,
}

impl Sample {
    /// Create a new sample with a recorded timestamp.
    pub fn new(longitude: f64, latitude: f64, timestamp: i64) -> Self {
        Self {
            longitude,
            latitude,
            timestamp,
            synthetic_time: false,
        }
    }

    /// Create a sample whose timestamp is only a sequence counter.
    pub fn untimed(longitude: f64, latitude: f64, counter: i64) -> Self {
        Self {
            synthetic_time: true,
            ..Self::new(longitude, latitude, counter)
        }
    }

    /// Check if the sample has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// Position as a geo coordinate (x = longitude, y = latitude).
    #[inline]
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }
}

/// Routing engine a segment is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Primary engine (map matching and direct routes)
    #[default]
    Osrm,
    /// Secondary engine, used inside the fence
    Valhalla,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Osrm => "osrm",
            Engine::Valhalla => "valhalla",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered (lon, lat) coordinates with no two consecutive entries identical.
pub type ResolvedPath = Vec<Coord<f64>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_validation() {
        assert!(Sample::new(-0.1278, 51.5074, 0).is_valid());
        assert!(!Sample::new(0.0, 91.0, 0).is_valid());
        assert!(!Sample::new(181.0, 0.0, 0).is_valid());
        assert!(!Sample::new(f64::NAN, 0.0, 0).is_valid());
    }

    #[test]
    fn test_sample_coord_order() {
        let c = Sample::new(-46.8, -23.5, 10).coord();
        assert_eq!(c.x, -46.8);
        assert_eq!(c.y, -23.5);
    }

    #[test]
    fn test_engine_names() {
        assert_eq!(Engine::default(), Engine::Osrm);
        assert_eq!(Engine::Valhalla.to_string(), "valhalla");
        let json = serde_json::to_string(&Engine::Osrm).unwrap();
        assert_eq!(json, "\"osrm\"");
    }
}
