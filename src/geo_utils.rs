//! # Geographic Utilities
//!
//! Core geographic computations shared by the whole pipeline.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`planar_distance`] | Equirectangular distance between two coordinates |
//! | [`sample_distance`] | Same, for two [`Sample`]s |
//! | [`polyline_length`] | Total length of a coordinate path in meters |
//! | [`initial_bearing`] | Great-circle initial bearing, rounded to whole degrees |
//! | [`compute_bounds`] | Bounding box of a coordinate ring |
//! | [`lerp`] | Linear interpolation between two coordinates |
//!
//! ## Example
//!
//! ```rust
//! use geo::Coord;
//! use trace_stitch::geo_utils;
//!
//! let a = Coord { x: 0.0, y: 0.0 };
//! let b = Coord { x: 0.0, y: 0.001 };
//!
//! // 0.001 degrees of latitude is 111 meters
//! let dist = geo_utils::planar_distance(a, b);
//! assert!((dist - 111.0).abs() < 0.01);
//! assert_eq!(geo_utils::initial_bearing(a, b), 0);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Equirectangular Projection
//!
//! Distances use a flat projection scaled by 111,000 m per degree, with the
//! longitude axis shortened by the cosine of the mean latitude. Over the
//! tens-of-meters spans compared here the error against haversine is far
//! below GPS noise, and every threshold in [`crate::StitchConfig`] was tuned
//! against this exact formula.

use crate::Sample;
use geo::{Coord, Line};

/// Meters per degree of latitude used by the planar approximation.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Equirectangular distance in meters between two (lon, lat) coordinates.
///
/// # Example
///
/// ```rust
/// use geo::Coord;
/// use trace_stitch::geo_utils::planar_distance;
///
/// let d = planar_distance(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.001, y: 0.0 });
/// assert!((d - 111.0).abs() < 0.01);
/// ```
#[inline]
pub fn planar_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let mean_lat = ((a.y + b.y) / 2.0).to_radians();
    let mx = (b.x - a.x) * METERS_PER_DEGREE * mean_lat.cos();
    let my = (b.y - a.y) * METERS_PER_DEGREE;
    mx.hypot(my)
}

/// Planar distance between two samples in meters.
#[inline]
pub fn sample_distance(a: &Sample, b: &Sample) -> f64 {
    planar_distance(a.coord(), b.coord())
}

/// Calculate the total length of a coordinate path in meters.
///
/// Empty or single-point paths return 0.0.
pub fn polyline_length(coords: &[Coord<f64>]) -> f64 {
    if coords.len() < 2 {
        return 0.0;
    }

    coords
        .windows(2)
        .map(|w| planar_distance(w[0], w[1]))
        .sum()
}

/// Perpendicular distance in degrees from `p` to the infinite line through
/// `a` and `b`.
///
/// A degenerate line (`a == b`) falls back to the distance from `p` to `a`.
pub fn line_distance_deg(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let line = Line::new(a, b);
    let (dx, dy) = (line.dx(), line.dy());
    if dx == 0.0 && dy == 0.0 {
        return (p.x - a.x).hypot(p.y - a.y);
    }
    (dx * (a.y - p.y) - (a.x - p.x) * dy).abs() / dx.hypot(dy)
}

// =============================================================================
// Direction
// =============================================================================

/// Great-circle initial bearing from `from` to `to`, rounded to the nearest
/// whole degree in `0..360`.
pub fn initial_bearing(from: Coord<f64>, to: Coord<f64>) -> u16 {
    let lat1 = from.y.to_radians();
    let lat2 = to.y.to_radians();
    let dlon = (to.x - from.x).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    let bearing = (y.atan2(x).to_degrees() + 360.0) % 360.0;

    (bearing.round() as u16) % 360
}

/// Linear interpolation in degree space, `t` in [0, 1].
#[inline]
pub fn lerp(a: Coord<f64>, b: Coord<f64>, t: f64) -> Coord<f64> {
    Coord {
        x: a.x + t * (b.x - a.x),
        y: a.y + t * (b.y - a.y),
    }
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Check whether a (lon, lat) coordinate lies inside or on the box.
    #[inline]
    pub fn contains(&self, c: Coord<f64>) -> bool {
        c.y >= self.min_lat && c.y <= self.max_lat && c.x >= self.min_lng && c.x <= self.max_lng
    }
}

/// Compute the bounding box of a set of coordinates.
///
/// For empty input, returns bounds with MIN/MAX values that contain nothing.
pub fn compute_bounds(coords: &[Coord<f64>]) -> Bounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for c in coords {
        min_lat = min_lat.min(c.y);
        max_lat = max_lat.max(c.y);
        min_lng = min_lng.min(c.x);
        max_lng = max_lng.max(c.x);
    }

    Bounds {
        min_lat,
        max_lat,
        min_lng,
        max_lng,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
