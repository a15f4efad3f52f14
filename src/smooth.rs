//! # Smoothing and Densification
//!
//! Post-processing for the stitched path:
//!
//! - [`smooth_corners`]: Chaikin-style corner cutting that leaves sharp turns
//!   and the endpoints exactly where they are
//! - [`densify`]: linear resampling so consecutive points are at most one
//!   step apart
//!
//! ## Corner Preservation
//!
//! A vertex is kept when the heading change between its incoming and
//! outgoing edge is at least `corner_angle_deg`. Headings are measured in
//! degree space with `atan2`. The keep mask is computed once on the input
//! and carried through every iteration, so kept vertices stay kept and
//! never move.

use crate::geo_utils::{lerp, planar_distance};
use crate::{ResolvedPath, StitchConfig};
use geo::Coord;

/// Interpolated points closer than this to the edge end are skipped.
const DENSIFY_EPSILON_M: f64 = 1e-6;

/// Heading change at `b` in degrees, in `[0, 180]`.
fn turn_angle(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> f64 {
    let heading_in = (b.y - a.y).atan2(b.x - a.x).to_degrees();
    let heading_out = (c.y - b.y).atan2(c.x - b.x).to_degrees();
    let diff = (heading_out - heading_in).abs();
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Endpoints plus every interior vertex turning at least `corner_angle_deg`.
fn corner_mask(path: &[Coord<f64>], corner_angle_deg: f64) -> Vec<bool> {
    let n = path.len();
    (0..n)
        .map(|i| {
            i == 0 || i == n - 1 || turn_angle(path[i - 1], path[i], path[i + 1]) >= corner_angle_deg
        })
        .collect()
}

/// One corner-cutting pass. Every non-kept interior vertex is replaced by the
/// points at 1/4 and 3/4 of its outgoing edge.
fn chaikin_once(path: &[Coord<f64>], keep: &[bool]) -> (Vec<Coord<f64>>, Vec<bool>) {
    let n = path.len();
    let mut out = Vec::with_capacity(n * 2);
    let mut out_keep = Vec::with_capacity(n * 2);

    out.push(path[0]);
    out_keep.push(true);
    for i in 1..n - 1 {
        if keep[i] {
            out.push(path[i]);
            out_keep.push(true);
            continue;
        }
        out.push(lerp(path[i], path[i + 1], 0.25));
        out.push(lerp(path[i], path[i + 1], 0.75));
        out_keep.extend([false, false]);
    }
    out.push(path[n - 1]);
    out_keep.push(true);

    (out, out_keep)
}

/// Corner-preserving smoothing over `iterations` passes.
///
/// Paths of fewer than 3 points are returned unchanged.
pub fn smooth_corners(path: &[Coord<f64>], iterations: u32, corner_angle_deg: f64) -> ResolvedPath {
    if path.len() < 3 {
        return path.to_vec();
    }

    let mut keep = corner_mask(path, corner_angle_deg);
    let mut current = path.to_vec();
    for _ in 0..iterations {
        let (next, next_keep) = chaikin_once(&current, &keep);
        current = next;
        keep = next_keep;
    }
    current
}

/// Insert points every `step_m` meters along each edge longer than the step.
///
/// Original vertices are all kept; interpolated points never coincide with
/// the edge end.
pub fn densify(path: &[Coord<f64>], step_m: f64) -> ResolvedPath {
    if path.len() < 2 || !(step_m > 0.0) {
        return path.to_vec();
    }

    let mut out = Vec::with_capacity(path.len());
    out.push(path[0]);
    for w in path.windows(2) {
        let (a, b) = (w[0], w[1]);
        let dist = planar_distance(a, b);
        if dist > step_m {
            let mut k = 1.0;
            while k * step_m < dist - DENSIFY_EPSILON_M {
                out.push(lerp(a, b, k * step_m / dist));
                k += 1.0;
            }
        }
        out.push(b);
    }
    out
}

/// Apply the configured smoothing, then densification.
pub fn smooth_and_densify(path: &[Coord<f64>], config: &StitchConfig) -> ResolvedPath {
    let mut out = path.to_vec();
    if config.smooth {
        out = smooth_corners(&out, config.smooth_iterations, config.corner_angle_deg);
    }
    if config.densify {
        out = densify(&out, config.densify_step_m);
    }
    out
}
