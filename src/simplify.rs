//! Douglas-Peucker simplification in degree space.
//!
//! Distances are measured perpendicular to the infinite line through the
//! chord endpoints, so a point that doubles back past an endpoint along the
//! same line counts as on the line. Kept points are whole samples, so
//! timestamps travel with their positions.

use crate::geo_utils::line_distance_deg;
use crate::{Sample, StitchConfig};
use log::debug;

/// Simplify `samples` with a tolerance in degrees.
///
/// Returns the input unchanged when it has 2 points or fewer. The output is
/// always a subsequence of the input that keeps the first and last sample.
pub fn douglas_peucker(samples: &[Sample], tolerance_deg: f64) -> Vec<Sample> {
    if samples.len() <= 2 {
        return samples.to_vec();
    }

    let mut keep = vec![false; samples.len()];
    keep[0] = true;
    keep[samples.len() - 1] = true;

    // Pending (first, last) chords
    let mut stack = vec![(0, samples.len() - 1)];
    while let Some((first, last)) = stack.pop() {
        if last - first < 2 {
            continue;
        }
        let (a, b) = (samples[first].coord(), samples[last].coord());

        let mut index = first;
        let mut max_dist = 0.0;
        for (i, sample) in samples.iter().enumerate().take(last).skip(first + 1) {
            let d = line_distance_deg(sample.coord(), a, b);
            if d > max_dist {
                index = i;
                max_dist = d;
            }
        }

        if max_dist > tolerance_deg {
            keep[index] = true;
            stack.push((index, last));
            stack.push((first, index));
        }
    }

    samples
        .iter()
        .zip(keep)
        .filter_map(|(s, k)| k.then_some(*s))
        .collect()
}

/// Simplify a segment before it is sent to an engine.
///
/// Segments shorter than `min_points_to_simplify` are returned as-is.
pub fn simplify_for_matching(samples: &[Sample], config: &StitchConfig) -> Vec<Sample> {
    if samples.len() < config.min_points_to_simplify {
        return samples.to_vec();
    }

    let simplified = douglas_peucker(samples, config.dp_tolerance_deg);
    debug!(
        "Simplified {} -> {} points (tolerance {})",
        samples.len(),
        simplified.len(),
        config.dp_tolerance_deg
    );
    simplified
}
