//! Temporal sanitation and spatial deduplication.

use crate::geo_utils::sample_distance;
use crate::Sample;

/// Stable-sort by timestamp, then force strictly increasing timestamps.
///
/// Any timestamp not greater than the previous output timestamp becomes
/// `previous + 1`. Ties keep their input order before being bumped.
/// Repair saturates at `i64::MAX`.
///
/// # Example
/// ```
/// use trace_stitch::{Sample, sort_and_repair};
///
/// let raw = vec![Sample::new(0.0, 0.0, 5), Sample::new(0.0, 1.0, 5), Sample::new(0.0, 2.0, 1)];
/// let ts: Vec<i64> = sort_and_repair(&raw).iter().map(|s| s.timestamp).collect();
/// assert_eq!(ts, vec![1, 5, 6]);
/// ```
pub fn sort_and_repair(samples: &[Sample]) -> Vec<Sample> {
    let mut sorted = samples.to_vec();
    // sort_by_key is stable
    sorted.sort_by_key(|s| s.timestamp);

    let mut last: Option<i64> = None;
    for sample in sorted.iter_mut() {
        if let Some(prev) = last {
            if sample.timestamp <= prev {
                sample.timestamp = prev.saturating_add(1);
            }
        }
        last = Some(sample.timestamp);
    }
    sorted
}

/// Collapse consecutive samples closer than `epsilon_m` to the last kept one.
///
/// A merged sample never moves the kept position; it only advances the
/// kept timestamp when it is newer.
pub fn dedup_by_radius(samples: &[Sample], epsilon_m: f64) -> Vec<Sample> {
    let mut kept: Vec<Sample> = Vec::with_capacity(samples.len());

    for sample in samples {
        if let Some(last) = kept.last_mut() {
            if sample_distance(last, sample) < epsilon_m {
                if sample.timestamp > last.timestamp {
                    last.timestamp = sample.timestamp;
                }
                continue;
            }
        }
        kept.push(*sample);
    }
    kept
}
