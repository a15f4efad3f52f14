//! # Gap Segmentation
//!
//! Splits a run of samples wherever the signal was lost long enough that
//! matching across the hole would invent a path. A pair of consecutive
//! samples is flagged when the time step is too long, or when the jump is
//! both far and implausibly fast. A break needs `hysteresis` flagged pairs
//! in a row; isolated flags stay inside the current segment.

use crate::geo_utils::sample_distance;
use crate::segments::Segment;
use crate::{Engine, Sample, StitchConfig};
use log::debug;

/// Thresholds for flagging a pair of samples as a gap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapThresholds {
    /// Elapsed seconds at or above which a pair is a gap.
    pub max_dt_s: f64,
    /// Minimum jump in meters for the velocity test.
    pub min_dist_m: f64,
    /// Speed in m/s at or above which a long jump is a gap.
    pub max_vel_mps: f64,
    /// Consecutive flagged pairs required to break.
    pub hysteresis: u32,
}

impl Default for GapThresholds {
    fn default() -> Self {
        Self::from(&StitchConfig::default())
    }
}

impl From<&StitchConfig> for GapThresholds {
    fn from(config: &StitchConfig) -> Self {
        Self {
            max_dt_s: config.max_dt_gap_s,
            min_dist_m: config.min_dist_gap_m,
            max_vel_mps: config.max_vel_gap_mps,
            hysteresis: config.gap_hysteresis,
        }
    }
}

impl GapThresholds {
    /// Whether the step from `a` to `b` looks like lost signal.
    pub fn is_gap(&self, a: &Sample, b: &Sample) -> bool {
        let dist = sample_distance(a, b);
        let dt = (b.timestamp - a.timestamp).max(0) as f64;
        let velocity = if dt > 0.0 { dist / dt } else { f64::INFINITY };

        dt >= self.max_dt_s || (dist >= self.min_dist_m && velocity >= self.max_vel_mps)
    }
}

/// Split `samples` into Normal segments separated by GapBridge segments.
///
/// Every break closes the current segment, emits a 2-sample bridge from its
/// last sample to the sample that confirmed the break, and restarts
/// accumulation at that sample. A closing segment of a single sample is
/// never emitted.
pub fn split_on_gaps(samples: &[Sample], engine: Engine, thresholds: &GapThresholds) -> Vec<Segment> {
    if samples.len() < 2 {
        return Vec::new();
    }

    let required = thresholds.hysteresis.max(1);
    let mut segments = Vec::new();
    let mut current = vec![samples[0]];
    let mut flagged = 0u32;

    for pair in samples.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if thresholds.is_gap(a, b) {
            flagged += 1;
        } else {
            flagged = 0;
        }

        if flagged >= required {
            let last = current[current.len() - 1];
            if current.len() >= 2 {
                segments.push(Segment::new(engine, std::mem::take(&mut current)));
            }
            segments.push(Segment::bridge(engine, last, *b));
            current = vec![*b];
            flagged = 0;
        } else {
            current.push(*b);
        }
    }

    if current.len() >= 2 {
        segments.push(Segment::new(engine, current));
    }

    debug!(
        "[{}] gap split of {} samples: {} segments",
        engine,
        samples.len(),
        segments.len()
    );
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SegmentRole;

    /// Samples 11m apart, one per second, with the given timestamps.
    fn trace(timestamps: &[i64]) -> Vec<Sample> {
        timestamps
            .iter()
            .enumerate()
            .map(|(i, &t)| Sample::new(0.0, i as f64 * 0.0001, t))
            .collect()
    }

    #[test]
    fn test_is_gap_by_time() {
        let th = GapThresholds::default();
        let a = Sample::new(0.0, 0.0, 0);
        assert!(th.is_gap(&a, &Sample::new(0.0, 0.0001, 15)));
        assert!(!th.is_gap(&a, &Sample::new(0.0, 0.0001, 14)));
    }

    #[test]
    fn test_is_gap_by_velocity() {
        let th = GapThresholds::default();
        let a = Sample::new(0.0, 0.0, 0);
        // 222m in 2s = 111 m/s
        assert!(th.is_gap(&a, &Sample::new(0.0, 0.002, 2)));
        // 222m in 10s = 22 m/s, plausible
        assert!(!th.is_gap(&a, &Sample::new(0.0, 0.002, 10)));
        // Fast but short hop is not a gap
        assert!(!th.is_gap(&a, &Sample::new(0.0, 0.0005, 1)));
    }

    #[test]
    fn test_zero_dt_counts_as_infinite_velocity() {
        let th = GapThresholds::default();
        let a = Sample::new(0.0, 0.0, 5);
        assert!(th.is_gap(&a, &Sample::new(0.0, 0.002, 5)));
    }

    #[test]
    fn test_no_gaps_single_segment() {
        let samples = trace(&[0, 1, 2, 3, 4]);
        let segments = split_on_gaps(&samples, Engine::Osrm, &GapThresholds::default());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].samples, samples);
        assert_eq!(segments[0].role, SegmentRole::Normal);
    }

    #[test]
    fn test_single_flag_is_absorbed() {
        // One 20s pause between samples 2 and 3, then normal again
        let samples = trace(&[0, 1, 2, 22, 23, 24]);
        let segments = split_on_gaps(&samples, Engine::Osrm, &GapThresholds::default());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].samples.len(), 6);
    }

    #[test]
    fn test_consecutive_flags_break() {
        // Pairs (2,3) and (3,4) are both gaps
        let samples = trace(&[0, 1, 2, 30, 60, 61, 62]);
        let segments = split_on_gaps(&samples, Engine::Valhalla, &GapThresholds::default());

        let roles: Vec<SegmentRole> = segments.iter().map(|s| s.role).collect();
        assert_eq!(
            roles,
            vec![SegmentRole::Normal, SegmentRole::GapBridge, SegmentRole::Normal]
        );
        assert_eq!(segments[0].samples, samples[..4].to_vec());
        assert_eq!(segments[1].samples, vec![samples[3], samples[4]]);
        assert_eq!(segments[2].samples, samples[4..].to_vec());
        assert!(segments.iter().all(|s| s.engine == Engine::Valhalla));
    }

    #[test]
    fn test_hysteresis_one_breaks_immediately() {
        let th = GapThresholds {
            hysteresis: 1,
            ..GapThresholds::default()
        };
        let samples = trace(&[0, 1, 2, 22, 23]);
        let segments = split_on_gaps(&samples, Engine::Osrm, &th);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].samples, vec![samples[2], samples[3]]);
    }

    #[test]
    fn test_trailing_single_sample_dropped() {
        let th = GapThresholds {
            hysteresis: 1,
            ..GapThresholds::default()
        };
        let samples = trace(&[0, 1, 2, 40]);
        let segments = split_on_gaps(&samples, Engine::Osrm, &th);
        // Normal [0..=2] and the bridge; the lone last sample is not a segment
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].role, SegmentRole::GapBridge);
    }

    #[test]
    fn test_short_input() {
        let samples = trace(&[0]);
        assert!(split_on_gaps(&samples, Engine::Osrm, &GapThresholds::default()).is_empty());
    }
}
