//! Segment model and composed segmentation.
//!
//! Geofence routing and gap segmentation are independent strategies.
//! [`segment_trace`] applies the fence split first and then, when enabled,
//! the gap split inside every engine run.

use crate::fence::split_by_fence;
use crate::gaps::{split_on_gaps, GapThresholds};
use crate::{Engine, Sample, StitchConfig};
use log::debug;

/// How a segment is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRole {
    /// Regular run of samples, map-matched
    Normal,
    /// Two samples straddling a signal gap, only ever routed directly
    GapBridge,
}

/// Contiguous run of samples tagged with the engine that must process it.
///
/// Adjacent segments share their boundary sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub engine: Engine,
    pub role: SegmentRole,
    pub samples: Vec<Sample>,
}

impl Segment {
    pub fn new(engine: Engine, samples: Vec<Sample>) -> Self {
        Self {
            engine,
            role: SegmentRole::Normal,
            samples,
        }
    }

    pub fn bridge(engine: Engine, from: Sample, to: Sample) -> Self {
        Self {
            engine,
            role: SegmentRole::GapBridge,
            samples: vec![from, to],
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Partition a sanitized trace into engine-tagged segments.
pub fn segment_trace(trace: &[Sample], config: &StitchConfig) -> Vec<Segment> {
    let runs = split_by_fence(trace, config.fence.as_ref());

    if !config.split_on_gaps {
        return runs;
    }

    let thresholds = GapThresholds::from(config);
    let segments: Vec<Segment> = runs
        .into_iter()
        .flat_map(|run| split_on_gaps(&run.samples, run.engine, &thresholds))
        .collect();

    debug!("Gap segmentation produced {} segments", segments.len());
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fence;

    fn line(n: usize, step_s: i64) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample::new(0.0, i as f64 * 0.0001, i as i64 * step_s))
            .collect()
    }

    #[test]
    fn test_single_engine_single_segment() {
        let trace = line(5, 1);
        let segments = segment_trace(&trace, &StitchConfig::default());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].engine, Engine::Osrm);
        assert_eq!(segments[0].samples, trace);
    }

    #[test]
    fn test_fence_then_gaps_compose() {
        // Fence around samples 2..=3; a long pause between samples 6 and 7 and 7 and 8
        let mut trace = line(10, 1);
        trace[7].timestamp = 30;
        trace[8].timestamp = 60;
        trace[9].timestamp = 61;
        let fence = Fence::new(vec![
            [-0.001, 0.00015],
            [0.001, 0.00015],
            [0.001, 0.00035],
            [-0.001, 0.00035],
        ])
        .unwrap();

        let config = StitchConfig {
            fence: Some(fence),
            split_on_gaps: true,
            ..StitchConfig::default()
        };
        let segments = segment_trace(&trace, &config);

        let engines: Vec<Engine> = segments.iter().map(|s| s.engine).collect();
        assert_eq!(engines[0], Engine::Osrm);
        assert_eq!(engines[1], Engine::Valhalla);
        assert!(segments.iter().any(|s| s.role == SegmentRole::GapBridge));
    }
}
