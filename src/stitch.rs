//! Path stitching and arrival correction.

use crate::backend::RoutingBackend;
use crate::geo_utils::{planar_distance, polyline_length};
use crate::resolver::ResolvedSegment;
use crate::{ResolvedPath, Sample, StitchConfig};
use geo::Coord;
use log::{debug, warn};

/// What arrival correction did to the tail of the path.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrivalOutcome {
    /// The path already ends within `arrival_min_gap_m` of the last sample
    AlreadyArrived,
    /// A routed bridge to the last sample was appended
    Routed { route_m: f64 },
    /// The last sample was appended directly
    Appended { gap_m: f64 },
    /// Nothing could be appended; the path stops short
    Unreached { gap_m: f64 },
}

/// Append `coords` to `path`, skipping exact repeats of the previous point.
fn extend_dedup(path: &mut ResolvedPath, coords: impl IntoIterator<Item = Coord<f64>>) {
    for c in coords {
        if path.last() != Some(&c) {
            path.push(c);
        }
    }
}

/// Concatenate resolved segments in order without consecutive duplicates.
pub fn stitch_segments(segments: &[ResolvedSegment]) -> ResolvedPath {
    let mut path = ResolvedPath::with_capacity(segments.iter().map(|s| s.coords.len()).sum());
    for segment in segments {
        extend_dedup(&mut path, segment.coords.iter().copied());
    }
    path
}

/// Pull the end of `path` onto the true last sample.
///
/// A tail gap above `arrival_route_threshold_m` is bridged with a direct
/// route, kept only when it is no longer than
/// `arrival_ratio * gap + arrival_slack_m`. Whatever gap then remains is
/// closed with a straight append when it lies in
/// `(arrival_min_gap_m, arrival_route_threshold_m]`.
pub async fn correct_arrival<B: RoutingBackend>(
    path: &mut ResolvedPath,
    target: &Sample,
    backend: &B,
    config: &StitchConfig,
) -> ArrivalOutcome {
    let target = target.coord();
    let Some(&tail) = path.last() else {
        path.push(target);
        return ArrivalOutcome::Appended { gap_m: 0.0 };
    };

    let gap_m = planar_distance(tail, target);
    let mut routed = None;

    if gap_m > config.arrival_route_threshold_m {
        match backend.route(tail, target).await {
            Ok(route) => {
                let route_m = polyline_length(&route);
                let limit = config.arrival_ratio * gap_m + config.arrival_slack_m;
                if route_m <= limit {
                    debug!("Arrival bridge {:.0}m over a {:.0}m gap", route_m, gap_m);
                    extend_dedup(path, route);
                    routed = Some(route_m);
                } else {
                    warn!(
                        "Arrival bridge discarded: {:.0}m route exceeds {:.0}m limit",
                        route_m, limit
                    );
                }
            }
            Err(failure) => warn!("Arrival bridge failed: {}", failure),
        }
    }

    let remaining = path.last().map_or(0.0, |&c| planar_distance(c, target));
    if remaining > config.arrival_min_gap_m && remaining <= config.arrival_route_threshold_m {
        path.push(target);
        return match routed {
            Some(route_m) => ArrivalOutcome::Routed { route_m },
            None => ArrivalOutcome::Appended { gap_m: remaining },
        };
    }

    match routed {
        Some(route_m) => ArrivalOutcome::Routed { route_m },
        None if remaining <= config.arrival_min_gap_m => ArrivalOutcome::AlreadyArrived,
        None => ArrivalOutcome::Unreached { gap_m: remaining },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{EngineResult, Failure, LocatedEdge, ViaLocation};
    use crate::request::MatchRequest;
    use crate::resolver::Strategy;
    use crate::segments::SegmentRole;
    use crate::Engine;

    struct RouteOnly(Option<Vec<Coord<f64>>>);

    impl RoutingBackend for RouteOnly {
        async fn match_trace(&self, _request: &MatchRequest) -> EngineResult {
            Err(Failure::NotApplicable)
        }
        async fn route(&self, _from: Coord<f64>, _to: Coord<f64>) -> EngineResult {
            self.0.clone().ok_or(Failure::NoMatch)
        }
        async fn trace_route(&self, _samples: &[Sample]) -> EngineResult {
            Err(Failure::NotApplicable)
        }
        async fn locate(&self, _coord: Coord<f64>) -> std::result::Result<Vec<LocatedEdge>, Failure> {
            Err(Failure::NotApplicable)
        }
        async fn route_via(&self, _locations: &[ViaLocation]) -> EngineResult {
            Err(Failure::NotApplicable)
        }
    }

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    fn resolved(index: usize, coords: Vec<Coord<f64>>) -> ResolvedSegment {
        ResolvedSegment {
            index,
            engine: Engine::Osrm,
            role: SegmentRole::Normal,
            strategy: Strategy::RawPassthrough,
            coords,
            attempts: Vec::new(),
        }
    }

    #[test]
    fn test_stitch_drops_boundary_duplicates() {
        let path = stitch_segments(&[
            resolved(0, vec![c(0.0, 0.0), c(0.0, 1.0)]),
            resolved(1, vec![c(0.0, 1.0), c(0.0, 2.0), c(0.0, 2.0)]),
            resolved(2, vec![c(0.0, 2.0), c(0.0, 3.0)]),
        ]);
        assert_eq!(path, vec![c(0.0, 0.0), c(0.0, 1.0), c(0.0, 2.0), c(0.0, 3.0)]);
        for w in path.windows(2) {
            assert_ne!(w[0], w[1]);
        }
    }

    fn run(path: &mut ResolvedPath, target: Sample, backend: &RouteOnly) -> ArrivalOutcome {
        futures::executor::block_on(correct_arrival(path, &target, backend, &StitchConfig::default()))
    }

    #[test]
    fn test_small_gap_appends_target() {
        // ~11m short of the target
        let mut path = vec![c(0.0, 0.0), c(0.0, 0.001)];
        let outcome = run(&mut path, Sample::new(0.0, 0.0011, 0), &RouteOnly(None));
        assert!(matches!(outcome, ArrivalOutcome::Appended { .. }));
        assert_eq!(path.last(), Some(&c(0.0, 0.0011)));
    }

    #[test]
    fn test_tiny_gap_left_alone() {
        let mut path = vec![c(0.0, 0.0), c(0.0, 0.001)];
        let outcome = run(&mut path, Sample::new(0.0, 0.00101, 0), &RouteOnly(None));
        assert_eq!(outcome, ArrivalOutcome::AlreadyArrived);
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn test_large_gap_routed() {
        // 111m gap bridged by a 2-leg route of about 133m
        let mut path = vec![c(0.0, 0.0), c(0.0, 0.001)];
        let route = vec![c(0.0, 0.001), c(0.0001, 0.0015), c(0.0, 0.002)];
        let outcome = run(&mut path, Sample::new(0.0, 0.002, 0), &RouteOnly(Some(route)));
        assert!(matches!(outcome, ArrivalOutcome::Routed { .. }));
        assert_eq!(path.len(), 4);
        assert_eq!(path.last(), Some(&c(0.0, 0.002)));
    }

    #[test]
    fn test_detour_discarded() {
        // 111m gap, route of about 2.3km
        let mut path = vec![c(0.0, 0.0), c(0.0, 0.001)];
        let route = vec![c(0.0, 0.001), c(0.01, 0.001), c(0.01, 0.002), c(0.0, 0.002)];
        let outcome = run(&mut path, Sample::new(0.0, 0.002, 0), &RouteOnly(Some(route)));
        assert!(matches!(outcome, ArrivalOutcome::Unreached { .. }));
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn test_route_ending_near_target_gets_append() {
        // Route stops ~11m short; the remainder is appended
        let mut path = vec![c(0.0, 0.0)];
        let route = vec![c(0.0, 0.0), c(0.0, 0.0009)];
        let outcome = run(&mut path, Sample::new(0.0, 0.001, 0), &RouteOnly(Some(route)));
        assert!(matches!(outcome, ArrivalOutcome::Routed { .. }));
        assert_eq!(path, vec![c(0.0, 0.0), c(0.0, 0.0009), c(0.0, 0.001)]);
    }
}
