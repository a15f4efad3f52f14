//! # Segment Resolution
//!
//! Turns each [`Segment`] into coordinates by walking an ordered list of
//! strategies until one produces a non-empty path:
//!
//! | Strategy | Applies to | Operation |
//! |----------|------------|-----------|
//! | [`Strategy::TraceRoute`] | secondary engine segments | snap on Valhalla |
//! | [`Strategy::MapMatch`] | normal segments | OSRM match with a gap policy |
//! | [`Strategy::DirectBridge`] | all | OSRM route first -> last, length checked outside fence runs |
//! | [`Strategy::RawPassthrough`] | all | the simplified samples themselves |
//!
//! Normal segments try `MapMatch` twice: first with the configured policy,
//! then with [`GapPolicy::Split`]. Gap bridges skip matching entirely.
//! Raw passthrough cannot fail for a segment of 2 or more samples, so every
//! segment resolves.
//!
//! Segments are independent. [`resolve_segments`] runs up to
//! `max_concurrent_segments` at a time and returns results in segment order.

use crate::backend::{EngineResult, Failure, RoutingBackend};
use crate::geo_utils::{planar_distance, polyline_length};
use crate::request::{GapPolicy, MatchRequest};
use crate::segments::{Segment, SegmentRole};
use crate::simplify::simplify_for_matching;
use crate::{Engine, Sample, StitchConfig};
use futures::stream::{self, StreamExt};
use geo::Coord;
use log::{debug, info, warn};
use std::fmt;

/// One step of the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    TraceRoute,
    MapMatch(GapPolicy),
    DirectBridge,
    RawPassthrough,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::TraceRoute => write!(f, "trace_route"),
            Strategy::MapMatch(gaps) => write!(f, "match(gaps={})", gaps.as_str()),
            Strategy::DirectBridge => write!(f, "bridge"),
            Strategy::RawPassthrough => write!(f, "raw"),
        }
    }
}

/// Outcome of resolving one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSegment {
    /// Position of the segment in the trace
    pub index: usize,
    pub engine: Engine,
    pub role: SegmentRole,
    /// Strategy that produced `coords`
    pub strategy: Strategy,
    pub coords: Vec<Coord<f64>>,
    /// Strategies that were tried and failed, in order
    pub attempts: Vec<(Strategy, Failure)>,
}

impl ResolvedSegment {
    /// Whether the segment fell through to its own raw coordinates.
    pub fn is_passthrough(&self) -> bool {
        self.strategy == Strategy::RawPassthrough
    }
}

/// Runs the fallback chain for segments against a backend.
pub struct SegmentResolver<'a, B: RoutingBackend> {
    backend: &'a B,
    config: &'a StitchConfig,
}

impl<'a, B: RoutingBackend> SegmentResolver<'a, B> {
    pub fn new(backend: &'a B, config: &'a StitchConfig) -> Self {
        Self { backend, config }
    }

    /// Ordered strategies for a segment.
    pub fn strategies_for(&self, segment: &Segment) -> Vec<Strategy> {
        match segment.role {
            SegmentRole::GapBridge => vec![Strategy::DirectBridge, Strategy::RawPassthrough],
            SegmentRole::Normal => {
                let mut chain = Vec::with_capacity(5);
                if segment.engine == Engine::Valhalla {
                    chain.push(Strategy::TraceRoute);
                }
                chain.push(Strategy::MapMatch(self.config.gap_policy));
                if self.config.gap_policy != GapPolicy::Split {
                    chain.push(Strategy::MapMatch(GapPolicy::Split));
                }
                chain.push(Strategy::DirectBridge);
                chain.push(Strategy::RawPassthrough);
                chain
            }
        }
    }

    /// Resolve a single segment.
    pub async fn resolve(&self, index: usize, segment: &Segment) -> ResolvedSegment {
        let simplified = match segment.role {
            SegmentRole::Normal => simplify_for_matching(&segment.samples, self.config),
            SegmentRole::GapBridge => segment.samples.clone(),
        };
        // Built once; match retries only swap the gap policy
        let request = match segment.role {
            SegmentRole::Normal => Some(MatchRequest::build(
                &simplified,
                self.config,
                self.config.gap_policy,
            )),
            SegmentRole::GapBridge => None,
        };

        let mut attempts = Vec::new();
        for strategy in self.strategies_for(segment) {
            match self
                .attempt(strategy, segment, &simplified, request.as_ref())
                .await
            {
                Ok(coords) => {
                    debug!(
                        "[Segment {}] {} {} points -> {} coords via {}",
                        index,
                        segment.engine,
                        simplified.len(),
                        coords.len(),
                        strategy
                    );
                    return ResolvedSegment {
                        index,
                        engine: segment.engine,
                        role: segment.role,
                        strategy,
                        coords,
                        attempts,
                    };
                }
                Err(failure) => {
                    warn!("[Segment {}] {} failed: {}", index, strategy, failure);
                    attempts.push((strategy, failure));
                }
            }
        }

        // Only reachable for segments under 2 samples
        ResolvedSegment {
            index,
            engine: segment.engine,
            role: segment.role,
            strategy: Strategy::RawPassthrough,
            coords: simplified.iter().map(Sample::coord).collect(),
            attempts,
        }
    }

    async fn attempt(
        &self,
        strategy: Strategy,
        segment: &Segment,
        simplified: &[Sample],
        request: Option<&MatchRequest>,
    ) -> EngineResult {
        if simplified.len() < 2 {
            return Err(Failure::TooFewPoints);
        }

        let coords = match strategy {
            Strategy::TraceRoute => {
                if segment.engine != Engine::Valhalla {
                    return Err(Failure::NotApplicable);
                }
                self.backend.trace_route(simplified).await?
            }
            Strategy::MapMatch(gaps) => {
                let request = request.ok_or(Failure::NotApplicable)?;
                self.backend.match_trace(&request.with_gaps(gaps)).await?
            }
            Strategy::DirectBridge => self.bridge(simplified).await?,
            Strategy::RawPassthrough => simplified.iter().map(Sample::coord).collect(),
        };

        if coords.is_empty() {
            Err(Failure::NoMatch)
        } else {
            Ok(coords)
        }
    }

    /// Route first -> last, rejecting detours over the configured ratio.
    async fn bridge(&self, simplified: &[Sample]) -> EngineResult {
        let (Some(first), Some(last)) = (simplified.first(), simplified.last()) else {
            return Err(Failure::TooFewPoints);
        };
        let (from, to) = (first.coord(), last.coord());

        let route = self.backend.route(from, to).await?;
        let route_m = polyline_length(&route);
        let direct_m = planar_distance(from, to);

        if let Some(ratio) = self.config.bridge_ratio_limit() {
            if direct_m > 0.0 && route_m > ratio * direct_m {
                return Err(Failure::BridgeRejected { route_m, direct_m });
            }
        }
        Ok(route)
    }
}

/// Resolve every segment, preserving segment order in the output.
pub async fn resolve_segments<B: RoutingBackend>(
    backend: &B,
    config: &StitchConfig,
    segments: &[Segment],
) -> Vec<ResolvedSegment> {
    let resolver = SegmentResolver::new(backend, config);
    let concurrency = config.max_concurrent_segments.max(1);

    let resolved: Vec<ResolvedSegment> = stream::iter(segments.iter().enumerate())
        .map(|(index, segment)| resolver.resolve(index, segment))
        .buffered(concurrency)
        .collect()
        .await;

    let passthrough = resolved.iter().filter(|r| r.is_passthrough()).count();
    info!(
        "Resolved {} segments ({} raw passthrough, concurrency {})",
        resolved.len(),
        passthrough,
        concurrency
    );
    resolved
}
