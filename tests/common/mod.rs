//! In-memory routing engine shared by the integration tests.

#![allow(dead_code)]

use geo::Coord;
use std::sync::Mutex;
use std::time::Duration;
use trace_stitch::{
    EngineResult, Failure, LocatedEdge, MatchRequest, RoutingBackend, Sample, ViaLocation,
};

/// Echoes its inputs back as geometry unless told to fail.
#[derive(Default)]
pub struct FakeEngine {
    pub fail_match: bool,
    pub fail_route: bool,
    pub fail_trace_route: bool,
    /// Drop this many points from the end of every match result
    pub truncate_match: usize,
    /// Sleep per request, in ms, keyed off the first coordinate's latitude
    pub slow_below_lat: Option<f64>,
    /// Longitudes at or above this locate onto a footway
    pub footway_from_lon: Option<f64>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub fn failing() -> Self {
        Self {
            fail_match: true,
            fail_route: true,
            fail_trace_route: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

impl RoutingBackend for FakeEngine {
    async fn match_trace(&self, request: &MatchRequest) -> EngineResult {
        self.record(&format!("match:{}", request.gaps.as_str()));
        if let (Some(limit), Some(first)) = (self.slow_below_lat, request.coordinates.first()) {
            if first.y < limit {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
        if self.fail_match {
            return Err(Failure::NoMatch);
        }
        let keep = request.coordinates.len().saturating_sub(self.truncate_match);
        Ok(request.coordinates[..keep].to_vec())
    }

    async fn route(&self, from: Coord<f64>, to: Coord<f64>) -> EngineResult {
        self.record("route");
        if self.fail_route {
            return Err(Failure::Transport("connection refused".to_string()));
        }
        Ok(vec![from, to])
    }

    async fn trace_route(&self, samples: &[Sample]) -> EngineResult {
        self.record("trace_route");
        if self.fail_trace_route {
            return Err(Failure::Status(400));
        }
        Ok(samples.iter().map(Sample::coord).collect())
    }

    async fn locate(&self, coord: Coord<f64>) -> Result<Vec<LocatedEdge>, Failure> {
        self.record("locate");
        let footway = self.footway_from_lon.is_some_and(|lon| coord.x >= lon);
        Ok(vec![LocatedEdge {
            road_class: "residential".to_string(),
            use_: if footway { "footway" } else { "road" }.to_string(),
            distance: 2.0,
        }])
    }

    async fn route_via(&self, locations: &[ViaLocation]) -> EngineResult {
        self.record("route_via");
        if self.fail_route {
            return Err(Failure::Status(503));
        }
        Ok(locations.iter().map(|l| l.coord).collect())
    }
}

/// Samples along a meridian, `spacing_deg` apart, with the given timestamps.
pub fn meridian(timestamps: &[i64], spacing_deg: f64) -> Vec<Sample> {
    timestamps
        .iter()
        .enumerate()
        .map(|(i, &t)| Sample::new(0.0, i as f64 * spacing_deg, t))
        .collect()
}
