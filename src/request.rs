//! # Engine Requests
//!
//! Builds the outgoing requests for both engines:
//!
//! | Builder | Engine | Endpoint |
//! |---------|--------|----------|
//! | [`MatchRequest::url`] | OSRM | `GET /match/v1/driving/{coords}` |
//! | [`route_url`] | OSRM | `GET /route/v1/driving/{a};{b}` |
//! | [`trace_route_body`] | Valhalla | `POST /trace_route` |
//! | [`locate_body`] | Valhalla | `POST /locate` |
//! | [`route_body`] | Valhalla | `POST /route` |
//!
//! Everything here is pure: building a request never touches the network.

use crate::backend::ViaLocation;
use crate::geo_utils::{initial_bearing, planar_distance};
use crate::{Sample, StitchConfig};
use geo::Coord;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Write;

/// Road class window applied to every Valhalla location.
const MIN_ROAD_CLASS: &str = "residential";
const MAX_ROAD_CLASS: &str = "motorway";

/// How the primary engine treats breaks inside a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapPolicy {
    /// Match the trace as one piece
    #[default]
    Ignore,
    /// Allow the engine to emit several disjoint matchings
    Split,
}

impl GapPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapPolicy::Ignore => "ignore",
            GapPolicy::Split => "split",
        }
    }
}

// =============================================================================
// OSRM
// =============================================================================

/// A map-matching request for one simplified segment.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRequest {
    pub coordinates: Vec<Coord<f64>>,
    pub timestamps: Vec<i64>,
    /// Search radius per point, in meters
    pub radiuses: Vec<u32>,
    /// (bearing, tolerance) per point; endpoints are unconstrained
    pub bearings: Vec<Option<(u16, u16)>>,
    pub overview: String,
    pub gaps: GapPolicy,
}

impl MatchRequest {
    /// Build a request from simplified samples.
    ///
    /// Endpoints get the large radius and no bearing. An interior point gets
    /// the small radius unless it is at least `radius_spacing_threshold_m`
    /// from either neighbour, and a bearing from its previous to its next
    /// neighbour.
    pub fn build(samples: &[Sample], config: &StitchConfig, gaps: GapPolicy) -> Self {
        let coordinates: Vec<Coord<f64>> = samples.iter().map(|s| s.coord()).collect();
        let timestamps = samples.iter().map(|s| s.timestamp).collect();
        let n = coordinates.len();

        let mut radiuses = Vec::with_capacity(n);
        let mut bearings = Vec::with_capacity(n);
        for i in 0..n {
            if i == 0 || i == n - 1 {
                radiuses.push(config.radius_large_m);
                bearings.push(None);
                continue;
            }

            let (prev, here, next) = (coordinates[i - 1], coordinates[i], coordinates[i + 1]);
            let spacing = planar_distance(prev, here).max(planar_distance(here, next));
            radiuses.push(if spacing < config.radius_spacing_threshold_m {
                config.radius_small_m
            } else {
                config.radius_large_m
            });
            bearings.push(Some((initial_bearing(prev, next), config.bearing_tolerance_deg)));
        }

        Self {
            coordinates,
            timestamps,
            radiuses,
            bearings,
            overview: config.overview.clone(),
            gaps,
        }
    }

    /// Same request with a different gap policy.
    pub fn with_gaps(&self, gaps: GapPolicy) -> Self {
        Self {
            gaps,
            ..self.clone()
        }
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// Full `GET` URL against `host`.
    pub fn url(&self, host: &str) -> String {
        let timestamps = join(self.timestamps.iter().map(|t| t.to_string()));
        let radiuses = join(self.radiuses.iter().map(|r| r.to_string()));
        let bearings = join(self.bearings.iter().map(|b| match b {
            Some((bearing, tolerance)) => format!("{},{}", bearing, tolerance),
            None => String::new(),
        }));

        format!(
            "{}/match/v1/driving/{}?geometries=geojson&overview={}&gaps={}&timestamps={}&radiuses={}&bearings={}&tidy=true",
            host.trim_end_matches('/'),
            coordinate_list(&self.coordinates),
            self.overview,
            self.gaps.as_str(),
            timestamps,
            radiuses,
            bearings
        )
    }
}

/// Direct route URL between two coordinates.
pub fn route_url(host: &str, from: Coord<f64>, to: Coord<f64>) -> String {
    format!(
        "{}/route/v1/driving/{}?geometries=geojson&overview=full&continue_straight=true",
        host.trim_end_matches('/'),
        coordinate_list(&[from, to])
    )
}

/// `lon,lat;lon,lat;...`
fn coordinate_list(coords: &[Coord<f64>]) -> String {
    let mut out = String::with_capacity(coords.len() * 24);
    for (i, c) in coords.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        let _ = write!(out, "{},{}", c.x, c.y);
    }
    out
}

fn join(parts: impl Iterator<Item = String>) -> String {
    parts.collect::<Vec<_>>().join(";")
}

// =============================================================================
// Valhalla
// =============================================================================

/// Snap-mode trace request with timestamps.
pub fn trace_route_body(samples: &[Sample]) -> Value {
    let shape: Vec<Value> = samples
        .iter()
        .map(|s| json!({ "lat": s.latitude, "lon": s.longitude, "time": s.timestamp }))
        .collect();

    json!({
        "shape": shape,
        "costing": "auto",
        "shape_match": "map_snap",
        "use_timestamps": true,
        "format": "geojson",
    })
}

fn search_filter() -> Value {
    json!({ "min_road_class": MIN_ROAD_CLASS, "max_road_class": MAX_ROAD_CLASS })
}

/// Nearest-edge lookup for a single point.
pub fn locate_body(coord: Coord<f64>, radius_m: f64) -> Value {
    json!({
        "locations": [{
            "lat": coord.y,
            "lon": coord.x,
            "radius": radius_m,
            "search_filter": search_filter(),
        }]
    })
}

/// Multi-waypoint route through explicit break/through locations.
pub fn route_body(locations: &[ViaLocation], radius_m: f64) -> Value {
    let locations: Vec<Value> = locations
        .iter()
        .map(|loc| {
            json!({
                "lon": loc.coord.x,
                "lat": loc.coord.y,
                "type": loc.kind.as_str(),
                "radius": radius_m,
                "search_filter": search_filter(),
            })
        })
        .collect();

    json!({
        "locations": locations,
        "costing": "auto",
        "directions_options": { "units": "kilometers" },
        "alternates": 0,
        "filters": { "attributes": ["shape"] },
    })
}
