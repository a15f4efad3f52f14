//! # Routing Backend
//!
//! The seam between the pipeline and the two engines. Every engine operation
//! returns an [`EngineResult`]: either coordinates or an inspectable
//! [`Failure`]. Failures never abort a run; the resolver chain consumes them.
//!
//! The response parsers are plain functions over `serde_json::Value` so they
//! can be tested without a server.

use crate::request::MatchRequest;
use crate::Sample;
use geo::Coord;
use serde_json::Value;
use std::fmt;

/// Why an engine operation produced no geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// Connection or protocol error
    Transport(String),
    /// The per-call timeout elapsed
    Timeout,
    /// Non-success HTTP status
    Status(u16),
    /// Body was not the expected JSON shape
    Malformed(String),
    /// Valid response without any geometry
    NoMatch,
    /// Bridge route was implausibly long compared to the straight line
    BridgeRejected { route_m: f64, direct_m: f64 },
    /// Segment too short for the operation
    TooFewPoints,
    /// Strategy does not apply to this segment
    NotApplicable,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Transport(msg) => write!(f, "transport error: {}", msg),
            Failure::Timeout => write!(f, "timed out"),
            Failure::Status(code) => write!(f, "HTTP status {}", code),
            Failure::Malformed(msg) => write!(f, "malformed response: {}", msg),
            Failure::NoMatch => write!(f, "no geometry returned"),
            Failure::BridgeRejected { route_m, direct_m } => write!(
                f,
                "bridge rejected: route {:.0}m vs direct {:.0}m",
                route_m, direct_m
            ),
            Failure::TooFewPoints => write!(f, "too few points"),
            Failure::NotApplicable => write!(f, "not applicable"),
        }
    }
}

impl std::error::Error for Failure {}

/// Coordinates produced by an engine operation, or why there are none.
pub type EngineResult = std::result::Result<Vec<Coord<f64>>, Failure>;

/// Waypoint role in a multi-location route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    /// Stop: the route starts a new leg here
    Break,
    /// Pass-through: shapes the route without splitting it
    Through,
}

impl LocationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationKind::Break => "break",
            LocationKind::Through => "through",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViaLocation {
    pub coord: Coord<f64>,
    pub kind: LocationKind,
}

impl ViaLocation {
    pub fn new(coord: Coord<f64>, kind: LocationKind) -> Self {
        Self { coord, kind }
    }
}

/// Nearest road edge reported by a locate call.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedEdge {
    pub road_class: String,
    pub use_: String,
    /// Distance from the query point, meters
    pub distance: f64,
}

/// Engine operations the pipeline depends on.
///
/// Implemented over HTTP by [`crate::EngineClient`]; tests substitute an
/// in-memory fake.
#[allow(async_fn_in_trait)]
pub trait RoutingBackend {
    /// Map-match a segment on the primary engine.
    async fn match_trace(&self, request: &MatchRequest) -> EngineResult;

    /// Direct route between two points on the primary engine.
    async fn route(&self, from: Coord<f64>, to: Coord<f64>) -> EngineResult;

    /// Snap a timestamped trace on the secondary engine.
    async fn trace_route(&self, samples: &[Sample]) -> EngineResult;

    /// Candidate edges near a point on the secondary engine.
    async fn locate(&self, coord: Coord<f64>) -> std::result::Result<Vec<LocatedEdge>, Failure>;

    /// Route through explicit waypoints on the secondary engine.
    async fn route_via(&self, locations: &[ViaLocation]) -> EngineResult;
}

// =============================================================================
// Response Parsing
// =============================================================================

/// Read a GeoJSON-style `[[lon, lat], ...]` array.
fn coordinate_array(value: &Value) -> std::result::Result<Vec<Coord<f64>>, Failure> {
    let points = value
        .as_array()
        .ok_or_else(|| Failure::Malformed("coordinates is not an array".to_string()))?;

    points
        .iter()
        .map(|p| match (p.get(0).and_then(Value::as_f64), p.get(1).and_then(Value::as_f64)) {
            (Some(x), Some(y)) => Ok(Coord { x, y }),
            _ => Err(Failure::Malformed(format!("bad coordinate {}", p))),
        })
        .collect()
}

fn non_empty(coords: Vec<Coord<f64>>) -> EngineResult {
    if coords.is_empty() {
        Err(Failure::NoMatch)
    } else {
        Ok(coords)
    }
}

/// OSRM `/match`: concatenate every matching's geometry in order.
pub fn parse_match_response(body: &Value) -> EngineResult {
    let Some(matchings) = body.get("matchings").and_then(Value::as_array) else {
        return Err(Failure::NoMatch);
    };

    let mut coords = Vec::new();
    for matching in matchings {
        let geometry = &matching["geometry"];
        if geometry["type"].as_str() != Some("LineString") {
            continue;
        }
        coords.extend(coordinate_array(&geometry["coordinates"])?);
    }
    non_empty(coords)
}

/// OSRM `/route`: geometry of the first route.
pub fn parse_route_response(body: &Value) -> EngineResult {
    let Some(route) = body.get("routes").and_then(|r| r.get(0)) else {
        return Err(Failure::NoMatch);
    };
    non_empty(coordinate_array(&route["geometry"]["coordinates"])?)
}

/// Valhalla `/trace_route` with `format=geojson`: every LineString feature.
pub fn parse_trace_route_response(body: &Value) -> EngineResult {
    let Some(features) = body.get("features").and_then(Value::as_array) else {
        return Err(Failure::NoMatch);
    };

    let mut coords = Vec::new();
    for feature in features {
        let geometry = &feature["geometry"];
        if geometry["type"].as_str() == Some("LineString") {
            coords.extend(coordinate_array(&geometry["coordinates"])?);
        }
    }
    non_empty(coords)
}

/// Valhalla `/locate`: edges of the first location.
///
/// Accepts both the array form (`[{"edges": [...]}]`) and the object form
/// (`{"locations": [{"correlation": {"edges": [...]}}]}`). Edges without a
/// distance sort last.
pub fn parse_locate_response(body: &Value) -> std::result::Result<Vec<LocatedEdge>, Failure> {
    let edges = if let Some(first) = body.as_array().and_then(|a| a.first()) {
        &first["edges"]
    } else {
        &body["locations"][0]["correlation"]["edges"]
    };

    if edges.is_null() {
        return Ok(Vec::new());
    }
    let edges = edges
        .as_array()
        .ok_or_else(|| Failure::Malformed("edges is not an array".to_string()))?;

    let text = |edge: &Value, key: &str| -> String {
        edge.get(key)
            .or_else(|| edge["edge"].get(key))
            .or_else(|| {
                if key == "road_class" {
                    edge["edge"].get("classification")
                } else {
                    None
                }
            })
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Ok(edges
        .iter()
        .map(|edge| LocatedEdge {
            road_class: text(edge, "road_class"),
            use_: text(edge, "use"),
            distance: edge
                .get("distance")
                .and_then(Value::as_f64)
                .unwrap_or(f64::INFINITY),
        })
        .collect())
}

/// Valhalla `/route`: decode every leg's polyline6 shape, falling back to
/// the trip-level shape, and join legs without repeating the junction.
pub fn parse_trip_response(body: &Value) -> EngineResult {
    let trip = &body["trip"];

    let mut shapes: Vec<&str> = trip["legs"]
        .as_array()
        .map(|legs| {
            legs.iter()
                .filter_map(|leg| leg["shape"].as_str())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if shapes.is_empty() {
        if let Some(shape) = trip["shape"].as_str().filter(|s| !s.is_empty()) {
            shapes.push(shape);
        }
    }
    if shapes.is_empty() {
        return Err(Failure::NoMatch);
    }

    let mut coords: Vec<Coord<f64>> = Vec::new();
    for shape in shapes {
        let line = polyline::decode_polyline(shape, 6)
            .map_err(|e| Failure::Malformed(format!("polyline6: {}", e)))?;
        let mut points = line.0.into_iter().peekable();
        if coords.last() == points.peek() {
            points.next();
        }
        coords.extend(points);
    }
    non_empty(coords)
}
