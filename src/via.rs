//! # Waypoint Routing
//!
//! Builds a route on the secondary engine that follows a recorded trace
//! through a handful of validated via points instead of map-matching every
//! sample:
//!
//! 1. Pick up to `max_vias` evenly spaced interior samples
//! 2. Keep only those that `locate` places on a drivable road
//! 3. Route `break -> through... -> break` and decode the leg shapes
//! 4. Spread the trace's time span over the resulting coordinates
//!
//! The result can be written as GeoJSON or as a nested track document that
//! [`crate::normalize_points`] reads back.

use crate::backend::{Failure, LocatedEdge, LocationKind, RoutingBackend, ViaLocation};
use crate::{Result, Sample, StitchConfig, TraceStitchError};
use futures::stream::{self, StreamExt};
use geo::Coord;
use log::{debug, info, warn};
use serde_json::{json, Value};

/// Road classes a via point may sit on.
pub const ALLOWED_ROAD_CLASSES: &[&str] = &[
    "motorway",
    "trunk",
    "primary",
    "secondary",
    "tertiary",
    "unclassified",
    "residential",
];

/// Edge uses that disqualify a via point.
pub const DISALLOWED_USES: &[&str] = &[
    "driveway",
    "parking_aisle",
    "footway",
    "path",
    "steps",
    "pedestrian",
    "alley",
];

/// Evenly spaced interior samples, at most `max_vias`, in trace order.
pub fn sample_vias(samples: &[Sample], max_vias: usize) -> Vec<Sample> {
    let n = samples.len();
    if n <= 2 || max_vias == 0 {
        return Vec::new();
    }

    let interior = n - 2;
    if interior <= max_vias {
        return samples[1..n - 1].to_vec();
    }

    let step = interior as f64 / (max_vias + 1) as f64;
    let mut picks: Vec<usize> = (0..max_vias)
        .map(|i| 1 + ((step * (i as f64 + 0.5)).round() as usize).min(interior - 1))
        .collect();
    picks.dedup();
    picks.into_iter().map(|i| samples[i]).collect()
}

/// Whether the nearest edge is a drivable road within `max_distance_m`.
pub fn is_valid_road(edges: &[LocatedEdge], max_distance_m: f64) -> bool {
    let Some(best) = edges
        .iter()
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
    else {
        return false;
    };

    best.distance <= max_distance_m
        && ALLOWED_ROAD_CLASSES.contains(&best.road_class.as_str())
        && !DISALLOWED_USES.contains(&best.use_.as_str())
}

/// `count` millisecond timestamps spread linearly over the samples' span.
///
/// Only recorded times count; counter timestamps are ignored. With no
/// recorded time at all every output timestamp is 0.
pub fn interpolate_timestamps_ms(samples: &[Sample], count: usize) -> Vec<i64> {
    let recorded = || samples.iter().filter(|s| !s.synthetic_time).map(|s| s.timestamp);
    let (Some(t0), Some(t1)) = (recorded().min(), recorded().max()) else {
        return vec![0; count];
    };

    let (t0_ms, t1_ms) = (t0.saturating_mul(1000), t1.saturating_mul(1000));
    match count {
        0 => Vec::new(),
        1 => vec![t0_ms],
        _ => {
            let (start, span) = (i128::from(t0_ms), i128::from(t1_ms) - i128::from(t0_ms));
            let last = (count - 1) as i128;
            // Every value lies in [t0_ms, t1_ms], so narrowing back is exact
            (0..count as i128)
                .map(|i| (start + span * i / last) as i64)
                .collect()
        }
    }
}

/// Route through validated waypoints with synthesized timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct ViaRoute {
    pub coords: Vec<Coord<f64>>,
    pub timestamps_ms: Vec<i64>,
    /// Locations sent to the engine, endpoints included
    pub waypoint_count: usize,
}

impl ViaRoute {
    pub fn to_geojson(&self) -> Value {
        let coordinates: Vec<[f64; 2]> = self.coords.iter().map(|c| [c.x, c.y]).collect();
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": { "source": "valhalla", "waypoint_count": self.waypoint_count },
                "geometry": { "type": "LineString", "coordinates": coordinates },
            }]
        })
    }

    /// `{"track": {"route": [[ts_ms, lat, lon], ...]}}`
    pub fn to_track_document(&self) -> Value {
        let rows: Vec<Value> = self
            .coords
            .iter()
            .zip(&self.timestamps_ms)
            .map(|(c, ts)| json!([ts, c.y, c.x]))
            .collect();
        json!({ "track": { "route": rows } })
    }
}

/// Build a [`ViaRoute`] for `samples`, in the order given.
///
/// Via candidates whose locate call fails are skipped. A failing route call
/// is an error: there is nothing to fall back to.
pub async fn build_via_route<B: RoutingBackend>(
    backend: &B,
    samples: &[Sample],
    config: &StitchConfig,
) -> Result<ViaRoute> {
    if samples.len() < 2 {
        return Err(TraceStitchError::InsufficientPoints {
            point_count: samples.len(),
            minimum_required: 2,
        });
    }
    let (start, end) = (samples[0], samples[samples.len() - 1]);

    let candidates = sample_vias(samples, config.max_vias);
    let checked: Vec<Option<Coord<f64>>> = stream::iter(candidates)
        .map(|via| async move {
            let coord = via.coord();
            match backend.locate(coord).await {
                Ok(edges) if is_valid_road(&edges, config.locate_radius_m) => Some(coord),
                Ok(_) => {
                    debug!("Via {:.6},{:.6} not on a drivable road", coord.x, coord.y);
                    None
                }
                Err(failure) => {
                    warn!("Locate failed for {:.6},{:.6}: {}", coord.x, coord.y, failure);
                    None
                }
            }
        })
        .buffered(config.max_concurrent_segments.max(1))
        .collect()
        .await;
    let vias: Vec<Coord<f64>> = checked.into_iter().flatten().collect();

    let mut locations = Vec::with_capacity(vias.len() + 2);
    locations.push(ViaLocation::new(start.coord(), LocationKind::Break));
    locations.extend(vias.iter().map(|&c| ViaLocation::new(c, LocationKind::Through)));
    locations.push(ViaLocation::new(end.coord(), LocationKind::Break));

    let coords = backend
        .route_via(&locations)
        .await
        .map_err(|failure| TraceStitchError::HttpError {
            status_code: match failure {
                Failure::Status(code) => Some(code),
                _ => None,
            },
            message: format!("via route: {}", failure),
        })?;

    let timestamps_ms = interpolate_timestamps_ms(samples, coords.len());
    info!(
        "Via route: {} of {} candidates kept, {} coords",
        vias.len(),
        config.max_vias.min(samples.len().saturating_sub(2)),
        coords.len()
    );

    Ok(ViaRoute {
        coords,
        timestamps_ms,
        waypoint_count: locations.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(road_class: &str, use_: &str, distance: f64) -> LocatedEdge {
        LocatedEdge {
            road_class: road_class.to_string(),
            use_: use_.to_string(),
            distance,
        }
    }

    fn line(n: usize) -> Vec<Sample> {
        (0..n).map(|i| Sample::new(0.0, i as f64 * 0.001, i as i64)).collect()
    }

    #[test]
    fn test_sample_vias_small_trace_uses_all_interior() {
        let samples = line(5);
        assert_eq!(sample_vias(&samples, 10), samples[1..4].to_vec());
        assert!(sample_vias(&samples[..2], 10).is_empty());
        assert!(sample_vias(&samples, 0).is_empty());
    }

    #[test]
    fn test_sample_vias_spreads_picks() {
        let samples = line(102);
        let vias = sample_vias(&samples, 10);
        assert_eq!(vias.len(), 10);
        assert!(vias.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert!(vias[0].timestamp > 0);
        assert!(vias[9].timestamp < 101);
    }

    #[test]
    fn test_is_valid_road() {
        assert!(is_valid_road(&[edge("primary", "road", 3.0)], 25.0));
        assert!(!is_valid_road(&[edge("service_other", "road", 3.0)], 25.0));
        assert!(!is_valid_road(&[edge("residential", "driveway", 3.0)], 25.0));
        assert!(!is_valid_road(&[edge("primary", "road", 40.0)], 25.0));
        assert!(!is_valid_road(&[], 25.0));
        // Only the nearest edge counts
        assert!(!is_valid_road(
            &[edge("primary", "road", 10.0), edge("residential", "footway", 2.0)],
            25.0
        ));
    }

    #[test]
    fn test_interpolate_timestamps() {
        let samples = vec![Sample::new(0.0, 0.0, 10), Sample::new(0.0, 1.0, 12)];
        assert_eq!(interpolate_timestamps_ms(&samples, 5), vec![10_000, 10_500, 11_000, 11_500, 12_000]);
        assert_eq!(interpolate_timestamps_ms(&samples, 1), vec![10_000]);
        assert!(interpolate_timestamps_ms(&samples, 0).is_empty());
        assert_eq!(interpolate_timestamps_ms(&[], 2), vec![0, 0]);
    }

    #[test]
    fn test_interpolate_ignores_counter_timestamps() {
        let untimed = vec![Sample::untimed(0.0, 0.0, 0), Sample::untimed(0.0, 1.0, 1)];
        assert_eq!(interpolate_timestamps_ms(&untimed, 3), vec![0, 0, 0]);

        let mixed = vec![
            Sample::new(0.0, 0.0, 100),
            Sample::untimed(0.0, 0.5, 101),
            Sample::new(0.0, 1.0, 102),
            Sample::untimed(0.0, 1.5, 103),
        ];
        assert_eq!(interpolate_timestamps_ms(&mixed, 3), vec![100_000, 101_000, 102_000]);
    }

    #[test]
    fn test_interpolate_extreme_times_do_not_overflow() {
        let samples = vec![Sample::new(0.0, 0.0, i64::MIN / 10), Sample::new(0.0, 1.0, i64::MAX / 10)];
        let ts = interpolate_timestamps_ms(&samples, 4);
        assert_eq!(ts.first(), Some(&i64::MIN));
        assert_eq!(ts.last(), Some(&i64::MAX));
        assert!(ts.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_track_document_reads_back() {
        let route = ViaRoute {
            coords: vec![Coord { x: -46.6, y: -23.5 }, Coord { x: -46.7, y: -23.6 }],
            timestamps_ms: vec![1_700_000_000_000, 1_700_000_010_000],
            waypoint_count: 2,
        };
        let doc = route.to_track_document();
        assert_eq!(doc["track"]["route"][0][1], -23.5);

        let samples = crate::normalize_points(&doc);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], Sample::new(-46.6, -23.5, 1_700_000_000));
        assert_eq!(samples[1].timestamp, 1_700_000_010);

        let gj = route.to_geojson();
        assert_eq!(gj["features"][0]["properties"]["source"], "valhalla");
        assert_eq!(gj["features"][0]["properties"]["waypoint_count"], 2);
    }
}
