//! Pipeline configuration.
//!
//! Every host, tolerance and threshold lives in [`StitchConfig`] and is
//! passed down explicitly. A JSON file may override any subset of fields.

use crate::fence::Fence;
use crate::request::GapPolicy;
use crate::{Result, TraceStitchError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Search radius presets used by the two pipeline variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadiusProfile {
    /// Tight radii for fence-routed traces (12m / 18m)
    Fenced,
    /// Loose radii for gap-segmented traces (30m / 50m)
    Gapped,
}

impl RadiusProfile {
    /// (small, large) radius in meters.
    pub fn radii(&self) -> (u32, u32) {
        match self {
            RadiusProfile::Fenced => (12, 18),
            RadiusProfile::Gapped => (30, 50),
        }
    }
}

/// Configuration for trace reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    /// Primary engine base URL (map matching, direct routes).
    /// Default: http://127.0.0.1:5001
    pub osrm_host: String,

    /// Secondary engine base URL (trace_route, locate, waypoint route).
    /// Default: http://127.0.0.1:8002
    pub valhalla_host: String,

    /// Douglas-Peucker tolerance in degrees.
    /// Default: 0.00008 (~8-9 meters at the equator)
    pub dp_tolerance_deg: f64,

    /// Segments shorter than this are sent unsimplified.
    /// Default: 10
    pub min_points_to_simplify: usize,

    /// Consecutive samples closer than this are merged (meters).
    /// Default: 3.0
    pub dedup_epsilon_m: f64,

    /// Map-match `overview` parameter.
    /// Default: "full"
    pub overview: String,

    /// Gap policy for the first map-match attempt.
    /// Default: ignore (split is always used as the retry)
    pub gap_policy: GapPolicy,

    /// Search radius for well-sampled interior points (meters).
    pub radius_small_m: u32,

    /// Search radius for endpoints and sparse interior points (meters).
    pub radius_large_m: u32,

    /// Interior points with a neighbor farther than this get the large radius.
    /// Default: 30.0 meters
    pub radius_spacing_threshold_m: f64,

    /// Tolerance paired with every interior bearing hint (degrees).
    /// Default: 90
    pub bearing_tolerance_deg: u16,

    /// Elapsed time that always counts as a gap (seconds).
    /// Default: 15.0
    pub max_dt_gap_s: f64,

    /// Minimum jump distance for a velocity gap (meters).
    /// Default: 120.0
    pub min_dist_gap_m: f64,

    /// Minimum implied speed for a velocity gap (m/s).
    /// Default: 33.0
    pub max_vel_gap_mps: f64,

    /// Consecutive gap flags required before a segment break.
    /// Default: 2
    pub gap_hysteresis: u32,

    /// Bridges longer than this multiple of the straight-line distance are rejected.
    /// Not applied to fence-routed runs unless they also split on gaps
    /// (see [`StitchConfig::bridge_ratio_limit`]).
    /// Default: 5.0
    pub bridge_max_ratio: f64,

    /// Tail gaps above this are routed instead of appended (meters).
    /// Default: 30.0
    pub arrival_route_threshold_m: f64,

    /// Tail gaps at or below this are ignored (meters).
    /// Default: 2.0
    pub arrival_min_gap_m: f64,

    /// Arrival bridge may be at most `ratio * gap + slack` long.
    /// Default: 3.0
    pub arrival_ratio: f64,

    /// Default: 50.0 meters
    pub arrival_slack_m: f64,

    /// Apply corner-preserving smoothing to the stitched path.
    pub smooth: bool,

    /// Default: 1
    pub smooth_iterations: u32,

    /// Turns at or above this angle are never smoothed (degrees).
    /// Default: 35.0
    pub corner_angle_deg: f64,

    /// Re-sample the stitched path at a uniform step.
    pub densify: bool,

    /// Default: 5.0 meters
    pub densify_step_m: f64,

    /// Polygon routing its interior to the secondary engine. None = single engine.
    pub fence: Option<Fence>,

    /// Break engine runs further wherever signal loss is detected.
    pub split_on_gaps: bool,

    /// Maximum via points for the waypoint route tool.
    /// Default: 10
    pub max_vias: usize,

    /// Search radius for via validation (meters).
    /// Default: 25.0
    pub locate_radius_m: f64,

    pub locate_timeout_secs: u64,
    pub route_timeout_secs: u64,
    pub match_timeout_secs: u64,
    pub via_route_timeout_secs: u64,

    /// Segments resolved at once. 1 reproduces strictly sequential resolution.
    pub max_concurrent_segments: usize,
}

impl Default for StitchConfig {
    fn default() -> Self {
        let (radius_small_m, radius_large_m) = RadiusProfile::Fenced.radii();
        Self {
            osrm_host: "http://127.0.0.1:5001".to_string(),
            valhalla_host: "http://127.0.0.1:8002".to_string(),
            dp_tolerance_deg: 0.00008,
            min_points_to_simplify: 10,
            dedup_epsilon_m: 3.0,
            overview: "full".to_string(),
            gap_policy: GapPolicy::Ignore,
            radius_small_m,
            radius_large_m,
            radius_spacing_threshold_m: 30.0,
            bearing_tolerance_deg: 90,
            max_dt_gap_s: 15.0,
            min_dist_gap_m: 120.0,
            max_vel_gap_mps: 33.0,
            gap_hysteresis: 2,
            bridge_max_ratio: 5.0,
            arrival_route_threshold_m: 30.0,
            arrival_min_gap_m: 2.0,
            arrival_ratio: 3.0,
            arrival_slack_m: 50.0,
            smooth: true,
            smooth_iterations: 1,
            corner_angle_deg: 35.0,
            densify: true,
            densify_step_m: 5.0,
            fence: None,
            split_on_gaps: false,
            max_vias: 10,
            locate_radius_m: 25.0,
            locate_timeout_secs: 8,
            route_timeout_secs: 30,
            match_timeout_secs: 60,
            via_route_timeout_secs: 90,
            max_concurrent_segments: 1,
        }
    }
}

impl StitchConfig {
    /// Fence-routed pipeline: inside the fence goes to the secondary engine.
    pub fn fenced(fence: Fence) -> Self {
        Self {
            fence: Some(fence),
            ..Self::default()
        }
        .with_radius_profile(RadiusProfile::Fenced)
    }

    /// Single-engine pipeline that segments on signal gaps.
    pub fn gapped() -> Self {
        Self {
            split_on_gaps: true,
            ..Self::default()
        }
        .with_radius_profile(RadiusProfile::Gapped)
    }

    /// Detour limit for direct bridges, if one applies.
    ///
    /// Fence-routed runs accept any bridge the engine returns; the gap and
    /// single-engine pipelines reject routes over `bridge_max_ratio`.
    pub fn bridge_ratio_limit(&self) -> Option<f64> {
        if self.fence.is_some() && !self.split_on_gaps {
            None
        } else {
            Some(self.bridge_max_ratio)
        }
    }

    pub fn with_radius_profile(mut self, profile: RadiusProfile) -> Self {
        let (small, large) = profile.radii();
        self.radius_small_m = small;
        self.radius_large_m = large;
        self
    }

    /// Load a (possibly partial) configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| TraceStitchError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: StitchConfig =
            serde_json::from_str(&text).map_err(|e| TraceStitchError::ConfigError {
                message: format!("{}: {}", path.display(), e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("dedup_epsilon_m", self.dedup_epsilon_m),
            ("densify_step_m", self.densify_step_m),
            ("bridge_max_ratio", self.bridge_max_ratio),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(TraceStitchError::ConfigError {
                    message: format!("{} must be positive, got {}", name, value),
                });
            }
        }
        if !(self.dp_tolerance_deg.is_finite() && self.dp_tolerance_deg >= 0.0) {
            return Err(TraceStitchError::ConfigError {
                message: format!("dp_tolerance_deg must be >= 0, got {}", self.dp_tolerance_deg),
            });
        }
        if self.radius_small_m > self.radius_large_m {
            return Err(TraceStitchError::ConfigError {
                message: format!(
                    "radius_small_m ({}) exceeds radius_large_m ({})",
                    self.radius_small_m, self.radius_large_m
                ),
            });
        }
        if self.max_concurrent_segments == 0 {
            return Err(TraceStitchError::ConfigError {
                message: "max_concurrent_segments must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn locate_timeout(&self) -> Duration {
        Duration::from_secs(self.locate_timeout_secs)
    }

    pub fn route_timeout(&self) -> Duration {
        Duration::from_secs(self.route_timeout_secs)
    }

    pub fn match_timeout(&self) -> Duration {
        Duration::from_secs(self.match_timeout_secs)
    }

    pub fn via_route_timeout(&self) -> Duration {
        Duration::from_secs(self.via_route_timeout_secs)
    }
}
