//! HTTP client for the OSRM and Valhalla engines.
//!
//! - One pooled reqwest client shared by every call
//! - Per-operation timeouts (short for locate, long for match and via routes)
//! - Retry with exponential backoff on 429 and on connection errors
//!
//! Every failure is mapped to a [`Failure`] and returned; nothing here
//! aborts a run.

use crate::backend::{
    parse_locate_response, parse_match_response, parse_route_response,
    parse_trace_route_response, parse_trip_response, EngineResult, Failure, LocatedEdge,
    RoutingBackend, ViaLocation,
};
use crate::request::{locate_body, route_body, route_url, trace_route_body, MatchRequest};
use crate::{Result, Sample, StitchConfig, TraceStitchError};
use geo::Coord;
use log::{debug, warn};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};

const MAX_RETRIES: u32 = 3;
const MAX_IDLE_PER_HOST: usize = 8;

/// reqwest-backed [`RoutingBackend`].
pub struct EngineClient {
    client: Client,
    osrm_host: String,
    valhalla_host: String,
    locate_radius_m: f64,
    locate_timeout: Duration,
    route_timeout: Duration,
    match_timeout: Duration,
    via_route_timeout: Duration,
}

impl EngineClient {
    /// Create a client for the hosts and timeouts in `config`.
    pub fn new(config: &StitchConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| TraceStitchError::HttpError {
                message: format!("Failed to create HTTP client: {}", e),
                status_code: None,
            })?;

        Ok(Self {
            client,
            osrm_host: config.osrm_host.trim_end_matches('/').to_string(),
            valhalla_host: config.valhalla_host.trim_end_matches('/').to_string(),
            locate_radius_m: config.locate_radius_m,
            locate_timeout: config.locate_timeout(),
            route_timeout: config.route_timeout(),
            match_timeout: config.match_timeout(),
            via_route_timeout: config.via_route_timeout(),
        })
    }

    async fn get_json(&self, url: &str, timeout: Duration) -> std::result::Result<Value, Failure> {
        self.send_json(|| self.client.get(url).timeout(timeout), url)
            .await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
    ) -> std::result::Result<Value, Failure> {
        self.send_json(|| self.client.post(url).json(body).timeout(timeout), url)
            .await
    }

    /// Send a request built by `build`, retrying 429s and connection errors.
    async fn send_json<F>(&self, build: F, url: &str) -> std::result::Result<Value, Failure>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let started = Instant::now();

        loop {
            match build().send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        retries += 1;
                        if retries > MAX_RETRIES {
                            return Err(Failure::Status(status.as_u16()));
                        }
                        let wait = Duration::from_millis(500 * (1 << retries.min(3)));
                        warn!("[Engine] 429 from {}, retry {} after {:?}", url, retries, wait);
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    if !status.is_success() {
                        return Err(Failure::Status(status.as_u16()));
                    }

                    let bytes = resp.bytes().await.map_err(map_reqwest_error)?;
                    let body: Value = serde_json::from_slice(&bytes)
                        .map_err(|e| Failure::Malformed(e.to_string()))?;

                    debug!(
                        "[Engine] {} -> {} bytes in {:?}",
                        url,
                        bytes.len(),
                        started.elapsed()
                    );
                    return Ok(body);
                }
                Err(e) if e.is_connect() && retries < MAX_RETRIES => {
                    retries += 1;
                    let wait = Duration::from_millis(200 * (1 << retries));
                    warn!("[Engine] {}: {}, retry {} after {:?}", url, e, retries, wait);
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(map_reqwest_error(e)),
            }
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> Failure {
    if e.is_timeout() {
        Failure::Timeout
    } else if let Some(status) = e.status() {
        Failure::Status(status.as_u16())
    } else {
        Failure::Transport(e.to_string())
    }
}

impl RoutingBackend for EngineClient {
    async fn match_trace(&self, request: &MatchRequest) -> EngineResult {
        if request.len() < 2 {
            return Err(Failure::TooFewPoints);
        }
        let url = request.url(&self.osrm_host);
        let body = self.get_json(&url, self.match_timeout).await?;
        parse_match_response(&body)
    }

    async fn route(&self, from: Coord<f64>, to: Coord<f64>) -> EngineResult {
        let url = route_url(&self.osrm_host, from, to);
        let body = self.get_json(&url, self.route_timeout).await?;
        parse_route_response(&body)
    }

    async fn trace_route(&self, samples: &[Sample]) -> EngineResult {
        if samples.len() < 2 {
            return Err(Failure::TooFewPoints);
        }
        let url = format!("{}/trace_route", self.valhalla_host);
        let body = self
            .post_json(&url, &trace_route_body(samples), self.match_timeout)
            .await?;
        parse_trace_route_response(&body)
    }

    async fn locate(&self, coord: Coord<f64>) -> std::result::Result<Vec<LocatedEdge>, Failure> {
        let url = format!("{}/locate", self.valhalla_host);
        let body = self
            .post_json(&url, &locate_body(coord, self.locate_radius_m), self.locate_timeout)
            .await?;
        parse_locate_response(&body)
    }

    async fn route_via(&self, locations: &[ViaLocation]) -> EngineResult {
        if locations.len() < 2 {
            return Err(Failure::TooFewPoints);
        }
        let url = format!("{}/route", self.valhalla_host);
        let body = self
            .post_json(
                &url,
                &route_body(locations, self.locate_radius_m),
                self.via_route_timeout,
            )
            .await?;
        parse_trip_response(&body)
    }
}
