//! Batched elevation lookups with split-on-413 retries.

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::queue::RequestQueue;
use futures::future::{BoxFuture, FutureExt};
use hunt_core::models::{ElevationSample, GeoPoint};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Deepest recursion allowed when halving a batch the provider rejected as too large.
pub const MAX_SPLIT_DEPTH: u32 = 5;

/// Returned samples match a requested coordinate within this many degrees.
pub const COORDINATE_TOLERANCE_DEG: f64 = 1e-6;

/// Open-Elevation lookup body: `{"locations": [{"latitude", "longitude"}, ...]}`.
/// The provider rejects a bare array, so the list is wrapped.
#[derive(Debug, Serialize)]
struct ElevationRequest {
    locations: Vec<Location>,
}

#[derive(Debug, Serialize)]
struct Location {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ElevationResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
    elevation: Option<f64>,
}

enum BatchOutcome {
    Samples(Vec<ElevationSample>),
    TooLarge,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ElevationFetcher {
    client: Client,
    queue: RequestQueue,
    url: String,
    request_timeout: Duration,
}

impl ElevationFetcher {
    pub fn new(client: Client, queue: RequestQueue, config: &SearchConfig) -> Self {
        Self {
            client,
            queue,
            url: config.elevation_url.clone(),
            request_timeout: config.request_timeout(),
        }
    }

    /// Request elevation for every coordinate in a single batch.
    ///
    /// Missing elevation is never an error: failed batches contribute no
    /// samples and callers see `None` for the affected coordinates.
    pub async fn fetch_elevations(&self, coordinates: &[GeoPoint]) -> Vec<ElevationSample> {
        if coordinates.is_empty() {
            return Vec::new();
        }
        self.fetch_batch(coordinates, 0).await
    }

    /// Fetch one batch, halving it on HTTP 413 while `depth` is below
    /// [`MAX_SPLIT_DEPTH`]. Halves are requested left then right.
    pub fn fetch_batch<'a>(
        &'a self,
        coordinates: &'a [GeoPoint],
        depth: u32,
    ) -> BoxFuture<'a, Vec<ElevationSample>> {
        async move {
            match self.request_batch(coordinates).await {
                BatchOutcome::Samples(samples) => samples,
                BatchOutcome::TooLarge => {
                    if depth >= MAX_SPLIT_DEPTH || coordinates.len() < 2 {
                        tracing::warn!(
                            depth,
                            batch = coordinates.len(),
                            "Elevation batch still too large, giving up on it"
                        );
                        return Vec::new();
                    }
                    let (left, right) = coordinates.split_at(coordinates.len() / 2);
                    tracing::debug!(
                        depth,
                        left = left.len(),
                        right = right.len(),
                        "Elevation payload too large, splitting batch"
                    );
                    let mut samples = self.fetch_batch(left, depth + 1).await;
                    samples.extend(self.fetch_batch(right, depth + 1).await);
                    samples
                }
                BatchOutcome::Failed(reason) => {
                    tracing::warn!(
                        batch = coordinates.len(),
                        "Elevation fetch failed, continuing without elevation: {}",
                        reason
                    );
                    Vec::new()
                }
            }
        }
        .boxed()
    }

    async fn request_batch(&self, coordinates: &[GeoPoint]) -> BatchOutcome {
        let request = ElevationRequest {
            locations: coordinates
                .iter()
                .map(|point| Location {
                    latitude: point.lat,
                    longitude: point.lon,
                })
                .collect(),
        };
        let client = self.client.clone();
        let url = self.url.clone();
        let timeout = self.request_timeout;

        let outcome = self
            .queue
            .enqueue(move || async move {
                let response = client
                    .post(&url)
                    .timeout(timeout)
                    .json(&request)
                    .send()
                    .await?;
                let status = response.status();
                if status == StatusCode::PAYLOAD_TOO_LARGE {
                    return Ok(BatchOutcome::TooLarge);
                }
                if !status.is_success() {
                    return Ok(BatchOutcome::Failed(format!("elevation provider HTTP {status}")));
                }
                let body = response.text().await?;
                Ok::<_, SearchError>(BatchOutcome::Samples(parse_elevation_document(&body)))
            })
            .await;

        outcome.unwrap_or_else(|err| BatchOutcome::Failed(err.to_string()))
    }
}

/// Parse `{ "results": [{ latitude, longitude, elevation }] }`.
///
/// Results without usable coordinates are dropped; a missing or
/// non-finite elevation is kept as `None`.
pub fn parse_elevation_document(body: &str) -> Vec<ElevationSample> {
    let document: Value = match serde_json::from_str(body) {
        Ok(document) => document,
        Err(err) => {
            tracing::warn!("Elevation provider returned malformed document: {}", err);
            return Vec::new();
        }
    };
    let Some(results) = document.get("results").and_then(Value::as_array) else {
        tracing::warn!("Elevation provider document has no results array");
        return Vec::new();
    };

    results
        .iter()
        .filter_map(|result| serde_json::from_value::<ElevationResult>(result.clone()).ok())
        .filter_map(|result| {
            let coordinates = GeoPoint::new(result.latitude?, result.longitude?);
            if !coordinates.is_finite() {
                return None;
            }
            Some(ElevationSample {
                coordinates,
                elevation_m: result.elevation.filter(|value| value.is_finite()),
            })
        })
        .collect()
}

/// Elevation for `point` from the first matching sample that has one.
pub fn elevation_for(point: &GeoPoint, samples: &[ElevationSample]) -> Option<f64> {
    samples
        .iter()
        .filter(|sample| sample.coordinates.approx_eq(point, COORDINATE_TOLERANCE_DEG))
        .find_map(|sample| sample.elevation_m)
}
