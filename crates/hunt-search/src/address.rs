//! Forward geocoding for the address search box.

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::queue::RequestQueue;
use hunt_core::models::{AddressMatch, GeoPoint};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_ADDRESS_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeocodeHit {
    full_text: String,
    kind: Option<String>,
    lat: f64,
    lon: f64,
}

#[derive(Debug, Clone)]
pub struct AddressClient {
    client: Client,
    queue: RequestQueue,
    url: String,
    request_timeout: Duration,
}

impl AddressClient {
    pub fn new(client: Client, queue: RequestQueue, config: &SearchConfig) -> Self {
        Self {
            client,
            queue,
            url: config.geocoder_url.trim().to_string(),
            request_timeout: config.request_timeout(),
        }
    }

    /// Resolve a free-text query to ranked matches.
    ///
    /// A blank query returns no matches without touching the network.
    /// Every failure is reported as [`SearchError::AddressSearch`].
    pub async fn search_address(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<AddressMatch>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        if self.url.is_empty() {
            return Err(SearchError::address_search(SearchError::Config(
                "geocoder URL is empty".to_string(),
            )));
        }
        let limit = limit.unwrap_or(DEFAULT_ADDRESS_LIMIT).max(1);

        let client = self.client.clone();
        let url = self.url.clone();
        let timeout = self.request_timeout;
        let params = [("q", query.to_string()), ("limit", limit.to_string())];
        let body = self
            .queue
            .enqueue(move || async move {
                let response = client
                    .get(&url)
                    .query(&params)
                    .timeout(timeout)
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(SearchError::Status(status));
                }
                Ok::<_, SearchError>(response.text().await?)
            })
            .await
            .map_err(SearchError::address_search)?;

        let matches = parse_geocode_document(&body);
        tracing::debug!(query, count = matches.len(), "Address search finished");
        Ok(matches)
    }
}

/// Map `{ "results": [...] }` hits to address matches.
///
/// A body without a `results` array has no matches. Hits that cannot be
/// decoded are skipped.
pub fn parse_geocode_document(body: &str) -> Vec<AddressMatch> {
    let Ok(document) = serde_json::from_str::<Value>(body) else {
        tracing::warn!("Geocoder returned malformed document");
        return Vec::new();
    };
    let Some(results) = document.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };

    results
        .iter()
        .filter_map(|hit| serde_json::from_value::<GeocodeHit>(hit.clone()).ok())
        .filter(|hit| hit.lat.is_finite() && hit.lon.is_finite())
        .map(|hit| AddressMatch {
            main: hit.full_text,
            secondary: hit.kind.clone(),
            coordinates: GeoPoint::new(hit.lat, hit.lon),
            kind: hit.kind,
        })
        .collect()
}
