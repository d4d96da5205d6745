//! Named feature lookup around a path via the Overpass API.

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::queue::RequestQueue;
use hunt_core::models::{FeatureKind, GeoPoint, RawFeature, NAME_TAG_KEYS};
use hunt_core::spatial::PathBounds;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    kind: String,
    id: Option<i64>,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<OverpassCenter>,
    tags: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct OverpassCenter {
    lat: Option<f64>,
    lon: Option<f64>,
}

enum FeatureFetch {
    Body(String),
    Status(StatusCode),
}

/// Client for the feature-lookup provider. All requests go through the
/// shared [`RequestQueue`].
#[derive(Debug, Clone)]
pub struct FeatureClient {
    client: Client,
    queue: RequestQueue,
    url: String,
    overpass_timeout_s: u64,
    max_elements: usize,
    request_timeout: Duration,
}

impl FeatureClient {
    pub fn new(client: Client, queue: RequestQueue, config: &SearchConfig) -> Self {
        Self {
            client,
            queue,
            url: config.overpass_url.clone(),
            overpass_timeout_s: config.overpass_timeout_s.max(5),
            max_elements: config.overpass_max_elements.max(1),
            request_timeout: config.request_timeout(),
        }
    }

    /// Fetch named features inside the path's corridor box.
    ///
    /// Provider error statuses and unreadable documents yield an empty
    /// list. Only a request that could not be carried out at all is an
    /// error.
    pub async fn search_features(
        &self,
        path: &[GeoPoint],
        radius_km: f64,
    ) -> Result<Vec<RawFeature>, SearchError> {
        let Some(bounds) = PathBounds::from_points(path) else {
            return Ok(Vec::new());
        };
        let bounds = bounds.expand_by_km(radius_km);
        let query = build_overpass_query(&bounds, self.overpass_timeout_s, self.max_elements);

        let client = self.client.clone();
        let url = self.url.clone();
        let timeout = self.request_timeout;
        let fetched = self
            .queue
            .enqueue(move || async move {
                let response = client
                    .post(&url)
                    .header("Content-Type", "text/plain")
                    .timeout(timeout)
                    .body(query)
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    return Ok(FeatureFetch::Status(status));
                }
                Ok::<_, SearchError>(FeatureFetch::Body(response.text().await?))
            })
            .await?;

        match fetched {
            FeatureFetch::Status(status) => {
                tracing::warn!("Feature provider HTTP {}, returning no features", status);
                Ok(Vec::new())
            }
            FeatureFetch::Body(body) => {
                let features = parse_overpass_document(&body);
                tracing::debug!(count = features.len(), "Parsed feature provider response");
                Ok(features)
            }
        }
    }
}

/// Overpass QL for every named node and way inside `bounds`, ways
/// reported by their center.
pub fn build_overpass_query(bounds: &PathBounds, timeout_s: u64, max_elements: usize) -> String {
    let bbox = format!(
        "{:.6},{:.6},{:.6},{:.6}",
        bounds.min_lat, bounds.min_lon, bounds.max_lat, bounds.max_lon
    );
    format!(
        "[out:json][timeout:{timeout_s}];\n(\n  node[\"name\"]({bbox});\n  way[\"name\"]({bbox});\n);\nout center tags {max_elements};"
    )
}

/// Parse a provider document into features.
///
/// Never fails: a document that is not JSON or has no `elements` array
/// yields nothing, and elements that cannot be used are skipped.
pub fn parse_overpass_document(body: &str) -> Vec<RawFeature> {
    let document: Value = match serde_json::from_str(body) {
        Ok(document) => document,
        Err(err) => {
            tracing::warn!("Feature provider returned malformed document: {}", err);
            return Vec::new();
        }
    };
    let Some(elements) = document.get("elements").and_then(Value::as_array) else {
        tracing::warn!("Feature provider document has no elements array");
        return Vec::new();
    };

    elements
        .iter()
        .filter_map(|element| serde_json::from_value::<OverpassElement>(element.clone()).ok())
        .filter_map(to_raw_feature)
        .collect()
}

fn to_raw_feature(element: OverpassElement) -> Option<RawFeature> {
    let kind = match element.kind.as_str() {
        "node" => FeatureKind::Node,
        "way" => FeatureKind::Way,
        _ => return None,
    };
    let (lat, lon) = match kind {
        FeatureKind::Node => (element.lat, element.lon),
        FeatureKind::Way => {
            let center = element.center.as_ref()?;
            (center.lat, center.lon)
        }
    };
    let coordinates = GeoPoint::new(usable_coordinate(lat)?, usable_coordinate(lon)?);

    let tags: BTreeMap<String, String> = element
        .tags
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(text) => Some((key, text)),
            Value::Number(number) => Some((key, number.to_string())),
            Value::Bool(flag) => Some((key, flag.to_string())),
            _ => None,
        })
        .collect();

    let name = NAME_TAG_KEYS
        .iter()
        .find_map(|key| {
            tags.get(*key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        })?
        .to_string();

    let kind_label = match kind {
        FeatureKind::Node => "node",
        FeatureKind::Way => "way",
    };
    let provider_id = match element.id {
        Some(id) => format!("{kind_label}/{id}"),
        None => format!("{kind_label}/unknown"),
    };

    Some(RawFeature {
        provider_id,
        kind,
        coordinates,
        name,
        tags,
    })
}

// Absent, non-finite and exactly-zero components all count as missing.
fn usable_coordinate(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_nodes_and_way_centers() {
        let body = json!({
            "version": 0.6,
            "elements": [
                { "type": "node", "id": 1, "lat": 45.9, "lon": 6.8,
                  "tags": { "name": "Aiguille du Midi", "natural": "peak", "ele": 3842 } },
                { "type": "way", "id": 2, "center": { "lat": 45.92, "lon": 6.87 },
                  "tags": { "name": "Mer de Glace", "natural": "glacier" } }
            ]
        })
        .to_string();

        let features = parse_overpass_document(&body);
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].provider_id, "node/1");
        assert_eq!(features[0].tags.get("ele").map(String::as_str), Some("3842"));
        assert_eq!(features[1].kind, FeatureKind::Way);
        assert_eq!(features[1].coordinates, GeoPoint::new(45.92, 6.87));
    }

    #[test]
    fn skips_unusable_elements() {
        let body = json!({
            "elements": [
                { "type": "way", "id": 3, "tags": { "name": "No center" } },
                { "type": "node", "id": 4, "lat": 45.0, "lon": 6.0, "tags": { "natural": "peak" } },
                { "type": "node", "id": 5, "lon": 6.0, "tags": { "name": "No lat" } },
                { "type": "node", "id": 6, "lat": 45.0, "tags": { "name": "No lon" } },
                { "type": "node", "id": 7, "lat": 0.0, "lon": 6.0, "tags": { "name": "Zero lat" } },
                { "type": "node", "id": 8, "lat": "45.0", "lon": 6.0, "tags": { "name": "Text lat" } },
                { "type": "relation", "id": 9, "center": { "lat": 45.0, "lon": 6.0 }, "tags": { "name": "Relation" } },
                { "type": "node", "id": 10, "lat": 45.0, "lon": 6.0, "tags": { "name": "   " } },
                { "type": "node", "id": 11, "lat": 45.1, "lon": 6.1, "tags": { "name:en": "Kept" } }
            ]
        })
        .to_string();

        let features = parse_overpass_document(&body);
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].name, "Kept");
        assert_eq!(features[0].provider_id, "node/11");
    }

    #[test]
    fn malformed_documents_yield_no_features() {
        assert!(parse_overpass_document("").is_empty());
        assert!(parse_overpass_document("<osm><node/></osm>").is_empty());
        assert!(parse_overpass_document("[1, 2, 3]").is_empty());
        assert!(parse_overpass_document("{\"elements\": {\"type\": \"node\"}}").is_empty());
        assert!(parse_overpass_document("{\"remark\": \"runtime error\"}").is_empty());
    }

    #[test]
    fn query_is_scoped_to_bounds() {
        let bounds = PathBounds {
            min_lat: 45.0,
            max_lat: 46.0,
            min_lon: 6.0,
            max_lon: 7.0,
        };
        let query = build_overpass_query(&bounds, 25, 200);
        assert!(query.starts_with("[out:json][timeout:25];"));
        assert!(query.contains("node[\"name\"](45.000000,6.000000,46.000000,7.000000);"));
        assert!(query.contains("way[\"name\"](45.000000,6.000000,46.000000,7.000000);"));
        assert!(query.ends_with("out center tags 200;"));
    }
}
