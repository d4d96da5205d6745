//! Public search entry points used by the planner UI.

use crate::address::AddressClient;
use crate::assemble::assemble;
use crate::config::SearchConfig;
use crate::elevation::ElevationFetcher;
use crate::error::SearchError;
use crate::features::FeatureClient;
use crate::queue::RequestQueue;
use hunt_core::models::{AddressMatch, GeoPoint, SearchResult, SearchZone};
use reqwest::Client;

/// Owns one client per provider, all sharing the same [`RequestQueue`].
#[derive(Debug, Clone)]
pub struct SearchService {
    queue: RequestQueue,
    features: FeatureClient,
    elevations: ElevationFetcher,
    addresses: AddressClient,
}

impl SearchService {
    /// Build the service around an existing queue, so other callers can
    /// share the same rate limit.
    pub fn new(config: &SearchConfig, queue: RequestQueue) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            features: FeatureClient::new(client.clone(), queue.clone(), config),
            elevations: ElevationFetcher::new(client.clone(), queue.clone(), config),
            addresses: AddressClient::new(client, queue.clone(), config),
            queue,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        let queue = RequestQueue::new(config.queue_max_concurrent, config.queue_min_spacing());
        Self::new(config, queue)
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    /// Named features within `radius_km` of `path`, nearest first.
    ///
    /// An empty path or an unusable radius is an empty result. Errors are
    /// reserved for a feature lookup that could not be performed.
    pub async fn search_locations_near_path(
        &self,
        path: &[GeoPoint],
        radius_km: f64,
        zone: Option<&SearchZone>,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let path: Vec<GeoPoint> = path.iter().copied().filter(GeoPoint::is_finite).collect();
        if path.is_empty() || !radius_km.is_finite() || radius_km < 0.0 {
            return Ok(Vec::new());
        }

        let raw = self.features.search_features(&path, radius_km).await?;
        let found = raw.len();
        let results = assemble(raw, &path, radius_km, zone, &self.elevations).await;
        tracing::info!(
            points = path.len(),
            radius_km,
            found,
            kept = results.len(),
            "Path search finished"
        );
        Ok(results)
    }

    pub async fn search_address(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<AddressMatch>, SearchError> {
        self.addresses.search_address(query, limit).await
    }
}
