//! Search configuration from environment.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub overpass_url: String,
    pub overpass_timeout_s: u64,
    pub overpass_max_elements: usize,
    pub elevation_url: String,
    /// Forward geocoding endpoint. Address search fails while this is empty.
    pub geocoder_url: String,
    pub queue_max_concurrent: usize,
    pub queue_min_spacing_ms: u64,
    pub request_timeout_s: u64,
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            overpass_url: "https://overpass-api.de/api/interpreter".to_string(),
            overpass_timeout_s: 25,
            overpass_max_elements: 500,
            elevation_url: "https://api.open-elevation.com/api/v1/lookup".to_string(),
            geocoder_url: String::new(),
            queue_max_concurrent: 2,
            queue_min_spacing_ms: 250,
            request_timeout_s: 30,
            user_agent: concat!("hunt-search/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl SearchConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            overpass_url: env::var("HUNT_OVERPASS_URL").unwrap_or(defaults.overpass_url),
            overpass_timeout_s: env::var("HUNT_OVERPASS_TIMEOUT_S")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.overpass_timeout_s),
            overpass_max_elements: env::var("HUNT_OVERPASS_MAX_ELEMENTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.overpass_max_elements),
            elevation_url: env::var("HUNT_ELEVATION_URL").unwrap_or(defaults.elevation_url),
            geocoder_url: env::var("HUNT_GEOCODER_URL").unwrap_or(defaults.geocoder_url),
            queue_max_concurrent: env::var("HUNT_QUEUE_MAX_CONCURRENT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.queue_max_concurrent),
            queue_min_spacing_ms: env::var("HUNT_QUEUE_MIN_SPACING_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.queue_min_spacing_ms),
            request_timeout_s: env::var("HUNT_REQUEST_TIMEOUT_S")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.request_timeout_s),
            user_agent: env::var("HUNT_USER_AGENT").unwrap_or(defaults.user_agent),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_s.max(1))
    }

    pub fn queue_min_spacing(&self) -> Duration {
        Duration::from_millis(self.queue_min_spacing_ms)
    }
}
