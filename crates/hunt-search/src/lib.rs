//! Hunt Search - rate-limited discovery of named places around a drawn path.
//!
//! Features come from an Overpass endpoint, elevation from an
//! Open-Elevation compatible endpoint, and address matches from a
//! forward geocoder. Every outbound call passes through one shared
//! [`RequestQueue`].

pub mod address;
pub mod assemble;
pub mod config;
pub mod elevation;
pub mod error;
pub mod features;
pub mod queue;
pub mod service;

pub use config::SearchConfig;
pub use error::SearchError;
pub use hunt_core::models::{AddressMatch, GeoPoint, SearchResult, SearchZone};
pub use hunt_core::spatial::{distance_point_to_segment, great_circle_midpoint, haversine_distance};
pub use queue::RequestQueue;
pub use service::SearchService;
