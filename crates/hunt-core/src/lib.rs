//! Hunt Core - models and geometry shared by hunt path searches.

pub mod models;
pub mod spatial;

pub use models::{
    AddressMatch, ElevationSample, FeatureKind, GeoPoint, RawFeature, SearchResult, SearchZone,
};
pub use spatial::{
    distance_point_to_segment, distance_to_path, great_circle_midpoint, haversine_distance,
    point_in_polygon, PathBounds,
};
