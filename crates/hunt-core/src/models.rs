//! Core data models for hunt path searches.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Tag keys that carry a display name, most preferred first.
pub const NAME_TAG_KEYS: [&str; 3] = ["name", "name:en", "official_name"];

/// Tag keys checked in order when picking a feature's type label.
/// Settlement and landscape keys win over generic category keys.
pub const TYPE_TAG_PRIORITY: [&str; 13] = [
    "place",
    "natural",
    "historic",
    "tourism",
    "amenity",
    "leisure",
    "shop",
    "building",
    "landuse",
    "waterway",
    "highway",
    "railway",
    "man_made",
];

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    /// True when both components are within `tolerance_deg` of `other`.
    pub fn approx_eq(&self, other: &GeoPoint, tolerance_deg: f64) -> bool {
        (self.lat - other.lat).abs() <= tolerance_deg && (self.lon - other.lon).abs() <= tolerance_deg
    }
}

/// Explicit search area supplied by the caller, usually a buffer
/// precomputed around the drawn path.
///
/// Built either directly from a ring or from untyped GeoJSON with
/// [`SearchZone::from_geojson`], which never fails: shapes it cannot use
/// become [`SearchZone::Unsupported`] and contain no points.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchZone {
    /// A bare coordinate ring, closed (first == last) or not.
    Ring(Vec<GeoPoint>),
    /// GeoJSON `Polygon`: outer ring first, holes after.
    Polygon { rings: Vec<Vec<GeoPoint>> },
    /// GeoJSON `Feature`; the geometry may be absent.
    Feature { geometry: Option<Box<SearchZone>> },
    /// Any other geometry type, identified by its `type` member.
    Unsupported(String),
}

impl SearchZone {
    pub fn ring(points: Vec<GeoPoint>) -> Self {
        Self::Ring(points)
    }

    pub fn from_geojson(value: &Value) -> Self {
        match value {
            Value::Array(positions) => Self::Ring(parse_ring(positions)),
            Value::Object(map) => match map.get("type").and_then(Value::as_str) {
                Some("Polygon") => {
                    let rings = map
                        .get("coordinates")
                        .and_then(Value::as_array)
                        .map(|rings| {
                            rings
                                .iter()
                                .map(|ring| ring.as_array().map(|p| parse_ring(p)).unwrap_or_default())
                                .collect()
                        })
                        .unwrap_or_default();
                    Self::Polygon { rings }
                }
                Some("Feature") => {
                    let geometry = map
                        .get("geometry")
                        .filter(|geometry| !geometry.is_null())
                        .map(|geometry| Box::new(Self::from_geojson(geometry)));
                    Self::Feature { geometry }
                }
                Some(other) => Self::Unsupported(other.to_string()),
                None => Self::Unsupported("untyped".to_string()),
            },
            Value::Null => Self::Unsupported("null".to_string()),
            _ => Self::Unsupported("scalar".to_string()),
        }
    }

    /// The ring used for containment tests, if this zone has one.
    pub fn outer_ring(&self) -> Option<&[GeoPoint]> {
        match self {
            Self::Ring(points) => Some(points.as_slice()),
            Self::Polygon { rings } => rings.first().map(Vec::as_slice),
            Self::Feature { geometry } => geometry.as_deref().and_then(Self::outer_ring),
            Self::Unsupported(_) => None,
        }
    }
}

fn parse_ring(positions: &[Value]) -> Vec<GeoPoint> {
    positions.iter().filter_map(parse_position).collect()
}

/// GeoJSON positions are `[lon, lat]`; `{ "lat", "lon" }` objects are accepted too.
fn parse_position(value: &Value) -> Option<GeoPoint> {
    match value {
        Value::Array(items) => {
            let lon = items.first()?.as_f64()?;
            let lat = items.get(1)?.as_f64()?;
            Some(GeoPoint::new(lat, lon))
        }
        Value::Object(map) => {
            let lat = map.get("lat")?.as_f64()?;
            let lon = map.get("lon")?.as_f64()?;
            Some(GeoPoint::new(lat, lon))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Node,
    Way,
}

/// A named feature as returned by the feature-lookup provider, before
/// distance filtering and elevation enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFeature {
    pub provider_id: String,
    pub kind: FeatureKind,
    /// Node position, or the provider-computed center for ways.
    pub coordinates: GeoPoint,
    pub name: String,
    pub tags: BTreeMap<String, String>,
}

impl RawFeature {
    /// Resolve the `(key, value)` tag that describes what this feature is.
    ///
    /// Keys from [`TYPE_TAG_PRIORITY`] are tried in order; otherwise the
    /// first tag key that is not name-like is used.
    pub fn type_tag(&self) -> Option<(&str, &str)> {
        TYPE_TAG_PRIORITY
            .iter()
            .find_map(|key| self.tags.get_key_value(*key))
            .or_else(|| self.tags.iter().find(|(key, _)| !is_name_key(key)))
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// Name-like keys never describe a feature's type.
pub fn is_name_key(key: &str) -> bool {
    key == "name" || key.starts_with("name:") || key.ends_with("_name")
}

/// Elevation returned by the provider for one coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationSample {
    pub coordinates: GeoPoint,
    /// `None` when the provider has no data for this coordinate.
    pub elevation_m: Option<f64>,
}

/// One entry of a path search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub name: String,
    pub secondary_label: Option<String>,
    pub coordinates: GeoPoint,
    pub distance_km: f64,
    pub elevation_m: Option<f64>,
    pub type_tag: Option<String>,
}

/// One forward-geocoding hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressMatch {
    pub main: String,
    pub secondary: Option<String>,
    pub coordinates: GeoPoint,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(tags: &[(&str, &str)]) -> RawFeature {
        RawFeature {
            provider_id: "node/1".to_string(),
            kind: FeatureKind::Node,
            coordinates: GeoPoint::new(45.0, 6.0),
            name: "Test".to_string(),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn type_tag_prefers_place_over_category_keys() {
        let f = feature(&[("name", "Lac Blanc"), ("amenity", "parking"), ("place", "hamlet")]);
        assert_eq!(f.type_tag(), Some(("place", "hamlet")));
    }

    #[test]
    fn type_tag_falls_back_to_first_non_name_key() {
        let f = feature(&[("name", "Refuge"), ("alt_name", "Hut"), ("ele", "2352"), ("operator", "CAF")]);
        assert_eq!(f.type_tag(), Some(("ele", "2352")));
    }

    #[test]
    fn type_tag_is_none_for_name_only_features() {
        let f = feature(&[("name", "Somewhere"), ("name:en", "Somewhere")]);
        assert_eq!(f.type_tag(), None);
    }

    #[test]
    fn geojson_polygon_uses_lon_lat_order() {
        let zone = SearchZone::from_geojson(&json!({
            "type": "Polygon",
            "coordinates": [[[2.0, 48.0], [3.0, 48.0], [3.0, 49.0], [2.0, 48.0]]]
        }));
        let ring = zone.outer_ring().expect("ring");
        assert_eq!(ring.len(), 4);
        assert_eq!(ring[1], GeoPoint::new(48.0, 3.0));
    }

    #[test]
    fn geojson_feature_without_geometry_has_no_ring() {
        let zone = SearchZone::from_geojson(&json!({ "type": "Feature", "geometry": null }));
        assert_eq!(zone, SearchZone::Feature { geometry: None });
        assert!(zone.outer_ring().is_none());
    }

    #[test]
    fn unknown_geometry_is_unsupported() {
        let zone = SearchZone::from_geojson(&json!({ "type": "LineString", "coordinates": [] }));
        assert_eq!(zone, SearchZone::Unsupported("LineString".to_string()));
        assert_eq!(SearchZone::from_geojson(&Value::Null).outer_ring(), None);
    }

    #[test]
    fn search_result_serializes_camel_case() {
        let result = SearchResult {
            name: "Col".to_string(),
            secondary_label: None,
            coordinates: GeoPoint::new(1.0, 2.0),
            distance_km: 0.5,
            elevation_m: Some(1200.0),
            type_tag: Some("natural".to_string()),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["distanceKm"], json!(0.5));
        assert_eq!(value["elevationM"], json!(1200.0));
        assert!(value.get("secondaryLabel").is_some());
    }
}
