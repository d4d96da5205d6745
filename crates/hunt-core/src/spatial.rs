//! Spatial math for path searches: distances, containment and corridors.

use crate::models::{GeoPoint, SearchZone};

/// Mean Earth radius used by every great-circle computation.
pub const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Calculate distance between two points in kilometers using the Haversine formula.
///
/// Symmetric in its arguments and exactly zero for identical points.
pub fn haversine_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let dphi = (b.lat - a.lat).to_radians();
    let dlambda = (b.lon - a.lon).to_radians();
    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Midpoint of the great-circle arc between two points.
pub fn great_circle_midpoint(a: &GeoPoint, b: &GeoPoint) -> GeoPoint {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let lambda1 = a.lon.to_radians();
    let dlambda = (b.lon - a.lon).to_radians();

    let bx = phi2.cos() * dlambda.cos();
    let by = phi2.cos() * dlambda.sin();
    let phi_m = (phi1.sin() + phi2.sin()).atan2(((phi1.cos() + bx).powi(2) + by * by).sqrt());
    let mut lambda_m = lambda1 + by.atan2(phi1.cos() + bx);
    lambda_m = (lambda_m + std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI)
        - std::f64::consts::PI;

    GeoPoint::new(phi_m.to_degrees(), lambda_m.to_degrees())
}

/// Approximate distance from a point to a segment, in kilometers.
///
/// Takes the smallest of the distances to both endpoints and to the
/// great-circle midpoint. This is not a projection onto the arc; result
/// ordering for search-sized radii and the distances shown to users both
/// depend on this exact approximation.
pub fn distance_point_to_segment(point: &GeoPoint, seg_start: &GeoPoint, seg_end: &GeoPoint) -> f64 {
    if seg_start == seg_end {
        return haversine_distance(point, seg_start);
    }
    let midpoint = great_circle_midpoint(seg_start, seg_end);
    haversine_distance(point, seg_start)
        .min(haversine_distance(point, seg_end))
        .min(haversine_distance(point, &midpoint))
}

/// Minimum distance from a point to any segment of a path, in kilometers.
///
/// A single-point path is a plain great-circle distance. An empty path
/// is infinitely far away.
pub fn distance_to_path(point: &GeoPoint, path: &[GeoPoint]) -> f64 {
    match path {
        [] => f64::INFINITY,
        [only] => haversine_distance(point, only),
        _ => path
            .windows(2)
            .map(|segment| distance_point_to_segment(point, &segment[0], &segment[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Check if a point is inside a search zone using even-odd ray casting.
///
/// Only the outer ring is considered. Zones without a ring (unsupported
/// geometry, feature without geometry) and rings with fewer than three
/// finite vertices contain nothing.
pub fn point_in_polygon(point: &GeoPoint, zone: &SearchZone) -> bool {
    let Some(ring) = zone.outer_ring() else {
        return false;
    };
    let vertices: Vec<&GeoPoint> = ring.iter().filter(|vertex| vertex.is_finite()).collect();
    if vertices.len() < 3 || !point.is_finite() {
        return false;
    }

    let lat = point.lat;
    let lon = point.lon;
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let yi = vertices[i].lat;
        let xi = vertices[i].lon;
        let yj = vertices[j].lat;
        let xj = vertices[j].lon;

        if ((yi > lat) != (yj > lat)) && (lon < (xj - xi) * (lat - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }

    inside
}

// ==== Degree/distance conversion ====

/// Meters per degree of latitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lat(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_132.954 - 559.822 * (2.0 * lat_rad).cos() + 1.175 * (4.0 * lat_rad).cos()
        - 0.0023 * (6.0 * lat_rad).cos()
}

/// Meters per degree of longitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lon(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_412.84 * lat_rad.cos() - 93.5 * (3.0 * lat_rad).cos() + 0.118 * (5.0 * lat_rad).cos()
}

/// Axis-aligned box in degrees covering a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl PathBounds {
    /// Box around every finite point, or `None` when there is none.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        let mut min_lat = f64::INFINITY;
        let mut max_lat = f64::NEG_INFINITY;
        let mut min_lon = f64::INFINITY;
        let mut max_lon = f64::NEG_INFINITY;
        for point in points.iter().filter(|point| point.is_finite()) {
            min_lat = min_lat.min(point.lat);
            max_lat = max_lat.max(point.lat);
            min_lon = min_lon.min(point.lon);
            max_lon = max_lon.max(point.lon);
        }
        if !min_lat.is_finite() || !min_lon.is_finite() {
            return None;
        }
        Some(Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    /// Grow the box by `radius_km` on every side.
    ///
    /// The longitude pad is scaled at the most poleward latitude of the
    /// box so the corridor is never narrower than the radius. Latitude
    /// clamps at the poles and longitude at ±180; the box does not wrap
    /// across the antimeridian.
    pub fn expand_by_km(&self, radius_km: f64) -> Self {
        let radius_m = if radius_km.is_finite() { radius_km.max(0.0) * 1000.0 } else { 0.0 };
        let ref_lat = self.min_lat.abs().max(self.max_lat.abs()).min(89.0);
        let pad_lat = radius_m / meters_per_deg_lat(ref_lat).max(1e-9);
        let pad_lon = radius_m / meters_per_deg_lon(ref_lat).max(1.0);
        Self {
            min_lat: (self.min_lat - pad_lat).max(-90.0),
            max_lat: (self.max_lat + pad_lat).min(90.0),
            min_lon: (self.min_lon - pad_lon).max(-180.0),
            max_lon: (self.max_lon + pad_lon).min(180.0),
        }
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lon >= self.min_lon
            && point.lon <= self.max_lon
    }
}
