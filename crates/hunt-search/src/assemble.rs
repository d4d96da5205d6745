//! Turn raw provider features into the final, ordered result set.

use crate::elevation::{elevation_for, ElevationFetcher};
use hunt_core::models::{ElevationSample, GeoPoint, RawFeature, SearchResult, SearchZone};
use hunt_core::spatial::{distance_to_path, point_in_polygon};
use std::cmp::Ordering;
use std::collections::HashSet;

/// A feature that passed the corridor filters, with its distance to the path.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub feature: RawFeature,
    pub distance_km: f64,
}

/// Filter, enrich, deduplicate and sort features found near `path`.
///
/// "Nothing found" is an empty list. Elevation is fetched only for
/// features that survive filtering, once per distinct coordinate.
pub async fn assemble(
    raw: Vec<RawFeature>,
    path: &[GeoPoint],
    radius_km: f64,
    zone: Option<&SearchZone>,
    elevations: &ElevationFetcher,
) -> Vec<SearchResult> {
    let candidates = filter_candidates(raw, path, radius_km, zone);
    if candidates.is_empty() {
        return Vec::new();
    }

    let coordinates = distinct_coordinates(&candidates);
    let samples = elevations.fetch_elevations(&coordinates).await;
    tracing::debug!(
        candidates = candidates.len(),
        requested = coordinates.len(),
        samples = samples.len(),
        "Merging elevation samples"
    );
    merge_results(candidates, &samples)
}

/// Keep features within `radius_km` of the path and, when a zone is
/// given, inside it.
pub fn filter_candidates(
    raw: Vec<RawFeature>,
    path: &[GeoPoint],
    radius_km: f64,
    zone: Option<&SearchZone>,
) -> Vec<Candidate> {
    raw.into_iter()
        .filter_map(|feature| {
            let distance_km = distance_to_path(&feature.coordinates, path);
            let within_radius = distance_km <= radius_km;
            if !within_radius {
                return None;
            }
            if let Some(zone) = zone {
                if !point_in_polygon(&feature.coordinates, zone) {
                    return None;
                }
            }
            Some(Candidate {
                feature,
                distance_km,
            })
        })
        .collect()
}

/// Build results, drop repeated `(name, coordinates)` pairs keeping the
/// first, and order by distance. Ties keep their input order.
pub fn merge_results(candidates: Vec<Candidate>, samples: &[ElevationSample]) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    let mut results: Vec<SearchResult> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let feature = candidate.feature;
            let key = (
                feature.name.clone(),
                dedupe_component(feature.coordinates.lat),
                dedupe_component(feature.coordinates.lon),
            );
            if !seen.insert(key) {
                return None;
            }

            let (type_tag, secondary_label) = match feature.type_tag() {
                Some((key, value)) => (Some(key.to_string()), Some(value.replace('_', " "))),
                None => (None, None),
            };
            let elevation_m = elevation_for(&feature.coordinates, samples);
            Some(SearchResult {
                name: feature.name,
                secondary_label,
                coordinates: feature.coordinates,
                distance_km: candidate.distance_km,
                elevation_m,
                type_tag,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        a.distance_km
            .partial_cmp(&b.distance_km)
            .unwrap_or(Ordering::Equal)
    });
    results
}

// Degrees at 1e-5 precision; `+ 0.0` folds -0.0 into 0.0.
fn dedupe_component(degrees: f64) -> i64 {
    ((degrees * 1e5).round() + 0.0) as i64
}

fn distinct_coordinates(candidates: &[Candidate]) -> Vec<GeoPoint> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .map(|candidate| candidate.feature.coordinates)
        .filter(|point| seen.insert((point.lat.to_bits(), point.lon.to_bits())))
        .collect()
}
