//! Nearest-stop resolution.
//!
//! Answers "which stop is this rider at?" for both bus stops and train
//! stations. Small collections are scanned directly; larger ones go through
//! a [`SpatialGridIndex`]. Index construction has a fixed cost that only
//! pays off past a couple dozen stops, so the cutover is a named constant
//! rather than always-index or always-scan.
//!
//! A resolver never force-matches: when the nearest candidate is farther
//! than the match radius the answer is `None`, signaling out-of-range
//! instead of guessing.

use crate::geo_utils::haversine_distance_km;
use crate::grid::{SpatialGridIndex, DEFAULT_CELL_SIZE_DEG};
use crate::{GpsPoint, RankedMatch, Stop};

/// Below this many stops a direct scan beats building a grid index.
pub const SMALL_COLLECTION_THRESHOLD: usize = 20;

/// Default stop-match radius in kilometers.
pub const DEFAULT_MATCH_RADIUS_KM: f64 = 1.0;

/// How many candidates to pull from the index before picking the closest.
const INDEXED_CANDIDATES: usize = 10;

/// A resolved nearest stop.
///
/// `index` is the stop's position in the original, itinerary-ordered slice
/// passed to the resolver (looked up by id), **not** its rank in the
/// distance-sorted candidate list. Callers slice the remaining itinerary
/// off this index.
#[derive(Debug, Clone)]
pub struct ClosestStop {
    pub stop: Stop,
    pub distance_km: f64,
    pub index: usize,
}

/// Find the closest stop to `(lat, lon)` within `max_distance_km`.
///
/// Returns `None` for an empty stop list or when the nearest candidate is
/// out of range; both are normal outcomes, not errors.
///
/// # Example
///
/// ```rust
/// use stop_tracker::{resolver, Stop, StopKind, GpsPoint};
///
/// let stops = vec![
///     Stop::new("a", "First Ave", GpsPoint::new(37.500, 127.0), StopKind::Bus),
///     Stop::new("b", "Second Ave", GpsPoint::new(37.510, 127.0), StopKind::Bus),
/// ];
///
/// let hit = resolver::find_closest_stop(37.5005, 127.0, &stops, 1.0).unwrap();
/// assert_eq!(hit.stop.id, "a");
/// assert_eq!(hit.index, 0);
///
/// // Nothing within a kilometer of a point far away
/// assert!(resolver::find_closest_stop(40.0, 127.0, &stops, 1.0).is_none());
/// ```
pub fn find_closest_stop(
    lat: f64,
    lon: f64,
    stops: &[Stop],
    max_distance_km: f64,
) -> Option<ClosestStop> {
    let candidates = find_k_nearest(
        lat,
        lon,
        stops,
        INDEXED_CANDIDATES,
        Some(max_distance_km * 1000.0),
    );
    let best = candidates.into_iter().next()?;
    let index = stops.iter().position(|s| s.id == best.stop.id)?;
    Some(ClosestStop {
        stop: best.stop,
        distance_km: best.distance_km,
        index,
    })
}

/// [`find_closest_stop`] against a caller-owned, pre-built index.
///
/// Used on the hot path where the same stop set is queried every few
/// seconds (one index per session, rebuilt only when the stop set
/// changes). `stops` must be the same itinerary-ordered slice the index
/// was built from so the returned index refers to the caller's ordering.
pub fn find_closest_stop_in(
    index: &SpatialGridIndex,
    lat: f64,
    lon: f64,
    stops: &[Stop],
    max_distance_km: f64,
) -> Option<ClosestStop> {
    let best = index.find_nearby(lat, lon, max_distance_km).into_iter().next()?;
    let position = stops.iter().position(|s| s.id == best.stop.id)?;
    Some(ClosestStop {
        stop: best.stop,
        distance_km: best.distance_km,
        index: position,
    })
}

/// General k-nearest-neighbor search over any stop collection.
///
/// Uses a grid index for collections above [`SMALL_COLLECTION_THRESHOLD`],
/// a direct scan otherwise. `max_distance_meters` of `None` means
/// unbounded (always a direct scan, since a grid query needs a radius).
/// The result is annotated with kilometer distances and always sorted
/// ascending.
pub fn find_k_nearest(
    lat: f64,
    lon: f64,
    stops: &[Stop],
    k: usize,
    max_distance_meters: Option<f64>,
) -> Vec<RankedMatch> {
    if stops.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut matches = match max_distance_meters {
        Some(max_m) if stops.len() > SMALL_COLLECTION_THRESHOLD => {
            let index = SpatialGridIndex::build(stops, DEFAULT_CELL_SIZE_DEG);
            index.find_nearby(lat, lon, max_m / 1000.0)
        }
        _ => {
            let here = GpsPoint::new(lat, lon);
            let max_km = max_distance_meters.map(|m| m / 1000.0).unwrap_or(f64::INFINITY);
            let mut direct: Vec<RankedMatch> = stops
                .iter()
                .filter(|s| s.location.is_valid())
                .map(|s| RankedMatch {
                    stop: s.clone(),
                    distance_km: haversine_distance_km(&here, &s.location),
                })
                .filter(|m| m.distance_km <= max_km)
                .collect();
            direct.sort_by(|a, b| {
                a.distance_km
                    .partial_cmp(&b.distance_km)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            direct
        }
    };

    matches.truncate(k);
    matches
}
