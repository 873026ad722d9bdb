//! # Stop Tracker
//!
//! GPS stop matching and journey progress tracking for transit arrival
//! alarms.
//!
//! This library is the location core of a "wake me at my stop" rider app:
//! given live GPS samples and an ordered stop list for one route
//! direction, it resolves which stop the rider is nearest to, tracks
//! monotonically-improving progress toward a chosen destination stop, and
//! emits a one-shot arrival event the host uses to wake the rider.
//!
//! ## Components
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`geo_utils`] | Haversine distance and compass bearing |
//! | [`grid`] | Lat/lon grid-cell index for approximate-radius queries |
//! | [`resolver`] | Closest-stop and k-nearest-neighbor decisions |
//! | [`location`] | Location stream seam, subscription guard, fallback source |
//! | [`alarm`] | Pure mood/trigger policy (meter-denominated thresholds) |
//! | [`tracker`] | Per-session itinerary, watermarked progress, one-shot alarm |
//!
//! Stop data itself (upstream transit API, pagination, caching) and the
//! delivery of the arrival notification are external collaborators; this
//! crate only defines the seams they plug into.
//!
//! ## Features
//!
//! - **`serde`** - serde derives on the data model
//! - **`ffi`** - UniFFI bindings for mobile platforms (iOS/Android)
//!
//! ## Quick Start
//!
//! ```rust
//! use stop_tracker::{
//!     resolver, GpsPoint, Itinerary, JourneyTracker, LocationSample, Stop, StopKind,
//!     TrackerConfig,
//! };
//!
//! // One route direction's stops, in travel order
//! let route: Vec<Stop> = (0..8)
//!     .map(|i| {
//!         let lat = 37.50 + i as f64 * 0.0045;
//!         Stop::new(format!("s{i}"), format!("Stop {i}"), GpsPoint::new(lat, 127.0), StopKind::Bus)
//!     })
//!     .collect();
//!
//! // Where did the rider board?
//! let boarded = resolver::find_closest_stop(37.5001, 127.0, &route, 1.0).unwrap();
//! assert_eq!(boarded.index, 0);
//!
//! // Track toward their chosen destination
//! let itinerary = Itinerary::build(&route, boarded.index, "s7").unwrap();
//! let mut tracker = JourneyTracker::new(itinerary, TrackerConfig::default());
//!
//! let arrival = tracker.on_sample(LocationSample::new(37.5315, 127.0, 0));
//! assert_eq!(arrival.unwrap().stop_name, "Stop 7");
//! ```

pub mod alarm;
pub mod geo_utils;
pub mod grid;
pub mod location;
pub mod resolver;
pub mod tracker;

pub use alarm::{AlarmThresholds, ArrivalEvent, Mood};
pub use grid::SpatialGridIndex;
pub use location::{
    FallbackLocationSource, LocationCallback, LocationSample, LocationSource,
    LocationSubscription,
};
pub use resolver::{find_closest_stop, find_k_nearest, ClosestStop};
pub use tracker::{
    Itinerary, JourneyTracker, LinearSegmentProgress, NoPartialProgress, SegmentProgress,
    TrackerConfig, TrackingSnapshot,
};

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("StopTrackerRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude (WGS84 degrees).
///
/// # Example
/// ```
/// use stop_tracker::GpsPoint;
/// let point = GpsPoint::new(37.5665, 126.9780); // Seoul City Hall
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Which network a stop belongs to.
///
/// Bus stops and train stations share every spatial operation in this
/// crate; the tag carries the distinction for hosts that render or fetch
/// them differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopKind {
    Bus,
    Train,
}

/// Route placement metadata a stop may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteMeta {
    /// Position of the stop along its route.
    pub sequence: u32,
    /// Route direction this placement belongs to (0/1 in feed terms).
    pub direction: u8,
}

/// A located transit stop or station.
///
/// Identity is the `id`: two stops with the same id are the same stop,
/// wherever they appear.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub location: GpsPoint,
    pub kind: StopKind,
    pub route_meta: Option<RouteMeta>,
}

impl Stop {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        location: GpsPoint,
        kind: StopKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location,
            kind,
            route_meta: None,
        }
    }

    pub fn with_route_meta(mut self, sequence: u32, direction: u8) -> Self {
        self.route_meta = Some(RouteMeta {
            sequence,
            direction,
        });
        self
    }
}

/// A stop annotated with its distance from a query point, in kilometers.
///
/// Ranked result lists are always sorted ascending by distance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankedMatch {
    pub stop: Stop,
    pub distance_km: f64,
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::{debug, info};

    /// Callback interface delivering the one-shot arrival event to the
    /// host. Implement this in Kotlin/Swift to schedule the wake-up
    /// notification.
    #[uniffi::export(callback_interface)]
    pub trait ArrivalCallback: Send + Sync {
        /// Called at most once per tracked journey, with the destination
        /// stop's name.
        fn on_arrival(&self, stop_name: String);
    }

    /// FFI view of a resolved closest stop.
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct FfiClosestStop {
        pub stop: Stop,
        pub distance_km: f64,
        /// Position in the stop list that was passed in (itinerary order).
        pub index: u32,
    }

    /// One inter-stop connector's watermarked progress.
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct FfiSegmentProgress {
        pub index: u32,
        pub percent: f64,
    }

    /// FFI view of a tracking session snapshot.
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct FfiTrackingSnapshot {
        pub current_stop_index: Option<u32>,
        pub destination_index: u32,
        pub displayed_progress: f64,
        pub segment_progress: Vec<FfiSegmentProgress>,
        pub mood: Mood,
        pub status: String,
        pub alarm_triggered: bool,
    }

    fn to_ffi_snapshot(snapshot: TrackingSnapshot) -> FfiTrackingSnapshot {
        let mut segment_progress: Vec<FfiSegmentProgress> = snapshot
            .segment_progress
            .into_iter()
            .map(|(index, percent)| FfiSegmentProgress {
                index: index as u32,
                percent,
            })
            .collect();
        segment_progress.sort_by_key(|s| s.index);

        FfiTrackingSnapshot {
            current_stop_index: snapshot.current_stop_index.map(|i| i as u32),
            destination_index: snapshot.destination_index as u32,
            displayed_progress: snapshot.displayed_progress,
            segment_progress,
            mood: snapshot.mood,
            status: snapshot.status,
            alarm_triggered: snapshot.alarm_triggered,
        }
    }

    /// Find the closest stop within `max_distance_km` of a position.
    #[uniffi::export]
    pub fn ffi_find_closest_stop(
        latitude: f64,
        longitude: f64,
        stops: Vec<Stop>,
        max_distance_km: f64,
    ) -> Option<FfiClosestStop> {
        init_logging();
        debug!(
            "[StopTrackerRust] find_closest_stop over {} stops",
            stops.len()
        );
        resolver::find_closest_stop(latitude, longitude, &stops, max_distance_km).map(|hit| {
            FfiClosestStop {
                stop: hit.stop,
                distance_km: hit.distance_km,
                index: hit.index as u32,
            }
        })
    }

    /// K-nearest stops to a position, sorted ascending by distance.
    #[uniffi::export]
    pub fn ffi_find_k_nearest(
        latitude: f64,
        longitude: f64,
        stops: Vec<Stop>,
        k: u32,
        max_distance_meters: Option<f64>,
    ) -> Vec<RankedMatch> {
        init_logging();
        resolver::find_k_nearest(latitude, longitude, &stops, k as usize, max_distance_meters)
    }

    /// Replay a batch of location samples against a journey and return the
    /// final session snapshot. `None` when the itinerary cannot be built
    /// (empty route or out-of-bounds start).
    #[uniffi::export]
    pub fn ffi_track_journey(
        route: Vec<Stop>,
        start_index: u32,
        destination_id: String,
        samples: Vec<LocationSample>,
    ) -> Option<FfiTrackingSnapshot> {
        init_logging();
        info!(
            "[StopTrackerRust] track_journey: {} stops, {} samples",
            route.len(),
            samples.len()
        );

        let itinerary = Itinerary::build(&route, start_index as usize, &destination_id)?;
        let mut tracker = JourneyTracker::new(itinerary, TrackerConfig::default());
        for sample in samples {
            tracker.on_sample(sample);
        }
        Some(to_ffi_snapshot(tracker.snapshot()))
    }

    /// Same as [`ffi_track_journey`] but delivers the one-shot arrival
    /// event through the callback as soon as the trigger sample is
    /// replayed.
    #[uniffi::export]
    pub fn ffi_track_journey_with_alarm(
        route: Vec<Stop>,
        start_index: u32,
        destination_id: String,
        samples: Vec<LocationSample>,
        callback: Box<dyn ArrivalCallback>,
    ) -> Option<FfiTrackingSnapshot> {
        init_logging();

        let itinerary = Itinerary::build(&route, start_index as usize, &destination_id)?;
        let mut tracker = JourneyTracker::new(itinerary, TrackerConfig::default());
        for sample in samples {
            if let Some(event) = tracker.on_sample(sample) {
                info!("[StopTrackerRust] arrival at {}", event.stop_name);
                callback.on_arrival(event.stop_name);
            }
        }
        Some(to_ffi_snapshot(tracker.snapshot()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gps_point_validation() {
        assert!(GpsPoint::new(37.5665, 126.9780).is_valid());
        assert!(!GpsPoint::new(91.0, 0.0).is_valid());
        assert!(!GpsPoint::new(0.0, 181.0).is_valid());
        assert!(!GpsPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_stop_identity_is_the_id() {
        let a = Stop::new("7001", "Gangnam Station", GpsPoint::new(37.4979, 127.0276), StopKind::Train);
        let b = Stop::new("7001", "Gangnam Stn.", GpsPoint::new(37.4980, 127.0276), StopKind::Train);
        // Same stop as far as matching is concerned, whatever the label says
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_route_meta_builder() {
        let stop = Stop::new("s", "S", GpsPoint::new(0.0, 0.0), StopKind::Bus)
            .with_route_meta(12, 1);
        assert_eq!(stop.route_meta, Some(RouteMeta { sequence: 12, direction: 1 }));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_stop_serde_round_trip() {
        let stop = Stop::new("s1", "Stop 1", GpsPoint::new(37.5, 127.0), StopKind::Bus)
            .with_route_meta(3, 0);
        let json = serde_json::to_string(&stop).unwrap();
        let back: Stop = serde_json::from_str(&json).unwrap();
        assert_eq!(stop, back);
    }
}
