//! Journey progress tracking.
//!
//! One [`JourneyTracker`] per riding session: it owns the itinerary (the
//! ordered slice of stops from the matched start stop through the chosen
//! destination), consumes the live location stream, and turns noisy
//! GPS-to-stop matches into the state the UI renders — current stop index,
//! a progress percentage that never moves backward, the mascot mood, and a
//! one-shot arrival event.
//!
//! Two call sites drive it on the same logical thread: the platform
//! location push (every few seconds / meters) via [`JourneyTracker::on_sample`],
//! and a ~10 second timer via [`JourneyTracker::tick`] that re-evaluates
//! the last known fix when no fresh sample arrived. No locking; the session
//! ends by dropping the tracker together with its location subscription.
//!
//! The raw stop match is allowed to move backward when GPS noise flips the
//! nearest stop (re-matching is honest about what the sensor says); the
//! *displayed* progress is clamped through per-session watermarks so the
//! progress bar never visually retreats.

use std::collections::HashMap;

use crate::alarm::{self, AlarmThresholds, ArrivalEvent, Mood};
use crate::geo_utils::haversine_distance;
use crate::grid::{SpatialGridIndex, DEFAULT_CELL_SIZE_DEG};
use crate::location::LocationSample;
use crate::resolver::{self, DEFAULT_MATCH_RADIUS_KM, SMALL_COLLECTION_THRESHOLD};
use crate::{GpsPoint, Stop};

/// Tunables for a tracking session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    /// How far a stop may be and still count as "the rider is here", in
    /// kilometers.
    pub match_radius_km: f64,
    /// Cell size for the per-session grid index over the itinerary.
    pub cell_size_deg: f64,
    /// Alarm distances and stop counts (meters on this side).
    pub thresholds: AlarmThresholds,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            match_radius_km: DEFAULT_MATCH_RADIUS_KM,
            cell_size_deg: DEFAULT_CELL_SIZE_DEG,
            thresholds: AlarmThresholds::default(),
        }
    }
}

/// Ordered stop sequence for one directional traversal, from the matched
/// start stop through the destination stop inclusive. Immutable for the
/// session.
#[derive(Debug, Clone)]
pub struct Itinerary {
    stops: Vec<Stop>,
    destination_fallback: bool,
}

impl Itinerary {
    /// Slice an itinerary out of a full directional stop list.
    ///
    /// `start_index` is where the rider was matched on the full list;
    /// `destination_id` is the chosen destination stop. Two documented
    /// fallbacks, neither an error:
    ///
    /// - destination id not present in the list: the last stop of the full
    ///   list is used and a warning is logged
    ///   ([`used_destination_fallback`](Self::used_destination_fallback)
    ///   reports it);
    /// - destination precedes the start (already passed): the itinerary
    ///   collapses to the single start stop.
    ///
    /// Returns `None` only when `full_stops` is empty or `start_index` is
    /// out of bounds.
    pub fn build(full_stops: &[Stop], start_index: usize, destination_id: &str) -> Option<Self> {
        if start_index >= full_stops.len() {
            return None;
        }

        let (destination_index, destination_fallback) =
            match full_stops.iter().position(|s| s.id == destination_id) {
                Some(idx) => (idx, false),
                None => {
                    log::warn!(
                        "destination stop {destination_id} not found in route; \
                         falling back to the final stop"
                    );
                    (full_stops.len() - 1, true)
                }
            };

        let stops = if destination_index < start_index {
            // Destination already passed: degenerate one-stop session
            vec![full_stops[start_index].clone()]
        } else {
            full_stops[start_index..=destination_index].to_vec()
        };

        Some(Self {
            stops,
            destination_fallback,
        })
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Index of the destination stop within this itinerary (always the
    /// last stop).
    pub fn destination_index(&self) -> usize {
        self.stops.len() - 1
    }

    pub fn destination(&self) -> &Stop {
        &self.stops[self.stops.len() - 1]
    }

    /// True for a collapsed single-stop session.
    pub fn is_degenerate(&self) -> bool {
        self.stops.len() == 1
    }

    /// True when the requested destination id was missing and the final
    /// stop of the full list was substituted.
    pub fn used_destination_fallback(&self) -> bool {
        self.destination_fallback
    }
}

/// Estimate of fractional advancement between two adjacent stops, in
/// `[0, 100]`.
///
/// How partial progress should be derived is a product question more than
/// a geometric one, so it is pluggable: [`NoPartialProgress`] (whole-stop
/// granularity) and [`LinearSegmentProgress`] (distance-ratio projection)
/// are provided, and hosts with their own estimate implement the trait.
pub trait SegmentProgress {
    fn estimate(&self, from: &Stop, to: &Stop, position: &GpsPoint) -> f64;
}

/// No partial progress: the bar advances in whole-stop steps.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPartialProgress;

impl SegmentProgress for NoPartialProgress {
    fn estimate(&self, _from: &Stop, _to: &Stop, _position: &GpsPoint) -> f64 {
        0.0
    }
}

/// Distance-ratio estimate: how much of the `from`→`to` leg is behind the
/// rider, measured along straight great-circle legs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearSegmentProgress;

impl SegmentProgress for LinearSegmentProgress {
    fn estimate(&self, from: &Stop, to: &Stop, position: &GpsPoint) -> f64 {
        let covered = haversine_distance(&from.location, position);
        let ahead = haversine_distance(position, &to.location);
        let leg = covered + ahead;
        if leg > 0.0 {
            covered / leg * 100.0
        } else {
            0.0
        }
    }
}

/// Mutable per-session state. Created at journey start, mutated only by
/// the tracker, destroyed when the session ends.
#[derive(Debug, Clone)]
struct TrackingState {
    current_stop_index: Option<usize>,
    destination_index: usize,
    highest_progress_percent: f64,
    highest_segment_progress: HashMap<usize, f64>,
    alarm_triggered: bool,
    mood: Mood,
    last_sample: Option<LocationSample>,
    location_fallback: bool,
}

/// Read-only view of the session for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackingSnapshot {
    /// Itinerary index of the nearest matched stop; `None` before the
    /// first confident match.
    pub current_stop_index: Option<usize>,
    pub destination_index: usize,
    /// Watermarked overall progress, 0-100, non-decreasing.
    pub displayed_progress: f64,
    /// Watermarked progress per inter-stop connector, keyed by the index
    /// of the connector's origin stop.
    pub segment_progress: HashMap<usize, f64>,
    pub mood: Mood,
    /// Human-readable status line.
    pub status: String,
    pub alarm_triggered: bool,
    /// True when samples come from the fixed fallback coordinate rather
    /// than a real sensor.
    pub location_fallback: bool,
}

/// Stateful per-session tracker. See the module docs for the driving
/// model.
///
/// # Example
///
/// ```rust
/// use stop_tracker::{Itinerary, JourneyTracker, TrackerConfig};
/// use stop_tracker::{GpsPoint, LocationSample, Stop, StopKind};
///
/// let route: Vec<Stop> = (0..5)
///     .map(|i| {
///         let lat = 37.5 + i as f64 * 0.0045; // ~500 m apart
///         Stop::new(format!("s{i}"), format!("Stop {i}"), GpsPoint::new(lat, 127.0), StopKind::Bus)
///     })
///     .collect();
///
/// let itinerary = Itinerary::build(&route, 0, "s4").unwrap();
/// let mut tracker = JourneyTracker::new(itinerary, TrackerConfig::default());
///
/// // Rider boards at the first stop
/// let event = tracker.on_sample(LocationSample::new(37.5, 127.0, 0));
/// assert!(event.is_none());
/// assert_eq!(tracker.snapshot().current_stop_index, Some(0));
///
/// // Rider reaches the destination: the one-shot arrival event fires
/// let event = tracker.on_sample(LocationSample::new(37.518, 127.0, 60_000));
/// assert_eq!(event.unwrap().stop_name, "Stop 4");
/// ```
pub struct JourneyTracker {
    itinerary: Itinerary,
    /// Grid index over the itinerary, built once at session start when the
    /// itinerary is large enough to be worth it.
    index: Option<SpatialGridIndex>,
    config: TrackerConfig,
    partial: Box<dyn SegmentProgress>,
    state: TrackingState,
}

impl JourneyTracker {
    /// Start a session with whole-stop progress granularity.
    pub fn new(itinerary: Itinerary, config: TrackerConfig) -> Self {
        Self::with_progress(itinerary, config, Box::new(NoPartialProgress))
    }

    /// Start a session with a custom partial-progress strategy.
    pub fn with_progress(
        itinerary: Itinerary,
        config: TrackerConfig,
        partial: Box<dyn SegmentProgress>,
    ) -> Self {
        let index = (itinerary.len() > SMALL_COLLECTION_THRESHOLD)
            .then(|| SpatialGridIndex::build(itinerary.stops(), config.cell_size_deg));
        let destination_index = itinerary.destination_index();

        Self {
            itinerary,
            index,
            config,
            partial,
            state: TrackingState {
                current_stop_index: None,
                destination_index,
                highest_progress_percent: 0.0,
                highest_segment_progress: HashMap::new(),
                alarm_triggered: false,
                mood: Mood::Sleeping,
                last_sample: None,
                location_fallback: false,
            },
        }
    }

    /// Feed a fresh location sample. Returns the arrival event the first
    /// time the trigger condition is met, `None` on every other call.
    ///
    /// Invalid (non-finite) samples are dropped without touching session
    /// state.
    pub fn on_sample(&mut self, sample: LocationSample) -> Option<ArrivalEvent> {
        if !sample.is_valid() {
            log::debug!("dropping non-finite location sample");
            return None;
        }
        self.state.last_sample = Some(sample);
        self.evaluate()
    }

    /// Periodic re-evaluation using the last known sample, for the timer
    /// path when no fresh fix arrived. No-op before the first sample.
    pub fn tick(&mut self) -> Option<ArrivalEvent> {
        self.evaluate()
    }

    /// Record whether samples are currently coming from the fixed
    /// fallback coordinate (surfaced on the snapshot).
    pub fn set_location_fallback(&mut self, fallback: bool) {
        self.state.location_fallback = fallback;
    }

    pub fn itinerary(&self) -> &Itinerary {
        &self.itinerary
    }

    /// Current session view for the presentation layer.
    pub fn snapshot(&self) -> TrackingSnapshot {
        TrackingSnapshot {
            current_stop_index: self.state.current_stop_index,
            destination_index: self.state.destination_index,
            displayed_progress: self.state.highest_progress_percent,
            segment_progress: self.state.highest_segment_progress.clone(),
            mood: self.state.mood,
            status: self.status_text(),
            alarm_triggered: self.state.alarm_triggered,
            location_fallback: self.state.location_fallback,
        }
    }

    fn evaluate(&mut self) -> Option<ArrivalEvent> {
        // Terminal: once arrived the session only waits to be dropped
        if self.state.mood == Mood::Triggered {
            return None;
        }
        let sample = self.state.last_sample?;
        let here = sample.point();

        // Re-match against the itinerary. The raw index may move backward
        // on GPS noise; only displayed progress is monotonic.
        let matched = match &self.index {
            Some(index) => resolver::find_closest_stop_in(
                index,
                here.latitude,
                here.longitude,
                self.itinerary.stops(),
                self.config.match_radius_km,
            ),
            None => resolver::find_closest_stop(
                here.latitude,
                here.longitude,
                self.itinerary.stops(),
                self.config.match_radius_km,
            ),
        };
        if let Some(m) = matched {
            self.state.current_stop_index = Some(m.index);
        }

        let distance_to_destination_m =
            haversine_distance(&here, &self.itinerary.destination().location);

        let mood = alarm::evaluate(
            self.state.current_stop_index,
            self.state.destination_index,
            distance_to_destination_m,
            &self.config.thresholds,
        );
        self.state.mood = mood;

        let event = if mood == Mood::Triggered && !self.state.alarm_triggered {
            self.state.alarm_triggered = true;
            log::info!(
                "arrival alarm fired for {} ({:.0} m out)",
                self.itinerary.destination().name,
                distance_to_destination_m
            );
            Some(ArrivalEvent {
                stop_name: self.itinerary.destination().name.clone(),
            })
        } else {
            None
        };

        self.update_progress(&here);
        event
    }

    /// Fold the current raw position into the monotonic watermarks.
    fn update_progress(&mut self, here: &GpsPoint) {
        if self.state.mood == Mood::Triggered {
            // Arrived: the journey is complete regardless of where the
            // last raw match landed.
            self.state.highest_progress_percent = 100.0;
            for i in 0..self.state.destination_index {
                self.state.highest_segment_progress.insert(i, 100.0);
            }
            return;
        }

        let Some(current) = self.state.current_stop_index else {
            return;
        };
        let total = self.state.destination_index;

        // Degenerate one-stop session: being matched at all means done
        let overall = if total == 0 {
            100.0
        } else {
            let completed = current.min(total);
            let partial = self.partial_for(current, here);
            (completed as f64 / total as f64) * 100.0 + (partial / 100.0) * (100.0 / total as f64)
        };

        if overall > self.state.highest_progress_percent {
            self.state.highest_progress_percent = overall.min(100.0);
        }

        // Per-connector watermarks: everything behind the current stop
        // holds at 100, the live connector gets the partial estimate.
        for i in 0..current.min(total) {
            self.state.highest_segment_progress.insert(i, 100.0);
        }
        if current < total {
            let partial = self.partial_for(current, here);
            let entry = self
                .state
                .highest_segment_progress
                .entry(current)
                .or_insert(0.0);
            if partial > *entry {
                *entry = partial;
            }
        }
    }

    /// Clamped partial estimate for the connector leaving `current`.
    fn partial_for(&self, current: usize, here: &GpsPoint) -> f64 {
        if current >= self.state.destination_index {
            return 0.0;
        }
        let stops = self.itinerary.stops();
        let raw = self.partial.estimate(&stops[current], &stops[current + 1], here);
        if raw.is_finite() {
            raw.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    /// Human-readable status line for the UI.
    pub fn status_text(&self) -> String {
        if self.state.mood == Mood::Triggered {
            return format!("arriving at {}", self.itinerary.destination().name);
        }
        let Some(current) = self.state.current_stop_index else {
            return "waiting for location".to_string();
        };

        let remaining = self.state.destination_index.saturating_sub(current);
        if remaining == 0 {
            return format!("arriving at {}", self.itinerary.destination().name);
        }

        let next = &self.itinerary.stops()[current + 1];
        if remaining == 1 {
            format!("approaching {} (1 stop away)", next.name)
        } else {
            format!("approaching {} ({} stops away)", next.name, remaining)
        }
    }
}
