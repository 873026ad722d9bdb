//! Alarm trigger policy.
//!
//! Pure decision logic consulted on every location sample and timer tick:
//! given where the rider is in the itinerary and how far they are from the
//! destination stop, decide whether the session is still asleep, close
//! enough to warn, or arrived. The stateful one-shot guard (fire the
//! arrival event exactly once) lives in the tracker; everything here is a
//! total function over its inputs.
//!
//! Distances on this side of the crate are **meters** (500 m warn radius,
//! 100 m trigger radius), unlike the kilometer-denominated stop-match
//! radii. See the unit-confusion tests at the bottom.

/// Rider-facing session state, rendered as the mascot's mood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mood {
    /// Far from the destination; nothing to do.
    Sleeping,
    /// Destination is close; get ready.
    Alert,
    /// Arrived. Terminal for the session.
    Triggered,
}

/// Distance and stop-count thresholds for the alarm policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlarmThresholds {
    /// Within this many meters of the destination the alarm fires.
    pub trigger_distance_m: f64,
    /// Within this many meters, one stop out, the rider is warned.
    pub approach_distance_m: f64,
    /// This many stops before the destination the rider is warned
    /// regardless of distance.
    pub approach_stops: usize,
}

impl Default for AlarmThresholds {
    fn default() -> Self {
        Self {
            trigger_distance_m: 100.0,
            approach_distance_m: 500.0,
            approach_stops: 2,
        }
    }
}

/// One-shot arrival signal, consumed by the host notification layer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArrivalEvent {
    pub stop_name: String,
}

/// Decide the session mood from the current itinerary position and the
/// live distance to the destination stop.
///
/// - `Triggered` when the rider is matched to the destination stop, or
///   within `trigger_distance_m` of it.
/// - `Alert` when the rider is `approach_stops` stops out, or one stop out
///   and within `approach_distance_m`.
/// - `Sleeping` otherwise. A session that was alert can fall back to
///   sleeping; only the tracker makes `Triggered` sticky.
///
/// `current` of `None` means no confident stop match yet; the distance
/// trigger still applies. A NaN distance fails every comparison and
/// yields `Sleeping`.
pub fn evaluate(
    current: Option<usize>,
    destination: usize,
    distance_to_destination_m: f64,
    thresholds: &AlarmThresholds,
) -> Mood {
    if current == Some(destination) || distance_to_destination_m <= thresholds.trigger_distance_m {
        return Mood::Triggered;
    }

    if let Some(current) = current {
        let stops_remaining = destination.checked_sub(current);
        if stops_remaining == Some(thresholds.approach_stops) {
            return Mood::Alert;
        }
        if stops_remaining == Some(1) && distance_to_destination_m < thresholds.approach_distance_m {
            return Mood::Alert;
        }
    }

    Mood::Sleeping
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> AlarmThresholds {
        AlarmThresholds::default()
    }

    #[test]
    fn test_two_stops_out_alerts() {
        // destination index 4: index 2 alerts regardless of distance
        assert_eq!(evaluate(Some(2), 4, 5_000.0, &defaults()), Mood::Alert);
    }

    #[test]
    fn test_one_stop_out_depends_on_distance() {
        // 600 m out: the one-stop rule does not fire
        assert_eq!(evaluate(Some(3), 4, 600.0, &defaults()), Mood::Sleeping);
        // 400 m out: it does
        assert_eq!(evaluate(Some(3), 4, 400.0, &defaults()), Mood::Alert);
    }

    #[test]
    fn test_triggered_at_destination_index() {
        assert_eq!(evaluate(Some(4), 4, 2_000.0, &defaults()), Mood::Triggered);
    }

    #[test]
    fn test_triggered_within_meter_radius() {
        assert_eq!(evaluate(Some(1), 4, 99.0, &defaults()), Mood::Triggered);
        assert_eq!(evaluate(None, 4, 50.0, &defaults()), Mood::Triggered);
    }

    #[test]
    fn test_meter_threshold_boundary() {
        // Exactly 100 m counts as arrived
        assert_eq!(evaluate(None, 4, 100.0, &defaults()), Mood::Triggered);
    }

    #[test]
    fn test_unit_confusion_regression() {
        // 100 m expressed in meters triggers...
        assert_eq!(evaluate(None, 4, 100.0, &defaults()), Mood::Triggered);
        // ...but a full kilometer must not, even though the same number
        // denominated in km (1.0) would slip under a mis-unit comparison.
        assert_eq!(evaluate(None, 4, 1_000.0, &defaults()), Mood::Sleeping);
    }

    #[test]
    fn test_far_away_sleeps() {
        assert_eq!(evaluate(Some(0), 10, 20_000.0, &defaults()), Mood::Sleeping);
        assert_eq!(evaluate(None, 10, 20_000.0, &defaults()), Mood::Sleeping);
    }

    #[test]
    fn test_short_itineraries_do_not_underflow() {
        // destination 0 or 1: the "two stops out" rule cannot underflow
        assert_eq!(evaluate(Some(0), 0, 5_000.0, &defaults()), Mood::Triggered);
        assert_eq!(evaluate(Some(0), 1, 400.0, &defaults()), Mood::Alert);
        assert_eq!(evaluate(Some(1), 0, 5_000.0, &defaults()), Mood::Sleeping);
    }

    #[test]
    fn test_nan_distance_sleeps() {
        assert_eq!(evaluate(Some(0), 4, f64::NAN, &defaults()), Mood::Sleeping);
    }
}
