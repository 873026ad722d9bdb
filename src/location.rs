//! Location stream abstraction.
//!
//! The platform location service (Android/iOS) pushes samples roughly every
//! 3-5 seconds or every 5-10 meters of movement. This module defines the
//! seam the tracker sits behind: a [`LocationSource`] that delivers
//! [`LocationSample`]s to a callback, and a [`LocationSubscription`] guard
//! whose drop guarantees no further callbacks on any exit path.
//!
//! When location permission is denied or sensors are unavailable, hosts
//! swap in a [`FallbackLocationSource`]: a fixed default coordinate
//! delivered on the same cadence, flagged so the UI can surface the
//! degradation. The tracker keeps working either way; missing location is
//! a degradation, never an error.

use std::cell::Cell;
use std::rc::Rc;

use crate::GpsPoint;

/// A single GPS fix from the platform location service.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms,
        }
    }

    /// Check that the fix carries finite, in-range coordinates.
    pub fn is_valid(&self) -> bool {
        GpsPoint::new(self.latitude, self.longitude).is_valid()
    }

    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// Callback receiving pushed location samples.
pub type LocationCallback = Box<dyn FnMut(LocationSample)>;

/// A push-based source of location samples.
///
/// Implementations wrap the platform location service (or a replayed
/// trace in tests). Sources must honor the returned subscription: once it
/// is cancelled or dropped, the callback must never fire again.
pub trait LocationSource {
    fn subscribe(&mut self, callback: LocationCallback) -> LocationSubscription;

    /// True when this source delivers a fixed fallback coordinate instead
    /// of real sensor fixes.
    fn is_fallback(&self) -> bool {
        false
    }
}

/// Scoped handle to an active location subscription.
///
/// Dropping the handle (or calling [`cancel`](Self::cancel)) tears the
/// subscription down; sources check [`is_active`](Self::is_active) before
/// every delivery, so no callback runs after teardown.
#[derive(Debug)]
pub struct LocationSubscription {
    active: Rc<Cell<bool>>,
}

impl LocationSubscription {
    pub fn new() -> Self {
        Self {
            active: Rc::new(Cell::new(true)),
        }
    }

    /// Shared flag a source holds to gate deliveries.
    pub fn active_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.active)
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Explicitly tear down the subscription. Idempotent.
    pub fn cancel(&self) {
        self.active.set(false);
    }
}

impl Default for LocationSubscription {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LocationSubscription {
    fn drop(&mut self) {
        self.active.set(false);
    }
}

/// Fixed-coordinate source used when real location is unavailable.
///
/// Hosts drive it from the same timer that would carry real fixes by
/// calling [`pump`](Self::pump); each pump delivers the default coordinate
/// to the subscriber, if the subscription is still live.
pub struct FallbackLocationSource {
    coordinate: GpsPoint,
    subscriber: Option<(LocationCallback, Rc<Cell<bool>>)>,
}

impl FallbackLocationSource {
    pub fn new(coordinate: GpsPoint) -> Self {
        Self {
            coordinate,
            subscriber: None,
        }
    }

    /// Deliver the fallback coordinate stamped with `timestamp_ms`.
    pub fn pump(&mut self, timestamp_ms: i64) {
        if let Some((callback, active)) = self.subscriber.as_mut() {
            if active.get() {
                callback(LocationSample::new(
                    self.coordinate.latitude,
                    self.coordinate.longitude,
                    timestamp_ms,
                ));
            }
        }
    }
}

impl LocationSource for FallbackLocationSource {
    fn subscribe(&mut self, callback: LocationCallback) -> LocationSubscription {
        let subscription = LocationSubscription::new();
        self.subscriber = Some((callback, subscription.active_flag()));
        subscription
    }

    fn is_fallback(&self) -> bool {
        true
    }
}
