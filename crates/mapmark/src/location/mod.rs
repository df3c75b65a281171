//! Platform location-service abstraction.
//!
//! This module defines the types shared between the platform's location
//! service and the [`PermissionTracker`](tracker::PermissionTracker): the
//! authorization verdict, position fixes, and the event channel through
//! which platform callbacks reach the owning thread.
//!
//! Platform callbacks arrive on arbitrary background threads. They never
//! touch tracker state directly; they enqueue [`LocationEvent`]s through a
//! cloneable [`LocationEventSender`], and the tracker drains the queue on
//! the thread that owns it. This keeps every read of the cached
//! authorization/coordinate pair tear-free without locks.

pub mod tracker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

use crate::marker::Coordinate;

/// The platform's current verdict on whether this app may access device
/// location.
///
/// Exactly one value at any time; transitions are driven only by the
/// platform's permission callback. The verdict is never persisted; it is
/// recomputed every process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationState {
    /// The user has not yet been asked.
    NotDetermined,
    /// The user cannot change this app's status, e.g. due to parental
    /// controls.
    Restricted,
    /// The user denied access, disabled location services, or the device is
    /// in a mode that blocks them.
    Denied,
    /// Location access is allowed whether or not the app is in use.
    AuthorizedAlways,
    /// Location access is allowed only while the app is in use.
    AuthorizedWhenInUse,
    /// The platform reported a state this library does not recognize.
    Unknown,
}

impl AuthorizationState {
    /// Whether this state permits reading the device location.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::AuthorizedAlways | Self::AuthorizedWhenInUse)
    }
}

impl std::fmt::Display for AuthorizationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotDetermined => write!(f, "not determined"),
            Self::Restricted => write!(f, "restricted"),
            Self::Denied => write!(f, "denied"),
            Self::AuthorizedAlways => write!(f, "authorized always"),
            Self::AuthorizedWhenInUse => write!(f, "authorized when in use"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One reported device-location observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    /// The observed coordinate.
    pub coordinate: Coordinate,

    /// When the observation arrived from the platform.
    pub received_at: DateTime<Utc>,
}

impl Fix {
    /// Create a fix stamped with the current time.
    #[must_use]
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            received_at: Utc::now(),
        }
    }
}

/// An event delivered by a platform location callback.
#[derive(Debug, Clone)]
pub enum LocationEvent {
    /// The permission state changed (user toggled a setting, the OS revoked
    /// access, or the pending permission prompt was answered).
    AuthorizationChanged(AuthorizationState),

    /// A batch of new fixes arrived, newest first.
    PositionUpdate(Vec<Fix>),
}

/// Sending half of the location event channel.
///
/// Platform implementations clone this into their callback context and call
/// [`authorization_changed`](Self::authorization_changed) /
/// [`position_updated`](Self::position_updated) from whatever thread the
/// platform delivers on.
#[derive(Debug, Clone)]
pub struct LocationEventSender {
    tx: mpsc::UnboundedSender<LocationEvent>,
}

impl LocationEventSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<LocationEvent>) -> Self {
        Self { tx }
    }

    /// Report a permission-state change.
    pub fn authorization_changed(&self, state: AuthorizationState) {
        self.send(LocationEvent::AuthorizationChanged(state));
    }

    /// Report a batch of fixes, newest first.
    pub fn position_updated(&self, fixes: Vec<Fix>) {
        self.send(LocationEvent::PositionUpdate(fixes));
    }

    fn send(&self, event: LocationEvent) {
        // The tracker owning the receiver may already be gone; a callback
        // firing after that is harmless.
        if self.tx.send(event).is_err() {
            trace!("location event dropped: tracker gone");
        }
    }
}

/// A scoped registration for continuous position updates.
///
/// Returned by [`LocationPlatform::start_updates`]; the platform keeps a
/// [`SubscriptionWatcher`] and stops delivering once the subscription is
/// stopped or dropped. This replaces an unbounded register-and-forget with
/// an explicit lifetime tied to the consumer.
#[derive(Debug)]
pub struct UpdateSubscription {
    active: Arc<AtomicBool>,
}

impl UpdateSubscription {
    /// Create a new, active subscription.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get a watcher the platform can poll before each delivery.
    #[must_use]
    pub fn watcher(&self) -> SubscriptionWatcher {
        SubscriptionWatcher {
            active: Arc::clone(&self.active),
        }
    }

    /// Whether the subscription is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop position delivery.
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

impl Default for UpdateSubscription {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for UpdateSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Platform-side view of an [`UpdateSubscription`].
#[derive(Debug, Clone)]
pub struct SubscriptionWatcher {
    active: Arc<AtomicBool>,
}

impl SubscriptionWatcher {
    /// Whether the consumer still wants deliveries.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// The platform location service.
///
/// Implementors wrap whatever the host OS provides: an authorization
/// verdict, a fire-and-forget permission prompt, continuous position
/// delivery, and the most recent fix. See `mapmark-sim` for a scripted
/// implementation used in development and integration tests.
pub trait LocationPlatform: Send + Sync {
    /// The platform's current authorization verdict.
    fn authorization_status(&self) -> AuthorizationState;

    /// Ask the user for location permission.
    ///
    /// Fire-and-forget: the answer arrives later through an
    /// [`LocationEvent::AuthorizationChanged`] callback, not through this
    /// call.
    fn request_permission(&self);

    /// Begin continuous position delivery through `events`.
    ///
    /// Delivery continues until the returned subscription is stopped or
    /// dropped.
    fn start_updates(&self, events: LocationEventSender) -> UpdateSubscription;

    /// The most recent fix the platform has, if any.
    ///
    /// Absent on a fresh install before the first fix arrives.
    fn last_fix(&self) -> Option<Fix>;
}
