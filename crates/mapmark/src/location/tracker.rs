//! Authorization tracking and the best-known-coordinate cache.
//!
//! [`PermissionTracker`] wraps the platform's permission and position
//! callbacks into a pollable state: the current [`AuthorizationState`] and
//! the last known [`Coordinate`]. It is the single writer of both fields:
//! callbacks only enqueue events, and the tracker applies them on the
//! thread that owns it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::location::{
    AuthorizationState, LocationEvent, LocationEventSender, LocationPlatform, UpdateSubscription,
};
use crate::marker::Coordinate;

/// Tracks the platform's location-permission verdict and the best known
/// coordinate.
///
/// All methods must be called from the thread that owns the tracker
/// (typically the UI thread). Platform callbacks may fire from anywhere;
/// their events are applied during [`pump`](Self::pump) or
/// [`check_authorization`](Self::check_authorization).
pub struct PermissionTracker {
    platform: Arc<dyn LocationPlatform>,
    events: mpsc::UnboundedReceiver<LocationEvent>,
    sender: LocationEventSender,
    subscription: Option<UpdateSubscription>,
    authorization: AuthorizationState,
    coordinate: Option<Coordinate>,
}

impl std::fmt::Debug for PermissionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionTracker")
            .field("authorization", &self.authorization)
            .field("coordinate", &self.coordinate)
            .field("registered", &self.subscription.is_some())
            .finish_non_exhaustive()
    }
}

impl PermissionTracker {
    /// Create a tracker over the given platform.
    ///
    /// No platform interaction happens until the first
    /// [`check_authorization`](Self::check_authorization) call; until then
    /// the tracker reports [`AuthorizationState::NotDetermined`] and no
    /// coordinate.
    #[must_use]
    pub fn new(platform: Arc<dyn LocationPlatform>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            platform,
            events: rx,
            sender: LocationEventSender::new(tx),
            subscription: None,
            authorization: AuthorizationState::NotDetermined,
            coordinate: None,
        }
    }

    /// Check the current authorization state.
    ///
    /// Idempotent. On the first call this registers for continuous position
    /// updates; the registration lives until [`stop_updates`](Self::stop_updates).
    /// If the platform reports `NotDetermined`, a permission request is
    /// triggered as a side effect; the answer arrives later through the
    /// authorization callback, not through this call. If the state is
    /// authorized, the cached coordinate is refreshed from the most recent
    /// platform fix (which may not exist yet on a fresh install).
    ///
    /// Never fails; always returns one of the six states.
    pub fn check_authorization(&mut self) -> AuthorizationState {
        self.pump();

        if self.subscription.is_none() {
            self.subscription = Some(self.platform.start_updates(self.sender.clone()));
            debug!("registered for position updates");
        }

        let state = self.platform.authorization_status();
        self.classify(state);
        self.authorization
    }

    /// Apply all pending callback events.
    ///
    /// Call this from the owning thread before reading
    /// [`authorization`](Self::authorization) or
    /// [`coordinate`](Self::coordinate) outside of a
    /// [`check_authorization`](Self::check_authorization) cycle.
    pub fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
        }
    }

    /// The cached authorization state, as of the last pump.
    #[must_use]
    pub fn authorization(&self) -> AuthorizationState {
        self.authorization
    }

    /// The best known coordinate, as of the last pump.
    ///
    /// Absent until the first fix arrives while authorized. A transition to
    /// Denied or Restricted does not clear it.
    #[must_use]
    pub fn coordinate(&self) -> Option<Coordinate> {
        self.coordinate
    }

    /// Whether the tracker is registered for position updates.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.subscription.is_some()
    }

    /// Release the position-update registration.
    ///
    /// A subsequent [`check_authorization`](Self::check_authorization)
    /// registers again.
    pub fn stop_updates(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.stop();
            debug!("released position-update registration");
        }
    }

    fn apply(&mut self, event: LocationEvent) {
        match event {
            LocationEvent::AuthorizationChanged(state) => {
                trace!(%state, "authorization callback");
                self.classify(state);
            }
            LocationEvent::PositionUpdate(fixes) => {
                // Newest fix wins immediately; no smoothing or staleness check.
                if let Some(first) = fixes.first() {
                    trace!(coordinate = %first.coordinate, "position callback");
                    self.coordinate = Some(first.coordinate);
                }
            }
        }
    }

    /// Classification shared by the foreground check and the authorization
    /// callback.
    fn classify(&mut self, state: AuthorizationState) {
        match state {
            AuthorizationState::NotDetermined => {
                self.platform.request_permission();
            }
            AuthorizationState::AuthorizedAlways | AuthorizationState::AuthorizedWhenInUse => {
                if let Some(fix) = self.platform.last_fix() {
                    self.coordinate = Some(fix.coordinate);
                }
            }
            // The cached coordinate is deliberately left as-is.
            AuthorizationState::Restricted
            | AuthorizationState::Denied
            | AuthorizationState::Unknown => {}
        }

        if self.authorization != state {
            debug!(from = %self.authorization, to = %state, "authorization state changed");
        }
        self.authorization = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::location::Fix;

    /// A platform double scripted from the test body.
    #[derive(Debug, Default)]
    struct ScriptedPlatform {
        status: Mutex<Option<AuthorizationState>>,
        fix: Mutex<Option<Fix>>,
        permission_requests: AtomicUsize,
        registrations: AtomicUsize,
        sender: Mutex<Option<LocationEventSender>>,
    }

    impl ScriptedPlatform {
        fn with_status(status: AuthorizationState) -> Arc<Self> {
            let platform = Self::default();
            *platform.status.lock().unwrap() = Some(status);
            Arc::new(platform)
        }

        fn set_status(&self, status: AuthorizationState) {
            *self.status.lock().unwrap() = Some(status);
        }

        fn set_fix(&self, coordinate: Coordinate) {
            *self.fix.lock().unwrap() = Some(Fix::new(coordinate));
        }

        fn sender(&self) -> LocationEventSender {
            self.sender.lock().unwrap().clone().expect("not registered")
        }
    }

    impl LocationPlatform for ScriptedPlatform {
        fn authorization_status(&self) -> AuthorizationState {
            self.status
                .lock()
                .unwrap()
                .unwrap_or(AuthorizationState::Unknown)
        }

        fn request_permission(&self) {
            self.permission_requests.fetch_add(1, Ordering::SeqCst);
        }

        fn start_updates(&self, events: LocationEventSender) -> UpdateSubscription {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            *self.sender.lock().unwrap() = Some(events);
            UpdateSubscription::new()
        }

        fn last_fix(&self) -> Option<Fix> {
            *self.fix.lock().unwrap()
        }
    }

    #[test]
    fn test_check_when_in_use_returns_state_and_caches_fix() {
        let platform = ScriptedPlatform::with_status(AuthorizationState::AuthorizedWhenInUse);
        platform.set_fix(Coordinate::new(60.1699, 24.9384));

        let mut tracker = PermissionTracker::new(platform);
        let state = tracker.check_authorization();

        assert_eq!(state, AuthorizationState::AuthorizedWhenInUse);
        assert_eq!(tracker.coordinate(), Some(Coordinate::new(60.1699, 24.9384)));
    }

    #[test]
    fn test_check_denied_preserves_previous_coordinate() {
        let platform = ScriptedPlatform::with_status(AuthorizationState::AuthorizedWhenInUse);
        platform.set_fix(Coordinate::new(60.1699, 24.9384));

        let mut tracker = PermissionTracker::new(Arc::clone(&platform) as Arc<dyn LocationPlatform>);
        tracker.check_authorization();

        platform.set_status(AuthorizationState::Denied);
        let state = tracker.check_authorization();

        assert_eq!(state, AuthorizationState::Denied);
        // Not reset by the denial.
        assert_eq!(tracker.coordinate(), Some(Coordinate::new(60.1699, 24.9384)));
    }

    #[test]
    fn test_check_not_determined_requests_permission() {
        let platform = ScriptedPlatform::with_status(AuthorizationState::NotDetermined);
        let mut tracker = PermissionTracker::new(Arc::clone(&platform) as Arc<dyn LocationPlatform>);

        let state = tracker.check_authorization();

        assert_eq!(state, AuthorizationState::NotDetermined);
        assert_eq!(platform.permission_requests.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.coordinate(), None);
    }

    #[test]
    fn test_check_authorized_without_fix_leaves_coordinate_absent() {
        let platform = ScriptedPlatform::with_status(AuthorizationState::AuthorizedAlways);
        let mut tracker = PermissionTracker::new(platform);

        assert_eq!(
            tracker.check_authorization(),
            AuthorizationState::AuthorizedAlways
        );
        assert_eq!(tracker.coordinate(), None);
    }

    #[test]
    fn test_check_registers_exactly_once() {
        let platform = ScriptedPlatform::with_status(AuthorizationState::Denied);
        let mut tracker = PermissionTracker::new(Arc::clone(&platform) as Arc<dyn LocationPlatform>);

        tracker.check_authorization();
        tracker.check_authorization();
        tracker.check_authorization();

        assert_eq!(platform.registrations.load(Ordering::SeqCst), 1);
        assert!(tracker.is_registered());
    }

    #[test]
    fn test_position_update_takes_first_of_batch() {
        let platform = ScriptedPlatform::with_status(AuthorizationState::AuthorizedWhenInUse);
        let mut tracker = PermissionTracker::new(Arc::clone(&platform) as Arc<dyn LocationPlatform>);
        tracker.check_authorization();

        platform.sender().position_updated(vec![
            Fix::new(Coordinate::new(60.17, 24.94)),
            Fix::new(Coordinate::new(60.16, 24.93)),
        ]);
        tracker.pump();

        assert_eq!(tracker.coordinate(), Some(Coordinate::new(60.17, 24.94)));
    }

    #[test]
    fn test_empty_position_batch_changes_nothing() {
        let platform = ScriptedPlatform::with_status(AuthorizationState::AuthorizedWhenInUse);
        platform.set_fix(Coordinate::new(1.0, 2.0));

        let mut tracker = PermissionTracker::new(Arc::clone(&platform) as Arc<dyn LocationPlatform>);
        tracker.check_authorization();

        platform.sender().position_updated(vec![]);
        tracker.pump();

        assert_eq!(tracker.coordinate(), Some(Coordinate::new(1.0, 2.0)));
    }

    #[test]
    fn test_authorization_callback_applies_without_foreground_check() {
        let platform = ScriptedPlatform::with_status(AuthorizationState::AuthorizedWhenInUse);
        let mut tracker = PermissionTracker::new(Arc::clone(&platform) as Arc<dyn LocationPlatform>);
        tracker.check_authorization();

        // The user revokes access in settings; only the callback reports it.
        platform.sender().authorization_changed(AuthorizationState::Denied);
        tracker.pump();

        assert_eq!(tracker.authorization(), AuthorizationState::Denied);
    }

    #[test]
    fn test_authorization_callback_to_authorized_refreshes_fix() {
        let platform = ScriptedPlatform::with_status(AuthorizationState::NotDetermined);
        let mut tracker = PermissionTracker::new(Arc::clone(&platform) as Arc<dyn LocationPlatform>);
        tracker.check_authorization();

        // The user answers the prompt; a fix is already available.
        platform.set_fix(Coordinate::new(51.5072, -0.1275));
        platform.set_status(AuthorizationState::AuthorizedWhenInUse);
        platform
            .sender()
            .authorization_changed(AuthorizationState::AuthorizedWhenInUse);
        tracker.pump();

        assert_eq!(tracker.authorization(), AuthorizationState::AuthorizedWhenInUse);
        assert_eq!(tracker.coordinate(), Some(Coordinate::new(51.5072, -0.1275)));
    }

    #[test]
    fn test_events_from_background_thread_apply_on_pump() {
        let platform = ScriptedPlatform::with_status(AuthorizationState::AuthorizedAlways);
        let mut tracker = PermissionTracker::new(Arc::clone(&platform) as Arc<dyn LocationPlatform>);
        tracker.check_authorization();

        let sender = platform.sender();
        let handle = std::thread::spawn(move || {
            sender.position_updated(vec![Fix::new(Coordinate::new(35.6764, 139.6500))]);
        });
        handle.join().unwrap();

        tracker.pump();
        assert_eq!(tracker.coordinate(), Some(Coordinate::new(35.6764, 139.6500)));
    }

    #[test]
    fn test_stop_updates_releases_registration() {
        let platform = ScriptedPlatform::with_status(AuthorizationState::AuthorizedWhenInUse);
        let mut tracker = PermissionTracker::new(Arc::clone(&platform) as Arc<dyn LocationPlatform>);
        tracker.check_authorization();
        assert!(tracker.is_registered());

        tracker.stop_updates();
        assert!(!tracker.is_registered());

        // Re-checking registers again.
        tracker.check_authorization();
        assert_eq!(platform.registrations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unknown_state_passes_through() {
        let platform = Arc::new(ScriptedPlatform::default());
        let mut tracker = PermissionTracker::new(Arc::clone(&platform) as Arc<dyn LocationPlatform>);

        assert_eq!(tracker.check_authorization(), AuthorizationState::Unknown);
        assert_eq!(platform.permission_requests.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_tracker_debug_omits_platform() {
        let platform = ScriptedPlatform::with_status(AuthorizationState::Denied);
        let tracker = PermissionTracker::new(platform);

        let debug = format!("{tracker:?}");
        assert!(debug.contains("PermissionTracker"));
        assert!(debug.contains("registered"));
    }
}
