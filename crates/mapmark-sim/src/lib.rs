//! Scripted location platform for mapmark.
//!
//! This crate provides a [`LocationPlatform`] implementation whose
//! authorization state and position fixes are driven from code instead of
//! real hardware. It exists for two consumers: integration tests that need
//! to walk a [`PermissionTracker`](mapmark::PermissionTracker) through
//! permission flows, and development builds that want map behavior without
//! a device.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::time::interval;
use tracing::{debug, trace, warn};

use mapmark::location::{
    AuthorizationState, Fix, LocationEventSender, LocationPlatform, SubscriptionWatcher,
    UpdateSubscription,
};
use mapmark::Coordinate;

/// Errors that can occur while driving the simulator.
#[derive(Debug, Error)]
pub enum SimulatorError {
    /// No tracker has registered for updates, so a replay would go nowhere.
    #[error("no tracker is registered for position updates")]
    NotRegistered,
}

/// Result type for simulator operations.
pub type Result<T> = std::result::Result<T, SimulatorError>;

/// Configuration for the simulated platform.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Authorization state before anyone answers a prompt.
    pub initial_authorization: AuthorizationState,

    /// State granted when the app requests permission, simulating the
    /// user's answer to the prompt.
    pub grant: AuthorizationState,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_authorization: AuthorizationState::NotDetermined,
            grant: AuthorizationState::AuthorizedWhenInUse,
        }
    }
}

#[derive(Debug, Default)]
struct SimulatorState {
    authorization: Option<AuthorizationState>,
    last_fix: Option<Fix>,
    sender: Option<LocationEventSender>,
    watcher: Option<SubscriptionWatcher>,
}

/// A scriptable location platform.
///
/// Wrap it in an [`Arc`] and hand a clone to the tracker; keep another
/// clone to flip authorization and feed fixes from the test or dev harness.
#[derive(Debug)]
pub struct SimulatedPlatform {
    config: SimulatorConfig,
    state: Mutex<SimulatorState>,
}

impl SimulatedPlatform {
    /// Create a platform with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SimulatorConfig::default())
    }

    /// Create a platform with a custom configuration.
    #[must_use]
    pub fn with_config(config: SimulatorConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SimulatorState::default()),
        }
    }

    /// Set the authorization state, delivering the change callback if a
    /// tracker is registered.
    ///
    /// Simulates the user toggling a setting or the OS revoking access.
    pub fn set_authorization(&self, authorization: AuthorizationState) {
        let sender = {
            let mut state = self.state.lock().expect("simulator state poisoned");
            state.authorization = Some(authorization);
            state.sender.clone()
        };

        debug!(%authorization, "simulated authorization change");
        if let Some(sender) = sender {
            sender.authorization_changed(authorization);
        }
    }

    /// Feed a single fix, newest of its (one-element) batch.
    pub fn push_fix(&self, coordinate: Coordinate) {
        self.push_fixes(vec![coordinate]);
    }

    /// Feed a batch of fixes, newest first.
    ///
    /// The first coordinate becomes the platform's last fix. The batch is
    /// delivered only while the registered subscription is active; the last
    /// fix is recorded either way, as a real platform would.
    pub fn push_fixes(&self, coordinates: Vec<Coordinate>) {
        if coordinates.is_empty() {
            return;
        }

        let now = Utc::now();
        let fixes: Vec<Fix> = coordinates
            .into_iter()
            .map(|coordinate| Fix {
                coordinate,
                received_at: now,
            })
            .collect();

        let sender = {
            let mut state = self.state.lock().expect("simulator state poisoned");
            state.last_fix = fixes.first().copied();

            let delivering = state
                .watcher
                .as_ref()
                .is_some_and(SubscriptionWatcher::is_active);
            if delivering {
                state.sender.clone()
            } else {
                trace!("no active subscription; fix recorded but not delivered");
                None
            }
        };

        if let Some(sender) = sender {
            sender.position_updated(fixes);
        }
    }

    /// Whether a tracker currently holds an active subscription.
    #[must_use]
    pub fn has_subscriber(&self) -> bool {
        self.state
            .lock()
            .expect("simulator state poisoned")
            .watcher
            .as_ref()
            .is_some_and(SubscriptionWatcher::is_active)
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationPlatform for SimulatedPlatform {
    fn authorization_status(&self) -> AuthorizationState {
        self.state
            .lock()
            .expect("simulator state poisoned")
            .authorization
            .unwrap_or(self.config.initial_authorization)
    }

    fn request_permission(&self) {
        // Answer the prompt with the configured grant, through the same
        // callback path a real platform would use.
        debug!(grant = %self.config.grant, "simulated permission prompt answered");
        self.set_authorization(self.config.grant);
    }

    fn start_updates(&self, events: LocationEventSender) -> UpdateSubscription {
        let subscription = UpdateSubscription::new();
        let mut state = self.state.lock().expect("simulator state poisoned");
        state.sender = Some(events);
        state.watcher = Some(subscription.watcher());
        debug!("tracker registered for simulated position updates");
        subscription
    }

    fn last_fix(&self) -> Option<Fix> {
        self.state.lock().expect("simulator state poisoned").last_fix
    }
}

/// Configuration for a route replay.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Time between consecutive fixes.
    pub interval: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// Replays a route through a [`SimulatedPlatform`] on a timer.
///
/// Each point is fed as a single-fix batch at the configured interval,
/// imitating a device moving along the route.
#[derive(Debug)]
pub struct RouteReplay {
    platform: Arc<SimulatedPlatform>,
    config: ReplayConfig,
    running: Arc<AtomicBool>,
}

impl RouteReplay {
    /// Create a replay over the given platform with default configuration.
    #[must_use]
    pub fn new(platform: Arc<SimulatedPlatform>) -> Self {
        Self::with_config(platform, ReplayConfig::default())
    }

    /// Create a replay with a custom configuration.
    #[must_use]
    pub fn with_config(platform: Arc<SimulatedPlatform>, config: ReplayConfig) -> Self {
        Self {
            platform,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check if the replay is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Drive the route until it ends or [`stop`](Self::stop) is called.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::NotRegistered`] if no tracker is
    /// subscribed: the fixes would vanish and the caller almost certainly
    /// forgot to check authorization first.
    pub async fn run(&self, route: Vec<Coordinate>) -> Result<()> {
        if !self.platform.has_subscriber() {
            return Err(SimulatorError::NotRegistered);
        }

        if self.running.swap(true, Ordering::SeqCst) {
            warn!("route replay already running");
            return Ok(());
        }

        debug!(
            points = route.len(),
            interval_ms = self.config.interval.as_millis(),
            "starting route replay"
        );

        let mut ticker = interval(self.config.interval);
        for coordinate in route {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            ticker.tick().await;
            self.platform.push_fix(coordinate);
        }

        self.running.store(false, Ordering::SeqCst);
        debug!("route replay finished");
        Ok(())
    }

    /// Stop the replay.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Get a handle that can stop the replay from another task.
    #[must_use]
    pub fn stop_handle(&self) -> ReplayHandle {
        ReplayHandle {
            running: Arc::clone(&self.running),
        }
    }
}

/// A handle to control a running route replay.
#[derive(Debug, Clone)]
pub struct ReplayHandle {
    running: Arc<AtomicBool>,
}

impl ReplayHandle {
    /// Stop the associated replay.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the replay is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
