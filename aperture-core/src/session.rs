//! Capture session state tracking
//!
//! The camera subsystem reports session transitions, device errors and
//! availability changes from its own threads. [`SessionTracker`] is the one
//! listener registered for all of them; it owns the current
//! [`SessionState`] behind a mutex so the caller's thread can read it at any
//! time.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::backend::CameraEventListener;
use crate::status::DeviceError;
use crate::types::{DeviceHandle, SessionHandle, SessionState};

#[derive(Debug, Default)]
struct TrackerState {
    state: SessionState,
    owned_session: Option<SessionHandle>,
    last_device_error: Option<(DeviceHandle, DeviceError)>,
    device_errors: u64,
    stale_notifications: u64,
}

/// Thread-safe holder of the capture session state
#[derive(Debug, Default)]
pub struct SessionTracker {
    inner: Mutex<TrackerState>,
}

impl SessionTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Listener to register with the device, the session and the
    /// availability notifier
    pub fn listener(self: &Arc<Self>) -> Arc<dyn CameraEventListener> {
        self.clone()
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Session whose notifications are accepted
    pub fn owned_session(&self) -> Option<SessionHandle> {
        self.inner.lock().owned_session
    }

    /// Most recent device error, if any was reported
    pub fn last_device_error(&self) -> Option<(DeviceHandle, DeviceError)> {
        self.inner.lock().last_device_error
    }

    /// Number of device errors reported so far
    pub fn device_error_count(&self) -> u64 {
        self.inner.lock().device_errors
    }

    /// Number of notifications dropped because they named another session
    pub fn stale_notification_count(&self) -> u64 {
        self.inner.lock().stale_notifications
    }

    /// Take ownership of a freshly created session and mark it ready
    pub fn adopt(&self, session: SessionHandle) {
        let mut inner = self.inner.lock();
        if let Some(previous) = inner.owned_session.replace(session) {
            warn!("{} replaces still-owned {}", session, previous);
        }
        inner.state = SessionState::Ready;
        debug!("Tracking {} (READY)", session);
    }

    /// Apply a transition reported for `session`
    ///
    /// Returns `false` if the notification was ignored because `session` is
    /// not the owned session.
    pub fn on_transition(&self, session: SessionHandle, new_state: SessionState) -> bool {
        let mut inner = self.inner.lock();

        if inner.owned_session != Some(session) {
            inner.stale_notifications += 1;
            warn!(
                "Unexpected session notification: {} -> {} (owned: {:?})",
                session, new_state, inner.owned_session
            );
            return false;
        }

        let old_state = inner.state;
        if old_state == SessionState::Active && new_state == SessionState::Closed {
            warn!("{} closed while ACTIVE", session);
        }
        inner.state = new_state;

        info!("Session state: {} -> {}", old_state, new_state);
        true
    }

    /// Record a device error; session state is left untouched
    pub fn on_device_error(&self, device: DeviceHandle, device_error: DeviceError) {
        let mut inner = self.inner.lock();
        inner.device_errors += 1;
        inner.last_device_error = Some((device, device_error));
        error!("{} reported {}", device, device_error);
    }

    /// Log an availability change
    pub fn on_availability_changed(&self, camera_id: &str, available: bool) {
        info!(
            "Camera {} is now {}",
            camera_id,
            if available { "available" } else { "unavailable" }
        );
    }
}

impl CameraEventListener for SessionTracker {
    fn on_session_transition(&self, session: SessionHandle, state: SessionState) {
        self.on_transition(session, state);
    }

    fn on_device_error(&self, device: DeviceHandle, error: DeviceError) {
        SessionTracker::on_device_error(self, device, error);
    }

    fn on_availability_changed(&self, camera_id: &str, available: bool) {
        SessionTracker::on_availability_changed(self, camera_id, available);
    }
}
