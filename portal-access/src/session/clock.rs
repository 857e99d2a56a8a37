//! Per-view session clock
//!
//! Polls the remaining session time while a view is mounted and the user is
//! authenticated, raising the expiry warning and forcing logout on expiry.
//!
//! ```text
//! Idle --auth--> Active --remaining <= threshold--> Warning
//!                  ^  \                              |
//!                  |   `----remaining <= 0----> Expired (force logout once)
//!                  `------ extend_session ----------'
//! ```

use super::store::{SessionAction, SessionPort};
use parking_lot::Mutex;
use portal_core::{spawn_interval, spawn_task, SessionConfig, TaskHandle};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Not authenticated; no timer runs
    #[default]
    Idle,
    Active,
    /// Remaining time is at or below the warning threshold
    Warning,
    Expired,
}

/// Remaining session time split for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRemaining {
    pub minutes: i64,
    pub seconds: i64,
    /// `MM:SS`
    pub formatted: String,
}

impl TimeRemaining {
    pub fn from_ms(ms: i64) -> Self {
        let ms = ms.max(0);
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) / 1000;
        Self {
            minutes,
            seconds,
            formatted: format!("{:02}:{:02}", minutes, seconds),
        }
    }
}

#[derive(Debug, Default)]
struct ClockStatus {
    phase: SessionPhase,
    show_warning: bool,
    /// Warning already raised in the current low-time window
    warning_shown: bool,
    /// Force logout already dispatched for the current expiry
    logout_dispatched: bool,
    remaining_ms: i64,
}

struct ClockShared {
    session: Arc<dyn SessionPort>,
    config: SessionConfig,
    status: Mutex<ClockStatus>,
    poll_task: Mutex<Option<TaskHandle>>,
}

impl ClockShared {
    fn poll(&self) -> SessionPhase {
        if !self.session.is_authenticated() {
            self.mark_idle();
            return SessionPhase::Idle;
        }

        let remaining = self.session.session_time_remaining_ms();
        let threshold = i64::try_from(self.config.warning_threshold_ms).unwrap_or(i64::MAX);
        let mut force_logout = false;

        let phase = {
            let mut status = self.status.lock();
            let previous = status.phase;
            status.remaining_ms = remaining;

            if remaining <= 0 {
                status.show_warning = false;
                if !status.logout_dispatched {
                    status.logout_dispatched = true;
                    force_logout = true;
                }
                status.phase = SessionPhase::Expired;
            } else {
                status.logout_dispatched = false;
                if remaining <= threshold {
                    if !status.warning_shown {
                        status.warning_shown = true;
                        status.show_warning = true;
                    }
                } else {
                    status.show_warning = false;
                    status.warning_shown = false;
                }
                status.phase = if status.show_warning {
                    SessionPhase::Warning
                } else {
                    SessionPhase::Active
                };
            }

            if previous != status.phase {
                info!(
                    from = ?previous,
                    to = ?status.phase,
                    remaining_ms = remaining,
                    "Session phase changed"
                );
            }
            status.phase
        };

        if force_logout {
            warn!("Session expired, forcing logout");
            self.session.dispatch(SessionAction::ForceLogout);
        }

        phase
    }

    fn start_polling(self: &Arc<Self>) {
        {
            let mut poll_task = self.poll_task.lock();
            if poll_task.as_ref().is_some_and(TaskHandle::is_active) {
                return;
            }

            *self.status.lock() = ClockStatus {
                phase: SessionPhase::Active,
                ..ClockStatus::default()
            };

            let weak: Weak<Self> = Arc::downgrade(self);
            let period = Duration::from_millis(self.config.poll_interval_ms);
            *poll_task = Some(spawn_interval("session-clock-poll", period, move || {
                let weak = weak.clone();
                async move {
                    if let Some(shared) = weak.upgrade() {
                        shared.poll();
                    }
                }
            }));
            debug!(poll_interval_ms = self.config.poll_interval_ms, "Session polling started");
        }

        self.poll();
    }

    fn stop_polling(&self) {
        if let Some(mut task) = self.poll_task.lock().take() {
            task.cancel();
            debug!("Session polling stopped");
        }
    }

    fn mark_idle(&self) {
        let mut status = self.status.lock();
        if status.phase != SessionPhase::Idle {
            debug!(from = ?status.phase, "Session clock idle");
        }
        *status = ClockStatus::default();
    }
}

/// Session clock scoped to one mounted view
pub struct SessionClock {
    shared: Arc<ClockShared>,
    watcher: Mutex<Option<TaskHandle>>,
}

impl SessionClock {
    pub fn new(session: Arc<dyn SessionPort>, config: SessionConfig) -> Self {
        Self {
            shared: Arc::new(ClockShared {
                session,
                config,
                status: Mutex::new(ClockStatus::default()),
                poll_task: Mutex::new(None),
            }),
            watcher: Mutex::new(None),
        }
    }

    /// Start following authentication changes. Idempotent.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn mount(&self) {
        let mut watcher = self.watcher.lock();
        if watcher.is_some() {
            return;
        }

        let mut rx = self.shared.session.subscribe();
        let mut authenticated = rx.borrow_and_update().is_authenticated;
        if authenticated {
            self.shared.start_polling();
        }

        let weak = Arc::downgrade(&self.shared);
        *watcher = Some(spawn_task("session-clock-auth", async move {
            while rx.changed().await.is_ok() {
                let now_authenticated = rx.borrow_and_update().is_authenticated;
                if now_authenticated == authenticated {
                    continue;
                }
                authenticated = now_authenticated;

                let Some(shared) = weak.upgrade() else {
                    break;
                };
                if authenticated {
                    shared.start_polling();
                } else {
                    shared.stop_polling();
                    shared.mark_idle();
                }
            }
        }));
    }

    /// Stop every timer and listener. Idempotent.
    pub fn unmount(&self) {
        if let Some(mut watcher) = self.watcher.lock().take() {
            watcher.cancel();
        }
        self.shared.stop_polling();
        self.shared.mark_idle();
    }

    /// Evaluate one tick immediately
    pub fn poll(&self) -> SessionPhase {
        self.shared.poll()
    }

    pub fn is_polling(&self) -> bool {
        self.shared
            .poll_task
            .lock()
            .as_ref()
            .is_some_and(TaskHandle::is_active)
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.status.lock().phase
    }

    pub fn show_warning(&self) -> bool {
        self.shared.status.lock().show_warning
    }

    pub fn time_remaining(&self) -> TimeRemaining {
        TimeRemaining::from_ms(self.shared.session.session_time_remaining_ms())
    }

    /// Hide the warning for the rest of the current low-time window
    pub fn dismiss_warning(&self) {
        let mut status = self.shared.status.lock();
        status.show_warning = false;
        status.warning_shown = true;
        if status.phase == SessionPhase::Warning {
            status.phase = SessionPhase::Active;
        }
    }

    /// Record activity and clear the warning
    pub fn extend_session(&self) {
        self.shared.session.dispatch(SessionAction::UpdateLastActivity);
        let mut status = self.shared.status.lock();
        status.show_warning = false;
        status.warning_shown = false;
        status.logout_dispatched = false;
        if self.shared.session.is_authenticated() {
            status.phase = SessionPhase::Active;
        }
        info!("Session extended");
    }

    /// Force logout regardless of remaining time
    pub fn logout(&self) {
        info!("Logout requested");
        self.shared.session.dispatch(SessionAction::ForceLogout);
    }
}

impl Drop for SessionClock {
    fn drop(&mut self) {
        self.unmount();
    }
}
