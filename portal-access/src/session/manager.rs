//! Application-lifetime session manager
//!
//! Owns the activity listener and the two background intervals: the timeout
//! check and the token refresh. Construct it once at startup, call
//! [`SessionManager::init`] and keep it alive for the lifetime of the app.

use super::activity::{ActivityBus, ActivityKind};
use super::store::{SessionAction, SessionPort};
use crate::{AccessError, AccessResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use portal_core::{spawn_interval, spawn_task, with_timeout, SessionConfig, TaskHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Exchanges a refresh token for a new one
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> AccessResult<String>;
}

struct ManagerShared {
    session: Arc<dyn SessionPort>,
    refresher: Arc<dyn TokenRefresher>,
    config: SessionConfig,
    logout_dispatched: AtomicBool,
}

impl ManagerShared {
    fn on_activity(&self, kind: ActivityKind, last_dispatch: &mut Option<Instant>, window: Duration) {
        if !self.session.is_authenticated() {
            return;
        }

        let now = Instant::now();
        if last_dispatch.is_some_and(|at| now.duration_since(at) < window) {
            trace!(?kind, "Activity throttled");
            return;
        }

        *last_dispatch = Some(now);
        self.session.dispatch(SessionAction::UpdateLastActivity);
    }

    fn check_timeout(&self) {
        if !self.session.is_authenticated() || self.session.session_time_remaining_ms() > 0 {
            self.logout_dispatched.store(false, Ordering::SeqCst);
            return;
        }

        if !self.logout_dispatched.swap(true, Ordering::SeqCst) {
            warn!("Session timed out, forcing logout");
            self.session.dispatch(SessionAction::ForceLogout);
        }
    }

    /// Refresh the token of the session that is current when the call starts.
    ///
    /// The outcome is tagged with that session's generation, so a logout or a
    /// new login while the refresher is in flight leaves the newer session alone.
    async fn refresh(&self) -> AccessResult<bool> {
        let state = self.session.snapshot();
        if !state.is_authenticated {
            return Ok(false);
        }
        let Some(token) = state.refresh_token else {
            debug!("No refresh token, skipping refresh");
            return Ok(false);
        };
        let generation = state.session_generation;

        let outcome = with_timeout(
            self.refresher.refresh(&token),
            self.config.refresh_timeout_ms,
            "token_refresh",
        )
        .await
        .map_err(AccessError::from)
        .and_then(|result| result);

        let current = self.session.snapshot().session_generation;
        match outcome {
            Ok(_) if current != generation => {
                debug!(generation, current, "Session changed during refresh, discarding token");
                Ok(false)
            }
            Ok(refresh_token) => {
                self.session.dispatch(SessionAction::TokenRefreshed {
                    generation,
                    refresh_token,
                });
                info!("Session token refreshed");
                Ok(true)
            }
            Err(error) => {
                if current == generation {
                    warn!(error = %error, "Token refresh failed, forcing logout");
                } else {
                    debug!(error = %error, "Refresh for an earlier session failed");
                }
                self.session.dispatch(SessionAction::RefreshFailed { generation });
                Err(error)
            }
        }
    }
}

struct ManagerTasks {
    _activity: TaskHandle,
    _timeout_check: TaskHandle,
    _refresh: TaskHandle,
}

pub struct SessionManager {
    shared: Arc<ManagerShared>,
    activity: ActivityBus,
    tasks: Mutex<Option<ManagerTasks>>,
}

impl SessionManager {
    pub fn new(
        session: Arc<dyn SessionPort>,
        activity: ActivityBus,
        refresher: Arc<dyn TokenRefresher>,
        config: SessionConfig,
    ) -> Self {
        Self {
            shared: Arc::new(ManagerShared {
                session,
                refresher,
                config,
                logout_dispatched: AtomicBool::new(false),
            }),
            activity,
            tasks: Mutex::new(None),
        }
    }

    /// Start the activity listener and both intervals. Idempotent.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn init(&self) {
        let mut tasks = self.tasks.lock();
        if tasks.is_some() {
            debug!("Session manager already initialized");
            return;
        }

        let config = &self.shared.config;

        let mut rx = self.activity.subscribe();
        let shared = Arc::clone(&self.shared);
        let window = Duration::from_millis(config.activity_debounce_ms);
        let activity = spawn_task("session-activity", async move {
            let mut last_dispatch = None;
            loop {
                match rx.recv().await {
                    Ok(kind) => shared.on_activity(kind, &mut last_dispatch, window),
                    Err(RecvError::Lagged(skipped)) => {
                        trace!(skipped, "Activity listener lagged");
                        shared.on_activity(ActivityKind::Pointer, &mut last_dispatch, window);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let shared = Arc::clone(&self.shared);
        let timeout_check = spawn_interval(
            "session-timeout-check",
            Duration::from_millis(config.timeout_check_interval_ms),
            move || {
                let shared = Arc::clone(&shared);
                async move { shared.check_timeout() }
            },
        );

        let shared = Arc::clone(&self.shared);
        let refresh = spawn_interval(
            "session-refresh",
            Duration::from_millis(config.refresh_interval_ms),
            move || {
                let shared = Arc::clone(&shared);
                async move {
                    // failures are logged and already ended the session
                    let _ = shared.refresh().await;
                }
            },
        );

        *tasks = Some(ManagerTasks {
            _activity: activity,
            _timeout_check: timeout_check,
            _refresh: refresh,
        });

        info!(
            timeout_check_interval_ms = config.timeout_check_interval_ms,
            refresh_interval_ms = config.refresh_interval_ms,
            activity_debounce_ms = config.activity_debounce_ms,
            "Session manager initialized"
        );
    }

    /// Stop the listener and both intervals. Idempotent, safe before `init`.
    pub fn destroy(&self) {
        if self.tasks.lock().take().is_some() {
            info!("Session manager destroyed");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.tasks.lock().is_some()
    }

    /// Run the refresh tick now. Returns whether a new token was stored.
    pub async fn refresh_now(&self) -> AccessResult<bool> {
        self.shared.refresh().await
    }

    /// Run the timeout check now
    pub fn check_timeout_now(&self) {
        self.shared.check_timeout();
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.destroy();
    }
}
