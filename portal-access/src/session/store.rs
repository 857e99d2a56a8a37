//! Session store
//!
//! Process-wide session state shared by every component. Nothing mutates it
//! directly: callers dispatch a [`SessionAction`] and the reducer computes the
//! next state. Subscribers observe changes through a `watch` channel.

use chrono::{DateTime, Utc};
use portal_core::{Clock, PermissionSet, Role, SessionConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Snapshot of the authenticated-activity window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub is_authenticated: bool,
    /// Bumped on every login and logout; tags work started for one session
    #[serde(default)]
    pub session_generation: u64,
    pub role: Role,
    pub permissions: PermissionSet,
    /// Bumped every time `permissions` is replaced
    pub permissions_epoch: u64,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub session_timeout_ms: u64,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub last_refresh_at: Option<DateTime<Utc>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            is_authenticated: false,
            session_generation: 0,
            role: Role::Guest,
            permissions: PermissionSet::new(),
            permissions_epoch: 0,
            last_activity_at: None,
            session_timeout_ms: SessionConfig::default().session_timeout_ms,
            refresh_token: None,
            last_refresh_at: None,
        }
    }
}

/// Actions accepted by the session reducer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    Login {
        role: Role,
        permissions: PermissionSet,
        refresh_token: Option<String>,
    },
    UpdateLastActivity,
    /// New refresh token for the session identified by `generation`
    TokenRefreshed {
        generation: u64,
        refresh_token: String,
    },
    /// Refresh was rejected; logs out only the session identified by `generation`
    RefreshFailed {
        generation: u64,
    },
    SetPermissions(PermissionSet),
    ForceLogout,
}

impl SessionAction {
    pub fn name(&self) -> &'static str {
        match self {
            SessionAction::Login { .. } => "login",
            SessionAction::UpdateLastActivity => "update_last_activity",
            SessionAction::TokenRefreshed { .. } => "token_refreshed",
            SessionAction::RefreshFailed { .. } => "refresh_failed",
            SessionAction::SetPermissions(_) => "set_permissions",
            SessionAction::ForceLogout => "force_logout",
        }
    }
}

impl SessionState {
    fn fresh(session_timeout_ms: u64, permissions_epoch: u64, session_generation: u64) -> Self {
        Self {
            session_timeout_ms,
            permissions_epoch,
            session_generation,
            ..Self::default()
        }
    }

    fn logout(&mut self) -> bool {
        if !self.is_authenticated && self.refresh_token.is_none() {
            return false;
        }
        *self = Self::fresh(
            self.session_timeout_ms,
            self.permissions_epoch + 1,
            self.session_generation + 1,
        );
        true
    }

    /// Apply `action` at `now`. Returns whether anything changed.
    pub fn reduce(&mut self, action: SessionAction, now: DateTime<Utc>) -> bool {
        match action {
            SessionAction::Login {
                role,
                permissions,
                refresh_token,
            } => {
                *self = Self {
                    is_authenticated: true,
                    session_generation: self.session_generation + 1,
                    role,
                    permissions,
                    permissions_epoch: self.permissions_epoch + 1,
                    last_activity_at: Some(now),
                    session_timeout_ms: self.session_timeout_ms,
                    refresh_token,
                    last_refresh_at: None,
                };
                true
            }
            SessionAction::UpdateLastActivity => {
                if !self.is_authenticated {
                    return false;
                }
                self.last_activity_at = Some(now);
                true
            }
            SessionAction::TokenRefreshed {
                generation,
                refresh_token,
            } => {
                if !self.is_authenticated || generation != self.session_generation {
                    return false;
                }
                self.refresh_token = Some(refresh_token);
                self.last_refresh_at = Some(now);
                true
            }
            SessionAction::RefreshFailed { generation } => {
                if generation != self.session_generation {
                    return false;
                }
                self.logout()
            }
            SessionAction::SetPermissions(permissions) => {
                self.permissions = permissions;
                self.permissions_epoch += 1;
                true
            }
            SessionAction::ForceLogout => self.logout(),
        }
    }

    /// `last_activity_at + session_timeout_ms - now`, clamped at zero
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> i64 {
        if !self.is_authenticated {
            return 0;
        }
        let Some(last_activity) = self.last_activity_at else {
            return 0;
        };
        let elapsed = (now - last_activity).num_milliseconds();
        let timeout = i64::try_from(self.session_timeout_ms).unwrap_or(i64::MAX);
        timeout.saturating_sub(elapsed).max(0)
    }
}

/// Selectors and dispatch the session components consume
pub trait SessionPort: Send + Sync {
    fn snapshot(&self) -> SessionState;

    fn session_time_remaining_ms(&self) -> i64;

    fn dispatch(&self, action: SessionAction);

    fn subscribe(&self) -> watch::Receiver<SessionState>;

    fn is_authenticated(&self) -> bool {
        self.snapshot().is_authenticated
    }

    fn user_role(&self) -> Role {
        self.snapshot().role
    }

    fn user_permissions(&self) -> PermissionSet {
        self.snapshot().permissions
    }

    fn refresh_token(&self) -> Option<String> {
        self.snapshot().refresh_token
    }
}

/// In-process session store
pub struct SessionStore {
    tx: watch::Sender<SessionState>,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(config: &SessionConfig, clock: Arc<dyn Clock>) -> Self {
        let (tx, _) = watch::channel(SessionState::fresh(config.session_timeout_ms, 0, 0));
        Self { tx, clock }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn login(&self, role: Role, permissions: PermissionSet, refresh_token: Option<String>) {
        self.dispatch(SessionAction::Login {
            role,
            permissions,
            refresh_token,
        });
    }
}

impl SessionPort for SessionStore {
    fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    fn session_time_remaining_ms(&self) -> i64 {
        self.tx.borrow().remaining_ms(self.clock.now())
    }

    fn dispatch(&self, action: SessionAction) {
        let now = self.clock.now();
        let name = action.name();
        let changed = self.tx.send_if_modified(|state| state.reduce(action, now));

        match name {
            "login" | "force_logout" | "refresh_failed" if changed => info!(action = name, "Session action applied"),
            _ => debug!(action = name, changed, "Session action dispatched"),
        }
    }

    fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated
    }

    fn user_role(&self) -> Role {
        self.tx.borrow().role
    }

    fn refresh_token(&self) -> Option<String> {
        self.tx.borrow().refresh_token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::ManualClock;

    fn store() -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let config = SessionConfig {
            session_timeout_ms: 60_000,
            warning_threshold_ms: 10_000,
            ..SessionConfig::default()
        };
        (SessionStore::new(&config, clock.clone()), clock)
    }

    #[test]
    fn remaining_time_counts_down_from_last_activity() {
        let (store, clock) = store();
        assert_eq!(store.session_time_remaining_ms(), 0);

        store.login(Role::User, PermissionSet::new(), None);
        assert_eq!(store.session_time_remaining_ms(), 60_000);

        clock.advance_ms(45_000);
        assert_eq!(store.session_time_remaining_ms(), 15_000);

        store.dispatch(SessionAction::UpdateLastActivity);
        assert_eq!(store.session_time_remaining_ms(), 60_000);

        clock.advance_ms(90_000);
        assert_eq!(store.session_time_remaining_ms(), 0);
    }

    #[test]
    fn activity_is_ignored_when_logged_out() {
        let (store, _) = store();
        let rx = store.subscribe();
        store.dispatch(SessionAction::UpdateLastActivity);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.snapshot().last_activity_at, None);
    }

    #[test]
    fn force_logout_clears_credentials_and_bumps_epoch() {
        let (store, _) = store();
        store.login(
            Role::Admin,
            ["users.read"].into_iter().collect(),
            Some("r1".to_string()),
        );
        let epoch = store.snapshot().permissions_epoch;

        store.dispatch(SessionAction::ForceLogout);
        let state = store.snapshot();
        assert!(!state.is_authenticated);
        assert_eq!(state.role, Role::Guest);
        assert!(state.permissions.is_empty());
        assert_eq!(state.refresh_token, None);
        assert_eq!(state.permissions_epoch, epoch + 1);
        assert_eq!(state.session_timeout_ms, 60_000);
    }

    #[test]
    fn set_permissions_replaces_wholesale() {
        let (store, _) = store();
        store.login(Role::User, ["a", "b"].into_iter().collect(), None);
        store.dispatch(SessionAction::SetPermissions(["c"].into_iter().collect()));
        let perms: Vec<String> = store.user_permissions().iter().map(str::to_string).collect();
        assert_eq!(perms, vec!["c"]);
    }

    #[test]
    fn token_refresh_requires_authentication() {
        let (store, _) = store();
        store.dispatch(SessionAction::TokenRefreshed {
            generation: 0,
            refresh_token: "r2".to_string(),
        });
        assert_eq!(store.refresh_token(), None);

        store.login(Role::User, PermissionSet::new(), Some("r1".to_string()));
        store.dispatch(SessionAction::TokenRefreshed {
            generation: store.snapshot().session_generation,
            refresh_token: "r2".to_string(),
        });
        assert_eq!(store.refresh_token().as_deref(), Some("r2"));
        assert!(store.snapshot().last_refresh_at.is_some());
    }

    #[test]
    fn results_for_an_earlier_session_are_ignored() {
        let (store, _) = store();
        store.login(Role::User, PermissionSet::new(), Some("alice".to_string()));
        let stale = store.snapshot().session_generation;

        store.dispatch(SessionAction::ForceLogout);
        store.login(Role::Admin, PermissionSet::new(), Some("bob".to_string()));
        assert!(store.snapshot().session_generation > stale);

        store.dispatch(SessionAction::TokenRefreshed {
            generation: stale,
            refresh_token: "alice-refreshed".to_string(),
        });
        store.dispatch(SessionAction::RefreshFailed { generation: stale });
        assert!(store.is_authenticated());
        assert_eq!(store.refresh_token().as_deref(), Some("bob"));

        let current = store.snapshot().session_generation;
        store.dispatch(SessionAction::RefreshFailed { generation: current });
        assert!(!store.is_authenticated());
    }
}
