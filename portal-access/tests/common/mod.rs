//! Shared fakes for the integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use portal_access::{SessionAction, SessionPort, SessionState};
use portal_core::Role;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Session port with a scripted remaining time that records dispatches
/// without applying them
pub struct RecordingSession {
    state: watch::Sender<SessionState>,
    remaining_ms: AtomicI64,
    dispatched: Mutex<Vec<SessionAction>>,
}

impl RecordingSession {
    pub fn authenticated(remaining_ms: i64) -> Self {
        let state = SessionState {
            is_authenticated: true,
            role: Role::User,
            ..SessionState::default()
        };
        Self {
            state: watch::channel(state).0,
            remaining_ms: AtomicI64::new(remaining_ms),
            dispatched: Mutex::new(Vec::new()),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            state: watch::channel(SessionState::default()).0,
            remaining_ms: AtomicI64::new(0),
            dispatched: Mutex::new(Vec::new()),
        }
    }

    pub fn set_remaining(&self, remaining_ms: i64) {
        self.remaining_ms.store(remaining_ms, Ordering::SeqCst);
    }

    pub fn count(&self, action: &SessionAction) -> usize {
        self.dispatched
            .lock()
            .iter()
            .filter(|dispatched| *dispatched == action)
            .count()
    }
}

impl SessionPort for RecordingSession {
    fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    fn session_time_remaining_ms(&self) -> i64 {
        self.remaining_ms.load(Ordering::SeqCst)
    }

    fn dispatch(&self, action: SessionAction) {
        self.dispatched.lock().push(action);
    }

    fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}

/// Let spawned tasks run to their next suspension point
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
