//! Session clock and session manager lifecycle

mod common;

use async_trait::async_trait;
use common::{settle, RecordingSession};
use portal_access::{
    AccessError, AccessResult, ActivityBus, ActivityKind, SessionAction, SessionClock,
    SessionManager, SessionPhase, SessionPort, SessionStore, TokenRefresher,
};
use portal_core::{ManualClock, PermissionSet, PortalError, Role, SessionConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn config() -> SessionConfig {
    SessionConfig::default()
}

#[test]
fn warning_shows_once_per_low_time_window() {
    let session = Arc::new(RecordingSession::authenticated(299_999));
    let clock = SessionClock::new(session.clone(), config());

    assert_eq!(clock.poll(), SessionPhase::Warning);
    assert!(clock.show_warning());

    clock.dismiss_warning();
    assert!(!clock.show_warning());
    assert_eq!(clock.poll(), SessionPhase::Active);
    assert!(!clock.show_warning());
    assert_eq!(clock.time_remaining().formatted, "04:59");
}

#[test]
fn warning_rearms_after_time_recovers() {
    let session = Arc::new(RecordingSession::authenticated(200_000));
    let clock = SessionClock::new(session.clone(), config());

    clock.poll();
    clock.dismiss_warning();

    session.set_remaining(1_000_000);
    assert_eq!(clock.poll(), SessionPhase::Active);

    session.set_remaining(100_000);
    assert_eq!(clock.poll(), SessionPhase::Warning);
    assert!(clock.show_warning());
}

#[test]
fn expiry_forces_logout_exactly_once() {
    let session = Arc::new(RecordingSession::authenticated(0));
    let clock = SessionClock::new(session.clone(), config());

    assert_eq!(clock.poll(), SessionPhase::Expired);
    assert_eq!(clock.poll(), SessionPhase::Expired);
    assert_eq!(session.count(&SessionAction::ForceLogout), 1);
    assert!(!clock.show_warning());
}

#[test]
fn extend_session_touches_activity_and_rearms_expiry() {
    let session = Arc::new(RecordingSession::authenticated(0));
    let clock = SessionClock::new(session.clone(), config());

    clock.poll();
    clock.extend_session();
    assert_eq!(session.count(&SessionAction::UpdateLastActivity), 1);

    clock.poll();
    assert_eq!(session.count(&SessionAction::ForceLogout), 2);
}

#[test]
fn logout_ignores_remaining_time() {
    let session = Arc::new(RecordingSession::authenticated(1_000_000));
    let clock = SessionClock::new(session.clone(), config());
    clock.logout();
    assert_eq!(session.count(&SessionAction::ForceLogout), 1);
}

#[test]
fn anonymous_session_stays_idle() {
    let session = Arc::new(RecordingSession::anonymous());
    let clock = SessionClock::new(session.clone(), config());
    assert_eq!(clock.poll(), SessionPhase::Idle);
    assert_eq!(session.count(&SessionAction::ForceLogout), 0);
}

#[tokio::test(start_paused = true)]
async fn clock_polls_only_while_authenticated() {
    let manual = Arc::new(ManualClock::default());
    let config = config();
    let store = Arc::new(SessionStore::new(&config, manual.clone()));
    let clock = SessionClock::new(store.clone(), config.clone());

    clock.mount();
    clock.mount();
    assert!(!clock.is_polling());

    store.login(Role::User, PermissionSet::new(), None);
    settle().await;
    assert!(clock.is_polling());
    assert_eq!(clock.phase(), SessionPhase::Active);

    manual.advance_ms(1_500_001);
    tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
    settle().await;
    assert!(clock.show_warning());

    store.dispatch(SessionAction::ForceLogout);
    settle().await;
    assert!(!clock.is_polling());
    assert_eq!(clock.phase(), SessionPhase::Idle);

    clock.unmount();
    clock.unmount();
}

#[tokio::test(start_paused = true)]
async fn polled_expiry_logs_the_store_out() {
    let manual = Arc::new(ManualClock::default());
    let config = config();
    let store = Arc::new(SessionStore::new(&config, manual.clone()));
    store.login(Role::Admin, PermissionSet::new(), Some("r1".to_string()));

    let clock = SessionClock::new(store.clone(), config.clone());
    clock.mount();

    manual.advance_ms(config.session_timeout_ms as i64);
    tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
    settle().await;

    assert!(!store.is_authenticated());
    assert_eq!(store.refresh_token(), None);
    assert!(!clock.is_polling());
}

#[tokio::test(start_paused = true)]
async fn dropped_clock_leaves_no_timer_behind() {
    let manual = Arc::new(ManualClock::default());
    let config = config();
    let store = Arc::new(SessionStore::new(&config, manual.clone()));
    store.login(Role::User, PermissionSet::new(), None);

    let clock = SessionClock::new(store.clone(), config.clone());
    clock.mount();
    assert!(clock.is_polling());
    drop(clock);

    manual.advance_ms(config.session_timeout_ms as i64);
    tokio::time::sleep(Duration::from_millis(config.poll_interval_ms * 2)).await;
    assert!(store.is_authenticated());
}

struct CountingRefresher {
    calls: AtomicUsize,
}

#[async_trait]
impl TokenRefresher for CountingRefresher {
    async fn refresh(&self, refresh_token: &str) -> AccessResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("{refresh_token}-{call}"))
    }
}

struct RejectingRefresher;

#[async_trait]
impl TokenRefresher for RejectingRefresher {
    async fn refresh(&self, _refresh_token: &str) -> AccessResult<String> {
        Err(AccessError::refresh("refresh token revoked"))
    }
}

struct StalledRefresher;

#[async_trait]
impl TokenRefresher for StalledRefresher {
    async fn refresh(&self, refresh_token: &str) -> AccessResult<String> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(refresh_token.to_string())
    }
}

/// Answers after a delay so the session can change underneath it
struct SlowRefresher {
    succeed: bool,
}

#[async_trait]
impl TokenRefresher for SlowRefresher {
    async fn refresh(&self, refresh_token: &str) -> AccessResult<String> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if self.succeed {
            Ok(format!("{refresh_token}-refreshed"))
        } else {
            Err(AccessError::refresh("refresh token revoked"))
        }
    }
}

fn counting() -> Arc<CountingRefresher> {
    Arc::new(CountingRefresher {
        calls: AtomicUsize::new(0),
    })
}

#[tokio::test(start_paused = true)]
async fn activity_is_throttled_to_one_dispatch_per_window() {
    let session = Arc::new(RecordingSession::authenticated(1_000_000));
    let bus = ActivityBus::new();
    let manager = SessionManager::new(session.clone(), bus.clone(), counting(), config());
    manager.init();

    for kind in [
        ActivityKind::Pointer,
        ActivityKind::Key,
        ActivityKind::Scroll,
        ActivityKind::Touch,
    ] {
        bus.emit(kind);
    }
    settle().await;
    assert_eq!(session.count(&SessionAction::UpdateLastActivity), 1);

    tokio::time::sleep(Duration::from_millis(config().activity_debounce_ms)).await;
    bus.emit(ActivityKind::Key);
    settle().await;
    assert_eq!(session.count(&SessionAction::UpdateLastActivity), 2);
}

#[tokio::test(start_paused = true)]
async fn activity_is_ignored_while_logged_out() {
    let session = Arc::new(RecordingSession::anonymous());
    let bus = ActivityBus::new();
    let manager = SessionManager::new(session.clone(), bus.clone(), counting(), config());
    manager.init();

    bus.emit(ActivityKind::Pointer);
    settle().await;
    assert_eq!(session.count(&SessionAction::UpdateLastActivity), 0);
}

#[tokio::test(start_paused = true)]
async fn timeout_check_forces_logout_once_per_expiry() {
    let session = Arc::new(RecordingSession::authenticated(0));
    let config = config();
    let period = Duration::from_millis(config.timeout_check_interval_ms);
    let manager = SessionManager::new(session.clone(), ActivityBus::new(), counting(), config);
    manager.init();

    tokio::time::sleep(period).await;
    settle().await;
    assert_eq!(session.count(&SessionAction::ForceLogout), 1);

    tokio::time::sleep(period).await;
    assert_eq!(session.count(&SessionAction::ForceLogout), 1);

    session.set_remaining(10_000);
    tokio::time::sleep(period).await;
    session.set_remaining(0);
    tokio::time::sleep(period).await;
    settle().await;
    assert_eq!(session.count(&SessionAction::ForceLogout), 2);
}

#[tokio::test(start_paused = true)]
async fn refresh_interval_rotates_token() {
    let config = config();
    let store = Arc::new(SessionStore::new(&config, Arc::new(ManualClock::default())));
    store.login(Role::User, PermissionSet::new(), Some("r".to_string()));

    let refresher = counting();
    let manager = SessionManager::new(
        store.clone(),
        ActivityBus::new(),
        refresher.clone(),
        config.clone(),
    );
    manager.init();

    tokio::time::sleep(Duration::from_millis(config.refresh_interval_ms)).await;
    settle().await;
    assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.refresh_token().as_deref(), Some("r-1"));
    assert!(store.snapshot().last_refresh_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn refresh_is_skipped_without_a_session() {
    let config = config();
    let store = Arc::new(SessionStore::new(&config, Arc::new(ManualClock::default())));
    let refresher = counting();
    let manager = SessionManager::new(store, ActivityBus::new(), refresher.clone(), config);

    assert!(!manager.refresh_now().await.unwrap());
    assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn refresh_failure_forces_logout() {
    let config = config();
    let store = Arc::new(SessionStore::new(&config, Arc::new(ManualClock::default())));
    store.login(Role::User, PermissionSet::new(), Some("r".to_string()));
    let manager = SessionManager::new(
        store.clone(),
        ActivityBus::new(),
        Arc::new(RejectingRefresher),
        config,
    );

    let err = manager.refresh_now().await.unwrap_err();
    assert!(matches!(err, AccessError::Refresh { .. }));
    assert!(!store.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn stalled_refresh_times_out_and_logs_out() {
    let config = config();
    let store = Arc::new(SessionStore::new(&config, Arc::new(ManualClock::default())));
    store.login(Role::User, PermissionSet::new(), Some("r".to_string()));
    let manager = SessionManager::new(
        store.clone(),
        ActivityBus::new(),
        Arc::new(StalledRefresher),
        config,
    );

    let err = manager.refresh_now().await.unwrap_err();
    assert!(matches!(err, AccessError::Core(PortalError::Timeout { .. })));
    assert!(!store.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn destroy_releases_listener_and_timers() {
    let session = Arc::new(RecordingSession::authenticated(0));
    let bus = ActivityBus::new();
    let manager = SessionManager::new(session.clone(), bus.clone(), counting(), config());

    manager.destroy();
    manager.init();
    manager.init();
    assert_eq!(bus.listener_count(), 1);

    manager.destroy();
    manager.destroy();
    settle().await;
    assert_eq!(bus.listener_count(), 0);

    tokio::time::sleep(Duration::from_millis(config().timeout_check_interval_ms * 2)).await;
    assert_eq!(session.count(&SessionAction::ForceLogout), 0);
}

async fn refresh_across_relogin(succeed: bool) -> (Arc<SessionStore>, AccessResult<bool>) {
    let config = config();
    let store = Arc::new(SessionStore::new(&config, Arc::new(ManualClock::default())));
    store.login(Role::User, PermissionSet::new(), Some("alice".to_string()));
    let manager = SessionManager::new(
        store.clone(),
        ActivityBus::new(),
        Arc::new(SlowRefresher { succeed }),
        config,
    );

    let (result, ()) = tokio::join!(manager.refresh_now(), async {
        store.dispatch(SessionAction::ForceLogout);
        store.login(Role::Admin, PermissionSet::new(), Some("bob".to_string()));
    });
    (store, result)
}

#[tokio::test(start_paused = true)]
async fn refresh_result_does_not_leak_into_the_next_session() {
    let (store, result) = refresh_across_relogin(true).await;

    assert!(!result.unwrap());
    assert!(store.is_authenticated());
    assert_eq!(store.user_role(), Role::Admin);
    assert_eq!(store.refresh_token().as_deref(), Some("bob"));
    assert!(store.snapshot().last_refresh_at.is_none());
}

#[tokio::test(start_paused = true)]
async fn refresh_failure_does_not_log_out_the_next_session() {
    let (store, result) = refresh_across_relogin(false).await;

    assert!(matches!(result, Err(AccessError::Refresh { .. })));
    assert!(store.is_authenticated());
    assert_eq!(store.refresh_token().as_deref(), Some("bob"));
}
