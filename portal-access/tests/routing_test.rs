//! Route access decisions and application wiring

use async_trait::async_trait;
use portal_access::{
    AccessError, AccessResult, MemoryTabStorage, MenuCatalog, NavigationService, PortalServices,
    RouteDecision, RouteTable, SessionPort, TokenRefresher,
};
use portal_core::{ManualClock, PermissionSet, PortalConfig, PortalError, Role};
use std::io::Write;
use std::sync::Arc;

fn service() -> NavigationService {
    NavigationService::new(
        Arc::new(MenuCatalog::default()),
        RouteTable::default(),
        Arc::new(MemoryTabStorage::new()),
    )
}

#[test]
fn admin_paths_belong_to_admin_only() {
    let service = service();
    assert!(!service.can_access_route("/admin/users", Role::User));
    assert!(service.can_access_route("/admin/users", Role::Admin));
    assert!(service.can_access_route("/admin/users/17", Role::Admin));
    assert!(service.can_access_route("/login", Role::Guest));
    assert!(service.can_access_route("/", Role::Guest));
    assert!(!service.can_access_route("/user/dashboard", Role::Guest));
}

#[test]
fn intended_route_is_read_once() {
    let service = service();
    service.set_intended_route("/admin/users");
    assert_eq!(service.get_intended_route().as_deref(), Some("/admin/users"));
    assert_eq!(service.get_intended_route(), None);
}

#[test]
fn default_routes_per_role() {
    let service = service();
    assert_eq!(service.get_default_route(Role::Admin), "/admin/dashboard");
    assert_eq!(service.get_default_route(Role::Moderator), "/moderator/dashboard");
    assert_eq!(service.get_default_route(Role::Guest), "/login");
}

#[test]
fn guest_bounce_returns_to_intended_route_after_login() {
    let service = service();
    assert_eq!(
        service.guard("/admin/reports", Role::Guest),
        RouteDecision::RedirectToLogin
    );
    assert_eq!(service.post_login_route(Role::Admin), "/admin/reports");
    assert_eq!(service.post_login_route(Role::Admin), "/admin/dashboard");
}

#[test]
fn intended_route_outside_role_falls_back_to_default() {
    let service = service();
    service.guard("/admin/settings", Role::Guest);
    assert_eq!(service.post_login_route(Role::User), "/user/dashboard");
    assert_eq!(service.get_intended_route(), None);
}

#[test]
fn signed_in_user_is_sent_home_from_foreign_route() {
    let service = service();
    assert_eq!(
        service.guard("/admin/users", Role::User),
        RouteDecision::RedirectToDefault("/user/dashboard".to_string())
    );
    assert_eq!(service.get_intended_route(), None);
    assert_eq!(service.guard("/user/offers/9/", Role::User), RouteDecision::Allow);
}

#[test]
fn route_decision_serializes_with_path() {
    let json = serde_json::to_value(RouteDecision::RedirectToDefault("/home".into())).unwrap();
    assert_eq!(json["decision"], "redirect_to_default");
    assert_eq!(json["path"], "/home");
}

struct StaticRefresher;

#[async_trait]
impl TokenRefresher for StaticRefresher {
    async fn refresh(&self, _refresh_token: &str) -> AccessResult<String> {
        Ok("fresh".to_string())
    }
}

#[test]
fn services_require_a_refresher() {
    let err = PortalServices::builder(PortalConfig::default())
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, AccessError::Config { .. }));
}

#[test]
fn services_reject_invalid_config() {
    let mut config = PortalConfig::default();
    config.session.poll_interval_ms = 0;
    let err = PortalServices::builder(config)
        .refresher(Arc::new(StaticRefresher))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, AccessError::Core(PortalError::Validation { .. })));
}

#[test]
fn services_report_a_missing_catalog_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = PortalConfig::default();
    config.navigation.menu_catalog_path = Some(dir.path().join("menus.toml"));

    let err = PortalServices::builder(config)
        .refresher(Arc::new(StaticRefresher))
        .build()
        .err()
        .unwrap();
    match err {
        AccessError::Core(PortalError::NotFound { resource, .. }) => {
            assert!(resource.ends_with("menus.toml"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn services_load_catalog_file_and_share_the_store() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
        [[user]]
        key = "home"
        label = "Home"
        path = "/user/dashboard"

        [[user]]
        key = "billing"
        label = "Billing"
        path = "/user/billing"
        permissions = ["billing.read"]
        "#
    )
    .unwrap();

    let mut config = PortalConfig::default();
    config.navigation.menu_catalog_path = Some(file.path().to_path_buf());
    config.navigation.history_limit = Some(5);

    let services = PortalServices::builder(config)
        .clock(Arc::new(ManualClock::default()))
        .refresher(Arc::new(StaticRefresher))
        .build()
        .unwrap();

    services
        .store
        .login(Role::User, PermissionSet::new(), Some("r".to_string()));
    let navigator = services.navigator();
    let keys: Vec<&str> = navigator.menu().iter().map(|n| n.key.as_str()).collect();
    assert_eq!(keys, vec!["home"]);
    assert_eq!(services.navigation.get_navigation_menu(Role::User).len(), 2);

    let clock = services.session_clock();
    assert_eq!(clock.time_remaining().formatted, "30:00");
    clock.logout();
    assert!(!services.store.is_authenticated());
}
