//! Route access guard and navigation service

use super::table::RouteTable;
use crate::navigation::{MenuCatalog, MenuNode};
use parking_lot::Mutex;
use portal_core::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Storage key for the route a guest tried to open before logging in
pub const INTENDED_ROUTE_KEY: &str = "intendedRoute";

/// Short-lived, tab-scoped key/value storage
pub trait TabStorage: Send + Sync {
    fn set_item(&self, key: &str, value: &str);

    /// Read and remove `key`
    fn take_item(&self, key: &str) -> Option<String>;
}

/// In-memory [`TabStorage`]
#[derive(Debug, Default)]
pub struct MemoryTabStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryTabStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TabStorage for MemoryTabStorage {
    fn set_item(&self, key: &str, value: &str) {
        self.items.lock().insert(key.to_string(), value.to_string());
    }

    fn take_item(&self, key: &str) -> Option<String> {
        self.items.lock().remove(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "path", rename_all = "snake_case")]
pub enum RouteDecision {
    Allow,
    RedirectToLogin,
    RedirectToDefault(String),
}

pub struct NavigationService {
    catalog: Arc<MenuCatalog>,
    routes: RouteTable,
    storage: Arc<dyn TabStorage>,
    history: Mutex<Vec<String>>,
}

impl NavigationService {
    pub fn new(catalog: Arc<MenuCatalog>, routes: RouteTable, storage: Arc<dyn TabStorage>) -> Self {
        Self {
            catalog,
            routes,
            storage,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Unfiltered menu declared for `role`
    pub fn get_navigation_menu(&self, role: Role) -> &[MenuNode] {
        self.catalog.menu_for(role)
    }

    pub fn get_default_route(&self, role: Role) -> &str {
        self.routes.default_route(role)
    }

    pub fn can_access_route(&self, path: &str, role: Role) -> bool {
        self.routes.is_public(path) || self.routes.role_owns(role, path)
    }

    /// Remember `path` for after login. Overwrites any unread value.
    pub fn set_intended_route(&self, path: &str) {
        self.storage.set_item(INTENDED_ROUTE_KEY, path);
        debug!(path, "Intended route stored");
    }

    /// Read the intended route once; later reads return `None`
    pub fn get_intended_route(&self) -> Option<String> {
        self.storage.take_item(INTENDED_ROUTE_KEY)
    }

    pub fn add_to_history(&self, path: &str) {
        self.history.lock().push(path.to_string());
    }

    pub fn get_history(&self) -> Vec<String> {
        self.history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    /// Decide what happens when `role` opens `path`.
    ///
    /// A guest bounced to login has `path` stored as the intended route.
    pub fn guard(&self, path: &str, role: Role) -> RouteDecision {
        if self.can_access_route(path, role) {
            return RouteDecision::Allow;
        }

        if role.is_guest() {
            self.set_intended_route(path);
            info!(path, "Guest redirected to login");
            return RouteDecision::RedirectToLogin;
        }

        let fallback = self.get_default_route(role).to_string();
        info!(path, role = %role, redirect = %fallback, "Route denied");
        RouteDecision::RedirectToDefault(fallback)
    }

    /// Landing page after login: the intended route when `role` may open it,
    /// otherwise the role's default route
    pub fn post_login_route(&self, role: Role) -> String {
        match self.get_intended_route() {
            Some(path) if self.can_access_route(&path, role) => path,
            Some(path) => {
                debug!(path, role = %role, "Discarding inaccessible intended route");
                self.get_default_route(role).to_string()
            }
            None => self.get_default_route(role).to_string(),
        }
    }
}
