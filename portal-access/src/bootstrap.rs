//! Application wiring
//!
//! Builds the session store and every service that shares it from one
//! [`PortalConfig`]. The host creates a single [`PortalServices`] at startup.

use crate::auth::PermissionEvaluator;
use crate::navigation::{MenuCatalog, Navigator};
use crate::routing::{MemoryTabStorage, NavigationService, RouteTable, TabStorage};
use crate::session::{
    ActivityBus, SessionClock, SessionManager, SessionPort, SessionStore, TokenRefresher,
};
use crate::{AccessError, AccessResult};
use portal_core::{not_found_error, Clock, NavigationConfig, PortalConfig, SystemClock};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct PortalServices {
    pub config: PortalConfig,
    pub store: Arc<SessionStore>,
    pub activity: ActivityBus,
    pub catalog: Arc<MenuCatalog>,
    pub navigation: NavigationService,
    pub manager: SessionManager,
    clock: Arc<dyn Clock>,
}

impl PortalServices {
    pub fn builder(config: PortalConfig) -> PortalServicesBuilder {
        PortalServicesBuilder::new(config)
    }

    /// Permission evaluator for the current session
    pub fn evaluator(&self) -> PermissionEvaluator {
        PermissionEvaluator::from_session(&self.store.snapshot())
    }

    /// Navigation state for a newly mounted view
    pub fn navigator(&self) -> Navigator {
        let evaluator = self.evaluator();
        Navigator::new(Arc::clone(&self.catalog), &evaluator, Arc::clone(&self.clock))
            .with_history_limit(self.config.navigation.history_limit)
    }

    /// Session clock for a newly mounted view
    pub fn session_clock(&self) -> SessionClock {
        SessionClock::new(self.store.clone(), self.config.session.clone())
    }
}

pub struct PortalServicesBuilder {
    config: PortalConfig,
    clock: Option<Arc<dyn Clock>>,
    catalog: Option<MenuCatalog>,
    routes: Option<RouteTable>,
    storage: Option<Arc<dyn TabStorage>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
}

impl PortalServicesBuilder {
    pub fn new(config: PortalConfig) -> Self {
        Self {
            config,
            clock: None,
            catalog: None,
            routes: None,
            storage: None,
            refresher: None,
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn catalog(mut self, catalog: MenuCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = Some(routes);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn TabStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Validate the configuration and wire everything together.
    ///
    /// Catalog and route table set on the builder win over the files named
    /// in `navigation`.
    pub fn build(self) -> AccessResult<PortalServices> {
        self.config.validate()?;

        let refresher = self
            .refresher
            .ok_or_else(|| AccessError::config("A token refresher is required"))?;

        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => load_menu_catalog(&self.config.navigation)?,
        };
        let routes = match self.routes {
            Some(routes) => routes,
            None => load_route_table(&self.config.navigation)?,
        };

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let storage: Arc<dyn TabStorage> = match self.storage {
            Some(storage) => storage,
            None => Arc::new(MemoryTabStorage::new()),
        };

        let store = Arc::new(SessionStore::new(&self.config.session, Arc::clone(&clock)));
        let activity = ActivityBus::new();
        let catalog = Arc::new(catalog);
        let navigation = NavigationService::new(Arc::clone(&catalog), routes, storage);
        let manager = SessionManager::new(
            store.clone(),
            activity.clone(),
            refresher,
            self.config.session.clone(),
        );

        info!(
            session_timeout_ms = self.config.session.session_timeout_ms,
            history_limit = ?self.config.navigation.history_limit,
            "Portal services ready"
        );

        Ok(PortalServices {
            config: self.config,
            store,
            activity,
            catalog,
            navigation,
            manager,
            clock,
        })
    }
}

/// Menu catalog named in `config`, or the built-in one
pub fn load_menu_catalog(config: &NavigationConfig) -> AccessResult<MenuCatalog> {
    match &config.menu_catalog_path {
        Some(path) => MenuCatalog::from_toml_str(&read_file(path)?),
        None => Ok(MenuCatalog::default()),
    }
}

/// Route table named in `config`, or the built-in one
pub fn load_route_table(config: &NavigationConfig) -> AccessResult<RouteTable> {
    match &config.route_table_path {
        Some(path) => RouteTable::from_toml_str(&read_file(path)?),
        None => Ok(RouteTable::default()),
    }
}

fn read_file(path: &Path) -> AccessResult<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            AccessError::Core(not_found_error!(path.display(), "bootstrap"))
        }
        _ => AccessError::config(format!("Failed to read {}: {}", path.display(), e)),
    })
}
