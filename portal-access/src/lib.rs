//! Portal Access - client-side session and permission layer
//!
//! This crate decides what a signed-in user may see and open, and keeps the
//! session alive or ends it. It includes:
//!
//! - Permission checks with a per-principal cached evaluator
//! - Role-keyed navigation menus filtered by permission, with breadcrumbs and history
//! - A per-view session clock with expiry warning and forced logout
//! - An application-wide session manager for activity, timeouts and token refresh
//! - Route access decisions, default landing pages and the post-login intended route
//!
//! ## Architecture
//!
//! - **Core** (portal-core): configuration, errors, logging, clocks and timers
//! - **Access** (this crate): session store and the components built on it
//! - **Presentation** (portal-cli or a UI host): rendering and user input

pub mod auth;
pub mod bootstrap;
pub mod navigation;
pub mod routing;
pub mod session;

pub use auth::{
    feature_permissions, has_all_permissions, has_any_permission, has_permission, Authorizer,
    CacheStats, FeaturePermissions, Grant, PermissionEvaluator,
};
pub use bootstrap::{load_menu_catalog, load_route_table, PortalServices, PortalServicesBuilder};
pub use navigation::{
    filter_menu, Breadcrumb, HistoryEntry, MenuCatalog, MenuEntry, MenuKind, MenuNode,
    NavigationContext, NavigationState, Navigator,
};
pub use routing::{
    MemoryTabStorage, NavigationService, RouteDecision, RouteTable, TabStorage,
    INTENDED_ROUTE_KEY,
};
pub use session::{
    ActivityBus, ActivityKind, SessionAction, SessionClock, SessionManager, SessionPhase,
    SessionPort, SessionState, SessionStore, TimeRemaining, TokenRefresher,
};

/// Access-layer error type
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("Core error: {0}")]
    Core(#[from] portal_core::PortalError),

    #[error("Token refresh error: {message}")]
    Refresh { message: String },

    #[error("Menu catalog error: {message}")]
    Catalog { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

pub type AccessResult<T> = Result<T, AccessError>;

impl AccessError {
    /// Create a token refresh error
    pub fn refresh<S: Into<String>>(message: S) -> Self {
        Self::Refresh {
            message: message.into(),
        }
    }

    /// Create a menu catalog error
    pub fn catalog<S: Into<String>>(message: S) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
