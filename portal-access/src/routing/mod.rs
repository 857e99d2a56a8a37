//! Route access
//!
//! Which paths each role may open, where each role lands by default, and the
//! one-shot intended route kept across the login redirect.

pub mod service;
pub mod table;

pub use service::{
    MemoryTabStorage, NavigationService, RouteDecision, TabStorage, INTENDED_ROUTE_KEY,
};
pub use table::{route_matches, RoleRoutes, RouteTable};
