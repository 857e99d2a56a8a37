//! Navigation menus
//!
//! Role-keyed menu catalog, permission filtering and per-consumer navigation
//! state (active item, breadcrumbs, history).

pub mod menu;
pub mod state;

pub use menu::{
    filter_menu, find_node, find_trail, Breadcrumb, MenuCatalog, MenuEntry, MenuKind, MenuNode,
};
pub use state::{HistoryEntry, NavigationContext, NavigationState, Navigator};
