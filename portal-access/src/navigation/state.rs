//! Navigation state
//!
//! Active item, breadcrumb trail and visit history for one mounted consumer.
//! State is never shared; every [`Navigator`] owns its own copy.

use super::menu::{find_node, find_trail, Breadcrumb, MenuCatalog, MenuEntry, MenuNode};
use crate::auth::Authorizer;
use chrono::{DateTime, Utc};
use portal_core::{Clock, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub key: String,
    pub timestamp: DateTime<Utc>,
    /// Descriptor used when `key` was not found in the menu
    #[serde(skip)]
    descriptor: Option<MenuEntry>,
}

impl HistoryEntry {
    fn new(key: &str, timestamp: DateTime<Utc>, descriptor: Option<MenuEntry>) -> Self {
        Self {
            key: key.to_string(),
            timestamp,
            descriptor,
        }
    }

    pub fn descriptor(&self) -> Option<&MenuEntry> {
        self.descriptor.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    pub active_key: String,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub history: Vec<HistoryEntry>,
}

/// What the UI needs to render back/forward affordances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationContext {
    pub current_item: Option<MenuEntry>,
    pub can_go_back: bool,
    pub previous_item: Option<MenuEntry>,
}

impl NavigationState {
    /// Initial state: the first menu item is active and the only history entry
    pub fn initial(menu: &[MenuNode], now: DateTime<Utc>) -> Self {
        match menu.first() {
            Some(first) => Self {
                active_key: first.key.clone(),
                breadcrumbs: vec![first.breadcrumb()],
                history: vec![HistoryEntry::new(&first.key, now, None)],
            },
            None => Self {
                active_key: String::new(),
                breadcrumbs: Vec::new(),
                history: Vec::new(),
            },
        }
    }

    /// Make `key` active, rebuild breadcrumbs and record the visit.
    ///
    /// A key missing from `menu` falls back to `descriptor` for both the
    /// current item and the breadcrumb leaf.
    pub fn navigate_to_item(
        &mut self,
        key: &str,
        descriptor: &MenuEntry,
        menu: &[MenuNode],
        now: DateTime<Utc>,
        history_limit: Option<usize>,
    ) {
        self.active_key = key.to_string();
        let fallback = match find_trail(menu, key) {
            Some(trail) => {
                self.breadcrumbs = trail.iter().map(|node| node.breadcrumb()).collect();
                None
            }
            None => {
                debug!(key, "Navigated to item outside the menu");
                let fallback = MenuEntry {
                    key: key.to_string(),
                    ..descriptor.clone()
                };
                self.breadcrumbs = vec![fallback.breadcrumb()];
                Some(fallback)
            }
        };

        self.history.push(HistoryEntry::new(key, now, fallback));
        if let Some(limit) = history_limit {
            let excess = self.history.len().saturating_sub(limit.max(1));
            if excess > 0 {
                self.history.drain(..excess);
            }
        }
    }

    /// Step back one history entry. Returns `false` when there is nowhere to go.
    pub fn go_back(&mut self, menu: &[MenuNode]) -> bool {
        if self.history.len() <= 1 {
            return false;
        }

        self.history.pop();
        let Some(previous) = self.history.last() else {
            return false;
        };
        self.active_key = previous.key.clone();
        self.breadcrumbs = match find_trail(menu, &previous.key) {
            Some(trail) => trail.iter().map(|node| node.breadcrumb()).collect(),
            None => previous
                .descriptor()
                .map(|entry| vec![entry.breadcrumb()])
                .unwrap_or_default(),
        };
        true
    }

    /// Descriptor recorded for the active item, if it came from outside the menu
    fn active_descriptor(&self) -> Option<&MenuEntry> {
        self.history
            .last()
            .filter(|entry| entry.key == self.active_key)
            .and_then(HistoryEntry::descriptor)
    }

    pub fn can_go_back(&self) -> bool {
        self.history.len() > 1
    }

    pub fn context(&self, menu: &[MenuNode]) -> NavigationContext {
        let current_item = if self.active_key.is_empty() {
            None
        } else {
            find_node(menu, &self.active_key)
                .map(MenuNode::entry)
                .or_else(|| self.active_descriptor().cloned())
        };

        let previous_item = self
            .history
            .len()
            .checked_sub(2)
            .and_then(|index| self.history.get(index))
            .and_then(|entry| find_node(menu, &entry.key))
            .map(MenuNode::entry);

        NavigationContext {
            current_item,
            can_go_back: self.can_go_back(),
            previous_item,
        }
    }
}

/// Navigation for one mounted consumer: filtered menu plus its own state
pub struct Navigator {
    catalog: Arc<MenuCatalog>,
    clock: Arc<dyn Clock>,
    role: Role,
    menu: Vec<MenuNode>,
    state: NavigationState,
    history_limit: Option<usize>,
}

impl Navigator {
    pub fn new<A: Authorizer + ?Sized>(
        catalog: Arc<MenuCatalog>,
        auth: &A,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let role = auth.role();
        let menu = catalog.build_menu(role, auth);
        let state = NavigationState::initial(&menu, clock.now());
        Self {
            catalog,
            clock,
            role,
            menu,
            state,
            history_limit: None,
        }
    }

    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn menu(&self) -> &[MenuNode] {
        &self.menu
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn navigate_to_item(&mut self, key: &str, descriptor: &MenuEntry) -> &NavigationState {
        let now = self.clock.now();
        self.state
            .navigate_to_item(key, descriptor, &self.menu, now, self.history_limit);
        &self.state
    }

    pub fn go_back(&mut self) -> bool {
        self.state.go_back(&self.menu)
    }

    /// Rebuild the menu for `auth`'s role and start over from its first item
    pub fn reset_navigation<A: Authorizer + ?Sized>(&mut self, auth: &A) -> &NavigationState {
        self.role = auth.role();
        self.menu = self.catalog.build_menu(self.role, auth);
        self.state = NavigationState::initial(&self.menu, self.clock.now());
        debug!(role = %self.role, "Navigation reset");
        &self.state
    }

    /// Re-filter the menu after a permission change, keeping the current state
    pub fn refresh_menu<A: Authorizer + ?Sized>(&mut self, auth: &A) {
        self.menu = self.catalog.build_menu(self.role, auth);
    }

    pub fn navigation_context(&self) -> NavigationContext {
        self.state.context(&self.menu)
    }
}
