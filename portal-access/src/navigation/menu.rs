//! Menu model and role-keyed catalog
//!
//! Menus are static trees. A node is either a navigable leaf with a path or a
//! branch grouping children. Filtering keeps declared order and drops branches
//! left without children.

use crate::auth::{Authorizer, Grant};
use crate::{AccessError, AccessResult};
use portal_core::{PermissionSet, Role};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// One entry in the navigation tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMenuNode")]
pub struct MenuNode {
    pub key: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Required permissions; all must pass
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    #[serde(flatten)]
    pub kind: MenuKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MenuKind {
    Leaf { path: String },
    Branch { children: Vec<MenuNode> },
}

/// Node as written in a catalog file, before the leaf/branch split
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMenuNode {
    key: String,
    label: String,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    permissions: Vec<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    children: Option<Vec<MenuNode>>,
}

impl TryFrom<RawMenuNode> for MenuNode {
    type Error = String;

    fn try_from(raw: RawMenuNode) -> Result<Self, Self::Error> {
        let kind = match (raw.path, raw.children) {
            (Some(path), None) => MenuKind::Leaf { path },
            (None, Some(children)) => MenuKind::Branch { children },
            (Some(_), Some(_)) => {
                return Err(format!(
                    "menu item '{}' declares both a path and children",
                    raw.key
                ))
            }
            (None, None) => {
                return Err(format!(
                    "menu item '{}' needs either a path or children",
                    raw.key
                ))
            }
        };
        Ok(Self {
            key: raw.key,
            label: raw.label,
            icon: raw.icon,
            permissions: raw.permissions,
            kind,
        })
    }
}

impl MenuNode {
    pub fn leaf(key: &str, label: &str, path: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            icon: None,
            permissions: Vec::new(),
            kind: MenuKind::Leaf {
                path: path.to_string(),
            },
        }
    }

    pub fn branch(key: &str, label: &str, children: Vec<MenuNode>) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            icon: None,
            permissions: Vec::new(),
            kind: MenuKind::Branch { children },
        }
    }

    pub fn requires(mut self, permission: &str) -> Self {
        self.permissions.push(permission.to_string());
        self
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    pub fn path(&self) -> Option<&str> {
        match &self.kind {
            MenuKind::Leaf { path } => Some(path),
            MenuKind::Branch { .. } => None,
        }
    }

    pub fn children(&self) -> &[MenuNode] {
        match &self.kind {
            MenuKind::Leaf { .. } => &[],
            MenuKind::Branch { children } => children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, MenuKind::Leaf { .. })
    }

    pub fn entry(&self) -> MenuEntry {
        MenuEntry {
            key: self.key.clone(),
            label: self.label.clone(),
            path: self.path().map(str::to_string),
        }
    }

    pub fn breadcrumb(&self) -> Breadcrumb {
        Breadcrumb {
            key: self.key.clone(),
            label: self.label.clone(),
        }
    }
}

/// Flat description of a menu item, as handed over by a click
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub key: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl MenuEntry {
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            path: None,
        }
    }

    pub fn breadcrumb(&self) -> Breadcrumb {
        Breadcrumb {
            key: self.key.clone(),
            label: self.label.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub key: String,
    pub label: String,
}

/// Filter a menu tree by the principal's permissions.
///
/// Leaves survive when all their permissions pass. Branches must pass their
/// own permissions and keep at least one surviving child.
pub fn filter_menu<A: Authorizer + ?Sized>(nodes: &[MenuNode], auth: &A) -> Vec<MenuNode> {
    nodes
        .iter()
        .filter_map(|node| {
            if !auth.has_all_permissions(&node.permissions) {
                return None;
            }
            match &node.kind {
                MenuKind::Leaf { .. } => Some(node.clone()),
                MenuKind::Branch { children } => {
                    let children = filter_menu(children, auth);
                    if children.is_empty() {
                        None
                    } else {
                        Some(MenuNode {
                            kind: MenuKind::Branch { children },
                            ..node.clone()
                        })
                    }
                }
            }
        })
        .collect()
}

/// Depth-first search for `key`; declared order wins on duplicates
pub fn find_node<'a>(menu: &'a [MenuNode], key: &str) -> Option<&'a MenuNode> {
    find_trail(menu, key).and_then(|trail| trail.last().copied())
}

/// Ancestor chain from the root down to the node matching `key`, inclusive
pub fn find_trail<'a>(menu: &'a [MenuNode], key: &str) -> Option<Vec<&'a MenuNode>> {
    for node in menu {
        if node.key == key {
            return Some(vec![node]);
        }
        if let Some(mut trail) = find_trail(node.children(), key) {
            trail.insert(0, node);
            return Some(trail);
        }
    }
    None
}

/// Role-keyed static menus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuCatalog {
    menus: HashMap<Role, Vec<MenuNode>>,
}

impl MenuCatalog {
    pub fn empty() -> Self {
        Self {
            menus: HashMap::new(),
        }
    }

    pub fn with_menu(mut self, role: Role, menu: Vec<MenuNode>) -> Self {
        self.menus.insert(role, menu);
        self
    }

    /// Unfiltered menu for `role`; empty when the role has none
    pub fn menu_for(&self, role: Role) -> &[MenuNode] {
        self.menus.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Menu for `role` filtered through `auth`
    pub fn build_menu<A: Authorizer + ?Sized>(&self, role: Role, auth: &A) -> Vec<MenuNode> {
        let menu = filter_menu(self.menu_for(role), auth);
        debug!(role = %role, items = menu.len(), "Menu built");
        menu
    }

    /// Menu for `role` filtered against a plain granted set
    pub fn build_menu_for(&self, role: Role, granted: &PermissionSet) -> Vec<MenuNode> {
        self.build_menu(role, &Grant::new(role, granted))
    }

    /// Load a catalog from TOML keyed by role name
    pub fn from_toml_str(content: &str) -> AccessResult<Self> {
        let raw: BTreeMap<String, Vec<MenuNode>> = toml::from_str(content)
            .map_err(|e| AccessError::catalog(format!("Failed to parse menu catalog: {}", e)))?;

        let mut catalog = Self::empty();
        for (name, menu) in raw {
            let role = name
                .parse::<Role>()
                .map_err(|e| AccessError::catalog(format!("Invalid menu catalog key: {}", e)))?;
            catalog.menus.insert(role, menu);
        }
        Ok(catalog)
    }

    pub fn to_toml_string(&self) -> AccessResult<String> {
        let raw: BTreeMap<&str, &Vec<MenuNode>> = self
            .menus
            .iter()
            .map(|(role, menu)| (role.as_str(), menu))
            .collect();
        toml::to_string_pretty(&raw)
            .map_err(|e| AccessError::catalog(format!("Failed to serialize menu catalog: {}", e)))
    }
}

impl Default for MenuCatalog {
    /// Dashboard menus shipped with the portal
    fn default() -> Self {
        Self::empty()
            .with_menu(Role::Admin, admin_menu())
            .with_menu(Role::User, user_menu())
            .with_menu(Role::Moderator, moderator_menu())
    }
}

fn admin_menu() -> Vec<MenuNode> {
    vec![
        MenuNode::leaf("dashboard", "Dashboard", "/admin/dashboard")
            .with_icon("dashboard")
            .requires("dashboard.read"),
        MenuNode::branch(
            "users",
            "Users",
            vec![
                MenuNode::leaf("users-list", "All Users", "/admin/users").requires("users.read"),
                MenuNode::leaf("users-create", "Add User", "/admin/users/new")
                    .requires("users.create"),
            ],
        )
        .with_icon("team"),
        MenuNode::branch(
            "offers",
            "Offers",
            vec![
                MenuNode::leaf("offers-list", "All Offers", "/admin/offers")
                    .requires("offers.read"),
                MenuNode::leaf("offers-review", "Pending Review", "/admin/offers/review")
                    .requires("offers.write"),
            ],
        )
        .with_icon("tags"),
        MenuNode::leaf("withdrawals", "Withdrawals", "/admin/withdrawals")
            .with_icon("wallet")
            .requires("withdrawals.read"),
        MenuNode::leaf("reports", "Reports", "/admin/reports")
            .with_icon("bar-chart")
            .requires("reports.read"),
        MenuNode::leaf("settings", "Settings", "/admin/settings")
            .with_icon("setting")
            .requires("settings.write"),
    ]
}

fn user_menu() -> Vec<MenuNode> {
    vec![
        MenuNode::leaf("dashboard", "Dashboard", "/user/dashboard").with_icon("dashboard"),
        MenuNode::leaf("offers", "Offers", "/user/offers")
            .with_icon("tags")
            .requires("offers.read"),
        MenuNode::branch(
            "wallet",
            "Wallet",
            vec![
                MenuNode::leaf("withdrawals", "Withdrawals", "/user/withdrawals")
                    .requires("withdrawals.read"),
                MenuNode::leaf("withdrawals-new", "Request Withdrawal", "/user/withdrawals/new")
                    .requires("withdrawals.create"),
            ],
        )
        .with_icon("wallet"),
        MenuNode::leaf("profile", "Profile", "/user/profile").with_icon("user"),
    ]
}

fn moderator_menu() -> Vec<MenuNode> {
    vec![
        MenuNode::leaf("dashboard", "Dashboard", "/moderator/dashboard").with_icon("dashboard"),
        MenuNode::leaf("offers-review", "Offer Review", "/moderator/offers")
            .with_icon("tags")
            .requires("offers.read"),
        MenuNode::leaf("users", "Users", "/moderator/users")
            .with_icon("team")
            .requires("users.read"),
        MenuNode::leaf("reports", "Reports", "/moderator/reports")
            .with_icon("bar-chart")
            .requires("reports.read"),
    ]
}
