//! Static route table
//!
//! Public routes plus the route set, default landing page and login route for
//! each role. Patterns are `/`-separated segments where `:name` matches any
//! single non-empty segment.

use crate::{AccessError, AccessResult};
use portal_core::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRoutes {
    pub default_route: String,
    #[serde(default)]
    pub routes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTable {
    pub login_route: String,
    #[serde(default)]
    pub public: Vec<String>,
    /// Keyed by role name
    #[serde(default)]
    pub roles: HashMap<String, RoleRoutes>,
}

/// Drop query, fragment and trailing slashes; the root stays `/`
fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Whether `path` matches `pattern`
pub fn route_matches(pattern: &str, path: &str) -> bool {
    let mut expected = normalize(pattern).split('/');
    let mut actual = normalize(path).split('/');

    loop {
        match (expected.next(), actual.next()) {
            (None, None) => return true,
            (Some(segment), Some(value)) => {
                let matched = if segment.starts_with(':') {
                    !value.is_empty()
                } else {
                    segment == value
                };
                if !matched {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

impl RouteTable {
    pub fn new(login_route: &str) -> Self {
        Self {
            login_route: login_route.to_string(),
            public: vec![login_route.to_string()],
            roles: HashMap::new(),
        }
    }

    pub fn with_public(mut self, pattern: &str) -> Self {
        self.public.push(pattern.to_string());
        self
    }

    pub fn with_role(mut self, role: Role, default_route: &str, routes: &[&str]) -> Self {
        self.roles.insert(
            role.as_str().to_string(),
            RoleRoutes {
                default_route: default_route.to_string(),
                routes: routes.iter().map(|r| r.to_string()).collect(),
            },
        );
        self
    }

    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public.iter().any(|pattern| route_matches(pattern, path))
    }

    /// Whether `path` is in the route set owned by `role`
    pub fn role_owns(&self, role: Role, path: &str) -> bool {
        self.roles
            .get(role.as_str())
            .is_some_and(|entry| entry.routes.iter().any(|pattern| route_matches(pattern, path)))
    }

    /// Landing page for `role`; guests and unconfigured roles get the login route
    pub fn default_route(&self, role: Role) -> &str {
        if role.is_guest() {
            return &self.login_route;
        }
        self.roles
            .get(role.as_str())
            .map(|entry| entry.default_route.as_str())
            .unwrap_or(&self.login_route)
    }

    pub fn from_toml_str(content: &str) -> AccessResult<Self> {
        let table: Self = toml::from_str(content)
            .map_err(|e| AccessError::config(format!("Failed to parse route table: {}", e)))?;

        for key in table.roles.keys() {
            key.parse::<Role>()
                .map_err(|e| AccessError::config(format!("Invalid route table role: {}", e)))?;
        }
        Ok(table)
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new("/login")
            .with_public("/")
            .with_public("/register")
            .with_public("/forgot-password")
            .with_public("/reset-password/:token")
            .with_public("/unauthorized")
            .with_role(
                Role::Admin,
                "/admin/dashboard",
                &[
                    "/admin/dashboard",
                    "/admin/users",
                    "/admin/users/new",
                    "/admin/users/:id",
                    "/admin/offers",
                    "/admin/offers/review",
                    "/admin/offers/:id",
                    "/admin/withdrawals",
                    "/admin/reports",
                    "/admin/settings",
                ],
            )
            .with_role(
                Role::User,
                "/user/dashboard",
                &[
                    "/user/dashboard",
                    "/user/offers",
                    "/user/offers/:id",
                    "/user/withdrawals",
                    "/user/withdrawals/new",
                    "/user/profile",
                ],
            )
            .with_role(
                Role::Moderator,
                "/moderator/dashboard",
                &[
                    "/moderator/dashboard",
                    "/moderator/offers",
                    "/moderator/offers/:id",
                    "/moderator/users",
                    "/moderator/reports",
                ],
            )
    }
}
