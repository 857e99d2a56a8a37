//! Permission checks
//!
//! Pure functions testing a required capability against a role and a granted
//! set. `Admin` passes every check; an absent or empty requirement always
//! passes; anything else must be present in the granted set.

use portal_core::{PermissionSet, Role};
use serde::{Deserialize, Serialize};

/// Check a single permission.
///
/// Only `None` and the empty string count as "no requirement"; a
/// whitespace-only token is an ordinary (ungrantable) permission.
pub fn has_permission(required: Option<&str>, role: Role, granted: &PermissionSet) -> bool {
    match required {
        None => true,
        Some("") => true,
        Some(_) if role.is_admin() => true,
        Some(required) => granted.contains(required),
    }
}

/// Check that every permission is satisfied
pub fn has_all_permissions<S: AsRef<str>>(
    required: &[S],
    role: Role,
    granted: &PermissionSet,
) -> bool {
    required
        .iter()
        .all(|p| has_permission(Some(p.as_ref()), role, granted))
}

/// Check that at least one permission is satisfied
pub fn has_any_permission<S: AsRef<str>>(
    required: &[S],
    role: Role,
    granted: &PermissionSet,
) -> bool {
    required
        .iter()
        .any(|p| has_permission(Some(p.as_ref()), role, granted))
}

/// CRUD-style flags for one feature namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturePermissions {
    pub can_read: bool,
    pub can_write: bool,
    pub can_delete: bool,
    pub can_create: bool,
    /// Every granted token in the feature's namespace
    pub all: Vec<String>,
}

/// Derive the feature flags for `feature` by checking `"{feature}.{action}"`
pub fn feature_permissions(feature: &str, role: Role, granted: &PermissionSet) -> FeaturePermissions {
    let check = |action: &str| {
        let token = format!("{}.{}", feature, action);
        has_permission(Some(token.as_str()), role, granted)
    };

    FeaturePermissions {
        can_read: check("read"),
        can_write: check("write"),
        can_delete: check("delete"),
        can_create: check("create"),
        all: granted.in_namespace(feature).map(str::to_string).collect(),
    }
}

/// Anything that can answer permission questions for one principal
pub trait Authorizer {
    fn role(&self) -> Role;

    fn has_permission(&self, required: Option<&str>) -> bool;

    fn has_all_permissions(&self, required: &[String]) -> bool {
        required.iter().all(|p| self.has_permission(Some(p.as_str())))
    }

    fn has_any_permission(&self, required: &[String]) -> bool {
        required.iter().any(|p| self.has_permission(Some(p.as_str())))
    }
}

/// Uncached view over a role and granted set
#[derive(Debug, Clone, Copy)]
pub struct Grant<'a> {
    pub role: Role,
    pub granted: &'a PermissionSet,
}

impl<'a> Grant<'a> {
    pub fn new(role: Role, granted: &'a PermissionSet) -> Self {
        Self { role, granted }
    }
}

impl Authorizer for Grant<'_> {
    fn role(&self) -> Role {
        self.role
    }

    fn has_permission(&self, required: Option<&str>) -> bool {
        has_permission(required, self.role, self.granted)
    }
}
