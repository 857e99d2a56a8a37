//! Authorization
//!
//! Permission checks against a role and granted set, in a pure form and as a
//! cached per-principal evaluator.

pub mod evaluator;
pub mod permissions;

pub use evaluator::{CacheStats, PermissionEvaluator};
pub use permissions::{
    feature_permissions, has_all_permissions, has_any_permission, has_permission, Authorizer,
    FeaturePermissions, Grant,
};
