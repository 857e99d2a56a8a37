//! Cached permission evaluator
//!
//! Holds the current principal's role and granted set and memoizes
//! `has_permission` answers. Entries are tagged with the epoch of the granted
//! set they were computed against; replacing the set bumps the epoch and drops
//! the whole cache.

use super::permissions::{self, Authorizer, FeaturePermissions};
use crate::session::SessionState;
use parking_lot::Mutex;
use portal_core::{PermissionSet, Role};
use std::collections::HashMap;
use tracing::debug;

/// Default number of memoized answers kept per epoch
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct PermissionCache {
    epoch: u64,
    entries: HashMap<String, bool>,
    hits: u64,
    misses: u64,
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub epoch: u64,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Permission evaluator for one principal
#[derive(Debug)]
pub struct PermissionEvaluator {
    role: Role,
    granted: PermissionSet,
    epoch: u64,
    /// Store epoch the granted set was copied from, if any
    source_epoch: Option<u64>,
    capacity: usize,
    cache: Mutex<PermissionCache>,
}

impl PermissionEvaluator {
    pub fn new(role: Role, granted: PermissionSet) -> Self {
        Self::with_capacity(role, granted, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(role: Role, granted: PermissionSet, capacity: usize) -> Self {
        Self {
            role,
            granted,
            epoch: 0,
            source_epoch: None,
            capacity: capacity.max(1),
            cache: Mutex::new(PermissionCache::default()),
        }
    }

    /// Build an evaluator from the current session snapshot
    pub fn from_session(state: &SessionState) -> Self {
        let mut evaluator = Self::new(state.role, state.permissions.clone());
        evaluator.source_epoch = Some(state.permissions_epoch);
        evaluator
    }

    /// Pick up role or permission changes from a newer session snapshot.
    ///
    /// Returns `true` when the cache was invalidated.
    pub fn sync_with(&mut self, state: &SessionState) -> bool {
        if self.source_epoch == Some(state.permissions_epoch) && self.role == state.role {
            return false;
        }
        self.role = state.role;
        self.update_permissions(state.permissions.clone());
        self.source_epoch = Some(state.permissions_epoch);
        true
    }

    pub fn granted(&self) -> &PermissionSet {
        &self.granted
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Replace the granted set wholesale and invalidate every cached answer
    pub fn update_permissions(&mut self, granted: PermissionSet) {
        self.granted = granted;
        self.bump_epoch();
        debug!(
            epoch = self.epoch,
            permissions = self.granted.len(),
            "Permissions replaced"
        );
    }

    pub fn set_role(&mut self, role: Role) {
        if self.role != role {
            self.role = role;
            self.bump_epoch();
        }
    }

    pub fn feature_permissions(&self, feature: &str) -> FeaturePermissions {
        permissions::feature_permissions(feature, self.role, &self.granted)
    }

    pub fn cache_stats(&self) -> CacheStats {
        let cache = self.cache.lock();
        CacheStats {
            epoch: cache.epoch,
            entries: cache.entries.len(),
            hits: cache.hits,
            misses: cache.misses,
        }
    }

    fn bump_epoch(&mut self) {
        self.epoch += 1;
        let cache = self.cache.get_mut();
        cache.entries.clear();
        cache.epoch = self.epoch;
    }
}

impl Authorizer for PermissionEvaluator {
    fn role(&self) -> Role {
        self.role
    }

    fn has_permission(&self, required: Option<&str>) -> bool {
        let required = match required {
            Some(required) if !required.is_empty() && !self.role.is_admin() => required,
            _ => return permissions::has_permission(required, self.role, &self.granted),
        };

        let mut cache = self.cache.lock();
        if cache.epoch != self.epoch {
            cache.entries.clear();
            cache.epoch = self.epoch;
        }

        if let Some(&allowed) = cache.entries.get(required) {
            cache.hits += 1;
            return allowed;
        }

        cache.misses += 1;
        let allowed = self.granted.contains(required);
        if cache.entries.len() >= self.capacity {
            cache.entries.clear();
        }
        cache.entries.insert(required.to_string(), allowed);
        allowed
    }
}
