//! Resolved permission snapshots

#![allow(missing_docs)]

use super::{CacheMetadata, CachedData, UsageTracker};
use crate::{holder::VerboseCheckTarget, node::Tristate};
use dashmap::DashMap;
use std::{collections::HashMap, sync::Arc};
use tracing::trace;

/// Evaluates permission checks against one resolved permission map.
///
/// Lookups are memoized until [`invalidate_cache`](Self::invalidate_cache).
#[derive(Debug)]
pub struct PermissionCalculator {
    target: VerboseCheckTarget,
    permissions: HashMap<String, bool>,
    lookups: DashMap<String, Tristate>,
}

impl PermissionCalculator {
    /// `permissions` keys must already be lowercase
    pub fn new(target: VerboseCheckTarget, permissions: HashMap<String, bool>) -> Self {
        Self {
            target,
            permissions,
            lookups: DashMap::new(),
        }
    }

    pub fn check_permission(&self, permission: &str) -> Tristate {
        let key = permission.to_lowercase();
        if let Some(hit) = self.lookups.get(&key) {
            return *hit;
        }

        let result = Tristate::from(self.permissions.get(&key).copied());
        trace!(target = %self.target, permission = %key, ?result, "permission check");
        self.lookups.insert(key, result);
        result
    }

    /// Drop memoized lookups
    pub fn invalidate_cache(&self) {
        self.lookups.clear();
    }

    pub fn permissions(&self) -> &HashMap<String, bool> {
        &self.permissions
    }

    pub fn target(&self) -> &VerboseCheckTarget {
        &self.target
    }

    #[cfg(test)]
    pub(crate) fn memoized(&self) -> usize {
        self.lookups.len()
    }
}

/// Immutable view of a holder's permissions under one set of query options
#[derive(Debug)]
pub struct PermissionCache {
    metadata: CacheMetadata,
    usage: UsageTracker,
    calculator: Arc<PermissionCalculator>,
}

impl PermissionCache {
    /// Build from resolver output. Keys are lowercased; where two keys only
    /// differ in case a `false` assignment wins.
    ///
    /// When `previous` resolved to the same map its calculator is shared
    /// instead of rebuilt.
    pub fn new(
        metadata: CacheMetadata,
        resolved: HashMap<String, bool>,
        previous: Option<&Self>,
    ) -> Self {
        let mut permissions = HashMap::with_capacity(resolved.len());
        for (key, value) in resolved {
            permissions
                .entry(key.to_lowercase())
                .and_modify(|current: &mut bool| *current &= value)
                .or_insert(value);
        }

        let calculator = match previous {
            Some(previous)
                if previous.calculator.permissions == permissions
                    && previous.calculator.target == *metadata.verbose_target() =>
            {
                Arc::clone(&previous.calculator)
            }
            _ => Arc::new(PermissionCalculator::new(
                metadata.verbose_target().clone(),
                permissions,
            )),
        };

        Self {
            metadata,
            usage: UsageTracker::new(),
            calculator,
        }
    }

    pub fn check_permission(&self, permission: &str) -> Tristate {
        self.calculator.check_permission(permission)
    }

    pub fn permission_map(&self) -> &HashMap<String, bool> {
        self.calculator.permissions()
    }

    pub fn calculator(&self) -> &Arc<PermissionCalculator> {
        &self.calculator
    }

    pub fn invalidate_cache(&self) {
        self.calculator.invalidate_cache();
    }
}

impl CachedData for PermissionCache {
    fn metadata(&self) -> &CacheMetadata {
        &self.metadata
    }

    fn usage(&self) -> &UsageTracker {
        &self.usage
    }
}

impl PartialEq for PermissionCache {
    fn eq(&self, other: &Self) -> bool {
        self.metadata == other.metadata && self.permission_map() == other.permission_map()
    }
}
