//! Resolved meta snapshots

#![allow(missing_docs)]

use super::{CacheMetadata, CachedData, UsageTracker};
use crate::{
    config::CacheConfig,
    meta::{AccumulatedMeta, MetaValueSelector},
    node::ChatMetaType,
    stack::MetaStackDefinition,
};
use std::collections::BTreeMap;

/// Immutable view of a holder's prefixes, suffixes, meta and weight.
#[derive(Debug)]
pub struct MetaCache {
    metadata: CacheMetadata,
    usage: UsageTracker,
    accumulated: AccumulatedMeta,
    selector: MetaValueSelector,
    selectors: BTreeMap<String, MetaValueSelector>,
}

impl MetaCache {
    pub(crate) fn new(
        metadata: CacheMetadata,
        accumulated: AccumulatedMeta,
        config: &CacheConfig,
    ) -> Self {
        Self {
            metadata,
            usage: UsageTracker::new(),
            accumulated,
            selector: config.meta_value_selector,
            selectors: config.meta_value_selectors.clone(),
        }
    }

    /// Formatted prefix stack, None when no layer produced a value
    pub fn prefix(&self) -> Option<&str> {
        self.accumulated.prefix.as_deref()
    }

    /// Formatted suffix stack, None when no layer produced a value
    pub fn suffix(&self) -> Option<&str> {
        self.accumulated.suffix.as_deref()
    }

    pub fn formatted(&self, meta_type: ChatMetaType) -> Option<&str> {
        match meta_type {
            ChatMetaType::Prefix => self.prefix(),
            ChatMetaType::Suffix => self.suffix(),
        }
    }

    /// Every prefix by priority, first seen at each priority
    pub fn prefixes(&self) -> &BTreeMap<i32, String> {
        &self.accumulated.prefixes
    }

    pub fn suffixes(&self) -> &BTreeMap<i32, String> {
        &self.accumulated.suffixes
    }

    /// All meta values per key in discovery order
    pub fn meta(&self) -> &BTreeMap<String, Vec<String>> {
        &self.accumulated.meta
    }

    /// One value for `key`, picked with the configured selector
    pub fn meta_value(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        let selector = self.selectors.get(&key).copied().unwrap_or(self.selector);
        self.meta_value_with(&key, selector)
    }

    pub fn meta_value_with(&self, key: &str, selector: MetaValueSelector) -> Option<&str> {
        self.accumulated
            .meta
            .get(&key.to_lowercase())
            .and_then(|values| selector.select(values))
    }

    pub fn weight(&self) -> Option<i32> {
        self.accumulated.weight
    }

    /// The stack definition the formatted value was produced with
    pub fn stack_definition(&self, meta_type: ChatMetaType) -> &MetaStackDefinition {
        match meta_type {
            ChatMetaType::Prefix => &self.accumulated.prefix_definition,
            ChatMetaType::Suffix => &self.accumulated.suffix_definition,
        }
    }
}

impl CachedData for MetaCache {
    fn metadata(&self) -> &CacheMetadata {
        &self.metadata
    }

    fn usage(&self) -> &UsageTracker {
        &self.usage
    }
}

impl PartialEq for MetaCache {
    fn eq(&self, other: &Self) -> bool {
        self.metadata == other.metadata
            && self.accumulated == other.accumulated
            && self.selector == other.selector
            && self.selectors == other.selectors
    }
}
