//! Cache configuration structures
//!
//! Holds the settings a holder's cache managers are created with: the
//! eviction staleness window, the housekeeping interval and the default meta
//! stack definitions used when a query does not carry its own.

#![allow(missing_docs)]

use crate::{
    error::{CacheError, CacheResult},
    meta::MetaValueSelector,
    node::ChatMetaType,
    stack::MetaStackDefinition,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};

/// Configuration for cached permission and meta data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries not accessed for longer than this are removed by cleanup
    pub staleness_window: Duration,
    /// How often the housekeeper runs cleanup
    pub cleanup_interval: Duration,
    /// Prefix stack used when the query options carry no override
    pub prefix_stack: MetaStackDefinition,
    /// Suffix stack used when the query options carry no override
    pub suffix_stack: MetaStackDefinition,
    /// Default strategy for picking a meta value
    pub meta_value_selector: MetaValueSelector,
    /// Per-key selector overrides (keys lowercase)
    pub meta_value_selectors: BTreeMap<String, MetaValueSelector>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            staleness_window: Duration::from_secs(120), // 2 minutes
            cleanup_interval: Duration::from_secs(60),  // 1 minute
            prefix_stack: MetaStackDefinition::default(),
            suffix_stack: MetaStackDefinition::default(),
            meta_value_selector: MetaValueSelector::default(),
            meta_value_selectors: BTreeMap::new(),
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> CacheResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate().map_err(CacheError::InvalidConfiguration)?;
        Ok(config)
    }

    pub fn to_json(&self) -> CacheResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Set the staleness window used by cleanup
    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    /// Set the housekeeping interval
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set the default stack for a chat meta type
    pub fn with_meta_stack(mut self, meta_type: ChatMetaType, definition: MetaStackDefinition) -> Self {
        match meta_type {
            ChatMetaType::Prefix => self.prefix_stack = definition,
            ChatMetaType::Suffix => self.suffix_stack = definition,
        }
        self
    }

    /// Set the default meta value selector
    pub fn with_meta_value_selector(mut self, selector: MetaValueSelector) -> Self {
        self.meta_value_selector = selector;
        self
    }

    /// Override the selector for one meta key
    pub fn with_meta_value_selector_for(mut self, key: &str, selector: MetaValueSelector) -> Self {
        self.meta_value_selectors.insert(key.to_lowercase(), selector);
        self
    }

    /// Default stack for `meta_type`
    pub fn meta_stack(&self, meta_type: ChatMetaType) -> &MetaStackDefinition {
        match meta_type {
            ChatMetaType::Prefix => &self.prefix_stack,
            ChatMetaType::Suffix => &self.suffix_stack,
        }
    }

    /// Selector for a meta key, falling back to the default
    pub fn meta_value_selector_for(&self, key: &str) -> MetaValueSelector {
        self.meta_value_selectors
            .get(&key.to_lowercase())
            .copied()
            .unwrap_or(self.meta_value_selector)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.staleness_window.is_zero() {
            return Err("staleness_window must be greater than 0".to_string());
        }

        if self.cleanup_interval.is_zero() {
            return Err("cleanup_interval must be greater than 0".to_string());
        }

        if self.meta_value_selectors.keys().any(|k| k.trim().is_empty()) {
            return Err("meta_value_selectors keys must not be blank".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
#[allow(clippy::expect_used)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::stack::{DuplicateRemoval, MetaStackElement};

    #[test]
    fn test_cache_config_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.staleness_window, Duration::from_secs(120));
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
        assert_eq!(config.prefix_stack.elements(), &[MetaStackElement::highest()]);
        assert_eq!(config.suffix_stack.duplicate_removal(), DuplicateRemoval::FirstOnly);
        assert_eq!(config.meta_value_selector, MetaValueSelector::First);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = CacheConfig::new().with_staleness_window(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = CacheConfig::new().with_cleanup_interval(Duration::ZERO);
        assert!(config.validate().is_err());

        let mut config = CacheConfig::new();
        config
            .meta_value_selectors
            .insert("  ".to_string(), MetaValueSelector::First);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_builder_method_chaining() {
        let prefix = MetaStackDefinition::new(
            vec![MetaStackElement::highest_own(), MetaStackElement::highest_inherited()],
            DuplicateRemoval::RetainAll,
            "",
            " ",
            "",
        );
        let config = CacheConfig::new()
            .with_staleness_window(Duration::from_secs(30))
            .with_meta_stack(ChatMetaType::Prefix, prefix.clone())
            .with_meta_value_selector_for("Homes", MetaValueSelector::HighestNumber)
            .with_staleness_window(Duration::from_secs(45));

        assert_eq!(config.staleness_window, Duration::from_secs(45));
        assert_eq!(config.meta_stack(ChatMetaType::Prefix), &prefix);
        assert_eq!(config.meta_stack(ChatMetaType::Suffix), &MetaStackDefinition::default());
        assert_eq!(config.meta_value_selector_for("homes"), MetaValueSelector::HighestNumber);
        assert_eq!(config.meta_value_selector_for("other"), MetaValueSelector::First);
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "staleness_window": { "secs": 300, "nanos": 0 },
            "prefix_stack": {
                "elements": ["highest_on_track_staff", "highest_not_on_track_staff"],
                "duplicates": "first-only",
                "start_spacer": "",
                "middle_spacer": " ",
                "end_spacer": " "
            },
            "meta_value_selectors": { "homes": "highest-number" }
        }"#;

        let config = CacheConfig::from_json(json).unwrap();
        assert_eq!(config.staleness_window, Duration::from_secs(300));
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
        assert_eq!(
            config.prefix_stack.elements(),
            &[
                MetaStackElement::highest_on_track("staff"),
                MetaStackElement::highest_not_on_track("staff"),
            ]
        );
        assert_eq!(config.meta_value_selector_for("HOMES"), MetaValueSelector::HighestNumber);
    }

    #[test]
    fn test_config_from_json_rejects_invalid() {
        let bad_element = r#"{ "prefix_stack": { "elements": ["tallest"], "duplicates": "retain-all" } }"#;
        assert!(matches!(
            CacheConfig::from_json(bad_element),
            Err(CacheError::Serialization(_))
        ));

        let zero_window = r#"{ "staleness_window": { "secs": 0, "nanos": 0 } }"#;
        assert!(matches!(
            CacheConfig::from_json(zero_window),
            Err(CacheError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = CacheConfig::new()
            .with_meta_value_selector(MetaValueSelector::LowestNumber)
            .with_meta_stack(ChatMetaType::Suffix, MetaStackDefinition::parse(
                &["lowest_own"],
                DuplicateRemoval::LastOnly,
                "[",
                ",",
                "]",
            ).unwrap());

        let json = config.to_json().unwrap();
        assert_eq!(CacheConfig::from_json(&json).unwrap(), config);
    }
}
