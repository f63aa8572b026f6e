//! Single-pass reducer for all meta kinds of one holder

#![allow(missing_docs)]

use crate::{
    error::{CacheError, CacheResult},
    holder::HolderIdentifier,
    node::{ChatMetaNode, ChatMetaType, MetaNode},
    stack::{MetaStack, MetaStackDefinition},
    track::TrackProvider,
};
use std::{
    collections::{BTreeMap, btree_map::Entry},
    sync::Arc,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Accumulating,
    Complete,
}

/// Collects prefixes, suffixes, meta and weight for one resolution pass.
///
/// The accumulator is write-only until [`complete`](Self::complete) is
/// called and read-only afterwards. Crossing that line in either direction
/// is an [`CacheError::IllegalState`].
#[derive(Debug)]
pub struct MetaAccumulator {
    state: State,
    meta: BTreeMap<String, Vec<String>>,
    prefixes: BTreeMap<i32, String>,
    suffixes: BTreeMap<i32, String>,
    weight: Option<i32>,
    prefix_stack: MetaStack,
    suffix_stack: MetaStack,
}

/// Everything a completed accumulator produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AccumulatedMeta {
    pub(crate) meta: BTreeMap<String, Vec<String>>,
    pub(crate) prefixes: BTreeMap<i32, String>,
    pub(crate) suffixes: BTreeMap<i32, String>,
    pub(crate) weight: Option<i32>,
    pub(crate) prefix: Option<String>,
    pub(crate) suffix: Option<String>,
    pub(crate) prefix_definition: MetaStackDefinition,
    pub(crate) suffix_definition: MetaStackDefinition,
}

impl MetaAccumulator {
    pub fn new(
        prefix_definition: MetaStackDefinition,
        suffix_definition: MetaStackDefinition,
        target: &HolderIdentifier,
        tracks: &Arc<dyn TrackProvider>,
    ) -> Self {
        Self {
            state: State::Accumulating,
            meta: BTreeMap::new(),
            prefixes: BTreeMap::new(),
            suffixes: BTreeMap::new(),
            weight: None,
            prefix_stack: MetaStack::new(prefix_definition, ChatMetaType::Prefix, target, tracks),
            suffix_stack: MetaStack::new(suffix_definition, ChatMetaType::Suffix, target, tracks),
        }
    }

    fn ensure_state(&self, expected: State, action: &str) -> CacheResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CacheError::illegal_state(format!(
                "cannot {action}: meta accumulator is {:?}",
                self.state
            )))
        }
    }

    /// Route a node to the matching collection
    pub fn accumulate_node(&mut self, node: impl Into<MetaNode>) -> CacheResult<()> {
        match node.into() {
            MetaNode::ChatMeta(node) => self.accumulate_chat_meta(&node),
            MetaNode::Meta { key, value, .. } => self.accumulate_meta(&key, value),
            MetaNode::Weight(weight) => self.accumulate_weight(weight),
        }
    }

    /// First node seen at a priority keeps that slot; every node is offered to its stack
    pub fn accumulate_chat_meta(&mut self, node: &ChatMetaNode) -> CacheResult<()> {
        self.ensure_state(State::Accumulating, "accumulate chat meta")?;
        let (by_priority, stack) = match node.meta_type() {
            ChatMetaType::Prefix => (&mut self.prefixes, &mut self.prefix_stack),
            ChatMetaType::Suffix => (&mut self.suffixes, &mut self.suffix_stack),
        };
        if let Entry::Vacant(slot) = by_priority.entry(node.priority()) {
            slot.insert(node.value().to_string());
        }
        stack.accumulate_to_all(node);
        Ok(())
    }

    /// Values are kept per key in discovery order. Keys are case-insensitive.
    pub fn accumulate_meta(&mut self, key: &str, value: impl Into<String>) -> CacheResult<()> {
        self.ensure_state(State::Accumulating, "accumulate meta")?;
        self.meta
            .entry(key.to_lowercase())
            .or_default()
            .push(value.into());
        Ok(())
    }

    pub fn accumulate_weight(&mut self, weight: i32) -> CacheResult<()> {
        self.ensure_state(State::Accumulating, "accumulate weight")?;
        self.weight = Some(self.weight.map_or(weight, |current| current.max(weight)));
        Ok(())
    }

    /// Freeze the accumulator. Calling it again is a no-op.
    pub fn complete(&mut self) {
        self.state = State::Complete;
    }

    pub fn is_complete(&self) -> bool {
        self.state == State::Complete
    }

    /// Highest weight seen, None if no weight node was accumulated
    pub fn weight(&self) -> CacheResult<Option<i32>> {
        self.ensure_state(State::Complete, "read weight")?;
        Ok(self.weight)
    }

    pub fn meta(&self) -> CacheResult<&BTreeMap<String, Vec<String>>> {
        self.ensure_state(State::Complete, "read meta")?;
        Ok(&self.meta)
    }

    pub fn prefixes(&self) -> CacheResult<&BTreeMap<i32, String>> {
        self.ensure_state(State::Complete, "read prefixes")?;
        Ok(&self.prefixes)
    }

    pub fn suffixes(&self) -> CacheResult<&BTreeMap<i32, String>> {
        self.ensure_state(State::Complete, "read suffixes")?;
        Ok(&self.suffixes)
    }

    /// The formatted stack for `meta_type`
    pub fn formatted(&self, meta_type: ChatMetaType) -> CacheResult<Option<String>> {
        self.ensure_state(State::Complete, "read formatted stack")?;
        Ok(match meta_type {
            ChatMetaType::Prefix => self.prefix_stack.to_formatted_string(),
            ChatMetaType::Suffix => self.suffix_stack.to_formatted_string(),
        })
    }

    pub(crate) fn into_accumulated(self) -> CacheResult<AccumulatedMeta> {
        self.ensure_state(State::Complete, "take results")?;
        Ok(AccumulatedMeta {
            prefix: self.prefix_stack.to_formatted_string(),
            suffix: self.suffix_stack.to_formatted_string(),
            meta: self.meta,
            prefixes: self.prefixes,
            suffixes: self.suffixes,
            weight: self.weight,
            prefix_definition: self.prefix_stack.definition().clone(),
            suffix_definition: self.suffix_stack.definition().clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        stack::{DuplicateRemoval, MetaStackElement},
        track::TrackRegistry,
    };

    fn accumulator() -> MetaAccumulator {
        let tracks: Arc<dyn TrackProvider> = Arc::new(TrackRegistry::new());
        MetaAccumulator::new(
            MetaStackDefinition::default(),
            MetaStackDefinition::new(
                vec![MetaStackElement::lowest(), MetaStackElement::highest()],
                DuplicateRemoval::RetainAll,
                "",
                "",
                "",
            ),
            &HolderIdentifier::user("alice"),
            &tracks,
        )
    }

    #[test]
    fn test_reading_before_complete_fails() {
        let acc = accumulator();
        assert!(matches!(acc.weight(), Err(CacheError::IllegalState(_))));
        assert!(matches!(acc.meta(), Err(CacheError::IllegalState(_))));
        assert!(matches!(acc.prefixes(), Err(CacheError::IllegalState(_))));
        assert!(matches!(
            acc.formatted(ChatMetaType::Prefix),
            Err(CacheError::IllegalState(_))
        ));
    }

    #[test]
    fn test_writing_after_complete_fails() {
        let mut acc = accumulator();
        acc.complete();
        assert!(matches!(acc.accumulate_weight(5), Err(CacheError::IllegalState(_))));
        assert!(matches!(
            acc.accumulate_node(ChatMetaNode::prefix(1, "x")),
            Err(CacheError::IllegalState(_))
        ));
        assert!(matches!(
            acc.accumulate_meta("home", "1"),
            Err(CacheError::IllegalState(_))
        ));
    }

    #[test]
    fn test_zero_weight_is_a_real_value() {
        let mut acc = accumulator();
        acc.accumulate_weight(0).unwrap();
        acc.accumulate_weight(-5).unwrap();
        acc.complete();
        assert_eq!(acc.weight().unwrap(), Some(0));

        let mut empty = accumulator();
        empty.complete();
        assert_eq!(empty.weight().unwrap(), None);
    }

    #[test]
    fn test_chat_meta_routing() {
        let mut acc = accumulator();
        acc.accumulate_node(ChatMetaNode::prefix(10, "[A]")).unwrap();
        acc.accumulate_node(ChatMetaNode::prefix(10, "[B]")).unwrap();
        acc.accumulate_node(ChatMetaNode::prefix(20, "[C]")).unwrap();
        acc.accumulate_node(ChatMetaNode::suffix(5, "<x>")).unwrap();
        acc.accumulate_node(ChatMetaNode::suffix(7, "<y>")).unwrap();
        acc.complete();
        acc.complete();

        let prefixes = acc.prefixes().unwrap();
        assert_eq!(prefixes.get(&10).map(String::as_str), Some("[A]"));
        assert_eq!(prefixes.len(), 2);
        assert_eq!(acc.formatted(ChatMetaType::Prefix).unwrap().as_deref(), Some("[C]"));
        assert_eq!(acc.formatted(ChatMetaType::Suffix).unwrap().as_deref(), Some("<x><y>"));
    }

    #[test]
    fn test_meta_values_keep_discovery_order() {
        let mut acc = accumulator();
        acc.accumulate_node(MetaNode::meta("Homes", "3")).unwrap();
        acc.accumulate_node(MetaNode::meta("homes", "5")).unwrap();
        acc.complete();

        let meta = acc.meta().unwrap();
        assert_eq!(meta.get("homes").unwrap(), &vec!["3".to_string(), "5".to_string()]);
    }

    #[test]
    fn test_into_accumulated_requires_completion() {
        let acc = accumulator();
        assert!(acc.into_accumulated().is_err());

        let mut acc = accumulator();
        acc.complete();
        let parts = acc.into_accumulated().unwrap();
        assert_eq!(parts.prefix, None);
        assert_eq!(parts.prefix_definition, MetaStackDefinition::default());
    }
}
