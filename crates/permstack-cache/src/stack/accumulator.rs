//! Per-pass reducers: one `ElementAccumulator` per layer, grouped in a `MetaStack`

#![allow(missing_docs)]

use crate::{
    holder::HolderIdentifier,
    node::{ChatMetaNode, ChatMetaType},
    stack::{definition::MetaStackDefinition, element::MetaStackElement},
    track::TrackProvider,
};
use std::{fmt, sync::Arc};

/// Holds the current winner for one stack layer.
///
/// Nodes must be offered in discovery order; ties keep the first node seen.
pub struct ElementAccumulator {
    element: MetaStackElement,
    meta_type: ChatMetaType,
    target: HolderIdentifier,
    tracks: Arc<dyn TrackProvider>,
    current: Option<ChatMetaNode>,
}

impl ElementAccumulator {
    pub(crate) fn new(
        element: MetaStackElement,
        meta_type: ChatMetaType,
        target: HolderIdentifier,
        tracks: Arc<dyn TrackProvider>,
    ) -> Self {
        Self {
            element,
            meta_type,
            target,
            tracks,
            current: None,
        }
    }

    /// Offer a candidate. Returns true if it became the new winner.
    pub fn offer(&mut self, node: &ChatMetaNode) -> bool {
        let accept = self.element.should_accumulate(
            &self.target,
            self.tracks.as_ref(),
            self.meta_type,
            node,
            self.current.as_ref(),
        );
        if accept {
            self.current = Some(node.clone());
        }
        accept
    }

    /// Current winner, None if nothing was accepted
    pub fn result(&self) -> Option<&ChatMetaNode> {
        self.current.as_ref()
    }

    pub fn element(&self) -> &MetaStackElement {
        &self.element
    }
}

impl fmt::Debug for ElementAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementAccumulator")
            .field("element", &self.element)
            .field("meta_type", &self.meta_type)
            .field("target", &self.target)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

/// Ordered set of layer accumulators built from a [`MetaStackDefinition`]
#[derive(Debug)]
pub struct MetaStack {
    definition: MetaStackDefinition,
    meta_type: ChatMetaType,
    layers: Vec<ElementAccumulator>,
}

impl MetaStack {
    pub fn new(
        definition: MetaStackDefinition,
        meta_type: ChatMetaType,
        target: &HolderIdentifier,
        tracks: &Arc<dyn TrackProvider>,
    ) -> Self {
        let layers = definition
            .elements()
            .iter()
            .map(|element| element.create_accumulator(meta_type, target.clone(), Arc::clone(tracks)))
            .collect();
        Self {
            definition,
            meta_type,
            layers,
        }
    }

    /// Offer `node` to every layer
    pub fn accumulate_to_all(&mut self, node: &ChatMetaNode) {
        for layer in &mut self.layers {
            layer.offer(node);
        }
    }

    /// Join each layer's winner per the definition.
    ///
    /// Returns None when no layer produced a result, so "no meta" stays
    /// distinguishable from an empty string value.
    pub fn to_formatted_string(&self) -> Option<String> {
        let values = self
            .layers
            .iter()
            .filter_map(ElementAccumulator::result)
            .map(ChatMetaNode::value)
            .collect();
        self.definition.format(values)
    }

    pub fn definition(&self) -> &MetaStackDefinition {
        &self.definition
    }

    pub fn meta_type(&self) -> ChatMetaType {
        self.meta_type
    }

    pub fn layers(&self) -> &[ElementAccumulator] {
        &self.layers
    }
}
