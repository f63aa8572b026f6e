//! Tie-break strategies for a single meta stack layer
//!
//! An element decides whether a newly discovered candidate replaces the
//! layer's current winner. Elements are plain data (ordering plus an origin
//! filter), so definitions built from them compare and hash structurally.

#![allow(missing_docs)]

use crate::{
    error::{CacheError, CacheResult},
    holder::HolderIdentifier,
    node::{ChatMetaNode, ChatMetaType},
    stack::accumulator::ElementAccumulator,
    track::{PassTrackSnapshot, TrackProvider},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};

/// Which end of the priority range wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriorityOrder {
    Highest,
    Lowest,
}

impl PriorityOrder {
    /// Strict comparison: equal priorities keep the existing winner.
    #[inline]
    fn replaces(self, candidate: i32, current: i32) -> bool {
        match self {
            Self::Highest => candidate > current,
            Self::Lowest => candidate < current,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Highest => "highest",
            Self::Lowest => "lowest",
        }
    }
}

/// Restriction on where a candidate must originate from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementFilter {
    Any,
    /// Defined directly on the holder being resolved
    Own,
    /// Defined on some other holder
    Inherited,
    /// Origin group is currently on the named track
    OnTrack(String),
    /// No origin, or origin group is not on the named track
    NotOnTrack(String),
    /// Origin is the named group
    FromGroup(String),
    /// Origin is anything but the named group
    NotFromGroup(String),
}

impl ElementFilter {
    fn accepts(
        &self,
        target: &HolderIdentifier,
        tracks: &dyn TrackProvider,
        node: &ChatMetaNode,
    ) -> bool {
        let origin_group = node.origin().and_then(HolderIdentifier::group_name);
        match self {
            Self::Any => true,
            Self::Own => node.is_own(target),
            Self::Inherited => node.is_inherited(target),
            Self::OnTrack(track) => origin_group
                .is_some_and(|group| tracks.track_contains(track, group) == Some(true)),
            Self::NotOnTrack(track) => origin_group
                .is_none_or(|group| tracks.track_contains(track, group) == Some(false)),
            Self::FromGroup(group) => origin_group == Some(group.as_str()),
            Self::NotFromGroup(group) => origin_group != Some(group.as_str()),
        }
    }

    fn track(&self) -> Option<&str> {
        match self {
            Self::OnTrack(track) | Self::NotOnTrack(track) => Some(track),
            _ => None,
        }
    }
}

/// One configured layer of a meta stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MetaStackElement {
    order: PriorityOrder,
    filter: ElementFilter,
}

impl MetaStackElement {
    pub fn new(order: PriorityOrder, filter: ElementFilter) -> Self {
        let filter = match filter {
            ElementFilter::OnTrack(name) => ElementFilter::OnTrack(name.to_lowercase()),
            ElementFilter::NotOnTrack(name) => ElementFilter::NotOnTrack(name.to_lowercase()),
            ElementFilter::FromGroup(name) => ElementFilter::FromGroup(name.to_lowercase()),
            ElementFilter::NotFromGroup(name) => ElementFilter::NotFromGroup(name.to_lowercase()),
            other => other,
        };
        Self { order, filter }
    }

    pub fn highest() -> Self {
        Self::new(PriorityOrder::Highest, ElementFilter::Any)
    }

    pub fn lowest() -> Self {
        Self::new(PriorityOrder::Lowest, ElementFilter::Any)
    }

    pub fn highest_own() -> Self {
        Self::new(PriorityOrder::Highest, ElementFilter::Own)
    }

    pub fn lowest_own() -> Self {
        Self::new(PriorityOrder::Lowest, ElementFilter::Own)
    }

    pub fn highest_inherited() -> Self {
        Self::new(PriorityOrder::Highest, ElementFilter::Inherited)
    }

    pub fn lowest_inherited() -> Self {
        Self::new(PriorityOrder::Lowest, ElementFilter::Inherited)
    }

    pub fn highest_on_track(track: impl Into<String>) -> Self {
        Self::new(PriorityOrder::Highest, ElementFilter::OnTrack(track.into()))
    }

    pub fn lowest_on_track(track: impl Into<String>) -> Self {
        Self::new(PriorityOrder::Lowest, ElementFilter::OnTrack(track.into()))
    }

    pub fn highest_not_on_track(track: impl Into<String>) -> Self {
        Self::new(PriorityOrder::Highest, ElementFilter::NotOnTrack(track.into()))
    }

    pub fn lowest_not_on_track(track: impl Into<String>) -> Self {
        Self::new(PriorityOrder::Lowest, ElementFilter::NotOnTrack(track.into()))
    }

    pub fn highest_from_group(group: impl Into<String>) -> Self {
        Self::new(PriorityOrder::Highest, ElementFilter::FromGroup(group.into()))
    }

    pub fn lowest_from_group(group: impl Into<String>) -> Self {
        Self::new(PriorityOrder::Lowest, ElementFilter::FromGroup(group.into()))
    }

    pub fn highest_not_from_group(group: impl Into<String>) -> Self {
        Self::new(PriorityOrder::Highest, ElementFilter::NotFromGroup(group.into()))
    }

    pub fn lowest_not_from_group(group: impl Into<String>) -> Self {
        Self::new(PriorityOrder::Lowest, ElementFilter::NotFromGroup(group.into()))
    }

    pub fn order(&self) -> PriorityOrder {
        self.order
    }

    pub fn filter(&self) -> &ElementFilter {
        &self.filter
    }

    /// Elements whose decision depends on live track state
    pub fn is_dynamic(&self) -> bool {
        self.filter.track().is_some()
    }

    /// Whether `node` should replace `current` as this layer's winner.
    ///
    /// Total and side-effect free. Nodes of another meta type, and nodes
    /// whose origin fails the filter, are always rejected. A track that does
    /// not resolve rejects every candidate with an origin group.
    pub fn should_accumulate(
        &self,
        target: &HolderIdentifier,
        tracks: &dyn TrackProvider,
        meta_type: ChatMetaType,
        node: &ChatMetaNode,
        current: Option<&ChatMetaNode>,
    ) -> bool {
        if node.meta_type() != meta_type {
            return false;
        }
        if let Some(current) = current
            && !self.order.replaces(node.priority(), current.priority())
        {
            return false;
        }
        self.filter.accepts(target, tracks, node)
    }

    /// Build the per-pass accumulator for this element.
    ///
    /// Track-scoped elements get an accumulator that snapshots the track's
    /// membership on first use and reuses it for the rest of the pass.
    pub fn create_accumulator(
        &self,
        meta_type: ChatMetaType,
        target: HolderIdentifier,
        tracks: Arc<dyn TrackProvider>,
    ) -> ElementAccumulator {
        let tracks: Arc<dyn TrackProvider> = match self.filter.track() {
            Some(track) => Arc::new(PassTrackSnapshot::new(tracks, track)),
            None => tracks,
        };
        ElementAccumulator::new(self.clone(), meta_type, target, tracks)
    }
}

impl fmt::Display for MetaStackElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.order.as_str())?;
        match &self.filter {
            ElementFilter::Any => Ok(()),
            ElementFilter::Own => f.write_str("_own"),
            ElementFilter::Inherited => f.write_str("_inherited"),
            ElementFilter::OnTrack(track) => write!(f, "_on_track_{track}"),
            ElementFilter::NotOnTrack(track) => write!(f, "_not_on_track_{track}"),
            ElementFilter::FromGroup(group) => write!(f, "_from_group_{group}"),
            ElementFilter::NotFromGroup(group) => write!(f, "_not_from_group_{group}"),
        }
    }
}

impl FromStr for MetaStackElement {
    type Err = CacheError;

    fn from_str(s: &str) -> CacheResult<Self> {
        let lowered = s.trim().to_lowercase();
        let invalid = || CacheError::InvalidStackElement(s.to_string());

        let (order, rest) = if let Some(rest) = lowered.strip_prefix("highest") {
            (PriorityOrder::Highest, rest)
        } else if let Some(rest) = lowered.strip_prefix("lowest") {
            (PriorityOrder::Lowest, rest)
        } else {
            return Err(invalid());
        };

        let named = |prefix: &str| -> Option<String> {
            rest.strip_prefix(prefix)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
        };

        let filter = match rest {
            "" => ElementFilter::Any,
            "_own" => ElementFilter::Own,
            "_inherited" => ElementFilter::Inherited,
            _ => {
                if let Some(track) = named("_not_on_track_") {
                    ElementFilter::NotOnTrack(track)
                } else if let Some(track) = named("_on_track_") {
                    ElementFilter::OnTrack(track)
                } else if let Some(group) = named("_not_from_group_") {
                    ElementFilter::NotFromGroup(group)
                } else if let Some(group) = named("_from_group_") {
                    ElementFilter::FromGroup(group)
                } else {
                    return Err(invalid());
                }
            }
        };

        Ok(Self::new(order, filter))
    }
}

impl TryFrom<String> for MetaStackElement {
    type Error = CacheError;

    fn try_from(value: String) -> CacheResult<Self> {
        value.parse()
    }
}

impl From<MetaStackElement> for String {
    fn from(element: MetaStackElement) -> Self {
        element.to_string()
    }
}
