//! Query contexts and the immutable `QueryOptions` cache key
//!
//! `QueryOptions` is the identity every cached result is filed under. It is
//! cheap to clone (shared inner value) and compares and hashes structurally,
//! so two independently built but identical options address the same entry.

#![allow(missing_docs)]

use crate::{node::ChatMetaType, stack::MetaStackDefinition};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

/// Immutable multimap of context keys to values (e.g. `server=lobby`).
///
/// Keys and values are stored lowercase and ordered, which keeps equality and
/// hashing independent of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextSet {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl ContextSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Single-pair context set
    pub fn of(key: &str, value: &str) -> Self {
        Self::empty().with(key, value)
    }

    /// Returns a copy with `key=value` added. Blank keys or values are ignored.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        let key = key.trim().to_lowercase();
        let value = value.trim().to_lowercase();
        if !key.is_empty() && !value.is_empty() {
            self.entries.entry(key).or_default().insert(value);
        }
        self
    }

    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.entries
            .get(&key.to_lowercase())
            .is_some_and(|values| values.contains(&value.to_lowercase()))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_lowercase())
    }

    pub fn values(&self, key: &str) -> impl Iterator<Item = &str> {
        self.entries
            .get(&key.to_lowercase())
            .into_iter()
            .flat_map(|values| values.iter().map(String::as_str))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of key/value pairs
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    /// True if every pair in `self` is also present in `other`.
    pub fn is_satisfied_by(&self, other: &ContextSet) -> bool {
        self.iter().all(|(k, v)| other.contains(k, v))
    }
}

impl fmt::Display for ContextSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("]")
    }
}

/// Whether resolution filters nodes by context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Only nodes applicable under the query's context set
    Contextual,
    /// Every node regardless of context
    NonContextual,
}

/// Resolution flags carried in query options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    ResolveInheritance,
    IncludeNodesWithoutServerContext,
    IncludeNodesWithoutWorldContext,
    ApplyInheritanceNodesWithoutServerContext,
    ApplyInheritanceNodesWithoutWorldContext,
}

impl Flag {
    pub const ALL: [Self; 5] = [
        Self::ResolveInheritance,
        Self::IncludeNodesWithoutServerContext,
        Self::IncludeNodesWithoutWorldContext,
        Self::ApplyInheritanceNodesWithoutServerContext,
        Self::ApplyInheritanceNodesWithoutWorldContext,
    ];

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Compact flag set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlagSet(u8);

impl FlagSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Flag::ALL.into_iter().fold(Self::empty(), Self::with)
    }

    pub const fn with(self, flag: Flag) -> Self {
        Self(self.0 | flag.bit())
    }

    pub const fn without(self, flag: Flag) -> Self {
        Self(self.0 & !flag.bit())
    }

    pub const fn contains(self, flag: Flag) -> bool {
        self.0 & flag.bit() != 0
    }
}

impl Default for FlagSet {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct QueryOptionsInner {
    mode: QueryMode,
    contexts: ContextSet,
    flags: FlagSet,
    prefix_stack: Option<MetaStackDefinition>,
    suffix_stack: Option<MetaStackDefinition>,
}

/// Immutable bundle of contexts, mode, flags and meta stack overrides.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryOptions(Arc<QueryOptionsInner>);

impl QueryOptions {
    pub fn builder(mode: QueryMode) -> QueryOptionsBuilder {
        QueryOptionsBuilder::new(mode)
    }

    /// Contextual options with default flags
    pub fn contextual(contexts: ContextSet) -> Self {
        Self::builder(QueryMode::Contextual).context(contexts).build()
    }

    /// The "resolve all, no context filter" variant
    pub fn non_contextual() -> Self {
        Self::builder(QueryMode::NonContextual).build()
    }

    pub fn to_builder(&self) -> QueryOptionsBuilder {
        QueryOptionsBuilder {
            mode: self.0.mode,
            contexts: self.0.contexts.clone(),
            flags: self.0.flags,
            prefix_stack: self.0.prefix_stack.clone(),
            suffix_stack: self.0.suffix_stack.clone(),
        }
    }

    pub fn mode(&self) -> QueryMode {
        self.0.mode
    }

    /// Always empty for non-contextual options
    pub fn contexts(&self) -> &ContextSet {
        &self.0.contexts
    }

    pub fn flags(&self) -> FlagSet {
        self.0.flags
    }

    pub fn flag(&self, flag: Flag) -> bool {
        self.0.flags.contains(flag)
    }

    /// Meta stack override for the given chat meta type, if any
    pub fn meta_stack(&self, meta_type: ChatMetaType) -> Option<&MetaStackDefinition> {
        match meta_type {
            ChatMetaType::Prefix => self.0.prefix_stack.as_ref(),
            ChatMetaType::Suffix => self.0.suffix_stack.as_ref(),
        }
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::contextual(ContextSet::empty())
    }
}

impl fmt::Display for QueryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.mode {
            QueryMode::Contextual => write!(f, "contextual{}", self.0.contexts),
            QueryMode::NonContextual => f.write_str("non-contextual"),
        }
    }
}

/// Builder for [`QueryOptions`]
#[derive(Debug, Clone)]
pub struct QueryOptionsBuilder {
    mode: QueryMode,
    contexts: ContextSet,
    flags: FlagSet,
    prefix_stack: Option<MetaStackDefinition>,
    suffix_stack: Option<MetaStackDefinition>,
}

impl QueryOptionsBuilder {
    pub fn new(mode: QueryMode) -> Self {
        Self {
            mode,
            contexts: ContextSet::empty(),
            flags: FlagSet::default(),
            prefix_stack: None,
            suffix_stack: None,
        }
    }

    pub fn mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Ignored for non-contextual options
    pub fn context(mut self, contexts: ContextSet) -> Self {
        self.contexts = contexts;
        self
    }

    pub fn flag(mut self, flag: Flag, value: bool) -> Self {
        self.flags = if value {
            self.flags.with(flag)
        } else {
            self.flags.without(flag)
        };
        self
    }

    pub fn flags(mut self, flags: FlagSet) -> Self {
        self.flags = flags;
        self
    }

    pub fn meta_stack(mut self, meta_type: ChatMetaType, definition: MetaStackDefinition) -> Self {
        match meta_type {
            ChatMetaType::Prefix => self.prefix_stack = Some(definition),
            ChatMetaType::Suffix => self.suffix_stack = Some(definition),
        }
        self
    }

    pub fn build(self) -> QueryOptions {
        let contexts = match self.mode {
            QueryMode::Contextual => self.contexts,
            QueryMode::NonContextual => ContextSet::empty(),
        };
        QueryOptions(Arc::new(QueryOptionsInner {
            mode: self.mode,
            contexts,
            flags: self.flags,
            prefix_stack: self.prefix_stack,
            suffix_stack: self.suffix_stack,
        }))
    }
}
