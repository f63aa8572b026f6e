//! Identity of permission holders and the resolver boundary they expose
//!
//! A holder (user or group) owns its permission and meta assignments. The
//! cache never walks the inheritance tree itself; it asks the holder's
//! [`HolderResolver`] for already-filtered candidates.

#![allow(missing_docs)]

use crate::{context::QueryOptions, error::CacheResult, meta::MetaAccumulator};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

/// Kind of permission holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HolderType {
    User,
    Group,
}

impl fmt::Display for HolderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Group => f.write_str("group"),
        }
    }
}

/// Unique identity of a holder. Names are stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HolderIdentifier {
    holder_type: HolderType,
    name: String,
}

impl HolderIdentifier {
    pub fn new(holder_type: HolderType, name: impl AsRef<str>) -> Self {
        Self {
            holder_type,
            name: name.as_ref().to_lowercase(),
        }
    }

    pub fn user(name: impl AsRef<str>) -> Self {
        Self::new(HolderType::User, name)
    }

    pub fn group(name: impl AsRef<str>) -> Self {
        Self::new(HolderType::Group, name)
    }

    pub fn holder_type(&self) -> HolderType {
        self.holder_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group name if this identifies a group
    pub fn group_name(&self) -> Option<&str> {
        match self.holder_type {
            HolderType::Group => Some(&self.name),
            HolderType::User => None,
        }
    }
}

impl fmt::Display for HolderIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.holder_type, self.name)
    }
}

/// Name under which permission checks for a holder are reported in verbose output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerboseCheckTarget {
    holder_type: HolderType,
    name: String,
}

impl VerboseCheckTarget {
    pub fn new(holder_type: HolderType, name: impl Into<String>) -> Self {
        Self {
            holder_type,
            name: name.into(),
        }
    }

    pub fn holder_type(&self) -> HolderType {
        self.holder_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<&HolderIdentifier> for VerboseCheckTarget {
    fn from(id: &HolderIdentifier) -> Self {
        Self::new(id.holder_type(), id.name())
    }
}

impl fmt::Display for VerboseCheckTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.holder_type, self.name)
    }
}

/// Node resolution hooks owned by the permission holder model.
///
/// Both calls receive the query options the cache entry is being computed
/// for and must only yield nodes that apply under them. Nodes must be
/// produced in inheritance pre-order; tie-breaking in meta stacks depends on
/// discovery order.
pub trait HolderResolver: Send + Sync + 'static {
    /// The holder whose data is being resolved
    fn identifier(&self) -> &HolderIdentifier;

    /// Name used for verbose permission check output. Defaults to the identifier.
    fn verbose_target(&self) -> VerboseCheckTarget {
        VerboseCheckTarget::from(self.identifier())
    }

    /// Resolve the effective permission map. Keys are permission names.
    fn resolve_permissions(&self, query_options: &QueryOptions)
    -> CacheResult<HashMap<String, bool>>;

    /// Stream applicable prefix, suffix, meta and weight nodes into `accumulator`.
    fn resolve_meta(
        &self,
        accumulator: &mut MetaAccumulator,
        query_options: &QueryOptions,
    ) -> CacheResult<()>;
}
