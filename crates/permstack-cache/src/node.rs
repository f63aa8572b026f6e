//! Resolved node shapes consumed by the cache
//!
//! Nodes arrive already filtered for applicability by the holder's resolver.
//! They are never mutated once created.

#![allow(missing_docs)]

use crate::holder::HolderIdentifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chat meta category a stack is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMetaType {
    Prefix,
    Suffix,
}

impl fmt::Display for ChatMetaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefix => f.write_str("prefix"),
            Self::Suffix => f.write_str("suffix"),
        }
    }
}

/// A prefix or suffix candidate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatMetaNode {
    meta_type: ChatMetaType,
    priority: i32,
    value: String,
    /// Holder the node was defined on. None when the resolver did not tag it.
    origin: Option<HolderIdentifier>,
}

impl ChatMetaNode {
    pub fn new(meta_type: ChatMetaType, priority: i32, value: impl Into<String>) -> Self {
        Self {
            meta_type,
            priority,
            value: value.into(),
            origin: None,
        }
    }

    pub fn prefix(priority: i32, value: impl Into<String>) -> Self {
        Self::new(ChatMetaType::Prefix, priority, value)
    }

    pub fn suffix(priority: i32, value: impl Into<String>) -> Self {
        Self::new(ChatMetaType::Suffix, priority, value)
    }

    /// Tag the node with the holder it was defined on
    pub fn with_origin(mut self, origin: HolderIdentifier) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn meta_type(&self) -> ChatMetaType {
        self.meta_type
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn origin(&self) -> Option<&HolderIdentifier> {
        self.origin.as_ref()
    }

    /// Defined directly on `holder`. Untagged nodes are never "own".
    pub fn is_own(&self, holder: &HolderIdentifier) -> bool {
        self.origin.as_ref() == Some(holder)
    }

    /// Inherited from a holder other than `holder`.
    pub fn is_inherited(&self, holder: &HolderIdentifier) -> bool {
        self.origin.as_ref().is_some_and(|origin| origin != holder)
    }
}

/// Any node a meta resolution pass can encounter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaNode {
    ChatMeta(ChatMetaNode),
    /// Arbitrary `key=value` meta
    Meta {
        key: String,
        value: String,
        origin: Option<HolderIdentifier>,
    },
    Weight(i32),
}

impl MetaNode {
    pub fn meta(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Meta {
            key: key.into(),
            value: value.into(),
            origin: None,
        }
    }
}

impl From<ChatMetaNode> for MetaNode {
    fn from(node: ChatMetaNode) -> Self {
        Self::ChatMeta(node)
    }
}

/// Three-valued permission check result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tristate {
    True,
    False,
    #[default]
    Undefined,
}

impl Tristate {
    pub fn as_bool(self) -> bool {
        matches!(self, Self::True)
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

impl From<Option<bool>> for Tristate {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Self::Undefined, Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_classification() {
        let user = HolderIdentifier::user("alice");
        let own = ChatMetaNode::prefix(10, "[A]").with_origin(user.clone());
        let inherited = ChatMetaNode::prefix(10, "[G]").with_origin(HolderIdentifier::group("vip"));
        let untagged = ChatMetaNode::prefix(10, "[?]");

        assert!(own.is_own(&user));
        assert!(!own.is_inherited(&user));
        assert!(inherited.is_inherited(&user));
        assert!(!inherited.is_own(&user));
        assert!(!untagged.is_own(&user));
        assert!(!untagged.is_inherited(&user));
    }

    #[test]
    fn test_tristate_conversions() {
        assert_eq!(Tristate::from(true), Tristate::True);
        assert_eq!(Tristate::from(Some(false)), Tristate::False);
        assert_eq!(Tristate::from(None), Tristate::Undefined);
        assert!(!Tristate::Undefined.as_bool());
        assert_eq!(Tristate::default(), Tristate::Undefined);
    }
}
