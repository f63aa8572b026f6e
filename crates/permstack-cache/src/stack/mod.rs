//! Meta stacks: deterministic reduction of competing prefixes and suffixes
//!
//! A [`MetaStackDefinition`] lists tie-break elements in display order. For
//! each resolution pass a [`MetaStack`] is built from it, every candidate is
//! offered to every layer, and the per-layer winners are joined into one
//! formatted string.
//!
//! ```rust
//! use std::sync::Arc;
//! use permstack_cache::{
//!     holder::HolderIdentifier,
//!     node::{ChatMetaNode, ChatMetaType},
//!     stack::{DuplicateRemoval, MetaStack, MetaStackDefinition, MetaStackElement},
//!     track::{TrackProvider, TrackRegistry},
//! };
//!
//! let tracks: Arc<dyn TrackProvider> = Arc::new(TrackRegistry::new());
//! let definition = MetaStackDefinition::new(
//!     vec![MetaStackElement::lowest(), MetaStackElement::highest()],
//!     DuplicateRemoval::RetainAll,
//!     "",
//!     " ",
//!     "",
//! );
//! let mut stack = MetaStack::new(
//!     definition,
//!     ChatMetaType::Prefix,
//!     &HolderIdentifier::user("alice"),
//!     &tracks,
//! );
//! stack.accumulate_to_all(&ChatMetaNode::prefix(100, "[Admin]"));
//! stack.accumulate_to_all(&ChatMetaNode::prefix(10, "[Member]"));
//! assert_eq!(stack.to_formatted_string().as_deref(), Some("[Member] [Admin]"));
//! ```

pub mod accumulator;
pub mod definition;
pub mod element;

pub use accumulator::{ElementAccumulator, MetaStack};
pub use definition::{DuplicateRemoval, MetaStackDefinition};
pub use element::{ElementFilter, MetaStackElement, PriorityOrder};
