//! Contextual permission and chat-meta caching for permission holders
//!
//! This crate keeps a holder's resolved permissions and meta (prefixes,
//! suffixes, arbitrary `key=value` meta and weight) cached per set of query
//! options, and keeps those caches coherent as the underlying assignments
//! change.
//!
//! # Features
//!
//! - **Async-Loading Containers**: One computation per key no matter how many
//!   callers miss at once
//! - **Recalculation With Reuse**: Entries are recomputed in the background
//!   and swapped in atomically; expensive parts of the previous entry may be
//!   reused
//! - **Linearizable Reload**: A reload invalidates first, so the old value is
//!   never served afterwards
//! - **Usage-Based Eviction**: Entries idle for longer than the staleness
//!   window are dropped by periodic housekeeping
//! - **Meta Stacks**: Competing prefixes and suffixes are reduced by an
//!   ordered list of tie-break elements into one deterministic string
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        CachedDataManager            │
//! │  (one per holder, owns containers)  │
//! └─────────────────────────────────────┘
//!          │                    │
//! ┌─────────────────┐  ┌─────────────────┐
//! │ CacheContainer  │  │ CacheContainer  │
//! │ <Permission…>   │  │ <MetaCache>     │
//! └─────────────────┘  └─────────────────┘
//!          │                    │
//! ┌─────────────────────────────────────┐
//! │          HolderResolver             │
//! │  resolve_permissions / resolve_meta │
//! └─────────────────────────────────────┘
//!                               │
//!                  ┌─────────────────────────┐
//!                  │ MetaAccumulator         │
//!                  │  └ MetaStack (per type) │
//!                  │     └ ElementAccumulator│
//!                  └─────────────────────────┘
//! ```
//!
//! # Usage Example
//!
//! ```rust
//! use std::{collections::HashMap, sync::Arc};
//! use permstack_cache::prelude::*;
//!
//! struct Notch(HolderIdentifier);
//!
//! impl HolderResolver for Notch {
//!     fn identifier(&self) -> &HolderIdentifier {
//!         &self.0
//!     }
//!
//!     fn resolve_permissions(&self, _: &QueryOptions) -> CacheResult<HashMap<String, bool>> {
//!         Ok(HashMap::from([("essentials.fly".to_string(), true)]))
//!     }
//!
//!     fn resolve_meta(&self, acc: &mut MetaAccumulator, _: &QueryOptions) -> CacheResult<()> {
//!         acc.accumulate_node(ChatMetaNode::prefix(100, "[Admin]"))?;
//!         acc.accumulate_node(ChatMetaNode::prefix(10, "[Member]"))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> CacheResult<()> {
//! let tracks: Arc<dyn TrackProvider> = Arc::new(TrackRegistry::new());
//! let manager = CachedDataManager::new(
//!     Arc::new(Notch(HolderIdentifier::user("notch"))),
//!     tracks,
//!     CacheConfig::default(),
//! )?;
//!
//! let query = QueryOptions::contextual(ContextSet::of("server", "lobby"));
//! let permissions = manager.permission_data(&query).await?;
//! assert_eq!(permissions.check_permission("essentials.fly"), Tristate::True);
//!
//! let meta = manager.meta_data(&query).await?;
//! assert_eq!(meta.prefix(), Some("[Admin]"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::doc_markdown)] // Domain terms don't need backticks
#![allow(clippy::use_self)] // Sometimes explicit types are clearer
#![allow(clippy::redundant_closure_for_method_calls)] // Sometimes clearer

pub mod config;
pub mod container;
pub mod context;
pub mod data;
pub mod error;
pub mod holder;
pub mod housekeeping;
pub mod manager;
pub mod meta;
pub mod node;
pub mod stack;
pub mod stats;
pub mod track;

// Re-export commonly used types
pub use config::CacheConfig;
pub use container::{BulkRefresh, CacheContainer, CacheLoader, Refresh};
pub use context::{ContextSet, Flag, FlagSet, QueryMode, QueryOptions, QueryOptionsBuilder};
pub use data::{CacheMetadata, CachedData, MetaCache, PermissionCache, PermissionCalculator, UsageTracker};
pub use error::{CacheError, CacheResult};
pub use holder::{HolderIdentifier, HolderResolver, HolderType, VerboseCheckTarget};
pub use housekeeping::{Cleanup, Housekeeper};
pub use manager::CachedDataManager;
pub use meta::{MetaAccumulator, MetaValueSelector};
pub use node::{ChatMetaNode, ChatMetaType, MetaNode, Tristate};
pub use stack::{
    DuplicateRemoval, ElementAccumulator, ElementFilter, MetaStack, MetaStackDefinition,
    MetaStackElement, PriorityOrder,
};
pub use stats::{ContainerMetrics, ContainerStats};
pub use track::{TrackProvider, TrackRegistry};

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits

    pub use crate::{
        // Managers and containers
        CacheContainer,
        CachedDataManager,
        Housekeeper,
        config::CacheConfig,
        context::{ContextSet, QueryMode, QueryOptions},
        data::{CachedData, MetaCache, PermissionCache},
        error::{CacheError, CacheResult},
        holder::{HolderIdentifier, HolderResolver, HolderType},
        meta::{MetaAccumulator, MetaValueSelector},
        node::{ChatMetaNode, ChatMetaType, MetaNode, Tristate},
        stack::{DuplicateRemoval, MetaStackDefinition, MetaStackElement},
        track::{TrackProvider, TrackRegistry},
    };
}
