//! Cached result objects
//!
//! Every entry a container publishes is an immutable snapshot carrying the
//! [`CacheMetadata`] it was computed for and a [`UsageTracker`] that the
//! container touches on each successful read. Cleanup decides eviction from
//! the tracker alone.

#![allow(missing_docs)]

pub mod meta;
pub mod permission;

pub use meta::MetaCache;
pub use permission::{PermissionCache, PermissionCalculator};

use crate::{
    context::QueryOptions,
    holder::{HolderType, VerboseCheckTarget},
};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

/// What a cached result was computed for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheMetadata {
    holder_type: HolderType,
    verbose_target: VerboseCheckTarget,
    query_options: QueryOptions,
}

impl CacheMetadata {
    pub fn new(
        holder_type: HolderType,
        verbose_target: VerboseCheckTarget,
        query_options: QueryOptions,
    ) -> Self {
        Self {
            holder_type,
            verbose_target,
            query_options,
        }
    }

    pub fn holder_type(&self) -> HolderType {
        self.holder_type
    }

    pub fn verbose_target(&self) -> &VerboseCheckTarget {
        &self.verbose_target
    }

    /// The key this result is filed under
    pub fn query_options(&self) -> &QueryOptions {
        &self.query_options
    }
}

/// Last-access bookkeeping shared by all result types.
///
/// Access time is stored as nanoseconds since creation so it can be updated
/// through a shared reference.
#[derive(Debug)]
pub struct UsageTracker {
    created: Instant,
    last_access_nanos: AtomicU64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self {
            created: Instant::now(),
            last_access_nanos: AtomicU64::new(0),
        }
    }

    /// Mark the owning result as used now
    #[inline]
    pub fn record_access(&self) {
        let elapsed = u64::try_from(self.created.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.last_access_nanos.fetch_max(elapsed, Ordering::Relaxed);
    }

    pub fn last_access(&self) -> Instant {
        self.created + Duration::from_nanos(self.last_access_nanos.load(Ordering::Relaxed))
    }

    /// Time since the last recorded access (or creation)
    pub fn idle(&self) -> Duration {
        self.last_access().elapsed()
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Common surface of the values a [`CacheContainer`](crate::container::CacheContainer) stores
pub trait CachedData: Send + Sync + 'static {
    fn metadata(&self) -> &CacheMetadata;

    fn usage(&self) -> &UsageTracker;
}
