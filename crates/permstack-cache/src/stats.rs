//! Container statistics and metrics types
//!
//! Counters are updated lock-free from the container hot paths and read as a
//! point-in-time [`ContainerStats`] snapshot.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)] // Statistics calculations intentionally accept precision loss

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

// Use cache-aligned atomics to reduce false sharing
#[repr(align(64))] // Cache line alignment
#[derive(Debug)]
struct CacheAlignedAtomicU64(AtomicU64);

impl CacheAlignedAtomicU64 {
    fn new(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    #[inline]
    fn load(&self, ordering: Ordering) -> u64 {
        self.0.load(ordering)
    }

    #[inline]
    fn fetch_add(&self, value: u64, ordering: Ordering) -> u64 {
        self.0.fetch_add(value, ordering)
    }
}

/// Container statistics snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_field_names)]
pub struct ContainerStats {
    /// Total number of get operations
    pub get_count: u64,
    /// Gets answered by an already published entry
    pub hit_count: u64,
    /// Gets that had to wait for or start a computation
    pub miss_count: u64,
    /// Computations that published an entry (initial loads and reloads)
    pub load_count: u64,
    /// Computations that failed
    pub load_failure_count: u64,
    /// Recalculations that replaced an entry
    pub recalculation_count: u64,
    /// Recalculations discarded because the slot changed underneath them
    pub discarded_recalculation_count: u64,
    /// Entries removed by explicit invalidation
    pub invalidation_count: u64,
    /// Entries removed by cleanup
    pub eviction_count: u64,
    /// Container creation time
    pub created_at: Instant,
    /// Average duration of a successful computation
    pub avg_load_time: Duration,
}

impl ContainerStats {
    pub fn new() -> Self {
        Self {
            get_count: 0,
            hit_count: 0,
            miss_count: 0,
            load_count: 0,
            load_failure_count: 0,
            recalculation_count: 0,
            discarded_recalculation_count: 0,
            invalidation_count: 0,
            eviction_count: 0,
            created_at: Instant::now(),
            avg_load_time: Duration::ZERO,
        }
    }

    /// Calculate hit rate (hits / total gets)
    #[inline]
    pub fn hit_rate(&self) -> f64 {
        if self.get_count == 0 {
            0.0
        } else {
            self.hit_count as f64 / self.get_count as f64
        }
    }

    fn computations(&self) -> u64 {
        self.load_count.saturating_add(self.recalculation_count)
    }

    /// Merge statistics from another container
    pub fn merge(&mut self, other: &Self) {
        let prev_computations = self.computations();

        self.get_count = self.get_count.saturating_add(other.get_count);
        self.hit_count = self.hit_count.saturating_add(other.hit_count);
        self.miss_count = self.miss_count.saturating_add(other.miss_count);
        self.load_count = self.load_count.saturating_add(other.load_count);
        self.load_failure_count = self
            .load_failure_count
            .saturating_add(other.load_failure_count);
        self.recalculation_count = self
            .recalculation_count
            .saturating_add(other.recalculation_count);
        self.discarded_recalculation_count = self
            .discarded_recalculation_count
            .saturating_add(other.discarded_recalculation_count);
        self.invalidation_count = self
            .invalidation_count
            .saturating_add(other.invalidation_count);
        self.eviction_count = self.eviction_count.saturating_add(other.eviction_count);
        self.created_at = self.created_at.min(other.created_at);

        // Weighted average - avoid overflow
        let total = self.computations();
        if total > 0 {
            let nanos = nanos_u64(self.avg_load_time)
                .saturating_mul(prev_computations)
                .saturating_add(nanos_u64(other.avg_load_time).saturating_mul(other.computations()));
            self.avg_load_time = Duration::from_nanos(nanos / total);
        }
    }
}

impl Default for ContainerStats {
    fn default() -> Self {
        Self::new()
    }
}

fn nanos_u64(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Atomic counters owned by one container
#[derive(Debug)]
pub struct ContainerMetrics {
    get_count: CacheAlignedAtomicU64,
    hit_count: CacheAlignedAtomicU64,
    miss_count: CacheAlignedAtomicU64,

    load_count: CacheAlignedAtomicU64,
    load_failure_count: CacheAlignedAtomicU64,
    recalculation_count: CacheAlignedAtomicU64,
    discarded_recalculation_count: CacheAlignedAtomicU64,

    invalidation_count: CacheAlignedAtomicU64,
    eviction_count: CacheAlignedAtomicU64,

    total_load_time_nanos: CacheAlignedAtomicU64,

    created_at: Instant,
}

impl ContainerMetrics {
    pub fn new() -> Self {
        Self {
            get_count: CacheAlignedAtomicU64::new(0),
            hit_count: CacheAlignedAtomicU64::new(0),
            miss_count: CacheAlignedAtomicU64::new(0),
            load_count: CacheAlignedAtomicU64::new(0),
            load_failure_count: CacheAlignedAtomicU64::new(0),
            recalculation_count: CacheAlignedAtomicU64::new(0),
            discarded_recalculation_count: CacheAlignedAtomicU64::new(0),
            invalidation_count: CacheAlignedAtomicU64::new(0),
            eviction_count: CacheAlignedAtomicU64::new(0),
            total_load_time_nanos: CacheAlignedAtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    #[inline]
    pub fn record_get(&self, hit: bool) {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_load(&self, duration: Duration) {
        self.load_count.fetch_add(1, Ordering::Relaxed);
        self.total_load_time_nanos
            .fetch_add(nanos_u64(duration), Ordering::Relaxed);
    }

    #[inline]
    pub fn record_load_failure(&self) {
        self.load_failure_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_recalculation(&self, duration: Duration) {
        self.recalculation_count.fetch_add(1, Ordering::Relaxed);
        self.total_load_time_nanos
            .fetch_add(nanos_u64(duration), Ordering::Relaxed);
    }

    #[inline]
    pub fn record_discarded_recalculation(&self) {
        self.discarded_recalculation_count
            .fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_invalidations(&self, count: u64) {
        self.invalidation_count.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_evictions(&self, count: u64) {
        self.eviction_count.fetch_add(count, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> ContainerStats {
        let load_count = self.load_count.load(Ordering::Relaxed);
        let recalculation_count = self.recalculation_count.load(Ordering::Relaxed);
        let computations = load_count.saturating_add(recalculation_count);
        let total_load_time_nanos = self.total_load_time_nanos.load(Ordering::Relaxed);

        let avg_load_time = if computations > 0 {
            Duration::from_nanos(total_load_time_nanos / computations)
        } else {
            Duration::ZERO
        };

        ContainerStats {
            get_count: self.get_count.load(Ordering::Relaxed),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            load_count,
            load_failure_count: self.load_failure_count.load(Ordering::Relaxed),
            recalculation_count,
            discarded_recalculation_count: self
                .discarded_recalculation_count
                .load(Ordering::Relaxed),
            invalidation_count: self.invalidation_count.load(Ordering::Relaxed),
            eviction_count: self.eviction_count.load(Ordering::Relaxed),
            created_at: self.created_at,
            avg_load_time,
        }
    }
}

impl Default for ContainerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
