//! Contextual async-loading cache container
//!
//! A [`CacheContainer`] maps [`QueryOptions`] to lazily computed, immutable
//! results. Each key owns a slot holding a single-assignment cell:
//!
//! - the first `get` for a key inserts an empty slot and initializes its
//!   cell; concurrent `get`s for the same key wait on that same cell, so
//!   only one computation runs
//! - `recalculate` takes a ticket when issued, computes off to the side and
//!   swaps in the result only if its ticket is still the latest one issued
//!   for the slot it started from
//! - `reload` removes the slot before recomputing, so no reader can be handed
//!   the pre-reload value afterwards
//!
//! Computations run on Tokio's blocking pool since resolvers are synchronous.

#![allow(missing_docs)]

use crate::{
    context::QueryOptions,
    data::CachedData,
    error::{CacheError, CacheResult},
    stats::{ContainerMetrics, ContainerStats},
};
use dashmap::DashMap;
use futures::future::{join_all, try_join_all};
use std::{
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    task::{Context, Poll},
    time::{Duration, Instant},
};
use tokio::{runtime::Handle, sync::OnceCell, task::JoinHandle};
use tracing::{debug, warn};

/// Computes the value for one key.
///
/// `previous` is the currently published value when recalculating. It may be
/// used to reuse expensive parts, but the result must not depend on it.
pub trait CacheLoader<T>: Send + Sync + 'static {
    fn load(&self, query_options: &QueryOptions, previous: Option<&T>) -> CacheResult<T>;
}

struct Slot<T> {
    /// Identity of this slot; a reload or invalidation yields a new one
    generation: u64,
    /// Ticket of the most recently issued recalculation
    latest_recalculation: u64,
    cell: Arc<OnceCell<Arc<T>>>,
}

impl<T> Slot<T> {
    fn pending(generation: u64) -> Self {
        Self {
            generation,
            latest_recalculation: generation,
            cell: Arc::new(OnceCell::new()),
        }
    }

    fn published(&self) -> Option<&Arc<T>> {
        self.cell.get()
    }

    fn publish(&mut self, value: Arc<T>) {
        self.cell = Arc::new(OnceCell::new_with(Some(value)));
    }
}

/// Recalculation stamped at the time it was issued
#[derive(Debug, Clone, Copy)]
struct Ticket {
    generation: u64,
    issued: u64,
}

struct Inner<T: CachedData> {
    name: &'static str,
    loader: Arc<dyn CacheLoader<T>>,
    slots: DashMap<QueryOptions, Slot<T>>,
    generations: AtomicU64,
    staleness_window: Duration,
    metrics: ContainerMetrics,
}

impl<T: CachedData> Inner<T> {
    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed)
    }

    fn published(&self, query_options: &QueryOptions) -> Option<Arc<T>> {
        self.slots
            .get(query_options)
            .and_then(|slot| slot.published().cloned())
    }

    /// Current slot for `query_options`, inserting an empty one if absent
    fn slot(&self, query_options: &QueryOptions) -> Arc<OnceCell<Arc<T>>> {
        let slot = self
            .slots
            .entry(query_options.clone())
            .or_insert_with(|| Slot::pending(self.next_generation()));
        Arc::clone(&slot.cell)
    }

    fn compute(&self, query_options: &QueryOptions, previous: Option<&T>) -> CacheResult<T> {
        let value = self.loader.load(query_options, previous)?;
        if value.metadata().query_options() != query_options {
            return Err(CacheError::illegal_state(format!(
                "loader for {} produced data for {} while computing {query_options}",
                self.name,
                value.metadata().query_options()
            )));
        }
        Ok(value)
    }

    async fn compute_blocking(
        self: &Arc<Self>,
        query_options: &QueryOptions,
        previous: Option<Arc<T>>,
    ) -> CacheResult<Arc<T>> {
        let inner = Arc::clone(self);
        let query_options = query_options.clone();
        tokio::task::spawn_blocking(move || {
            inner
                .compute(&query_options, previous.as_deref())
                .map(Arc::new)
        })
        .await?
    }

    async fn load(self: &Arc<Self>, query_options: &QueryOptions) -> CacheResult<Arc<T>> {
        debug!(container = self.name, query = %query_options, "loading entry");
        let started = Instant::now();
        match self.compute_blocking(query_options, None).await {
            Ok(value) => {
                self.metrics.record_load(started.elapsed());
                Ok(value)
            }
            Err(err) => {
                self.metrics.record_load_failure();
                warn!(container = self.name, query = %query_options, error = %err, "load failed");
                Err(err)
            }
        }
    }

    async fn get(self: &Arc<Self>, query_options: &QueryOptions) -> CacheResult<Arc<T>> {
        // Hits only take a shard read lock
        if let Some(value) = self.published(query_options) {
            self.metrics.record_get(true);
            value.usage().record_access();
            return Ok(value);
        }

        let cell = self.slot(query_options);
        if let Some(value) = cell.get() {
            self.metrics.record_get(true);
            value.usage().record_access();
            return Ok(Arc::clone(value));
        }

        self.metrics.record_get(false);
        let value = cell.get_or_try_init(|| self.load(query_options)).await?;
        value.usage().record_access();
        Ok(Arc::clone(value))
    }

    /// Stamp a recalculation for an existing slot, superseding earlier ones
    fn issue(&self, query_options: &QueryOptions) -> Option<Ticket> {
        let mut slot = self.slots.get_mut(query_options)?;
        let issued = self.next_generation();
        slot.latest_recalculation = issued;
        Some(Ticket {
            generation: slot.generation,
            issued,
        })
    }

    async fn recalculate(
        self: &Arc<Self>,
        query_options: &QueryOptions,
        ticket: Option<Ticket>,
    ) -> CacheResult<Arc<T>> {
        let Some(ticket) = ticket else {
            return self.get(query_options).await;
        };
        let cell = self
            .slots
            .get(query_options)
            .filter(|slot| slot.generation == ticket.generation)
            .map(|slot| Arc::clone(&slot.cell));
        let Some(cell) = cell else {
            // Invalidated or reloaded before the recalculation started
            self.metrics.record_discarded_recalculation();
            return self.get(query_options).await;
        };
        // Seed from the published value, or from the initial load if it is
        // still running
        let previous = Arc::clone(cell.get_or_try_init(|| self.load(query_options)).await?);

        let started = Instant::now();
        let value = match self.compute_blocking(query_options, Some(previous)).await {
            Ok(value) => value,
            Err(err) => {
                self.metrics.record_load_failure();
                warn!(
                    container = self.name,
                    query = %query_options,
                    error = %err,
                    "recalculation failed, keeping previous entry"
                );
                return Err(err);
            }
        };

        match self.slots.get_mut(query_options) {
            Some(mut slot)
                if slot.generation == ticket.generation
                    && slot.latest_recalculation == ticket.issued =>
            {
                slot.publish(Arc::clone(&value));
                self.metrics.record_recalculation(started.elapsed());
            }
            _ => {
                self.metrics.record_discarded_recalculation();
                debug!(container = self.name, query = %query_options, "recalculation superseded, discarding");
            }
        }
        Ok(value)
    }

    fn remove(&self, query_options: &QueryOptions) -> bool {
        self.slots
            .remove(query_options)
            .is_some_and(|(_, slot)| slot.published().is_some())
    }
}

/// Future resolving to the result of a background refresh
#[must_use = "a refresh runs regardless; await it to observe the result"]
pub struct Refresh<T> {
    state: RefreshState<T>,
}

enum RefreshState<T> {
    Running(JoinHandle<CacheResult<Arc<T>>>),
    Failed(Option<CacheError>),
}

impl<T: Send + Sync + 'static> Refresh<T> {
    fn spawn<F>(task: F) -> Self
    where
        F: Future<Output = CacheResult<Arc<T>>> + Send + 'static,
    {
        let state = match Handle::try_current() {
            Ok(handle) => RefreshState::Running(handle.spawn(task)),
            Err(err) => RefreshState::Failed(Some(CacheError::illegal_state(format!(
                "background refresh requires a Tokio runtime: {err}"
            )))),
        };
        Self { state }
    }
}

impl<T> Future for Refresh<T> {
    type Output = CacheResult<Arc<T>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            RefreshState::Running(handle) => Pin::new(handle)
                .poll(cx)
                .map(|joined| joined.unwrap_or_else(|err| Err(CacheError::Worker(err)))),
            RefreshState::Failed(err) => Poll::Ready(Err(err
                .take()
                .unwrap_or_else(|| CacheError::illegal_state("refresh polled after completion")))),
        }
    }
}

/// A set of per-key refreshes started together
#[must_use = "refreshes run regardless; join them to observe the results"]
pub struct BulkRefresh<T> {
    refreshes: Vec<(QueryOptions, Refresh<T>)>,
}

impl<T> BulkRefresh<T> {
    pub fn len(&self) -> usize {
        self.refreshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refreshes.is_empty()
    }

    /// Wait for every key. Failures are reported per key.
    pub async fn join(self) -> Vec<(QueryOptions, CacheResult<Arc<T>>)> {
        let (keys, refreshes): (Vec<_>, Vec<_>) = self.refreshes.into_iter().unzip();
        keys.into_iter().zip(join_all(refreshes).await).collect()
    }

    /// Wait for every key, failing as soon as one fails
    pub async fn try_join(self) -> CacheResult<Vec<Arc<T>>> {
        try_join_all(self.refreshes.into_iter().map(|(_, refresh)| refresh)).await
    }
}

/// Async-loading map from query options to cached data
pub struct CacheContainer<T: CachedData> {
    inner: Arc<Inner<T>>,
}

impl<T: CachedData> Clone for CacheContainer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: CachedData> CacheContainer<T> {
    pub fn new(
        name: &'static str,
        loader: Arc<dyn CacheLoader<T>>,
        staleness_window: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                loader,
                slots: DashMap::new(),
                generations: AtomicU64::new(0),
                staleness_window,
                metrics: ContainerMetrics::new(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Cached value for `query_options`, computing it on a miss.
    ///
    /// Concurrent callers missing on the same key share one computation.
    /// A failed computation leaves nothing cached.
    pub async fn get(&self, query_options: &QueryOptions) -> CacheResult<Arc<T>> {
        self.inner.get(query_options).await
    }

    /// Published value without triggering a computation
    pub fn get_if_present(&self, query_options: &QueryOptions) -> Option<Arc<T>> {
        let value = self.inner.published(query_options)?;
        self.inner.metrics.record_get(true);
        value.usage().record_access();
        Some(value)
    }

    /// Compute a fresh value on the calling thread without touching the map
    pub fn calculate(&self, query_options: &QueryOptions) -> CacheResult<T> {
        self.inner.compute(query_options, None)
    }

    /// Recompute the entry in the background and swap it in once done.
    ///
    /// Holders of the old value keep a valid snapshot. The result is
    /// discarded if the entry is invalidated or reloaded, or another
    /// recalculation is issued for it, while the computation runs. A key with
    /// no slot is loaded as by `get`.
    pub fn recalculate(&self, query_options: &QueryOptions) -> Refresh<T> {
        let ticket = self.inner.issue(query_options);
        let inner = Arc::clone(&self.inner);
        let query_options = query_options.clone();
        Refresh::spawn(async move { inner.recalculate(&query_options, ticket).await })
    }

    /// Invalidate the entry, then recompute it in the background.
    ///
    /// The entry is removed before this returns, so a `get` issued afterwards
    /// never observes the previous value.
    pub fn reload(&self, query_options: &QueryOptions) -> Refresh<T> {
        if self.inner.remove(query_options) {
            self.inner.metrics.record_invalidations(1);
        }
        let inner = Arc::clone(&self.inner);
        let query_options = query_options.clone();
        Refresh::spawn(async move { inner.get(&query_options).await })
    }

    /// Remove one entry. Returns whether a published value was removed.
    pub fn invalidate(&self, query_options: &QueryOptions) -> bool {
        let removed = self.inner.remove(query_options);
        if removed {
            self.inner.metrics.record_invalidations(1);
        }
        removed
    }

    /// Remove every entry
    pub fn invalidate_all(&self) {
        let published = self.len() as u64;
        self.inner.slots.clear();
        self.inner.metrics.record_invalidations(published);
    }

    /// Recalculate every key published at the time of the call
    pub fn recalculate_all(&self) -> BulkRefresh<T> {
        BulkRefresh {
            refreshes: self
                .keys()
                .into_iter()
                .map(|key| {
                    let refresh = self.recalculate(&key);
                    (key, refresh)
                })
                .collect(),
        }
    }

    /// Reload every key published at the time of the call
    pub fn reload_all(&self) -> BulkRefresh<T> {
        BulkRefresh {
            refreshes: self
                .keys()
                .into_iter()
                .map(|key| {
                    let refresh = self.reload(&key);
                    (key, refresh)
                })
                .collect(),
        }
    }

    /// Drop entries idle for longer than the staleness window.
    ///
    /// Empty slots left behind by failed loads are dropped once nobody is
    /// waiting on them. Returns the number of evicted values.
    pub fn cleanup(&self) -> usize {
        let window = self.inner.staleness_window;
        let mut evicted = 0;
        self.inner.slots.retain(|_, slot| match slot.published() {
            Some(value) if value.usage().idle() > window => {
                evicted += 1;
                false
            }
            Some(_) => true,
            None => Arc::strong_count(&slot.cell) > 1,
        });

        if evicted > 0 {
            self.inner.metrics.record_evictions(evicted as u64);
            debug!(container = self.inner.name, evicted, "evicted stale entries");
        }
        evicted
    }

    /// Keys with a published value
    pub fn keys(&self) -> Vec<QueryOptions> {
        self.inner
            .slots
            .iter()
            .filter(|entry| entry.value().published().is_some())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Every published value, without recording an access
    pub(crate) fn published(&self) -> Vec<Arc<T>> {
        self.inner
            .slots
            .iter()
            .filter_map(|entry| entry.value().published().cloned())
            .collect()
    }

    /// Number of published values
    pub fn len(&self) -> usize {
        self.inner
            .slots
            .iter()
            .filter(|entry| entry.value().published().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn staleness_window(&self) -> Duration {
        self.inner.staleness_window
    }

    pub fn stats(&self) -> ContainerStats {
        self.inner.metrics.snapshot()
    }
}

impl<T: CachedData> std::fmt::Debug for CacheContainer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheContainer")
            .field("name", &self.inner.name)
            .field("entries", &self.len())
            .field("staleness_window", &self.inner.staleness_window)
            .finish_non_exhaustive()
    }
}
