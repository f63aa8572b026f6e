//! Per-holder cached data manager
//!
//! A holder owns one [`CachedDataManager`] for its lifetime. The manager
//! owns a permission container and a meta container and wires both to the
//! holder's resolver, the track provider and the cache configuration.

#![allow(missing_docs)]

use crate::{
    config::CacheConfig,
    container::{BulkRefresh, CacheContainer, CacheLoader},
    context::QueryOptions,
    data::{CacheMetadata, MetaCache, PermissionCache},
    error::CacheResult,
    holder::HolderResolver,
    meta::MetaAccumulator,
    node::ChatMetaType,
    stack::MetaStackDefinition,
    stats::ContainerStats,
    track::TrackProvider,
};
use std::sync::Arc;
use tracing::debug;

/// Meta stack used for `meta_type`: the query override, else the configured default
pub fn effective_meta_stack(
    config: &CacheConfig,
    query_options: &QueryOptions,
    meta_type: ChatMetaType,
) -> MetaStackDefinition {
    query_options
        .meta_stack(meta_type)
        .unwrap_or_else(|| config.meta_stack(meta_type))
        .clone()
}

fn metadata<R: HolderResolver>(resolver: &R, query_options: &QueryOptions) -> CacheMetadata {
    CacheMetadata::new(
        resolver.identifier().holder_type(),
        resolver.verbose_target(),
        query_options.clone(),
    )
}

struct PermissionLoader<R> {
    resolver: Arc<R>,
}

impl<R: HolderResolver> CacheLoader<PermissionCache> for PermissionLoader<R> {
    fn load(
        &self,
        query_options: &QueryOptions,
        previous: Option<&PermissionCache>,
    ) -> CacheResult<PermissionCache> {
        let resolved = self.resolver.resolve_permissions(query_options)?;
        debug!(
            holder = %self.resolver.identifier(),
            query = %query_options,
            permissions = resolved.len(),
            "resolved permissions"
        );
        Ok(PermissionCache::new(
            metadata(self.resolver.as_ref(), query_options),
            resolved,
            previous,
        ))
    }
}

struct MetaLoader<R> {
    resolver: Arc<R>,
    tracks: Arc<dyn TrackProvider>,
    config: Arc<CacheConfig>,
}

impl<R: HolderResolver> CacheLoader<MetaCache> for MetaLoader<R> {
    fn load(&self, query_options: &QueryOptions, _previous: Option<&MetaCache>) -> CacheResult<MetaCache> {
        let mut accumulator = MetaAccumulator::new(
            effective_meta_stack(&self.config, query_options, ChatMetaType::Prefix),
            effective_meta_stack(&self.config, query_options, ChatMetaType::Suffix),
            self.resolver.identifier(),
            &self.tracks,
        );
        self.resolver.resolve_meta(&mut accumulator, query_options)?;
        accumulator.complete();

        let accumulated = accumulator.into_accumulated()?;
        debug!(
            holder = %self.resolver.identifier(),
            query = %query_options,
            prefix = ?accumulated.prefix,
            suffix = ?accumulated.suffix,
            "resolved meta"
        );
        Ok(MetaCache::new(
            metadata(self.resolver.as_ref(), query_options),
            accumulated,
            &self.config,
        ))
    }
}

/// Permission and meta caches of one holder
pub struct CachedDataManager<R: HolderResolver> {
    resolver: Arc<R>,
    config: Arc<CacheConfig>,
    permissions: CacheContainer<PermissionCache>,
    meta: CacheContainer<MetaCache>,
}

impl<R: HolderResolver> CachedDataManager<R> {
    /// Create a manager. The configuration is validated first.
    pub fn new(
        resolver: Arc<R>,
        tracks: Arc<dyn TrackProvider>,
        config: CacheConfig,
    ) -> CacheResult<Self> {
        config
            .validate()
            .map_err(crate::error::CacheError::InvalidConfiguration)?;
        let config = Arc::new(config);

        let permissions = CacheContainer::new(
            "permissions",
            Arc::new(PermissionLoader {
                resolver: Arc::clone(&resolver),
            }),
            config.staleness_window,
        );
        let meta = CacheContainer::new(
            "meta",
            Arc::new(MetaLoader {
                resolver: Arc::clone(&resolver),
                tracks,
                config: Arc::clone(&config),
            }),
            config.staleness_window,
        );

        Ok(Self {
            resolver,
            config,
            permissions,
            meta,
        })
    }

    pub fn resolver(&self) -> &Arc<R> {
        &self.resolver
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn permission_container(&self) -> &CacheContainer<PermissionCache> {
        &self.permissions
    }

    pub fn meta_container(&self) -> &CacheContainer<MetaCache> {
        &self.meta
    }

    pub async fn permission_data(&self, query_options: &QueryOptions) -> CacheResult<Arc<PermissionCache>> {
        self.permissions.get(query_options).await
    }

    pub async fn meta_data(&self, query_options: &QueryOptions) -> CacheResult<Arc<MetaCache>> {
        self.meta.get(query_options).await
    }

    /// Uncached permission snapshot
    pub fn calculate_permissions(&self, query_options: &QueryOptions) -> CacheResult<PermissionCache> {
        self.permissions.calculate(query_options)
    }

    /// Uncached meta snapshot
    pub fn calculate_meta(&self, query_options: &QueryOptions) -> CacheResult<MetaCache> {
        self.meta.calculate(query_options)
    }

    pub fn invalidate(&self) {
        self.invalidate_permissions();
        self.invalidate_meta();
    }

    pub fn invalidate_permissions(&self) {
        self.permissions.invalidate_all();
    }

    pub fn invalidate_meta(&self) {
        self.meta.invalidate_all();
    }

    pub fn recalculate_permissions(&self) -> BulkRefresh<PermissionCache> {
        self.permissions.recalculate_all()
    }

    pub fn recalculate_meta(&self) -> BulkRefresh<MetaCache> {
        self.meta.recalculate_all()
    }

    pub fn reload_permissions(&self) -> BulkRefresh<PermissionCache> {
        self.permissions.reload_all()
    }

    pub fn reload_meta(&self) -> BulkRefresh<MetaCache> {
        self.meta.reload_all()
    }

    /// Clear the lookup memo of every published permission calculator.
    ///
    /// Does not count as an access for eviction purposes.
    pub fn invalidate_permission_calculators(&self) {
        for data in self.permissions.published() {
            data.invalidate_cache();
        }
    }

    /// Evict stale entries from both containers
    pub fn perform_cache_cleanup(&self) -> usize {
        self.permissions.cleanup() + self.meta.cleanup()
    }

    pub fn meta_stack_definition(
        &self,
        query_options: &QueryOptions,
        meta_type: ChatMetaType,
    ) -> MetaStackDefinition {
        effective_meta_stack(&self.config, query_options, meta_type)
    }

    /// Combined statistics of both containers
    pub fn stats(&self) -> ContainerStats {
        let mut stats = self.permissions.stats();
        stats.merge(&self.meta.stats());
        stats
    }
}

impl<R: HolderResolver> crate::housekeeping::Cleanup for CachedDataManager<R> {
    fn cleanup(&self) -> usize {
        self.perform_cache_cleanup()
    }
}

impl<R: HolderResolver> std::fmt::Debug for CachedDataManager<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedDataManager")
            .field("holder", self.resolver.identifier())
            .field("permissions", &self.permissions)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}
