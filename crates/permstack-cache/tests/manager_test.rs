//! Cached data manager behaviour under concurrent use

use permstack_cache::{
    CacheConfig, CacheResult, CachedData, CachedDataManager, ContextSet, HolderIdentifier,
    HolderResolver, Housekeeper, MetaAccumulator, QueryOptions, Tristate,
    node::ChatMetaNode,
    track::{TrackProvider, TrackRegistry},
};
use pretty_assertions::assert_eq;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

/// Resolver backed by a mutable assignment table
struct TableHolder {
    id: HolderIdentifier,
    rank: AtomicUsize,
    permission_calls: AtomicUsize,
    meta_calls: AtomicUsize,
    broken: AtomicBool,
    delay: Duration,
}

impl TableHolder {
    fn new(delay: Duration) -> Self {
        Self {
            id: HolderIdentifier::user("notch"),
            rank: AtomicUsize::new(1),
            permission_calls: AtomicUsize::new(0),
            meta_calls: AtomicUsize::new(0),
            broken: AtomicBool::new(false),
            delay,
        }
    }

    fn check_broken(&self) -> CacheResult<()> {
        if self.broken.load(Ordering::SeqCst) {
            Err(permstack_cache::CacheError::resolution("storage offline"))
        } else {
            Ok(())
        }
    }
}

impl HolderResolver for TableHolder {
    fn identifier(&self) -> &HolderIdentifier {
        &self.id
    }

    fn resolve_permissions(&self, query_options: &QueryOptions) -> CacheResult<HashMap<String, bool>> {
        self.permission_calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.check_broken()?;

        let mut resolved = HashMap::from([("chat.use".to_string(), true)]);
        for server in query_options.contexts().values("server") {
            resolved.insert(format!("server.{server}"), true);
        }
        Ok(resolved)
    }

    fn resolve_meta(&self, accumulator: &mut MetaAccumulator, _: &QueryOptions) -> CacheResult<()> {
        self.meta_calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.check_broken()?;

        let rank = self.rank.load(Ordering::SeqCst);
        accumulator.accumulate_chat_meta(&ChatMetaNode::prefix(rank as i32, format!("[Rank {rank}]")))
    }
}

fn manager(delay: Duration, config: CacheConfig) -> (Arc<TableHolder>, Arc<CachedDataManager<TableHolder>>) {
    let holder = Arc::new(TableHolder::new(delay));
    let tracks: Arc<dyn TrackProvider> = Arc::new(TrackRegistry::new());
    let manager = CachedDataManager::new(Arc::clone(&holder), tracks, config)
        .unwrap_or_else(|err| panic!("invalid test config: {err}"));
    (holder, Arc::new(manager))
}

fn server(name: &str) -> QueryOptions {
    QueryOptions::contextual(ContextSet::of("server", name))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_gets_resolve_once_per_key() -> Result<(), Box<dyn std::error::Error>> {
    let (holder, manager) = manager(Duration::from_millis(40), CacheConfig::default());

    let mut tasks = Vec::new();
    for i in 0..32 {
        let manager = Arc::clone(&manager);
        let key = server(if i % 2 == 0 { "lobby" } else { "survival" });
        tasks.push(tokio::spawn(async move {
            let permissions = manager.permission_data(&key).await?;
            let meta = manager.meta_data(&key).await?;
            CacheResult::Ok((key, permissions, meta))
        }));
    }

    for task in tasks {
        let (key, permissions, meta) = task.await??;
        assert_eq!(permissions.metadata().query_options(), &key);
        assert_eq!(meta.metadata().query_options(), &key);
    }

    assert_eq!(holder.permission_calls.load(Ordering::SeqCst), 2);
    assert_eq!(holder.meta_calls.load(Ordering::SeqCst), 2);
    assert_eq!(manager.stats().load_count, 4);
    Ok(())
}

#[tokio::test]
async fn test_contexts_are_cached_independently() -> Result<(), Box<dyn std::error::Error>> {
    let (_, manager) = manager(Duration::ZERO, CacheConfig::default());

    let lobby = manager.permission_data(&server("lobby")).await?;
    let survival = manager.permission_data(&server("survival")).await?;
    let global = manager.permission_data(&QueryOptions::non_contextual()).await?;

    assert_eq!(lobby.check_permission("server.lobby"), Tristate::True);
    assert_eq!(lobby.check_permission("server.survival"), Tristate::Undefined);
    assert_eq!(survival.check_permission("server.survival"), Tristate::True);
    assert_eq!(global.check_permission("chat.use"), Tristate::True);
    assert_eq!(manager.permission_container().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_failed_recalculation_serves_stale_meta() -> Result<(), Box<dyn std::error::Error>> {
    let (holder, manager) = manager(Duration::ZERO, CacheConfig::default());
    let key = server("lobby");

    let before = manager.meta_data(&key).await?;
    holder.rank.store(5, Ordering::SeqCst);
    holder.broken.store(true, Ordering::SeqCst);

    let results = manager.recalculate_meta().join().await;
    assert_eq!(results.len(), 1);
    assert!(results[0].1.as_ref().is_err_and(|err| err.is_resolution_failure()));

    let stale = manager.meta_data(&key).await?;
    assert!(Arc::ptr_eq(&before, &stale));
    assert_eq!(stale.prefix(), Some("[Rank 1]"));

    holder.broken.store(false, Ordering::SeqCst);
    manager.recalculate_meta().try_join().await?;
    assert_eq!(manager.meta_data(&key).await?.prefix(), Some("[Rank 5]"));
    Ok(())
}

#[tokio::test]
async fn test_reload_hides_previous_value() -> Result<(), Box<dyn std::error::Error>> {
    let (holder, manager) = manager(Duration::from_millis(20), CacheConfig::default());
    let keys = [server("a"), server("b"), server("c")];
    for key in &keys {
        manager.meta_data(key).await?;
    }

    holder.rank.store(7, Ordering::SeqCst);
    let reload = manager.reload_meta();
    for key in &keys {
        assert_eq!(manager.meta_data(key).await?.prefix(), Some("[Rank 7]"));
    }

    for (key, result) in reload.join().await {
        assert_eq!(result?.metadata().query_options(), &key);
    }
    assert_eq!(holder.meta_calls.load(Ordering::SeqCst), 6);
    Ok(())
}

#[tokio::test]
async fn test_housekeeper_evicts_idle_entries() -> Result<(), Box<dyn std::error::Error>> {
    let config = CacheConfig::default()
        .with_staleness_window(Duration::from_millis(150))
        .with_cleanup_interval(Duration::from_millis(50));
    let (_, manager) = manager(Duration::ZERO, config);
    let housekeeper = Housekeeper::for_manager(&manager)?;
    assert_eq!(housekeeper.period(), Duration::from_millis(50));

    manager.permission_data(&server("idle")).await?;
    manager.permission_data(&server("busy")).await?;

    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(60)).await;
        manager.permission_data(&server("busy")).await?;
    }

    let remaining = manager.permission_container().keys();
    assert_eq!(remaining, vec![server("busy")]);
    assert_eq!(manager.stats().eviction_count, 1);

    housekeeper.stop();
    assert!(!housekeeper.is_running());
    Ok(())
}
