//! Periodic cleanup of stale cache entries
//!
//! The [`Housekeeper`] holds its target weakly: once the owning holder drops
//! its manager the task ends by itself on the next tick.

#![allow(missing_docs)]

use crate::{
    container::CacheContainer,
    data::CachedData,
    error::{CacheError, CacheResult},
    holder::HolderResolver,
    manager::CachedDataManager,
};
use parking_lot::Mutex;
use std::{
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, trace};

/// Something with stale entries to drop
pub trait Cleanup: Send + Sync + 'static {
    /// Remove stale entries, returning how many were removed
    fn cleanup(&self) -> usize;
}

impl<T: CachedData> Cleanup for CacheContainer<T> {
    fn cleanup(&self) -> usize {
        Self::cleanup(self)
    }
}

/// Background task running [`Cleanup::cleanup`] on a fixed interval
#[derive(Debug)]
pub struct Housekeeper {
    period: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Housekeeper {
    /// Start on the current Tokio runtime
    pub fn start<C: Cleanup>(target: &Arc<C>, period: Duration) -> CacheResult<Self> {
        if period.is_zero() {
            return Err(CacheError::InvalidConfiguration(
                "cleanup interval must be greater than 0".to_string(),
            ));
        }
        let runtime = Handle::try_current().map_err(|err| {
            CacheError::illegal_state(format!("housekeeping requires a Tokio runtime: {err}"))
        })?;

        let target: Weak<C> = Arc::downgrade(target);
        let handle = runtime.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(target) = target.upgrade() else {
                    debug!("housekeeping target dropped, stopping");
                    break;
                };
                let removed = target.cleanup();
                trace!(removed, "housekeeping pass");
            }
        });

        Ok(Self {
            period,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Start housekeeping for a manager using its configured interval
    pub fn for_manager<R: HolderResolver>(manager: &Arc<CachedDataManager<R>>) -> CacheResult<Self> {
        Self::start(manager, manager.config().cleanup_interval)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the task. Further calls are no-ops.
    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for Housekeeper {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl Cleanup for Counter {
        fn cleanup(&self) -> usize {
            self.0.fetch_add(1, Ordering::SeqCst);
            0
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_on_interval() {
        let target = Arc::new(Counter::default());
        let housekeeper = Housekeeper::start(&target, Duration::from_secs(60)).unwrap();

        tokio::time::sleep(Duration::from_secs(181)).await;
        assert_eq!(target.0.load(Ordering::SeqCst), 3);
        assert!(housekeeper.is_running());

        housekeeper.stop();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(target.0.load(Ordering::SeqCst), 3);
        assert!(!housekeeper.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_target_dropped() {
        let target = Arc::new(Counter::default());
        let housekeeper = Housekeeper::start(&target, Duration::from_secs(1)).unwrap();
        drop(target);

        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(!housekeeper.is_running());
    }

    #[tokio::test]
    async fn test_rejects_zero_interval() {
        let target = Arc::new(Counter::default());
        assert!(matches!(
            Housekeeper::start(&target, Duration::ZERO),
            Err(CacheError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_requires_runtime() {
        let target = Arc::new(Counter::default());
        assert!(matches!(
            Housekeeper::start(&target, Duration::from_secs(1)),
            Err(CacheError::IllegalState(_))
        ));
    }
}
