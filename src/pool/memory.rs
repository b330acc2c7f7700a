use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::errors::LlmResult;
use crate::pool::instance::PoolInstance;
use crate::pool::strategies::RotationStrategy;
use crate::pool::{PollingPoolManager, Pool, PoolConfig};

/// In-process pool over a fixed set of instances.
///
/// Selection only considers healthy instances. An instance whose failure
/// streak reaches `failure_threshold` is marked unhealthy when released, and
/// is put back in rotation once `recovery_time` has passed.
pub struct InstancePool {
    name: String,
    config: PoolConfig,
    instances: Vec<Arc<PoolInstance>>,
    strategy: Mutex<Box<dyn RotationStrategy>>,
    in_flight: AtomicUsize,
}

impl InstancePool {
    pub fn new(name: impl Into<String>, config: PoolConfig, instances: Vec<PoolInstance>) -> Self {
        let strategy = config.rotation_strategy.create();
        Self {
            name: name.into(),
            config,
            instances: instances.into_iter().map(Arc::new).collect(),
            strategy: Mutex::new(strategy),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Replace the rotation strategy
    pub async fn set_strategy(&self, strategy: Box<dyn RotationStrategy>) {
        *self.strategy.lock().await = strategy;
    }

    /// Instances currently acquired and not yet released
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn instance(&self, instance_id: &str) -> Option<Arc<PoolInstance>> {
        self.instances.iter().find(|i| i.id() == instance_id).cloned()
    }

    fn recover_expired(&self) {
        let recovery_time = self.config.recovery_time();
        for instance in &self.instances {
            if let Some(since) = instance.unhealthy_since() {
                if since.elapsed() >= recovery_time {
                    instance.recover();
                    info!("Pool '{}': instance '{}' back in rotation", self.name, instance.id());
                }
            }
        }
    }
}

#[async_trait]
impl Pool for InstancePool {
    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &PoolConfig {
        &self.config
    }

    async fn acquire_instance(&self) -> Option<Arc<PoolInstance>> {
        self.recover_expired();

        let candidates: Vec<Arc<PoolInstance>> =
            self.instances.iter().filter(|i| i.is_healthy()).cloned().collect();
        if candidates.is_empty() {
            warn!("Pool '{}' has no healthy instances", self.name);
            return None;
        }

        let index = self.strategy.lock().await.select_instance(&candidates)?;
        let instance = Arc::clone(candidates.get(index)?);
        instance.touch();
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        debug!("Pool '{}': acquired instance '{}'", self.name, instance.id());
        Some(instance)
    }

    async fn release_instance(&self, instance: Arc<PoolInstance>) {
        let threshold = self.config.failure_threshold;
        if threshold > 0 && instance.is_healthy() && instance.consecutive_failures() >= threshold {
            instance.set_status(super::InstanceStatus::Unhealthy);
            warn!(
                "Pool '{}': instance '{}' marked unhealthy after {} consecutive failures",
                self.name,
                instance.id(),
                instance.consecutive_failures()
            );
        }
        // Saturating: a stray release must not wrap the counter
        let _ = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)));
        debug!("Pool '{}': released instance '{}'", self.name, instance.id());
    }

    fn instances(&self) -> LlmResult<Vec<Arc<PoolInstance>>> {
        Ok(self.instances.clone())
    }
}

/// Name-indexed registry of pools
#[derive(Default)]
pub struct InMemoryPoolManager {
    pools: RwLock<HashMap<String, Arc<dyn Pool>>>,
}

impl InMemoryPoolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pool(&self, pool: Arc<dyn Pool>) {
        let name = pool.name().to_string();
        self.pools.write().unwrap_or_else(PoisonError::into_inner).insert(name.clone(), pool);
        info!("Registered polling pool '{}'", name);
    }

    pub fn remove_pool(&self, name: &str) -> Option<Arc<dyn Pool>> {
        self.pools.write().unwrap_or_else(PoisonError::into_inner).remove(name)
    }
}

impl PollingPoolManager for InMemoryPoolManager {
    fn get_pool(&self, name: &str) -> Option<Arc<dyn Pool>> {
        self.pools.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    fn pool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::InstanceStatus;
    use crate::providers::ClientConfig;

    fn pool_with(threshold: u32, recovery_time: u64) -> InstancePool {
        let config = PoolConfig {
            failure_threshold: threshold,
            recovery_time,
            ..Default::default()
        };
        InstancePool::new(
            "p",
            config,
            vec![
                PoolInstance::new("a", ClientConfig::default()),
                PoolInstance::new("b", ClientConfig::default()),
            ],
        )
    }

    #[tokio::test]
    async fn test_round_robin_acquire_and_release() {
        let pool = pool_with(3, 60);
        let first = pool.acquire_instance().await.unwrap();
        let second = pool.acquire_instance().await.unwrap();
        assert_eq!(first.id(), "a");
        assert_eq!(second.id(), "b");
        assert_eq!(pool.in_flight(), 2);

        pool.release_instance(first).await;
        pool.release_instance(second).await;
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failure_threshold_takes_instance_out() {
        let pool = pool_with(2, 3600);
        let a = pool.instance("a").unwrap();
        a.record_failure();
        a.record_failure();
        pool.release_instance(Arc::clone(&a)).await;
        assert_eq!(a.status(), InstanceStatus::Unhealthy);

        for _ in 0..3 {
            let picked = pool.acquire_instance().await.unwrap();
            assert_eq!(picked.id(), "b");
            pool.release_instance(picked).await;
        }
    }

    #[tokio::test]
    async fn test_unhealthy_instance_recovers_after_recovery_time() {
        let pool = pool_with(1, 0);
        let a = pool.instance("a").unwrap();
        a.set_status(InstanceStatus::Unhealthy);

        let picked = pool.acquire_instance().await.unwrap();
        assert!(a.is_healthy());
        pool.release_instance(picked).await;
    }

    #[tokio::test]
    async fn test_no_healthy_instances() {
        let pool = pool_with(1, 3600);
        for instance in pool.instances().unwrap() {
            instance.set_status(InstanceStatus::Unhealthy);
        }
        assert!(pool.acquire_instance().await.is_none());
    }

    #[test]
    fn test_manager_lookup() {
        let manager = InMemoryPoolManager::new();
        manager.add_pool(Arc::new(pool_with(1, 1)));
        assert!(manager.get_pool("p").is_some());
        assert_eq!(manager.pool_names(), vec!["p".to_string()]);
        assert!(manager.remove_pool("p").is_some());
        assert!(manager.get_pool("p").is_none());
    }
}
