//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use llm_wrappers::{
    ClientConfig, ClientRegistry, ExternalConfigResolver, FallbackManager, InstanceStatus, LlmError,
    LlmResult, ModuleConfig, Params, PollingPoolManager, Pool, PoolConfig, PoolInstance,
    ProviderClientFactory,
};

// ============================================================================
// Instances and clients
// ============================================================================

/// Mock-backed instance that always answers with `response`
pub fn ok_instance(id: &str, response: &str) -> PoolInstance {
    PoolInstance::new(id, ClientConfig::new("mock", id).with_extra("mock_response", response))
}

/// Mock-backed instance whose every call fails
pub fn failing_instance(id: &str) -> PoolInstance {
    PoolInstance::new(id, ClientConfig::new("mock", id).with_extra("mock_error", "backend down"))
}

/// Mock-backed instance that answers after `delay_ms`
pub fn slow_instance(id: &str, delay_ms: u64) -> PoolInstance {
    PoolInstance::new(id, ClientConfig::new("mock", id).with_extra("mock_delay_ms", delay_ms))
}

pub fn client_factory() -> Arc<ProviderClientFactory> {
    Arc::new(ProviderClientFactory::new(ClientRegistry::with_builtins(), None))
}

// ============================================================================
// Pool
// ============================================================================

/// Round-robin pool that counts acquisitions and releases
pub struct CountingPool {
    name: String,
    config: PoolConfig,
    instances: Vec<Arc<PoolInstance>>,
    next: AtomicUsize,
    acquired: AtomicUsize,
    released: AtomicUsize,
    exhausted: bool,
    broken: bool,
    release_delay: Option<Duration>,
}

impl CountingPool {
    pub fn new(name: &str, instances: Vec<PoolInstance>) -> Self {
        Self {
            name: name.to_string(),
            config: PoolConfig::default(),
            instances: instances.into_iter().map(Arc::new).collect(),
            next: AtomicUsize::new(0),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            exhausted: false,
            broken: false,
            release_delay: None,
        }
    }

    /// Releases only complete after `delay_ms`
    pub fn with_release_delay(mut self, delay_ms: u64) -> Self {
        self.release_delay = Some(Duration::from_millis(delay_ms));
        self
    }

    /// A pool whose `acquire_instance` never hands anything out
    pub fn exhausted(name: &str) -> Self {
        Self {
            exhausted: true,
            ..Self::new(name, Vec::new())
        }
    }

    /// A pool whose instance list cannot be read
    pub fn broken(name: &str) -> Self {
        Self {
            broken: true,
            ..Self::new(name, Vec::new())
        }
    }

    /// Pool with `healthy` healthy and `unhealthy` unhealthy instances
    pub fn with_health(name: &str, healthy: usize, unhealthy: usize) -> Self {
        let mut instances = Vec::new();
        for i in 0..healthy {
            instances.push(ok_instance(&format!("h{}", i), "ok"));
        }
        for i in 0..unhealthy {
            instances.push(ok_instance(&format!("u{}", i), "ok").with_status(InstanceStatus::Unhealthy));
        }
        Self::new(name, instances)
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn instance(&self, index: usize) -> Arc<PoolInstance> {
        Arc::clone(&self.instances[index])
    }
}

#[async_trait]
impl Pool for CountingPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &PoolConfig {
        &self.config
    }

    async fn acquire_instance(&self) -> Option<Arc<PoolInstance>> {
        if self.exhausted || self.instances.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::SeqCst) % self.instances.len();
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Some(Arc::clone(&self.instances[index]))
    }

    async fn release_instance(&self, _instance: Arc<PoolInstance>) {
        if let Some(delay) = self.release_delay {
            tokio::time::sleep(delay).await;
        }
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn instances(&self) -> LlmResult<Vec<Arc<PoolInstance>>> {
        if self.broken {
            return Err(LlmError::Unavailable("instance list unavailable".to_string()));
        }
        Ok(self.instances.clone())
    }
}

/// Pool manager over a fixed set of pools
#[derive(Default)]
pub struct StaticPools {
    pools: HashMap<String, Arc<dyn Pool>>,
}

impl StaticPools {
    pub fn with(mut self, pool: Arc<dyn Pool>) -> Self {
        self.pools.insert(pool.name().to_string(), pool);
        self
    }
}

impl PollingPoolManager for StaticPools {
    fn get_pool(&self, name: &str) -> Option<Arc<dyn Pool>> {
        self.pools.get(name).cloned()
    }

    fn pool_names(&self) -> Vec<String> {
        self.pools.keys().cloned().collect()
    }
}

// ============================================================================
// Fallback manager
// ============================================================================

/// Records every call; answers with `content` or fails with `error`
pub struct ScriptedFallback {
    outcome: Result<String, String>,
    calls: Mutex<Vec<(String, Vec<String>, String)>>,
}

impl ScriptedFallback {
    pub fn succeeding(content: &str) -> Self {
        Self {
            outcome: Ok(content.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            outcome: Err(error.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// (primary target, fallback groups, prompt) per call
    pub fn calls(&self) -> Vec<(String, Vec<String>, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FallbackManager for ScriptedFallback {
    async fn execute_with_fallback(
        &self,
        primary_target: &str,
        fallback_groups: &[String],
        prompt: &str,
        _params: &Params,
    ) -> LlmResult<String> {
        self.calls.lock().unwrap().push((
            primary_target.to_string(),
            fallback_groups.to_vec(),
            prompt.to_string(),
        ));
        match &self.outcome {
            Ok(content) => Ok(content.clone()),
            Err(error) => Err(LlmError::ApiError(error.clone())),
        }
    }
}

// ============================================================================
// Config resolver
// ============================================================================

/// Resolver over a fixed model map that counts cache invalidations
pub struct MapResolver {
    models: HashMap<String, ClientConfig>,
    module: ModuleConfig,
    invalidations: AtomicUsize,
}

impl MapResolver {
    pub fn new(module: ModuleConfig) -> Self {
        Self {
            models: HashMap::new(),
            module,
            invalidations: AtomicUsize::new(0),
        }
    }

    pub fn with_model(mut self, name: &str, config: ClientConfig) -> Self {
        self.models.insert(name.to_string(), config);
        self
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

impl ExternalConfigResolver for MapResolver {
    fn get_client_config(&self, model_name: &str) -> Option<ClientConfig> {
        self.models.get(model_name).cloned()
    }

    fn get_module_config(&self) -> ModuleConfig {
        self.module
    }

    fn invalidate_cache(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}
