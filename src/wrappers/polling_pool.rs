use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::collaborators::TokenCalculationService;
use crate::constants;
use crate::errors::{LlmError, WrapperError, WrapperResult};
use crate::pool::{PollingPoolManager, Pool, PoolInstance};
use crate::providers::{ClientConfig, LlmResponse, Message, Params, ProviderClientFactory, SharedClient};
use crate::wrappers::base::{prompt_from_messages, HealthCheckable, HealthReport, HistoryReset, Wrapper, WrapperStats};
use crate::wrappers::config::{WrapperConfig, WrapperKind};
use crate::wrappers::tokens;

/// One instance acquisition made by a pool wrapper
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RotationHistoryEntry {
    pub instance_id: String,
    pub attempt_number: usize,
    pub timestamp: DateTime<Utc>,
}

/// An instance borrowed from a pool.
///
/// `release` hands it back. If the lease is dropped without being released
/// (the call future was cancelled), the release is spawned on the current
/// runtime so the instance is never leaked.
pub struct InstanceLease {
    pool: Arc<dyn Pool>,
    instance: Arc<PoolInstance>,
    released: bool,
}

impl InstanceLease {
    pub fn new(pool: Arc<dyn Pool>, instance: Arc<PoolInstance>) -> Self {
        Self { pool, instance, released: false }
    }

    pub fn instance(&self) -> &Arc<PoolInstance> {
        &self.instance
    }

    /// Hands the instance back. The lease only counts as released once the
    /// pool's release completes; a release cancelled halfway is reissued on
    /// drop, so pools must tolerate a repeated release of the same instance.
    pub async fn release(mut self) {
        self.pool.release_instance(Arc::clone(&self.instance)).await;
        self.released = true;
    }
}

impl Drop for InstanceLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let pool = Arc::clone(&self.pool);
        let instance = Arc::clone(&self.instance);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Instance '{}' released after an interrupted call", instance.id());
                handle.spawn(async move {
                    pool.release_instance(instance).await;
                });
            }
            Err(_) => error!(
                "Instance '{}' of pool '{}' could not be released: no runtime available",
                instance.id(),
                pool.name()
            ),
        }
    }
}

#[derive(Default)]
struct PoolWrapperState {
    stats: WrapperStats,
    rotation_history: VecDeque<RotationHistoryEntry>,
    client_cache: HashMap<String, SharedClient>,
    total_attempts: u64,
}

/// Wrapper that rotates calls across the instances of a polling pool.
///
/// Each call tries up to `max_instance_attempts` acquisitions. A failing
/// instance is counted and released before the next one is tried; only when
/// every attempt fails does the caller see a `PollingPoolWrapperError`.
pub struct PollingPoolWrapper {
    name: String,
    config: WrapperConfig,
    max_attempts: usize,
    request_timeout: Option<Duration>,
    pool_manager: Arc<dyn PollingPoolManager>,
    client_factory: Arc<ProviderClientFactory>,
    token_service: Option<Arc<dyn TokenCalculationService>>,
    state: Mutex<PoolWrapperState>,
}

impl PollingPoolWrapper {
    pub fn new(
        name: impl Into<String>,
        config: WrapperConfig,
        pool_manager: Arc<dyn PollingPoolManager>,
        client_factory: Arc<ProviderClientFactory>,
    ) -> WrapperResult<Self> {
        let name = name.into();
        let max_attempts = config.max_instance_attempts()?;
        let request_timeout = config.request_timeout()?;
        info!(
            "Created polling pool wrapper '{}' for pool '{}' (max {} attempts)",
            name,
            config.pool_name(),
            max_attempts
        );
        Ok(Self {
            name,
            config,
            max_attempts,
            request_timeout,
            pool_manager,
            client_factory,
            token_service: None,
            state: Mutex::new(PoolWrapperState::default()),
        })
    }

    pub fn with_token_service(mut self, service: Arc<dyn TokenCalculationService>) -> Self {
        self.token_service = Some(service);
        self
    }

    pub fn config(&self) -> &WrapperConfig {
        &self.config
    }

    pub fn pool_name(&self) -> &str {
        self.config.pool_name()
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Instance calls made over the wrapper's lifetime, across all requests
    pub fn total_attempts(&self) -> u64 {
        self.state().total_attempts
    }

    /// Acquisitions made so far, oldest first
    pub fn rotation_history(&self) -> Vec<RotationHistoryEntry> {
        self.state().rotation_history.iter().cloned().collect()
    }

    pub fn reset_rotation_history(&self) {
        self.state().rotation_history.clear();
    }

    /// Forget every client built for this pool's instances
    pub fn clear_instance_cache(&self) {
        self.state().client_cache.clear();
        if let Some(instances) = self
            .pool_manager
            .get_pool(self.pool_name())
            .and_then(|pool| pool.instances().ok())
        {
            for instance in instances {
                instance.clear_client();
            }
        }
        debug!("Cleared instance client cache of wrapper '{}'", self.name);
    }

    async fn execute(&self, messages: &[Message], params: &Params) -> WrapperResult<LlmResponse> {
        let pool = self.pool_manager.get_pool(self.pool_name()).ok_or_else(|| {
            self.error(format!("Polling pool '{}' not found", self.pool_name()))
        })?;
        let prompt = prompt_from_messages(messages);
        let mut last_error: Option<WrapperError> = None;

        for attempt in 1..=self.max_attempts {
            let Some(instance) = pool.acquire_instance().await else {
                warn!(
                    "Wrapper '{}': no instance available in pool '{}' (attempt {}/{})",
                    self.name,
                    pool.name(),
                    attempt,
                    self.max_attempts
                );
                continue;
            };
            let lease = InstanceLease::new(Arc::clone(&pool), instance);
            self.record_rotation(lease.instance().id(), attempt);

            let outcome = self.invoke(lease.instance(), &prompt, params).await;
            self.state().total_attempts += 1;

            #[cfg(feature = "metrics")]
            crate::metrics::record_instance_attempt(pool.name(), lease.instance().id(), outcome.is_ok());

            match outcome {
                Ok(response) => {
                    lease.instance().record_success();
                    debug!(
                        "Wrapper '{}': instance '{}' succeeded on attempt {}",
                        self.name,
                        lease.instance().id(),
                        attempt
                    );
                    lease.release().await;
                    return Ok(response);
                }
                Err(e) => {
                    lease.instance().record_failure();
                    warn!(
                        "Wrapper '{}': instance '{}' failed on attempt {}/{}: {}",
                        self.name,
                        lease.instance().id(),
                        attempt,
                        self.max_attempts,
                        e
                    );
                    lease.release().await;
                    last_error = Some(e);
                }
            }
        }

        let err = self
            .error(format!(
                "All instances in pool '{}' failed after {} attempts",
                pool.name(),
                self.max_attempts
            ))
            .with_detail("attempts", self.max_attempts as u64);
        Err(match last_error {
            Some(cause) => err.with_source(cause),
            None => err,
        })
    }

    /// Run one prompt on one instance
    async fn invoke(&self, instance: &PoolInstance, prompt: &str, params: &Params) -> WrapperResult<LlmResponse> {
        let client = self.client_for(instance).await?;
        let messages = [Message::user(prompt)];

        let call = client.generate(&messages, params);
        let result = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(format!("no response within {:?}", limit))),
            },
            None => call.await,
        };

        let mut response = result.map_err(|e| {
            WrapperError::execution(format!("Instance '{}' call failed: {}", instance.id(), e))
                .with_detail("wrapper_type", WrapperKind::PollingPool.as_str())
                .with_detail("instance_id", instance.id().to_string())
                .with_source(e)
        })?;

        response.usage = Some(tokens::resolve_pool_usage(&response, self.token_service.as_deref()));
        response.metadata.insert("instance_id".to_string(), Value::from(instance.id()));
        response.metadata.insert("pool".to_string(), Value::from(self.pool_name()));
        Ok(response)
    }

    /// The instance's attached client, then the local cache, then a new one
    async fn client_for(&self, instance: &PoolInstance) -> WrapperResult<SharedClient> {
        if let Some(client) = instance.client() {
            return Ok(client);
        }
        let cached = self.state().client_cache.get(instance.id()).cloned();
        if let Some(client) = cached {
            instance.attach_client(Arc::clone(&client));
            return Ok(client);
        }

        let client = self
            .client_factory
            .create_client(instance_client_config(instance.config()))
            .await?;
        self.state()
            .client_cache
            .insert(instance.id().to_string(), Arc::clone(&client));
        instance.attach_client(Arc::clone(&client));
        debug!("Built client for instance '{}'", instance.id());
        Ok(client)
    }

    fn record_rotation(&self, instance_id: &str, attempt_number: usize) {
        let mut state = self.state();
        if state.rotation_history.len() >= constants::ROTATION_HISTORY_LIMIT {
            state.rotation_history.pop_front();
        }
        state.rotation_history.push_back(RotationHistoryEntry {
            instance_id: instance_id.to_string(),
            attempt_number,
            timestamp: Utc::now(),
        });
    }

    fn error(&self, message: String) -> WrapperError {
        WrapperError::polling_pool(message)
            .with_detail("wrapper_type", WrapperKind::PollingPool.as_str())
            .with_detail("wrapper_name", self.name.clone())
            .with_detail("pool", self.pool_name().to_string())
    }

    fn state(&self) -> MutexGuard<'_, PoolWrapperState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Instance provider settings with defaults for anything left unset
fn instance_client_config(config: &ClientConfig) -> ClientConfig {
    let mut config = config.clone();
    config.model_type.get_or_insert_with(|| constants::DEFAULT_INSTANCE_MODEL_TYPE.to_string());
    config.model_name.get_or_insert_with(|| constants::DEFAULT_INSTANCE_MODEL_NAME.to_string());
    config.temperature.get_or_insert(constants::DEFAULT_INSTANCE_TEMPERATURE);
    config.timeout.get_or_insert(constants::DEFAULT_TIMEOUT_SECS);
    config.max_retries.get_or_insert(constants::DEFAULT_MAX_RETRIES);
    config
}

#[async_trait]
impl Wrapper for PollingPoolWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> WrapperKind {
        WrapperKind::PollingPool
    }

    async fn generate(&self, messages: &[Message], params: &Params) -> WrapperResult<LlmResponse> {
        let started = Instant::now();
        let result = self.execute(messages, params).await;
        let elapsed = started.elapsed();
        self.state().stats.record(result.is_ok(), elapsed);

        #[cfg(feature = "metrics")]
        crate::metrics::record_wrapper_request(WrapperKind::PollingPool.as_str(), &self.name, result.as_ref().err(), elapsed);

        result
    }

    fn model_info(&self) -> HashMap<String, Value> {
        HashMap::from([
            ("name".to_string(), Value::from(self.name.clone())),
            ("wrapper_type".to_string(), Value::from(WrapperKind::PollingPool.as_str())),
            ("pool_name".to_string(), Value::from(self.pool_name())),
            ("max_instance_attempts".to_string(), Value::from(self.max_attempts as u64)),
            ("total_attempts".to_string(), Value::from(self.total_attempts())),
            ("supports_function_calling".to_string(), Value::from(self.supports_function_calling())),
        ])
    }

    fn get_stats(&self) -> WrapperResult<WrapperStats> {
        Ok(self.state().stats)
    }

    fn reset_stats(&self) {
        self.state().stats = WrapperStats::default();
    }

    fn as_health_checkable(&self) -> Option<&dyn HealthCheckable> {
        Some(self)
    }

    fn as_history_reset(&self) -> Option<&dyn HistoryReset> {
        Some(self)
    }
}

#[async_trait]
impl HealthCheckable for PollingPoolWrapper {
    async fn health_check(&self) -> HealthReport {
        let Some(pool) = self.pool_manager.get_pool(self.pool_name()) else {
            return HealthReport::unhealthy(format!("Polling pool '{}' not found", self.pool_name()));
        };

        let report = match pool.instances() {
            Ok(instances) => {
                let healthy = instances.iter().filter(|i| i.is_healthy()).count();
                HealthReport::from_counts(healthy, instances.len())
            }
            Err(e) => HealthReport::unhealthy(e.to_string()),
        }
        .with_detail("pool", pool.name().to_string());

        #[cfg(feature = "metrics")]
        crate::metrics::set_pool_health(pool.name(), report.healthy, report.health_ratio.unwrap_or(0.0));

        report
    }
}

impl HistoryReset for PollingPoolWrapper {
    fn reset_history(&self) {
        self.reset_rotation_history();
    }
}
