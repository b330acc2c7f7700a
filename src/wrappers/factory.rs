use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::join_all;
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::collaborators::{FallbackManager, TaskGroupManager, TokenCalculationService};
use crate::constants;
use crate::errors::{WrapperError, WrapperResult};
use crate::pool::PollingPoolManager;
use crate::providers::{Params, ProviderClientFactory};
use crate::wrappers::base::{HealthReport, Wrapper, WrapperStats};
use crate::wrappers::config::{WrapperConfig, WrapperKind};
use crate::wrappers::polling_pool::PollingPoolWrapper;
use crate::wrappers::task_group::TaskGroupWrapper;

/// Collaborators handed to every wrapper the factory builds
#[derive(Clone)]
pub struct WrapperContext {
    pub client_factory: Arc<ProviderClientFactory>,
    pub task_groups: Option<Arc<dyn TaskGroupManager>>,
    pub fallback: Option<Arc<dyn FallbackManager>>,
    pub pools: Option<Arc<dyn PollingPoolManager>>,
    pub token_service: Option<Arc<dyn TokenCalculationService>>,
}

impl WrapperContext {
    pub fn new(client_factory: Arc<ProviderClientFactory>) -> Self {
        Self {
            client_factory,
            task_groups: None,
            fallback: None,
            pools: None,
            token_service: None,
        }
    }

    pub fn with_task_group_manager(mut self, manager: Arc<dyn TaskGroupManager>) -> Self {
        self.task_groups = Some(manager);
        self
    }

    pub fn with_fallback_manager(mut self, manager: Arc<dyn FallbackManager>) -> Self {
        self.fallback = Some(manager);
        self
    }

    pub fn with_pool_manager(mut self, manager: Arc<dyn PollingPoolManager>) -> Self {
        self.pools = Some(manager);
        self
    }

    pub fn with_token_service(mut self, service: Arc<dyn TokenCalculationService>) -> Self {
        self.token_service = Some(service);
        self
    }
}

/// Builds a wrapper of a kind registered at runtime
pub type WrapperConstructor =
    Arc<dyn Fn(&str, WrapperConfig, &WrapperContext) -> WrapperResult<Arc<dyn Wrapper>> + Send + Sync>;

/// Stats of one wrapper, or why they could not be read
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WrapperStatsEntry {
    Stats(WrapperStats),
    Error { error: String },
}

/// Aggregate view over every registered wrapper
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FactoryStats {
    pub total_wrappers: usize,
    /// Number of wrappers per kind
    pub wrapper_types: BTreeMap<String, usize>,
    pub wrappers: BTreeMap<String, WrapperStatsEntry>,
}

/// Creates wrappers and keeps track of them by name
pub struct WrapperFactory {
    context: WrapperContext,
    wrappers: RwLock<HashMap<String, Arc<dyn Wrapper>>>,
    custom_kinds: RwLock<HashMap<String, WrapperConstructor>>,
}

impl WrapperFactory {
    pub fn new(context: WrapperContext) -> Self {
        Self {
            context,
            wrappers: RwLock::new(HashMap::new()),
            custom_kinds: RwLock::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &WrapperContext {
        &self.context
    }

    pub fn create_task_group_wrapper(&self, name: &str, config: WrapperConfig) -> WrapperResult<Arc<TaskGroupWrapper>> {
        config.fallback_groups()?;

        let mut wrapper = TaskGroupWrapper::new(name, config);
        if let Some(manager) = &self.context.task_groups {
            wrapper = wrapper.with_task_group_manager(Arc::clone(manager));
        }
        if let Some(manager) = &self.context.fallback {
            wrapper = wrapper.with_fallback_manager(Arc::clone(manager));
        }

        let wrapper = Arc::new(wrapper);
        self.store(name, wrapper.clone());
        Ok(wrapper)
    }

    pub fn create_polling_pool_wrapper(&self, name: &str, config: WrapperConfig) -> WrapperResult<Arc<PollingPoolWrapper>> {
        let pools = self.context.pools.as_ref().ok_or_else(|| {
            WrapperError::factory(format!(
                "Cannot create polling pool wrapper '{}': no polling pool manager configured",
                name
            ))
            .with_detail("wrapper_name", name.to_string())
            .with_detail("wrapper_type", WrapperKind::PollingPool.as_str())
        })?;

        let mut wrapper = PollingPoolWrapper::new(name, config, Arc::clone(pools), Arc::clone(&self.context.client_factory))?;
        if let Some(service) = &self.context.token_service {
            wrapper = wrapper.with_token_service(Arc::clone(service));
        }

        let wrapper = Arc::new(wrapper);
        self.store(name, wrapper.clone());
        Ok(wrapper)
    }

    /// Create and register a wrapper of the given kind
    pub fn create_wrapper_from_config(&self, name: &str, kind: WrapperKind, parameters: Params) -> WrapperResult<Arc<dyn Wrapper>> {
        let config = WrapperConfig::new(name, kind.clone()).with_parameters(parameters);
        match kind {
            WrapperKind::TaskGroup => {
                let wrapper: Arc<dyn Wrapper> = self.create_task_group_wrapper(name, config)?;
                Ok(wrapper)
            }
            WrapperKind::PollingPool => {
                let wrapper: Arc<dyn Wrapper> = self.create_polling_pool_wrapper(name, config)?;
                Ok(wrapper)
            }
            WrapperKind::Custom(kind_name) => {
                let constructor = self.kinds().get(&kind_name).cloned().ok_or_else(|| {
                    WrapperError::factory(format!("Unsupported wrapper type '{}'", kind_name))
                        .with_detail("wrapper_name", name.to_string())
                        .with_detail("wrapper_type", kind_name.clone())
                })?;
                let wrapper = constructor(name, config, &self.context)?;
                self.store(name, Arc::clone(&wrapper));
                Ok(wrapper)
            }
        }
    }

    /// Create every wrapper in a name → definition map.
    ///
    /// Entries without a `type`, of an unknown kind, or that fail to build
    /// are logged and skipped; the rest are returned.
    pub fn create_wrappers_from_config(&self, definitions: &HashMap<String, Params>) -> HashMap<String, Arc<dyn Wrapper>> {
        let mut created = HashMap::new();
        for (name, definition) in definitions {
            let config = match WrapperConfig::from_definition(name, definition) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Skipping wrapper '{}': {}", name, e);
                    continue;
                }
            };
            match self.create_wrapper_from_config(name, config.kind, config.parameters) {
                Ok(wrapper) => {
                    created.insert(name.clone(), wrapper);
                }
                Err(e) => error!("Failed to create wrapper '{}': {}", name, e),
            }
        }
        info!("Created {}/{} wrappers from config", created.len(), definitions.len());
        created
    }

    /// Make an additional wrapper kind available to `create_wrapper_from_config`
    pub fn register_wrapper_kind<F>(&self, kind: &str, constructor: F)
    where
        F: Fn(&str, WrapperConfig, &WrapperContext) -> WrapperResult<Arc<dyn Wrapper>> + Send + Sync + 'static,
    {
        let kind = kind.trim().to_lowercase();
        debug!("Registered wrapper kind '{}'", kind);
        self.custom_kinds
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, Arc::new(constructor));
    }

    /// Register an already built wrapper under its own name, returning the one it replaced
    pub fn register_wrapper(&self, wrapper: Arc<dyn Wrapper>) -> Option<Arc<dyn Wrapper>> {
        let name = wrapper.name().to_string();
        self.store(&name, wrapper)
    }

    pub fn get_wrapper(&self, name: &str) -> Option<Arc<dyn Wrapper>> {
        self.read().get(name).cloned()
    }

    /// Registered wrapper names, sorted
    pub fn list_wrappers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn remove_wrapper(&self, name: &str) -> Option<Arc<dyn Wrapper>> {
        let removed = self.write().remove(name);
        if removed.is_some() {
            info!("Removed wrapper '{}'", name);
        }
        removed
    }

    pub fn get_wrapper_stats(&self) -> FactoryStats {
        let wrappers = self.snapshot();
        let mut stats = FactoryStats {
            total_wrappers: wrappers.len(),
            ..Default::default()
        };

        for (name, wrapper) in wrappers {
            *stats.wrapper_types.entry(wrapper.kind().to_string()).or_insert(0) += 1;
            let entry = match wrapper.get_stats() {
                Ok(snapshot) => WrapperStatsEntry::Stats(snapshot),
                Err(e) => {
                    warn!("Could not read stats of wrapper '{}': {}", name, e);
                    WrapperStatsEntry::Error { error: e.to_string() }
                }
            };
            stats.wrappers.insert(name, entry);
        }
        stats
    }

    /// Health of every wrapper, each check bounded by a timeout
    pub async fn health_check_all(&self) -> BTreeMap<String, HealthReport> {
        let wrappers = self.snapshot();
        let checks = wrappers.iter().map(|(name, wrapper)| async move {
            let report = match wrapper.as_health_checkable() {
                Some(checkable) => {
                    match tokio::time::timeout(constants::HEALTH_CHECK_TIMEOUT, checkable.health_check()).await {
                        Ok(report) => report,
                        Err(_) => {
                            warn!("Health check of wrapper '{}' timed out", name);
                            HealthReport::unhealthy(format!(
                                "health check timed out after {:?}",
                                constants::HEALTH_CHECK_TIMEOUT
                            ))
                        }
                    }
                }
                None => HealthReport::no_health_check(),
            };
            (name.clone(), report)
        });
        join_all(checks).await.into_iter().collect()
    }

    /// `health_check_all` for callers that cannot await.
    ///
    /// Inside a runtime the checks run on a separate thread with its own
    /// runtime, so this never blocks on the caller's scheduler; outside one a
    /// runtime is started for the duration of the call.
    pub fn health_check_all_blocking(&self) -> BTreeMap<String, HealthReport> {
        let outcome = if tokio::runtime::Handle::try_current().is_ok() {
            std::thread::scope(|scope| {
                scope
                    .spawn(|| self.run_health_checks())
                    .join()
                    .unwrap_or_else(|_| Err("health check worker panicked".to_string()))
            })
        } else {
            self.run_health_checks()
        };

        outcome.unwrap_or_else(|e| {
            error!("Health checks could not run: {}", e);
            self.list_wrappers()
                .into_iter()
                .map(|name| (name, HealthReport::unhealthy(e.clone())))
                .collect()
        })
    }

    fn run_health_checks(&self) -> Result<BTreeMap<String, HealthReport>, String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("failed to start health check runtime: {}", e))?;
        Ok(runtime.block_on(self.health_check_all()))
    }

    /// Reset stats and histories of every wrapper; returns how many were reset
    pub fn reset_all_stats(&self) -> usize {
        let wrappers = self.snapshot();
        for (name, wrapper) in &wrappers {
            wrapper.reset_stats();
            if let Some(history) = wrapper.as_history_reset() {
                history.reset_history();
            }
            debug!("Reset stats of wrapper '{}'", name);
        }
        wrappers.len()
    }

    /// Drop every registered wrapper
    pub fn shutdown(&self) {
        let mut wrappers = self.write();
        let count = wrappers.len();
        wrappers.clear();
        info!("Wrapper factory shut down, released {} wrappers", count);
    }

    fn store(&self, name: &str, wrapper: Arc<dyn Wrapper>) -> Option<Arc<dyn Wrapper>> {
        let replaced = self.write().insert(name.to_string(), wrapper);
        if replaced.is_some() {
            warn!("Wrapper '{}' replaced an existing wrapper with the same name", name);
        }
        replaced
    }

    fn snapshot(&self) -> Vec<(String, Arc<dyn Wrapper>)> {
        let mut wrappers: Vec<_> = self
            .read()
            .iter()
            .map(|(name, wrapper)| (name.clone(), Arc::clone(wrapper)))
            .collect();
        wrappers.sort_by(|a, b| a.0.cmp(&b.0));
        wrappers
    }

    fn kinds(&self) -> RwLockReadGuard<'_, HashMap<String, WrapperConstructor>> {
        self.custom_kinds.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn Wrapper>>> {
        self.wrappers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn Wrapper>>> {
        self.wrappers.write().unwrap_or_else(PoisonError::into_inner)
    }
}
