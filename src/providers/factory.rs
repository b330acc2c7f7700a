use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::{debug, info};
use tokio::sync::Mutex;

use crate::collaborators::{ExternalConfigResolver, ModuleConfig};
use crate::errors::{WrapperError, WrapperResult};
use crate::providers::client::SharedClient;
use crate::providers::registry::ClientRegistry;
use crate::providers::transport::{TransportFactory, TransportOptions};
use crate::providers::types::ClientConfig;

/// Client cache keyed by logical model name.
///
/// Eviction drops the entry that was inserted first, no matter how recently
/// it was read. Replacing an existing key keeps its original position.
pub struct ClientCache {
    entries: HashMap<String, SharedClient>,
    order: VecDeque<String>,
    max_size: usize,
}

impl ClientCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_size,
        }
    }

    pub fn get(&self, model_name: &str) -> Option<SharedClient> {
        self.entries.get(model_name).cloned()
    }

    /// Insert a client, returning the evicted model name if any
    pub fn insert(&mut self, model_name: &str, client: SharedClient) -> Option<String> {
        if self.max_size == 0 {
            return None;
        }
        if let Some(slot) = self.entries.get_mut(model_name) {
            *slot = client;
            return None;
        }

        let mut evicted = None;
        if self.entries.len() >= self.max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                evicted = Some(oldest);
            }
        }
        self.order.push_back(model_name.to_string());
        self.entries.insert(model_name.to_string(), client);
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached model names, oldest first
    pub fn keys(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// Builds provider clients from configuration and caches them by model name
pub struct ProviderClientFactory {
    registry: ClientRegistry,
    transports: TransportFactory,
    resolver: Option<Arc<dyn ExternalConfigResolver>>,
    cache_enabled: bool,
    cache: Mutex<ClientCache>,
}

impl ProviderClientFactory {
    /// Create a factory; cache settings come from the resolver's module config
    pub fn new(registry: ClientRegistry, resolver: Option<Arc<dyn ExternalConfigResolver>>) -> Self {
        let module = resolver
            .as_ref()
            .map(|r| r.get_module_config())
            .unwrap_or_default();
        Self::with_module_config(registry, resolver, module)
    }

    pub fn with_module_config(
        registry: ClientRegistry,
        resolver: Option<Arc<dyn ExternalConfigResolver>>,
        module: ModuleConfig,
    ) -> Self {
        Self {
            registry,
            transports: TransportFactory::new(),
            resolver,
            cache_enabled: module.cache_enabled,
            cache: Mutex::new(ClientCache::new(module.cache_max_size)),
        }
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    /// Build a client from a (possibly name-only) configuration.
    ///
    /// # Errors
    /// * `ClientCreation` when the config cannot be resolved, misses a required
    ///   field, or the transport/client cannot be built
    /// * `UnsupportedModelType` when `model_type` has no registered constructor
    pub async fn create_client(&self, config: ClientConfig) -> WrapperResult<SharedClient> {
        let (cache_key, config) = self.resolve_config(config)?;

        let model_type = required_field(&config.model_type, "model_type", &config)?;
        let model_name = required_field(&config.model_name, "model_name", &config)?;

        let constructor = self
            .registry
            .resolve(&model_type)
            .ok_or_else(|| WrapperError::unsupported_model_type(&model_type, self.registry.supported_types()))?;

        let transport = self
            .transports
            .create_transport(&TransportOptions {
                provider: model_type.to_lowercase(),
                model: model_name.clone(),
                api_key: config.api_key.clone(),
                base_url: config.base_url.clone(),
                timeout: config.timeout,
                max_retries: config.max_retries,
                headers: config.headers.clone(),
            })
            .map_err(|e| {
                WrapperError::client_creation(format!(
                    "Failed to build HTTP transport for {} model '{}': {}",
                    model_type, model_name, e
                ))
                .with_detail("model_type", model_type.clone())
                .with_detail("model_name", model_name.clone())
            })?;

        let mut client = constructor(&config).map_err(|e| {
            WrapperError::client_creation(format!(
                "Failed to create {} client for model '{}': {}",
                model_type, model_name, e
            ))
            .with_detail("model_type", model_type.clone())
            .with_detail("model_name", model_name.clone())
        })?;

        if !client.set_http_client(transport) {
            debug!("Client for {} ({}) keeps its own transport", model_type, model_name);
        }

        let client: SharedClient = Arc::from(client);
        info!("Created {} client for model '{}'", model_type, model_name);

        if self.cache_enabled {
            self.cache_client(&cache_key, Arc::clone(&client)).await;
        }
        Ok(client)
    }

    /// Return the cached client for a logical model name, building it on a miss
    pub async fn get_or_create_client(&self, model_name: &str) -> WrapperResult<SharedClient> {
        if let Some(client) = self.cached_client(model_name).await {
            debug!("Client cache hit for '{}'", model_name);
            return Ok(client);
        }
        self.create_client(ClientConfig::for_model(model_name)).await
    }

    /// Insert into the cache, evicting the oldest insertion when full
    pub async fn cache_client(&self, model_name: &str, client: SharedClient) {
        let mut cache = self.cache.lock().await;
        if let Some(evicted) = cache.insert(model_name, client) {
            debug!("Evicted client '{}' from cache to make room for '{}'", evicted, model_name);
        }
    }

    pub async fn cached_client(&self, model_name: &str) -> Option<SharedClient> {
        self.cache.lock().await.get(model_name)
    }

    /// Cached model names, oldest insertion first
    pub async fn cached_models(&self) -> Vec<String> {
        self.cache.lock().await.keys()
    }

    /// Clear cached clients and transports and invalidate the external config cache
    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
        self.transports.clear_cache();
        if let Some(resolver) = &self.resolver {
            resolver.invalidate_cache();
        }
        info!("Provider client caches cleared");
    }

    /// Expand a name-only config through the resolver.
    /// Returns the cache key (logical model name) and the full config.
    fn resolve_config(&self, config: ClientConfig) -> WrapperResult<(String, ClientConfig)> {
        if !config.is_name_only() {
            let key = config.model_name.clone().unwrap_or_default();
            return Ok((key, config));
        }

        let logical = config.model_name.clone().unwrap_or_default();
        let resolved = self
            .resolver
            .as_ref()
            .and_then(|r| r.get_client_config(&logical))
            .ok_or_else(|| {
                WrapperError::client_creation(format!("No client configuration found for model '{}'", logical))
                    .with_detail("model_name", logical.clone())
            })?;

        let mut full = resolved.merged_over(&config);
        if full.model_name.is_none() {
            full.model_name = Some(logical.clone());
        }
        Ok((logical, full))
    }
}

fn required_field(value: &Option<String>, field: &str, config: &ClientConfig) -> WrapperResult<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(WrapperError::client_creation(format!(
            "Missing required field '{}' in client configuration (model_type: {}, model_name: {})",
            field,
            config.model_type.as_deref().unwrap_or("<unset>"),
            config.model_name.as_deref().unwrap_or("<unset>"),
        ))
        .with_detail("field", field.to_string())),
    }
}
