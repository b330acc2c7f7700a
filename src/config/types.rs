//! Configuration types for TOML-based configuration.
//!
//! These types map directly to the TOML configuration file structure.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::collaborators::ModuleConfig;
use crate::constants;
use crate::pool::{InMemoryPoolManager, InstancePool, PoolConfig, PoolInstance};
use crate::providers::{ClientConfig, Params};
use crate::task_groups::{StaticTaskGroupManager, TaskGroupDefinition};
use crate::wrappers::WrapperKind;

/// Root configuration structure.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Module-wide settings.
    #[serde(default)]
    pub settings: Settings,

    /// Logical models, resolvable by name.
    #[serde(default)]
    pub models: Vec<ModelConfig>,

    /// Task groups by name.
    #[serde(default)]
    pub task_groups: HashMap<String, TaskGroupDefinition>,

    /// Polling pools by name.
    #[serde(default)]
    pub pools: HashMap<String, PoolDefinition>,

    /// Wrapper definitions by name. Each table needs a `type`; the other keys
    /// become the wrapper's parameters.
    #[serde(default)]
    pub wrappers: HashMap<String, Params>,
}

/// Module-wide settings.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Whether provider clients are cached by model name.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Maximum number of cached provider clients.
    #[serde(default = "default_cache_max_size")]
    pub cache_max_size: usize,

    /// Attempt bound for pool wrappers that do not set their own.
    #[serde(default = "default_max_instance_attempts")]
    pub max_instance_attempts: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_max_size: default_cache_max_size(),
            max_instance_attempts: default_max_instance_attempts(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_max_size() -> usize {
    constants::DEFAULT_CLIENT_CACHE_SIZE
}

fn default_max_instance_attempts() -> usize {
    constants::DEFAULT_MAX_INSTANCE_ATTEMPTS
}

/// A logical model and the client settings it resolves to.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ModelConfig {
    /// Logical name (e.g., "fast-chat").
    pub name: String,

    /// Provider settings; `model_name` defaults to the logical name.
    #[serde(flatten)]
    pub client: ClientConfig,
}

/// A polling pool and its instances.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PoolDefinition {
    #[serde(flatten)]
    pub config: PoolConfig,

    #[serde(default)]
    pub instances: Vec<InstanceDefinition>,
}

/// One instance of a polling pool.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct InstanceDefinition {
    /// Identifier, unique within its pool.
    pub id: String,

    /// Provider settings of this instance.
    #[serde(flatten)]
    pub client: ClientConfig,
}

impl Config {
    pub fn module_config(&self) -> ModuleConfig {
        ModuleConfig {
            cache_enabled: self.settings.cache_enabled,
            cache_max_size: self.settings.cache_max_size,
        }
    }

    pub fn model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn build_task_group_manager(&self) -> StaticTaskGroupManager {
        StaticTaskGroupManager::from_groups(self.task_groups.clone())
    }

    pub fn build_pool_manager(&self) -> InMemoryPoolManager {
        let manager = InMemoryPoolManager::new();
        for (name, definition) in &self.pools {
            let instances = definition
                .instances
                .iter()
                .map(|i| PoolInstance::new(i.id.clone(), i.client.clone()))
                .collect();
            manager.add_pool(Arc::new(InstancePool::new(name.clone(), definition.config.clone(), instances)));
        }
        manager
    }

    /// Wrapper definitions ready for `WrapperFactory::create_wrappers_from_config`.
    ///
    /// Pool wrappers without `max_instance_attempts` get the one from `[settings]`.
    pub fn wrapper_definitions(&self) -> HashMap<String, Params> {
        self.wrappers
            .iter()
            .map(|(name, definition)| {
                let mut definition = definition.clone();
                let is_pool = definition
                    .get("type")
                    .and_then(Value::as_str)
                    .is_some_and(|kind| WrapperKind::from(kind) == WrapperKind::PollingPool);
                if is_pool {
                    definition
                        .entry("max_instance_attempts".to_string())
                        .or_insert_with(|| Value::from(self.settings.max_instance_attempts as u64));
                }
                (name.clone(), definition)
            })
            .collect()
    }
}
