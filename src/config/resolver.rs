use std::collections::HashMap;

use crate::collaborators::{ExternalConfigResolver, ModuleConfig};
use crate::providers::ClientConfig;

use super::types::Config;

/// Serves client and module settings out of a loaded [`Config`].
#[derive(Debug, Clone, Default)]
pub struct StaticConfigResolver {
    models: HashMap<String, ClientConfig>,
    module: ModuleConfig,
}

impl StaticConfigResolver {
    pub fn new(module: ModuleConfig) -> Self {
        Self {
            models: HashMap::new(),
            module,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut resolver = Self::new(config.module_config());
        for model in &config.models {
            resolver = resolver.with_model(model.name.clone(), model.client.clone());
        }
        resolver
    }

    /// Add a logical model; `model_name` defaults to the logical name
    pub fn with_model(mut self, name: impl Into<String>, mut client: ClientConfig) -> Self {
        let name = name.into();
        client.model_name.get_or_insert_with(|| name.clone());
        self.models.insert(name, client);
        self
    }
}

impl ExternalConfigResolver for StaticConfigResolver {
    fn get_client_config(&self, model_name: &str) -> Option<ClientConfig> {
        self.models.get(model_name).cloned()
    }

    fn get_module_config(&self) -> ModuleConfig {
        self.module
    }
}
