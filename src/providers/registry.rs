use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, warn};

use crate::errors::{LlmError, LlmResult};
use crate::providers::client::{ClientConstructor, ProviderClient};
use crate::providers::mock::MockClient;
use crate::providers::types::ClientConfig;

/// Provider families the registry tries to register on construction,
/// each with the type names it answers to
const BUILTIN_PROVIDERS: &[(&str, &[&str])] = &[
    ("openai", &["openai", "siliconflow"]),
    ("gemini", &["gemini"]),
    ("anthropic", &["anthropic", "claude"]),
    ("mock", &["mock"]),
    ("human_relay", &["human_relay", "human_relay_single", "human_relay_multi"]),
];

/// Maps provider type names to client constructors
#[derive(Default)]
pub struct ClientRegistry {
    constructors: RwLock<HashMap<String, ClientConstructor>>,
}

impl ClientRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry and registers every built-in provider that is
    /// available in this build. Missing implementations are logged and
    /// skipped so the remaining ones still register.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for (family, aliases) in BUILTIN_PROVIDERS {
            match builtin_constructor(family) {
                Ok(constructor) => {
                    for alias in *aliases {
                        registry.register_constructor(alias, Arc::clone(&constructor));
                    }
                    debug!("Registered built-in provider '{}' as {:?}", family, aliases);
                }
                Err(e) => {
                    warn!("Built-in provider '{}' not registered: {}", family, e);
                }
            }
        }
        registry
    }

    /// Register a constructor for a provider type, replacing any previous one
    pub fn register<F>(&self, provider_type: &str, constructor: F)
    where
        F: Fn(&ClientConfig) -> LlmResult<Box<dyn ProviderClient>> + Send + Sync + 'static,
    {
        self.register_constructor(provider_type, Arc::new(constructor));
    }

    pub fn register_constructor(&self, provider_type: &str, constructor: ClientConstructor) {
        self.constructors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provider_type.to_lowercase(), constructor);
    }

    /// Look up the constructor for a provider type (case-insensitive)
    pub fn resolve(&self, provider_type: &str) -> Option<ClientConstructor> {
        self.constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&provider_type.to_lowercase())
            .cloned()
    }

    pub fn is_registered(&self, provider_type: &str) -> bool {
        self.resolve(provider_type).is_some()
    }

    /// Registered type names, sorted
    pub fn supported_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }
}

/// Constructor for a built-in provider family.
///
/// Only the mock client ships with this crate; the HTTP providers are
/// supplied by adjacent crates through [`ClientRegistry::register`].
fn builtin_constructor(family: &str) -> LlmResult<ClientConstructor> {
    match family {
        "mock" => {
            let constructor: ClientConstructor = Arc::new(|config: &ClientConfig| {
                Ok(Box::new(MockClient::from_config(config)?) as Box<dyn ProviderClient>)
            });
            Ok(constructor)
        }
        other => Err(LlmError::Unavailable(format!(
            "no implementation for provider '{}' is linked into this build",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_register_available_providers_only() {
        let registry = ClientRegistry::with_builtins();
        assert!(registry.is_registered("mock"));
        assert!(!registry.is_registered("openai"));
        assert_eq!(registry.supported_types(), vec!["mock".to_string()]);
    }

    #[test]
    fn test_register_is_case_insensitive() {
        let registry = ClientRegistry::new();
        registry.register("OpenAI", |config| {
            Ok(Box::new(MockClient::from_config(config)?) as Box<dyn ProviderClient>)
        });
        assert!(registry.is_registered("openai"));
        assert!(registry.resolve("OPENAI").is_some());
        assert!(registry.resolve("gemini").is_none());
    }
}
