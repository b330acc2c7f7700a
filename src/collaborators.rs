//! Contracts this crate consumes from adjacent subsystems.
//!
//! Configuration storage, task-group definitions, cross-group fallback policy
//! and token counting are owned elsewhere; wrappers only talk to them through
//! these traits. In-memory implementations for the task-group and pool
//! managers live in [`crate::task_groups`] and [`crate::pool`].

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::constants;
use crate::errors::LlmResult;
use crate::providers::{ClientConfig, Params};

/// Module-level settings served by the external config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ModuleConfig {
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    #[serde(default = "default_cache_max_size")]
    pub cache_max_size: usize,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_max_size: constants::DEFAULT_CLIENT_CACHE_SIZE,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_max_size() -> usize {
    constants::DEFAULT_CLIENT_CACHE_SIZE
}

/// Resolves logical model names to full client configurations
pub trait ExternalConfigResolver: Send + Sync {
    /// Full client config for a logical model name, if one is defined
    fn get_client_config(&self, model_name: &str) -> Option<ClientConfig>;
    fn get_module_config(&self) -> ModuleConfig;
    /// Drop whatever the resolver cached; called when client caches are cleared
    fn invalidate_cache(&self) {}
}

/// A parsed `group.echelon` target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReference {
    pub group: String,
    pub echelon: Option<String>,
}

/// Read access to task-group definitions
pub trait TaskGroupManager: Send + Sync {
    /// Model names the target resolves to, in priority order
    fn get_models_for_group(&self, target: &str) -> LlmResult<Vec<String>>;
    /// Split a target into group and echelon; `None` if it is not a group reference
    fn parse_group_reference(&self, target: &str) -> Option<GroupReference>;
    /// Groups to fall back to when the target fails
    fn get_fallback_groups(&self, target: &str) -> Vec<String>;
    /// Raw echelon settings (models, function_calling, ...)
    fn get_echelon_config(&self, group: &str, echelon: &str) -> Option<HashMap<String, Value>>;
}

/// Cross-group retry policy
#[async_trait]
pub trait FallbackManager: Send + Sync {
    /// Run the prompt against `primary_target`, then each fallback group in order,
    /// returning the first successful content
    async fn execute_with_fallback(
        &self,
        primary_target: &str,
        fallback_groups: &[String],
        prompt: &str,
        params: &Params,
    ) -> LlmResult<String>;
}

/// Token counting service
pub trait TokenCalculationService: Send + Sync {
    fn calculate_tokens(&self, text: &str, provider_type: &str, model_name: &str) -> LlmResult<u32>;
}
