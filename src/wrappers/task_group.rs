use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::collaborators::{FallbackManager, TaskGroupManager};
use crate::constants;
use crate::errors::{WrapperError, WrapperResult};
use crate::providers::{LlmResponse, Message, Params};
use crate::wrappers::base::{prompt_from_messages, HistoryReset, Wrapper, WrapperStats};
use crate::wrappers::config::{WrapperConfig, WrapperKind};
use crate::wrappers::tokens;

/// Outcome of one call routed through the fallback manager
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackHistoryEntry {
    pub target: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct TaskGroupState {
    stats: WrapperStats,
    fallback_history: VecDeque<FallbackHistoryEntry>,
    current_target: Option<String>,
}

/// Wrapper routing calls to a task group.
///
/// With a fallback manager, the call is handed over together with the
/// fallback groups and the outcome is recorded in the fallback history.
/// Without one, the target is resolved to its models and answered directly.
pub struct TaskGroupWrapper {
    name: String,
    config: WrapperConfig,
    task_groups: Option<Arc<dyn TaskGroupManager>>,
    fallback: Option<Arc<dyn FallbackManager>>,
    state: Mutex<TaskGroupState>,
}

impl TaskGroupWrapper {
    pub fn new(name: impl Into<String>, config: WrapperConfig) -> Self {
        let name = name.into();
        info!("Created task group wrapper '{}'", name);
        Self {
            name,
            config,
            task_groups: None,
            fallback: None,
            state: Mutex::new(TaskGroupState::default()),
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

    pub fn config(&self) -> &WrapperConfig {
        &self.config
    }

    /// Configured target, or the wrapper name
    pub fn target(&self) -> &str {
        self.config.target().unwrap_or(self.name.as_str())
    }

    /// Target of the most recent call
    pub fn current_target(&self) -> Option<String> {
        self.state().current_target.clone()
    }

    pub fn fallback_history(&self) -> Vec<FallbackHistoryEntry> {
        self.state().fallback_history.iter().cloned().collect()
    }

    pub fn reset_fallback_history(&self) {
        self.state().fallback_history.clear();
    }

    async fn execute(&self, messages: &[Message], params: &Params) -> WrapperResult<LlmResponse> {
        let target = self.target().to_string();
        self.state().current_target = Some(target.clone());

        match &self.fallback {
            Some(fallback) => self.execute_with_fallback(fallback.as_ref(), &target, messages, params).await,
            None => self.execute_direct(&target, messages, params),
        }
    }

    async fn execute_with_fallback(
        &self,
        fallback: &dyn FallbackManager,
        target: &str,
        messages: &[Message],
        params: &Params,
    ) -> WrapperResult<LlmResponse> {
        let fallback_groups = match self.fallback_groups_for(target) {
            Ok(groups) => groups,
            Err(e) => {
                self.record_fallback(target, Some(e.to_string()));
                return Err(self
                    .error(format!("Invalid fallback groups for task group '{}': {}", target, e))
                    .with_detail("target", target.to_string())
                    .with_source(e));
            }
        };
        let prompt = prompt_from_messages(messages);
        debug!(
            "Wrapper '{}': executing '{}' with fallback groups {:?}",
            self.name, target, fallback_groups
        );

        match fallback.execute_with_fallback(target, &fallback_groups, &prompt, params).await {
            Ok(content) => {
                self.record_fallback(target, None);
                let usage = tokens::estimate_task_group_usage(&content, params);
                Ok(LlmResponse::new(content, target)
                    .with_usage(usage)
                    .with_metadata("task_group", target)
                    .with_metadata("fallback_groups", fallback_groups))
            }
            Err(e) => {
                warn!("Wrapper '{}': fallback execution for '{}' failed: {}", self.name, target, e);
                self.record_fallback(target, Some(e.to_string()));

                #[cfg(feature = "metrics")]
                crate::metrics::record_fallback_failure(&self.name, target);

                Err(self
                    .error(format!("Execution failed for task group '{}': {}", target, e))
                    .with_detail("target", target.to_string())
                    .with_source(e))
            }
        }
    }

    /// Answers from the first resolved model without calling a provider.
    ///
    /// The content is a placeholder; the returned model is the first model
    /// the target resolves to.
    fn execute_direct(&self, target: &str, _messages: &[Message], params: &Params) -> WrapperResult<LlmResponse> {
        let manager = self.task_groups.as_ref().ok_or_else(|| {
            self.error(format!("No task group manager available to resolve '{}'", target))
        })?;
        let models = manager.get_models_for_group(target).map_err(|e| {
            self.error(format!("Failed to resolve task group '{}': {}", target, e))
                .with_detail("target", target.to_string())
                .with_source(e)
        })?;
        let model = models.first().ok_or_else(|| {
            self.error(format!("Task group '{}' resolves to no models", target))
                .with_detail("target", target.to_string())
        })?;

        let content = format!("Response from {} for task group '{}'", model, target);
        let usage = tokens::estimate_task_group_usage(&content, params);
        Ok(LlmResponse::new(content, model.clone())
            .with_usage(usage)
            .with_metadata("task_group", target)
            .with_metadata("models", models.clone())
            .with_metadata("placeholder", true))
    }

    /// Configured fallback groups, else the ones defined for the target's group
    fn fallback_groups_for(&self, target: &str) -> WrapperResult<Vec<String>> {
        if let Some(groups) = self.config.fallback_groups()? {
            return Ok(groups);
        }
        Ok(self
            .task_groups
            .as_ref()
            .filter(|manager| manager.parse_group_reference(target).is_some())
            .map(|manager| manager.get_fallback_groups(target))
            .unwrap_or_default())
    }

    fn record_fallback(&self, target: &str, error: Option<String>) {
        let mut state = self.state();
        if state.fallback_history.len() >= constants::FALLBACK_HISTORY_LIMIT {
            state.fallback_history.pop_front();
        }
        state.fallback_history.push_back(FallbackHistoryEntry {
            target: target.to_string(),
            success: error.is_none(),
            error,
            timestamp: Utc::now(),
        });
    }

    fn error(&self, message: String) -> WrapperError {
        WrapperError::task_group(message)
            .with_detail("wrapper_type", WrapperKind::TaskGroup.as_str())
            .with_detail("wrapper_name", self.name.clone())
    }

    fn state(&self) -> MutexGuard<'_, TaskGroupState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Wrapper for TaskGroupWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> WrapperKind {
        WrapperKind::TaskGroup
    }

    async fn generate(&self, messages: &[Message], params: &Params) -> WrapperResult<LlmResponse> {
        let started = Instant::now();
        let result = self.execute(messages, params).await;
        let elapsed = started.elapsed();
        self.state().stats.record(result.is_ok(), elapsed);

        #[cfg(feature = "metrics")]
        crate::metrics::record_wrapper_request(WrapperKind::TaskGroup.as_str(), &self.name, result.as_ref().err(), elapsed);

        result
    }

    fn supports_function_calling(&self) -> bool {
        let Some(manager) = &self.task_groups else {
            return false;
        };
        let target = self.target();
        manager
            .parse_group_reference(target)
            .and_then(|reference| {
                let echelon = reference.echelon?;
                manager.get_echelon_config(&reference.group, &echelon)
            })
            .and_then(|config| config.get("function_calling").cloned())
            .is_some_and(|value| !value.is_null())
    }

    fn model_info(&self) -> HashMap<String, Value> {
        let mut info = HashMap::from([
            ("name".to_string(), Value::from(self.name.clone())),
            ("wrapper_type".to_string(), Value::from(WrapperKind::TaskGroup.as_str())),
            ("target".to_string(), Value::from(self.target())),
            ("has_fallback_manager".to_string(), Value::from(self.fallback.is_some())),
            ("supports_function_calling".to_string(), Value::from(self.supports_function_calling())),
        ]);
        if let Some(models) = self
            .task_groups
            .as_ref()
            .and_then(|manager| manager.get_models_for_group(self.target()).ok())
        {
            info.insert("models".to_string(), Value::from(models));
        }
        info
    }

    fn get_stats(&self) -> WrapperResult<WrapperStats> {
        Ok(self.state().stats)
    }

    fn reset_stats(&self) {
        self.state().stats = WrapperStats::default();
    }

    fn as_history_reset(&self) -> Option<&dyn HistoryReset> {
        Some(self)
    }
}

impl HistoryReset for TaskGroupWrapper {
    fn reset_history(&self) {
        self.reset_fallback_history();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task_groups::{EchelonDefinition, StaticTaskGroupManager, TaskGroupDefinition};
    use serde_json::json;

    fn manager() -> Arc<dyn TaskGroupManager> {
        Arc::new(StaticTaskGroupManager::new().with_group(
            "chat",
            TaskGroupDefinition::new()
                .echelon("primary", EchelonDefinition::new(["gpt-4"]).with_function_calling(json!(true)))
                .echelon("cheap", EchelonDefinition::new(["gpt-3.5"]))
                .fallback_to(["backup"]),
        ))
    }

    #[test]
    fn test_target_defaults_to_name() {
        let wrapper = TaskGroupWrapper::new("chat.primary", WrapperConfig::new("chat.primary", WrapperKind::TaskGroup));
        assert_eq!(wrapper.target(), "chat.primary");

        let config = WrapperConfig::new("w", WrapperKind::TaskGroup).with_param("target", "chat.cheap");
        assert_eq!(TaskGroupWrapper::new("w", config).target(), "chat.cheap");
    }

    #[test]
    fn test_function_calling_follows_echelon() {
        let primary = TaskGroupWrapper::new("w", WrapperConfig::new("w", WrapperKind::TaskGroup).with_param("target", "chat.primary"))
            .with_task_group_manager(manager());
        assert!(primary.supports_function_calling());

        let cheap = TaskGroupWrapper::new("w", WrapperConfig::new("w", WrapperKind::TaskGroup).with_param("target", "chat.cheap"))
            .with_task_group_manager(manager());
        assert!(!cheap.supports_function_calling());

        let unresolved = TaskGroupWrapper::new("w", WrapperConfig::new("w", WrapperKind::TaskGroup).with_param("target", "chat"))
            .with_task_group_manager(manager());
        assert!(!unresolved.supports_function_calling());
    }

    #[test]
    fn test_fallback_groups_prefer_config() {
        let wrapper = TaskGroupWrapper::new(
            "w",
            WrapperConfig::new("w", WrapperKind::TaskGroup).with_param("fallback_groups", json!(["explicit"])),
        )
        .with_task_group_manager(manager());
        assert_eq!(wrapper.fallback_groups_for("chat.primary").unwrap(), vec!["explicit"]);

        let derived = TaskGroupWrapper::new("w", WrapperConfig::new("w", WrapperKind::TaskGroup)).with_task_group_manager(manager());
        assert_eq!(derived.fallback_groups_for("chat.primary").unwrap(), vec!["backup"]);
        assert!(derived.fallback_groups_for("").unwrap().is_empty());
    }

    #[test]
    fn test_history_is_capped() {
        let wrapper = TaskGroupWrapper::new("w", WrapperConfig::new("w", WrapperKind::TaskGroup));
        for i in 0..(constants::FALLBACK_HISTORY_LIMIT + 5) {
            wrapper.record_fallback(&format!("t{}", i), None);
        }
        let history = wrapper.fallback_history();
        assert_eq!(history.len(), constants::FALLBACK_HISTORY_LIMIT);
        assert_eq!(history[0].target, "t5");
    }
}
