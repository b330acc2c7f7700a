//! In-memory task-group definitions.
//!
//! A task group is a named set of echelons; each echelon lists the models it
//! resolves to. Targets are written `group` or `group.echelon`.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collaborators::{GroupReference, TaskGroupManager};
use crate::errors::{LlmError, LlmResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EchelonDefinition {
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_calling: Option<Value>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

impl EchelonDefinition {
    pub fn new<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            models: models.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_function_calling(mut self, value: impl Into<Value>) -> Self {
        self.function_calling = Some(value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskGroupDefinition {
    /// Echelons by name; iteration order is the resolution order
    #[serde(default)]
    pub echelons: BTreeMap<String, EchelonDefinition>,
    #[serde(default)]
    pub fallback_groups: Vec<String>,
}

impl TaskGroupDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn echelon(mut self, name: impl Into<String>, echelon: EchelonDefinition) -> Self {
        self.echelons.insert(name.into(), echelon);
        self
    }

    pub fn fallback_to<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_groups = groups.into_iter().map(Into::into).collect();
        self
    }
}

/// Task-group manager over a fixed set of definitions
#[derive(Debug, Clone, Default)]
pub struct StaticTaskGroupManager {
    groups: HashMap<String, TaskGroupDefinition>,
}

impl StaticTaskGroupManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_groups(groups: HashMap<String, TaskGroupDefinition>) -> Self {
        Self { groups }
    }

    pub fn with_group(mut self, name: impl Into<String>, group: TaskGroupDefinition) -> Self {
        self.groups.insert(name.into(), group);
        self
    }

    pub fn group(&self, name: &str) -> Option<&TaskGroupDefinition> {
        self.groups.get(name)
    }
}

impl TaskGroupManager for StaticTaskGroupManager {
    fn get_models_for_group(&self, target: &str) -> LlmResult<Vec<String>> {
        let reference = self
            .parse_group_reference(target)
            .ok_or_else(|| LlmError::ConfigError(format!("Invalid task group reference '{}'", target)))?;
        let group = self
            .groups
            .get(&reference.group)
            .ok_or_else(|| LlmError::ConfigError(format!("Task group '{}' is not defined", reference.group)))?;

        match reference.echelon {
            Some(echelon) => group
                .echelons
                .get(&echelon)
                .map(|e| e.models.clone())
                .ok_or_else(|| {
                    LlmError::ConfigError(format!(
                        "Echelon '{}' is not defined in task group '{}'",
                        echelon, reference.group
                    ))
                }),
            None => {
                let mut models: Vec<String> = Vec::new();
                for echelon in group.echelons.values() {
                    for model in &echelon.models {
                        if !models.contains(model) {
                            models.push(model.clone());
                        }
                    }
                }
                Ok(models)
            }
        }
    }

    fn parse_group_reference(&self, target: &str) -> Option<GroupReference> {
        let target = target.trim();
        if target.is_empty() {
            return None;
        }
        match target.split_once('.') {
            Some((group, echelon)) => {
                if group.is_empty() || echelon.is_empty() {
                    return None;
                }
                Some(GroupReference {
                    group: group.to_string(),
                    echelon: Some(echelon.to_string()),
                })
            }
            None => Some(GroupReference {
                group: target.to_string(),
                echelon: None,
            }),
        }
    }

    fn get_fallback_groups(&self, target: &str) -> Vec<String> {
        self.parse_group_reference(target)
            .and_then(|reference| self.groups.get(&reference.group))
            .map(|group| group.fallback_groups.clone())
            .unwrap_or_default()
    }

    fn get_echelon_config(&self, group: &str, echelon: &str) -> Option<HashMap<String, Value>> {
        let definition = self.groups.get(group)?.echelons.get(echelon)?;
        let mut config = definition.extra.clone();
        config.insert("models".to_string(), Value::from(definition.models.clone()));
        if let Some(function_calling) = &definition.function_calling {
            config.insert("function_calling".to_string(), function_calling.clone());
        }
        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager() -> StaticTaskGroupManager {
        StaticTaskGroupManager::new().with_group(
            "chat",
            TaskGroupDefinition::new()
                .echelon("primary", EchelonDefinition::new(["gpt-4"]).with_function_calling(json!({"mode": "auto"})))
                .echelon("secondary", EchelonDefinition::new(["gpt-3.5", "gpt-4"]))
                .fallback_to(["backup"]),
        )
    }

    #[test]
    fn test_parse_group_reference() {
        let m = manager();
        assert_eq!(
            m.parse_group_reference("chat.primary"),
            Some(GroupReference { group: "chat".into(), echelon: Some("primary".into()) })
        );
        assert_eq!(m.parse_group_reference("chat").unwrap().echelon, None);
        assert!(m.parse_group_reference("").is_none());
        assert!(m.parse_group_reference("chat.").is_none());
    }

    #[test]
    fn test_models_for_echelon_and_group() {
        let m = manager();
        assert_eq!(m.get_models_for_group("chat.primary").unwrap(), vec!["gpt-4"]);
        assert_eq!(m.get_models_for_group("chat").unwrap(), vec!["gpt-4", "gpt-3.5"]);
        assert!(m.get_models_for_group("chat.tertiary").is_err());
        assert!(m.get_models_for_group("unknown").is_err());
    }

    #[test]
    fn test_fallback_groups_and_echelon_config() {
        let m = manager();
        assert_eq!(m.get_fallback_groups("chat.primary"), vec!["backup"]);
        assert!(m.get_fallback_groups("unknown").is_empty());

        let config = m.get_echelon_config("chat", "primary").unwrap();
        assert_eq!(config["function_calling"], json!({"mode": "auto"}));
        assert!(m.get_echelon_config("chat", "secondary").unwrap().get("function_calling").is_none());
    }
}
