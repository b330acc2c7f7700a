use std::fmt;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::constants;
use crate::errors::{WrapperError, WrapperResult};
use crate::providers::Params;

/// The kind of a wrapper, as named by the `type` field of its definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum WrapperKind {
    TaskGroup,
    PollingPool,
    /// A kind registered on the factory at runtime
    Custom(String),
}

impl WrapperKind {
    pub fn as_str(&self) -> &str {
        match self {
            WrapperKind::TaskGroup => "task_group",
            WrapperKind::PollingPool => "polling_pool",
            WrapperKind::Custom(kind) => kind,
        }
    }
}

impl From<&str> for WrapperKind {
    fn from(kind: &str) -> Self {
        match kind.trim().to_lowercase().as_str() {
            "task_group" => WrapperKind::TaskGroup,
            "polling_pool" => WrapperKind::PollingPool,
            other => WrapperKind::Custom(other.to_string()),
        }
    }
}

impl From<WrapperKind> for String {
    fn from(kind: WrapperKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for WrapperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Definition of one wrapper: its name, kind and free-form parameters.
///
/// Known parameters: `target`, `pool`, `max_instance_attempts`,
/// `fallback_groups`, `request_timeout` (seconds).
#[derive(Debug, Clone, PartialEq)]
pub struct WrapperConfig {
    pub name: String,
    pub kind: WrapperKind,
    pub parameters: Params,
}

impl WrapperConfig {
    pub fn new(name: impl Into<String>, kind: WrapperKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parameters: Params::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Params) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Build from a raw definition map; the kind comes from its `type` field
    pub fn from_definition(name: &str, definition: &Params) -> WrapperResult<Self> {
        let kind = definition
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                WrapperError::config(format!("Wrapper '{}' has no 'type' field", name))
                    .with_detail("wrapper_name", name.to_string())
            })?;

        let mut parameters = definition.clone();
        parameters.remove("type");
        Ok(Self {
            name: name.to_string(),
            kind: WrapperKind::from(kind),
            parameters,
        })
    }

    fn str_param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// Explicit routing target, if configured
    pub fn target(&self) -> Option<&str> {
        self.str_param("target")
    }

    /// Pool this wrapper routes to: `pool`, then `target`, then the wrapper name
    pub fn pool_name(&self) -> &str {
        self.str_param("pool")
            .or_else(|| self.target())
            .unwrap_or(self.name.as_str())
    }

    /// Attempt bound for polling pool calls, at least 1
    pub fn max_instance_attempts(&self) -> WrapperResult<usize> {
        match self.parameters.get("max_instance_attempts") {
            None | Some(Value::Null) => Ok(constants::DEFAULT_MAX_INSTANCE_ATTEMPTS),
            Some(value) => match value.as_u64() {
                Some(n) if n >= 1 => Ok(n as usize),
                _ => Err(self.invalid("max_instance_attempts", value, "a positive integer")),
            },
        }
    }

    /// Explicit fallback groups, if configured
    pub fn fallback_groups(&self) -> WrapperResult<Option<Vec<String>>> {
        match self.parameters.get("fallback_groups") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(String::from)
                        .ok_or_else(|| self.invalid("fallback_groups", item, "a list of strings"))
                })
                .collect::<WrapperResult<Vec<_>>>()
                .map(Some),
            Some(other) => Err(self.invalid("fallback_groups", other, "a list of strings")),
        }
    }

    /// Per-call deadline for provider calls
    pub fn request_timeout(&self) -> WrapperResult<Option<Duration>> {
        match self.parameters.get("request_timeout") {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_f64()
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .filter(|d| !d.is_zero())
                .map(Some)
                .ok_or_else(|| self.invalid("request_timeout", value, "a positive number of seconds")),
        }
    }

    fn invalid(&self, key: &str, value: &Value, expected: &str) -> WrapperError {
        WrapperError::config(format!(
            "Wrapper '{}': '{}' must be {}, got {}",
            self.name, key, expected, value
        ))
        .with_detail("wrapper_name", self.name.clone())
        .with_detail("parameter", key.to_string())
    }
}
