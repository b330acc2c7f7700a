use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form generation parameters forwarded to provider clients
pub type Params = HashMap<String, Value>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: role.into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    /// Reads `prompt_tokens`/`completion_tokens`/`total_tokens` out of a JSON
    /// object. Returns `None` unless at least one of them is a number.
    /// Counts beyond `u32::MAX` are clamped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let read = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_u64)
                .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        };

        let prompt = read("prompt_tokens");
        let completion = read("completion_tokens");
        let total = read("total_tokens");
        if prompt.is_none() && completion.is_none() && total.is_none() {
            return None;
        }

        let prompt = prompt.unwrap_or(0);
        let completion = completion.unwrap_or(0);
        Some(Self {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: total.unwrap_or(prompt.saturating_add(completion)),
        })
    }
}

/// Response returned by provider clients and wrappers
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl LlmResponse {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Configuration a provider client is built from.
///
/// Every field is optional so the same type can carry a bare logical model name
/// (to be resolved through the external config) or a fully specified client.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Request timeout in seconds
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Provider-specific settings not covered by the fields above
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

impl ClientConfig {
    /// A config that only names a logical model
    pub fn for_model(model_name: impl Into<String>) -> Self {
        Self {
            model_name: Some(model_name.into()),
            ..Default::default()
        }
    }

    pub fn new(model_type: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            model_type: Some(model_type.into()),
            model_name: Some(model_name.into()),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// True when only the logical model name is known
    pub fn is_name_only(&self) -> bool {
        self.model_type.is_none() && self.model_name.is_some()
    }

    /// Fills unset fields from `other`, keeping everything already set here
    pub fn merged_over(mut self, other: &ClientConfig) -> Self {
        if self.model_type.is_none() {
            self.model_type = other.model_type.clone();
        }
        if self.model_name.is_none() {
            self.model_name = other.model_name.clone();
        }
        if self.api_key.is_none() {
            self.api_key = other.api_key.clone();
        }
        if self.base_url.is_none() {
            self.base_url = other.base_url.clone();
        }
        if self.temperature.is_none() {
            self.temperature = other.temperature;
        }
        if self.max_tokens.is_none() {
            self.max_tokens = other.max_tokens;
        }
        if self.timeout.is_none() {
            self.timeout = other.timeout;
        }
        if self.max_retries.is_none() {
            self.max_retries = other.max_retries;
        }
        for (key, value) in &other.headers {
            self.headers.entry(key.clone()).or_insert_with(|| value.clone());
        }
        for (key, value) in &other.extra {
            self.extra.entry(key.clone()).or_insert_with(|| value.clone());
        }
        self
    }
}
