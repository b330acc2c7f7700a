//! Deterministic in-process client registered under the `mock` provider type.
//!
//! Behaviour is driven by extra keys in the client config:
//! - `mock_response`: fixed reply content (default echoes the last message)
//! - `mock_error`: when set, every call fails with this message
//! - `mock_delay_ms`: artificial latency before answering
//! - `mock_usage`: token usage object attached to every response

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{LlmError, LlmResult};
use crate::providers::client::ProviderClient;
use crate::providers::transport::HttpTransport;
use crate::providers::types::{ClientConfig, LlmResponse, Message, Params, TokenUsage};

const DEFAULT_MOCK_MODEL: &str = "mock-model";

pub struct MockClient {
    model: String,
    response: Option<String>,
    error: Option<String>,
    delay: Option<Duration>,
    usage: Option<TokenUsage>,
    transport: Option<Arc<HttpTransport>>,
    calls: AtomicUsize,
}

impl MockClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            response: None,
            error: None,
            delay: None,
            usage: None,
            transport: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &ClientConfig) -> LlmResult<Self> {
        let mut client = Self::new(config.model_name.as_deref().unwrap_or(DEFAULT_MOCK_MODEL));

        client.response = config.extra.get("mock_response").and_then(Value::as_str).map(String::from);
        client.error = config.extra.get("mock_error").and_then(Value::as_str).map(String::from);
        client.delay = match config.extra.get("mock_delay_ms") {
            None => None,
            Some(value) => Some(Duration::from_millis(value.as_u64().ok_or_else(|| {
                LlmError::ConfigError(format!("mock_delay_ms must be a non-negative integer, got {}", value))
            })?)),
        };
        client.usage = config.extra.get("mock_usage").and_then(TokenUsage::from_value);
        Ok(client)
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Number of `generate` calls received so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn transport(&self) -> Option<&Arc<HttpTransport>> {
        self.transport.as_ref()
    }
}

#[async_trait]
impl ProviderClient for MockClient {
    async fn generate(&self, messages: &[Message], _params: &Params) -> LlmResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = &self.error {
            return Err(LlmError::ApiError(error.clone()));
        }

        let content = match &self.response {
            Some(response) => response.clone(),
            None => {
                let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
                format!("Mock response from {}: {}", self.model, last)
            }
        };

        let mut response = LlmResponse::new(content, self.model.clone());
        response.finish_reason = Some("stop".to_string());
        response.usage = self.usage;
        Ok(response)
    }

    fn provider_type(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn set_http_client(&mut self, transport: Arc<HttpTransport>) -> bool {
        self.transport = Some(transport);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_echoes_last_message() {
        let client = MockClient::new("m1");
        let response = client
            .generate(&[Message::system("be brief"), Message::user("ping")], &Params::new())
            .await
            .unwrap();
        assert_eq!(response.content, "Mock response from m1: ping");
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_configured_error() {
        let config = ClientConfig::new("mock", "m1").with_extra("mock_error", "boom");
        let client = MockClient::from_config(&config).unwrap();
        let result = client.generate(&[Message::user("x")], &Params::new()).await;
        assert!(matches!(result, Err(LlmError::ApiError(msg)) if msg == "boom"));
    }

    #[test]
    fn test_rejects_bad_delay() {
        let config = ClientConfig::new("mock", "m1").with_extra("mock_delay_ms", json!("soon"));
        assert!(MockClient::from_config(&config).is_err());
    }
}
