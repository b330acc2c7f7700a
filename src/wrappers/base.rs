use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;
use serde_json::Value;

use crate::constants;
use crate::errors::WrapperResult;
use crate::providers::{LlmResponse, Message, Params};
use crate::wrappers::config::WrapperKind;

/// Stream of content chunks produced by `stream_generate`
pub type ChunkStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Running request statistics of a wrapper
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WrapperStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Seconds
    pub total_response_time: f64,
    /// Seconds; `total_response_time / total_requests`, 0 before any request
    pub avg_response_time: f64,
}

impl WrapperStats {
    /// Record the outcome of one top-level `generate` call
    pub fn record(&mut self, success: bool, elapsed: Duration) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
        self.total_response_time += elapsed.as_secs_f64();
        self.avg_response_time = self.total_response_time / self.total_requests as f64;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }
}

/// Result of a wrapper health check
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthy_instances: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_instances: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
}

impl HealthReport {
    /// Healthy when strictly more than half of the instances are healthy
    pub fn from_counts(healthy_instances: usize, total_instances: usize) -> Self {
        let health_ratio = if total_instances == 0 {
            0.0
        } else {
            healthy_instances as f64 / total_instances as f64
        };
        Self {
            healthy: healthy_instances * 2 > total_instances,
            healthy_instances: Some(healthy_instances),
            total_instances: Some(total_instances),
            health_ratio: Some(health_ratio),
            ..Default::default()
        }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Report for wrappers that have nothing to check
    pub fn no_health_check() -> Self {
        Self {
            healthy: true,
            note: Some("no health check".to_string()),
            ..Default::default()
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Wrappers that can report the health of what they route to
#[async_trait]
pub trait HealthCheckable: Send + Sync {
    /// Never fails: problems are reported in the returned report
    async fn health_check(&self) -> HealthReport;
}

/// Wrappers that keep an attempt history which can be cleared
pub trait HistoryReset: Send + Sync {
    fn reset_history(&self);
}

/// Common contract of every wrapper
///
/// A wrapper stands in for a logical target (a task group, a polling pool, ...)
/// and hides which concrete client ends up serving a request.
#[async_trait]
pub trait Wrapper: Send + Sync {
    /// Unique name the wrapper is registered under
    fn name(&self) -> &str;
    fn kind(&self) -> WrapperKind;

    /// Generate a response. Stats are updated exactly once per call.
    async fn generate(&self, messages: &[Message], params: &Params) -> WrapperResult<LlmResponse>;

    /// Stream a response.
    ///
    /// The default is not natively streaming: it runs `generate` once and
    /// re-chunks the content into pieces of ten characters.
    async fn stream_generate(&self, messages: &[Message], params: &Params) -> WrapperResult<ChunkStream> {
        let response = self.generate(messages, params).await?;
        let chunks = chunk_content(&response.content, constants::STREAM_CHUNK_CHARS);
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    fn supports_function_calling(&self) -> bool {
        false
    }

    fn model_info(&self) -> HashMap<String, Value>;

    /// Snapshot of the wrapper's stats
    fn get_stats(&self) -> WrapperResult<WrapperStats>;

    fn reset_stats(&self);

    fn as_health_checkable(&self) -> Option<&dyn HealthCheckable> {
        None
    }

    fn as_history_reset(&self) -> Option<&dyn HistoryReset> {
        None
    }
}

/// Split content into chunks of `size` characters
pub fn chunk_content(content: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = content.chars().collect();
    chars.chunks(size).map(|chunk| chunk.iter().collect()).collect()
}

/// Collapse a conversation into the single prompt a pool instance receives.
///
/// A single message is passed through as-is; longer conversations are
/// rendered one `role: content` line per message.
pub fn prompt_from_messages(messages: &[Message]) -> String {
    match messages {
        [] => String::new(),
        [only] => only.content.clone(),
        many => many
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}
