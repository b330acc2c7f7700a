use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::LlmResult;
use crate::providers::transport::HttpTransport;
use crate::providers::types::{ClientConfig, LlmResponse, Message, Params};

/// Common interface for all provider clients
///
/// Concrete clients (OpenAI, Anthropic, Gemini, ...) live outside this crate
/// and are plugged in through [`ClientRegistry`](crate::providers::ClientRegistry).
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Generate a completion for the given conversation
    async fn generate(&self, messages: &[Message], params: &Params) -> LlmResult<LlmResponse>;
    /// Provider type this client was registered under
    fn provider_type(&self) -> &str;
    /// Model this client talks to
    fn model_name(&self) -> &str;
    /// Hand the client a pre-built HTTP transport.
    ///
    /// Returns `false` when the client manages its own transport.
    fn set_http_client(&mut self, _transport: Arc<HttpTransport>) -> bool {
        false
    }
}

/// Shared handle to a built client
pub type SharedClient = Arc<dyn ProviderClient>;

/// Constructor registered for a provider type
pub type ClientConstructor = Arc<dyn Fn(&ClientConfig) -> LlmResult<Box<dyn ProviderClient>> + Send + Sync>;
