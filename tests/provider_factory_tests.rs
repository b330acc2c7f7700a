//! Tests for the client registry and the provider client factory.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::MapResolver;
use llm_wrappers::providers::HttpTransport;
use llm_wrappers::{
    ClientConfig, ClientRegistry, LlmResponse, LlmResult, MockClient, ModuleConfig, Params, ProviderClient,
    ProviderClientFactory, Message,
};

fn factory_with_cache(max_size: usize) -> ProviderClientFactory {
    ProviderClientFactory::with_module_config(
        ClientRegistry::with_builtins(),
        None,
        ModuleConfig { cache_enabled: true, cache_max_size: max_size },
    )
}

// ============================================================================
// Registry Tests
// ============================================================================

#[test]
fn test_builtins_register_available_providers_only() {
    let registry = ClientRegistry::with_builtins();
    assert!(registry.is_registered("mock"));
    assert!(registry.is_registered("MOCK"));
    assert!(!registry.is_registered("openai"));
    assert!(!registry.is_registered("claude"));
}

#[test]
fn test_register_custom_provider() {
    let registry = ClientRegistry::new();
    assert!(registry.resolve("echo").is_none());

    registry.register("Echo", |config: &ClientConfig| {
        let model = config.model_name.clone().unwrap_or_default();
        Ok(Box::new(MockClient::new(model).with_response("echo")) as Box<dyn ProviderClient>)
    });

    assert!(registry.is_registered("echo"));
    assert_eq!(registry.supported_types(), vec!["echo"]);
}

// ============================================================================
// Client Creation Tests
// ============================================================================

#[tokio::test]
async fn test_create_client_and_generate() {
    let factory = factory_with_cache(10);
    let client = factory
        .create_client(ClientConfig::new("mock", "m1").with_extra("mock_response", "hi"))
        .await
        .unwrap();

    assert_eq!(client.provider_type(), "mock");
    let response = client.generate(&[Message::user("ping")], &Params::new()).await.unwrap();
    assert_eq!(response.content, "hi");
    assert_eq!(factory.cached_models().await, vec!["m1"]);
}

#[tokio::test]
async fn test_unknown_model_type_lists_supported_types() {
    let factory = factory_with_cache(10);
    let err = factory
        .create_client(ClientConfig::new("openai", "gpt-4"))
        .await
        .err()
        .unwrap();

    assert_eq!(err.kind_name(), "UnsupportedModelTypeError");
    assert_eq!(err.details()["model_type"], "openai");
    assert!(err.details()["supported_types"].as_array().unwrap().contains(&"mock".into()));
}

#[tokio::test]
async fn test_missing_model_name_is_client_creation_error() {
    let factory = factory_with_cache(10);
    let config = ClientConfig {
        model_type: Some("mock".to_string()),
        ..Default::default()
    };
    let err = factory.create_client(config).await.err().unwrap();
    assert_eq!(err.kind_name(), "ClientCreationError");
    assert!(err.to_string().contains("model_name"));
}

#[tokio::test]
async fn test_name_only_config_without_resolver_fails() {
    let factory = factory_with_cache(10);
    let err = factory.create_client(ClientConfig::for_model("fast")).await.err().unwrap();
    assert_eq!(err.kind_name(), "ClientCreationError");
}

#[tokio::test]
async fn test_invalid_base_url_is_client_creation_error() {
    let factory = factory_with_cache(10);
    let err = factory
        .create_client(ClientConfig::new("mock", "m1").with_base_url("not a url"))
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind_name(), "ClientCreationError");
}

// ============================================================================
// Resolver Tests
// ============================================================================

#[tokio::test]
async fn test_get_or_create_resolves_and_caches() {
    let resolver = Arc::new(
        MapResolver::new(ModuleConfig::default())
            .with_model("fast", ClientConfig::new("mock", "mock-fast").with_extra("mock_response", "quick")),
    );
    let factory = ProviderClientFactory::new(ClientRegistry::with_builtins(), Some(resolver.clone()));

    let first = factory.get_or_create_client("fast").await.unwrap();
    let second = factory.get_or_create_client("fast").await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.model_name(), "mock-fast");
    assert_eq!(factory.cached_models().await, vec!["fast"]);

    assert!(factory.get_or_create_client("slow").await.is_err());
}

#[tokio::test]
async fn test_clear_cache_invalidates_resolver() {
    let resolver = Arc::new(
        MapResolver::new(ModuleConfig::default()).with_model("fast", ClientConfig::new("mock", "mock-fast")),
    );
    let factory = ProviderClientFactory::new(ClientRegistry::with_builtins(), Some(resolver.clone()));
    factory.get_or_create_client("fast").await.unwrap();

    factory.clear_cache().await;
    assert!(factory.cached_models().await.is_empty());
    assert_eq!(resolver.invalidations(), 1);
}

#[tokio::test]
async fn test_module_config_disables_cache() {
    let resolver = Arc::new(MapResolver::new(ModuleConfig { cache_enabled: false, cache_max_size: 10 }));
    let factory = ProviderClientFactory::new(ClientRegistry::with_builtins(), Some(resolver));
    assert!(!factory.cache_enabled());

    factory.create_client(ClientConfig::new("mock", "m1")).await.unwrap();
    assert!(factory.cached_models().await.is_empty());
}

// ============================================================================
// Transport Injection Tests
// ============================================================================

type Received = Arc<Mutex<Vec<Arc<HttpTransport>>>>;

/// Client that keeps every transport handed to it
struct RecordingClient {
    model: String,
    received: Received,
}

#[async_trait]
impl ProviderClient for RecordingClient {
    async fn generate(&self, _messages: &[Message], _params: &Params) -> LlmResult<LlmResponse> {
        Ok(LlmResponse::new("recorded", self.model.clone()))
    }

    fn provider_type(&self) -> &str {
        "recording"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn set_http_client(&mut self, transport: Arc<HttpTransport>) -> bool {
        self.received.lock().unwrap().push(transport);
        true
    }
}

fn recording_factory() -> (ProviderClientFactory, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let registry = ClientRegistry::new();
    let sink = Arc::clone(&received);
    registry.register("recording", move |config: &ClientConfig| {
        Ok(Box::new(RecordingClient {
            model: config.model_name.clone().unwrap_or_default(),
            received: Arc::clone(&sink),
        }) as Box<dyn ProviderClient>)
    });
    (ProviderClientFactory::new(registry, None), received)
}

#[tokio::test]
async fn test_transport_carries_client_settings() {
    let (factory, received) = recording_factory();
    let config = ClientConfig {
        timeout: Some(12.5),
        max_retries: Some(7),
        headers: HashMap::from([("x-team".to_string(), "routing".to_string())]),
        ..ClientConfig::new("recording", "m1").with_base_url("https://llm.internal/v1")
    };
    factory.create_client(config).await.unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let transport = &received[0];
    assert_eq!(transport.provider(), "recording");
    assert_eq!(transport.model(), "m1");
    assert_eq!(transport.timeout(), Duration::from_secs_f64(12.5));
    assert_eq!(transport.max_retries(), 7);
    assert_eq!(transport.base_url().unwrap().as_str(), "https://llm.internal/v1");
    assert_eq!(transport.headers()["x-team"], "routing");
}

#[tokio::test]
async fn test_transport_defaults_when_unset() {
    let (factory, received) = recording_factory();
    factory.create_client(ClientConfig::new("recording", "m1")).await.unwrap();

    let received = received.lock().unwrap();
    let transport = &received[0];
    assert_eq!(transport.timeout(), Duration::from_secs(30));
    assert_eq!(transport.max_retries(), 3);
    assert!(transport.base_url().is_none());
    assert!(transport.headers().is_empty());
}

#[tokio::test]
async fn test_clear_cache_builds_fresh_transport() {
    let (factory, received) = recording_factory();
    factory.create_client(ClientConfig::new("recording", "m1")).await.unwrap();
    factory.create_client(ClientConfig::new("recording", "m1")).await.unwrap();

    factory.clear_cache().await;
    factory.create_client(ClientConfig::new("recording", "m1")).await.unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 3);
    assert!(Arc::ptr_eq(&received[0], &received[1]));
    assert!(!Arc::ptr_eq(&received[1], &received[2]));
}

#[tokio::test]
async fn test_mock_client_accepts_transport() {
    let mut client = MockClient::new("m1");
    assert!(client.transport().is_none());

    let transport = Arc::new(HttpTransport::new(&Default::default()).unwrap());
    assert!(client.set_http_client(Arc::clone(&transport)));
    assert!(Arc::ptr_eq(client.transport().unwrap(), &transport));
}

// ============================================================================
// Cache Eviction Tests
// ============================================================================

#[tokio::test]
async fn test_eviction_is_insertion_order_not_lru() {
    let factory = factory_with_cache(2);
    for name in ["a", "b"] {
        factory.create_client(ClientConfig::new("mock", name)).await.unwrap();
    }

    // Reading "a" must not protect it
    assert!(factory.cached_client("a").await.is_some());
    factory.create_client(ClientConfig::new("mock", "c")).await.unwrap();

    assert!(factory.cached_client("a").await.is_none());
    assert_eq!(factory.cached_models().await, vec!["b", "c"]);
}

#[tokio::test]
async fn test_cache_client_directly() {
    let factory = factory_with_cache(2);
    let client: llm_wrappers::SharedClient = Arc::new(MockClient::new("x"));
    factory.cache_client("x", Arc::clone(&client)).await;

    let cached = factory.cached_client("x").await.unwrap();
    assert!(Arc::ptr_eq(&cached, &client));
}
