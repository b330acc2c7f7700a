//! Provider client plumbing
//!
//! This module contains everything needed to turn a configuration into a
//! callable provider client:
//! - the `ProviderClient` trait concrete providers implement
//! - the `ClientRegistry` mapping provider type names to constructors
//! - HTTP transports injected into clients
//! - the `ProviderClientFactory` that builds and caches clients
//! - a deterministic `MockClient`

pub mod client;
pub mod factory;
pub mod mock;
pub mod registry;
pub mod transport;
pub mod types;

pub use client::{ClientConstructor, ProviderClient, SharedClient};
pub use factory::{ClientCache, ProviderClientFactory};
pub use mock::MockClient;
pub use registry::ClientRegistry;
pub use transport::{HttpTransport, TransportFactory, TransportOptions};
pub use types::{ClientConfig, LlmResponse, Message, Params, TokenUsage};
