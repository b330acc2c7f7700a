//! llm-wrappers is the routing and resilience layer between callers and LLM backends.
//!
//! Callers address a logical target by name and never talk to a single provider
//! instance directly: a wrapper picks the concrete client, invokes it, retries on
//! another backend when one fails, and keeps statistics and health on the way.
//!
//! # Features
//!
//! - **Task-group wrappers**: resolve a task group (`group` or `group.echelon`) and
//!   optionally hand cross-group retries to a fallback manager
//! - **Polling-pool wrappers**: rotate across the instances of a pool with a bounded
//!   number of attempts, counting successes and failures per instance
//! - **Client factory**: build provider clients from configuration, inject HTTP
//!   transports, and cache clients by model name with insertion-order eviction
//! - **Health and stats**: per-wrapper statistics, pool health reports and
//!   rotation/fallback histories
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use llm_wrappers::{
//!     ClientRegistry, InMemoryPoolManager, InstancePool, Message, Params, PoolConfig,
//!     PoolInstance, ProviderClientFactory, Wrapper, WrapperContext, WrapperFactory,
//!     WrapperConfig, WrapperKind, ClientConfig,
//! };
//!
//! async fn example() {
//!     let pools = Arc::new(InMemoryPoolManager::new());
//!     pools.add_pool(Arc::new(InstancePool::new(
//!         "gpu",
//!         PoolConfig::default(),
//!         vec![
//!             PoolInstance::new("gpu-1", ClientConfig::new("mock", "model-a")),
//!             PoolInstance::new("gpu-2", ClientConfig::new("mock", "model-b")),
//!         ],
//!     )));
//!
//!     let clients = Arc::new(ProviderClientFactory::new(ClientRegistry::with_builtins(), None));
//!     let factory = WrapperFactory::new(WrapperContext::new(clients).with_pool_manager(pools));
//!
//!     let wrapper = factory
//!         .create_polling_pool_wrapper("gpu", WrapperConfig::new("gpu", WrapperKind::PollingPool))
//!         .expect("Failed to create wrapper");
//!
//!     let response = wrapper
//!         .generate(&[Message::user("Explain Rust in one paragraph")], &Params::new())
//!         .await
//!         .expect("All instances failed");
//!     println!("{}", response.content);
//! }
//! ```

pub mod collaborators;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pool;
pub mod providers;
pub mod task_groups;
pub mod wrappers;

#[cfg(feature = "metrics")]
pub mod metrics;

pub use collaborators::{
    ExternalConfigResolver,
    FallbackManager,
    GroupReference,
    ModuleConfig,
    TaskGroupManager,
    TokenCalculationService,
};

pub use errors::{LlmError, LlmResult, WrapperError, WrapperResult};

pub use pool::{
    InMemoryPoolManager,
    InstancePool,
    InstanceStatus,
    PollingPoolManager,
    Pool,
    PoolConfig,
    PoolInstance,
    RotationStrategyKind,
};

pub use providers::{
    ClientConfig,
    ClientRegistry,
    LlmResponse,
    Message,
    MockClient,
    Params,
    ProviderClient,
    ProviderClientFactory,
    SharedClient,
    TokenUsage,
};

pub use task_groups::{EchelonDefinition, StaticTaskGroupManager, TaskGroupDefinition};

pub use wrappers::{
    HealthCheckable,
    HealthReport,
    HistoryReset,
    PollingPoolWrapper,
    TaskGroupWrapper,
    Wrapper,
    WrapperConfig,
    WrapperContext,
    WrapperFactory,
    WrapperKind,
    WrapperStats,
};

#[cfg(feature = "metrics")]
pub use metrics::describe_metrics;

/// Initialize the logging system
///
/// This should be called at the start of your application in case
/// you want to activate the library's debug and info logging.
pub fn use_logging() {
    env_logger::init();
}
