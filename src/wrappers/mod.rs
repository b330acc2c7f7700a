//! Wrappers stand between callers and provider clients.
//!
//! A caller asks the [`WrapperFactory`] for a wrapper by name and calls
//! `generate` on it. The wrapper decides which concrete client serves the
//! request: a [`TaskGroupWrapper`] resolves a task group (optionally through a
//! fallback manager), a [`PollingPoolWrapper`] rotates across the instances of
//! a pool and retries on another instance when one fails.

pub mod base;
pub mod config;
pub mod factory;
pub mod polling_pool;
pub mod task_group;
pub mod tokens;

pub use base::{chunk_content, ChunkStream, HealthCheckable, HealthReport, HistoryReset, Wrapper, WrapperStats};
pub use config::{WrapperConfig, WrapperKind};
pub use factory::{FactoryStats, WrapperConstructor, WrapperContext, WrapperFactory, WrapperStatsEntry};
pub use polling_pool::{InstanceLease, PollingPoolWrapper, RotationHistoryEntry};
pub use task_group::{FallbackHistoryEntry, TaskGroupWrapper};
