//! Polling pools: named sets of interchangeable backend instances.
//!
//! Pools are owned outside the wrappers. A wrapper borrows an instance with
//! `acquire_instance`, and must hand it back with exactly one
//! `release_instance` call before moving on.

pub mod instance;
pub mod memory;
pub mod strategies;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::LlmResult;

pub use instance::{InstanceStatus, PoolInstance};
pub use memory::{InMemoryPoolManager, InstancePool};
pub use strategies::{RotationStrategy, RotationStrategyKind};

/// Pool-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Task groups this pool serves
    #[serde(default)]
    pub task_groups: Vec<String>,
    #[serde(default)]
    pub rotation_strategy: RotationStrategyKind,
    /// Seconds between health checks
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval: u64,
    /// Consecutive failures before an instance is taken out of rotation
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Seconds an unhealthy instance stays out of rotation
    #[serde(default = "default_recovery_time")]
    pub recovery_time: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            task_groups: Vec::new(),
            rotation_strategy: RotationStrategyKind::default(),
            health_check_interval: default_health_check_interval(),
            failure_threshold: default_failure_threshold(),
            recovery_time: default_recovery_time(),
        }
    }
}

impl PoolConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval)
    }

    pub fn recovery_time(&self) -> Duration {
        Duration::from_secs(self.recovery_time)
    }
}

fn default_health_check_interval() -> u64 {
    30
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_recovery_time() -> u64 {
    60
}

/// A named collection of instances with its own rotation policy
#[async_trait]
pub trait Pool: Send + Sync {
    fn name(&self) -> &str;
    fn config(&self) -> &PoolConfig;
    /// Borrow the next instance; `None` when nothing is available. May wait.
    async fn acquire_instance(&self) -> Option<Arc<PoolInstance>>;
    /// Return a borrowed instance. May be called again for the same
    /// instance when an earlier release was cancelled before completing.
    async fn release_instance(&self, instance: Arc<PoolInstance>);
    /// Snapshot of every instance in the pool
    fn instances(&self) -> LlmResult<Vec<Arc<PoolInstance>>>;
}

/// Looks pools up by name
pub trait PollingPoolManager: Send + Sync {
    fn get_pool(&self, name: &str) -> Option<Arc<dyn Pool>>;
    fn pool_names(&self) -> Vec<String>;
}
