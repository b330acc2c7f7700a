use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::providers::{ClientConfig, SharedClient};

/// Health of a pool instance, owned by the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Healthy,
    Unhealthy,
}

struct InstanceState {
    status: InstanceStatus,
    unhealthy_since: Option<Instant>,
    last_used: Option<Instant>,
}

/// One independently callable backend configuration within a pool.
///
/// Counters are atomics so wrappers and the pool can update them concurrently
/// through `record_success`/`record_failure`. The built client is cached on
/// the instance once created.
pub struct PoolInstance {
    instance_id: String,
    config: ClientConfig,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    consecutive_failures: AtomicU32,
    state: Mutex<InstanceState>,
    client: Mutex<Option<SharedClient>>,
}

impl PoolInstance {
    pub fn new(instance_id: impl Into<String>, config: ClientConfig) -> Self {
        Self {
            instance_id: instance_id.into(),
            config,
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            consecutive_failures: AtomicU32::new(0),
            state: Mutex::new(InstanceState {
                status: InstanceStatus::Healthy,
                unhealthy_since: None,
                last_used: None,
            }),
            client: Mutex::new(None),
        }
    }

    /// Builder-style status override, mostly for seeding pools
    pub fn with_status(self, status: InstanceStatus) -> Self {
        self.set_status(status);
        self
    }

    pub fn id(&self) -> &str {
        &self.instance_id
    }

    /// Provider settings embedded in this instance
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::SeqCst)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::SeqCst)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Total calls recorded against this instance
    pub fn request_count(&self) -> u64 {
        self.success_count() + self.failure_count()
    }

    pub fn record_success(&self) {
        self.success_count.fetch_add(1, Ordering::SeqCst);
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::SeqCst);
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn status(&self) -> InstanceStatus {
        self.state().status
    }

    pub fn is_healthy(&self) -> bool {
        self.status() == InstanceStatus::Healthy
    }

    pub fn set_status(&self, status: InstanceStatus) {
        let mut state = self.state();
        state.status = status;
        state.unhealthy_since = match status {
            InstanceStatus::Healthy => None,
            InstanceStatus::Unhealthy => Some(Instant::now()),
        };
    }

    /// When the instance was last marked unhealthy
    pub fn unhealthy_since(&self) -> Option<Instant> {
        self.state().unhealthy_since
    }

    /// Put the instance back in rotation and clear its failure streak
    pub fn recover(&self) {
        self.set_status(InstanceStatus::Healthy);
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    pub fn last_used(&self) -> Option<Instant> {
        self.state().last_used
    }

    pub fn touch(&self) {
        self.state().last_used = Some(Instant::now());
    }

    /// The client attached to this instance, if one was built already
    pub fn client(&self) -> Option<SharedClient> {
        self.client.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn attach_client(&self, client: SharedClient) {
        *self.client.lock().unwrap_or_else(PoisonError::into_inner) = Some(client);
    }

    pub fn clear_client(&self) {
        *self.client.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn state(&self) -> MutexGuard<'_, InstanceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PoolInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolInstance")
            .field("instance_id", &self.instance_id)
            .field("status", &self.status())
            .field("success_count", &self.success_count())
            .field("failure_count", &self.failure_count())
            .finish()
    }
}
