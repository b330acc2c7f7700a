use std::sync::Arc;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::pool::instance::PoolInstance;

/// Trait defining how a pool picks the next instance
///
/// Implementations receive only the instances currently eligible for
/// selection and return an index into that slice.
pub trait RotationStrategy: Send {
    /// Select an instance from the candidates
    ///
    /// # Returns
    /// * Index into `candidates`, or `None` when it is empty
    fn select_instance(&mut self, candidates: &[Arc<PoolInstance>]) -> Option<usize>;
}

/// Rotation strategy names accepted in pool configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategyKind {
    #[default]
    RoundRobin,
    Random,
    LeastUsed,
    LeastRecentlyUsed,
}

impl RotationStrategyKind {
    pub fn create(self) -> Box<dyn RotationStrategy> {
        match self {
            RotationStrategyKind::RoundRobin => Box::new(RoundRobinStrategy::new()),
            RotationStrategyKind::Random => Box::new(RandomStrategy::new()),
            RotationStrategyKind::LeastUsed => Box::new(LeastUsedStrategy::new()),
            RotationStrategyKind::LeastRecentlyUsed => Box::new(LeastRecentlyUsedStrategy::new()),
        }
    }
}

/// Cycles through the candidates in order
#[derive(Debug, Default)]
pub struct RoundRobinStrategy {
    next: usize,
}

impl RoundRobinStrategy {
    pub fn new() -> Self {
        Self { next: 0 }
    }
}

impl RotationStrategy for RoundRobinStrategy {
    fn select_instance(&mut self, candidates: &[Arc<PoolInstance>]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let index = self.next % candidates.len();
        self.next = self.next.wrapping_add(1);

        debug!(
            "RoundRobinStrategy: Selected index {} (ID: {}) from {} candidates",
            index, candidates[index].id(), candidates.len()
        );
        Some(index)
    }
}

/// Strategy that selects a random instance from the candidates.
#[derive(Debug, Default)]
pub struct RandomStrategy;

impl RandomStrategy {
    pub fn new() -> Self {
        Self {}
    }
}

impl RotationStrategy for RandomStrategy {
    fn select_instance(&mut self, candidates: &[Arc<PoolInstance>]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let index = rand::rng().random_range(0..candidates.len());

        debug!(
            "RandomStrategy: Selected random index {} (ID: {}) from {} candidates",
            index, candidates[index].id(), candidates.len()
        );
        Some(index)
    }
}

/// Strategy that selects the instance with the fewest recorded calls
#[derive(Debug, Default)]
pub struct LeastUsedStrategy;

impl LeastUsedStrategy {
    pub fn new() -> Self {
        Self {}
    }
}

impl RotationStrategy for LeastUsedStrategy {
    fn select_instance(&mut self, candidates: &[Arc<PoolInstance>]) -> Option<usize> {
        let (index, instance) = candidates
            .iter()
            .enumerate()
            .min_by_key(|(_, instance)| instance.request_count())?;

        debug!(
            "LeastUsedStrategy: Selected index {} (ID: {}) with {} recorded calls",
            index, instance.id(), instance.request_count()
        );
        Some(index)
    }
}

/// Strategy that selects the instance that was used least recently
///
/// Instances that were never used win over any used one.
#[derive(Debug, Default)]
pub struct LeastRecentlyUsedStrategy;

impl LeastRecentlyUsedStrategy {
    pub fn new() -> Self {
        Self {}
    }
}

impl RotationStrategy for LeastRecentlyUsedStrategy {
    fn select_instance(&mut self, candidates: &[Arc<PoolInstance>]) -> Option<usize> {
        // None sorts before Some, so unused instances come first
        let (index, instance) = candidates
            .iter()
            .enumerate()
            .min_by_key(|(_, instance)| instance.last_used())?;

        debug!(
            "LeastRecentlyUsedStrategy: Selected index {} (ID: {}) last used at {:?}",
            index, instance.id(), instance.last_used()
        );
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ClientConfig;

    fn instances(n: usize) -> Vec<Arc<PoolInstance>> {
        (0..n)
            .map(|i| Arc::new(PoolInstance::new(format!("i{}", i), ClientConfig::default())))
            .collect()
    }

    #[test]
    fn test_round_robin_cycles() {
        let pool = instances(3);
        let mut strategy = RoundRobinStrategy::new();
        let picks: Vec<_> = (0..4).map(|_| strategy.select_instance(&pool).unwrap()).collect();
        assert_eq!(picks, vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_empty_candidates() {
        assert!(RoundRobinStrategy::new().select_instance(&[]).is_none());
        assert!(RandomStrategy::new().select_instance(&[]).is_none());
        assert!(LeastUsedStrategy::new().select_instance(&[]).is_none());
        assert!(LeastRecentlyUsedStrategy::new().select_instance(&[]).is_none());
    }

    #[test]
    fn test_least_used_prefers_idle_instance() {
        let pool = instances(2);
        pool[0].record_success();
        assert_eq!(LeastUsedStrategy::new().select_instance(&pool), Some(1));
    }

    #[test]
    fn test_least_recently_used_prefers_unused() {
        let pool = instances(2);
        pool[0].touch();
        assert_eq!(LeastRecentlyUsedStrategy::new().select_instance(&pool), Some(1));
    }

    #[test]
    fn test_kind_parses_snake_case() {
        let kind: RotationStrategyKind = serde_json::from_str("\"least_recently_used\"").unwrap();
        assert_eq!(kind, RotationStrategyKind::LeastRecentlyUsed);
    }
}
