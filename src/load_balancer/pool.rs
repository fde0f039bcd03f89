//! Target pool management.
//!
//! # Responsibilities
//! - Own the ordered sequence of targets
//! - Apply load balancing algorithms to select a target
//! - Serialize shape-changing mutations against concurrent selection
//! - Produce read-only snapshots for reporting

use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::load_balancer::{
    least_conn::LeastConnections, round_robin::RoundRobin, target::Target, Algorithm, LoadBalancer,
};

/// Error type for pool mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("invalid target url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("target {0} already exists")]
    DuplicateTarget(String),

    #[error("target {0} not found")]
    TargetNotFound(String),
}

/// Point-in-time view of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSnapshot {
    pub url: String,
    pub alive: bool,
    pub current_connections: usize,
}

/// A target taken out of the pool, with the position it occupied.
#[derive(Debug)]
pub struct RemovedTarget {
    pub index: usize,
    pub target: Arc<Target>,
}

/// Registry of all targets plus rotation state.
///
/// The sequence sits behind one `RwLock`: selection and reporting take the
/// read side, add/remove take the write side. Liveness and connection counts
/// live in per-target atomics so selection never needs the write side.
#[derive(Debug, Default)]
pub struct TargetPool {
    targets: RwLock<Vec<Arc<Target>>>,
    round_robin: RoundRobin,
    least_conn: LeastConnections,
}

impl TargetPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the startup pool. Startup targets start alive, pending the first probe.
    pub fn from_urls<I, S>(urls: I) -> Result<Self, PoolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pool = Self::new();
        for url in urls {
            pool.insert(Target::parse(url.as_ref(), true)?)?;
        }
        Ok(pool)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<Target>>> {
        self.targets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<Target>>> {
        self.targets.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn balancer(&self, algorithm: Algorithm) -> &dyn LoadBalancer {
        match algorithm {
            Algorithm::RoundRobin => &self.round_robin,
            Algorithm::LeastConn => &self.least_conn,
        }
    }

    /// Select an alive target with the given algorithm.
    pub fn select(&self, algorithm: Algorithm) -> Option<Arc<Target>> {
        let targets = self.read();
        let selected = self.balancer(algorithm).next_target(&targets);
        if selected.is_none() {
            tracing::debug!(
                algorithm = ?algorithm,
                target_count = targets.len(),
                "No alive target found in pool"
            );
        }
        selected
    }

    pub fn select_round_robin(&self) -> Option<Arc<Target>> {
        self.select(Algorithm::RoundRobin)
    }

    pub fn select_least_conn(&self) -> Option<Arc<Target>> {
        self.select(Algorithm::LeastConn)
    }

    fn insert(&self, target: Target) -> Result<Arc<Target>, PoolError> {
        let mut targets = self.write();
        if targets.iter().any(|t| t.key() == target.key()) {
            return Err(PoolError::DuplicateTarget(target.url().to_string()));
        }
        let target = Arc::new(target);
        targets.push(target.clone());
        Ok(target)
    }

    /// Append a new target. It stays dead until a probe reaches it.
    pub fn add_target(&self, url: &str) -> Result<Arc<Target>, PoolError> {
        let target = self.insert(Target::parse(url, false)?)?;
        tracing::info!(target_url = %target.url(), "Target added");
        Ok(target)
    }

    /// Remove a target from the selectable set.
    ///
    /// Requests already holding the target keep it until they finish.
    pub fn remove_target(&self, url: &str) -> Result<RemovedTarget, PoolError> {
        let key = Target::parse(url, false)?.key().to_string();
        let mut targets = self.write();
        let index = targets
            .iter()
            .position(|t| t.key() == key)
            .ok_or_else(|| PoolError::TargetNotFound(url.to_string()))?;
        let target = targets.remove(index);
        drop(targets);

        tracing::info!(target_url = %target.url(), "Target removed");
        Ok(RemovedTarget { index, target })
    }

    /// Put a removed target back where it was (admin rollback).
    pub fn restore(&self, removed: RemovedTarget) -> Result<(), PoolError> {
        let mut targets = self.write();
        if targets.iter().any(|t| t.key() == removed.target.key()) {
            return Err(PoolError::DuplicateTarget(removed.target.url().to_string()));
        }
        let index = removed.index.min(targets.len());
        targets.insert(index, removed.target);
        Ok(())
    }

    /// Update liveness of the target at `url`, in any equivalent spelling.
    ///
    /// Returns the previous liveness, or `None` when no such target exists
    /// (an unparsable URL names no target).
    pub fn set_status(&self, url: &str, alive: bool) -> Option<bool> {
        let key = Target::parse(url, false).ok()?.key().to_string();
        self.set_status_by_key(&key, alive)
    }

    /// Same as `set_status`, for a caller already holding the canonical key.
    pub(crate) fn set_status_by_key(&self, key: &str, alive: bool) -> Option<bool> {
        let targets = self.read();
        targets
            .iter()
            .find(|t| t.key() == key)
            .map(|t| t.set_alive(alive))
    }

    /// Consistent read-only copy of the pool.
    pub fn snapshot(&self) -> Vec<TargetSnapshot> {
        self.read()
            .iter()
            .map(|t| TargetSnapshot {
                url: t.url().to_string(),
                alive: t.is_alive(),
                current_connections: t.current_connections(),
            })
            .collect()
    }

    /// Handles to every target (for health probing).
    pub fn targets(&self) -> Vec<Arc<Target>> {
        self.read().clone()
    }

    /// Configured URLs in pool order (for persistence).
    pub fn urls(&self) -> Vec<String> {
        self.read().iter().map(|t| t.url().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn alive_count(&self) -> usize {
        self.read().iter().filter(|t| t.is_alive()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(urls: &[&str]) -> TargetPool {
        TargetPool::from_urls(urls.iter().copied()).unwrap()
    }

    #[test]
    fn test_startup_targets_alive() {
        let p = pool(&["http://127.0.0.1:8081", "http://127.0.0.1:8082"]);
        assert_eq!(p.len(), 2);
        assert_eq!(p.alive_count(), 2);
    }

    #[test]
    fn test_startup_rejects_duplicates() {
        let err = TargetPool::from_urls(["http://127.0.0.1:8081", "http://127.0.0.1:8081/"]).unwrap_err();
        assert!(matches!(err, PoolError::DuplicateTarget(_)));
    }

    #[test]
    fn test_add_duplicate_leaves_pool_unchanged() {
        let p = pool(&["http://127.0.0.1:8081"]);
        let err = p.add_target("http://127.0.0.1:8081").unwrap_err();
        assert_eq!(err, PoolError::DuplicateTarget("http://127.0.0.1:8081".into()));
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn test_added_target_starts_dead() {
        let p = pool(&["http://127.0.0.1:8081"]);
        let t = p.add_target("http://127.0.0.1:8082").unwrap();
        assert!(!t.is_alive());
        assert_eq!(t.current_connections(), 0);
        assert_eq!(p.urls(), vec!["http://127.0.0.1:8081", "http://127.0.0.1:8082"]);
    }

    #[test]
    fn test_remove_missing_leaves_pool_unchanged() {
        let p = pool(&["http://127.0.0.1:8081"]);
        let err = p.remove_target("http://127.0.0.1:9999").unwrap_err();
        assert_eq!(err, PoolError::TargetNotFound("http://127.0.0.1:9999".into()));
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn test_remove_keeps_inflight_handle_valid() {
        let p = pool(&["http://127.0.0.1:8081", "http://127.0.0.1:8082"]);
        let held = p.select_round_robin().unwrap();
        let guard = held.acquire();

        let removed = p.remove_target(held.url()).unwrap();
        assert_eq!(removed.index, 0);
        assert_eq!(p.len(), 1);
        assert_eq!(guard.current_connections(), 1);
        drop(guard);
        assert_eq!(held.current_connections(), 0);

        for _ in 0..4 {
            assert_ne!(p.select_round_robin().unwrap().key(), held.key());
        }
    }

    #[test]
    fn test_restore_reinserts_at_index() {
        let p = pool(&[
            "http://127.0.0.1:8081",
            "http://127.0.0.1:8082",
            "http://127.0.0.1:8083",
        ]);
        let removed = p.remove_target("http://127.0.0.1:8082").unwrap();
        p.restore(removed).unwrap();
        assert_eq!(
            p.urls(),
            vec!["http://127.0.0.1:8081", "http://127.0.0.1:8082", "http://127.0.0.1:8083"]
        );
    }

    #[test]
    fn test_set_status_unknown_is_noop() {
        let p = pool(&["http://127.0.0.1:8081"]);
        assert_eq!(p.set_status("http://127.0.0.1:9999", false), None);
        assert_eq!(p.set_status("http://127.0.0.1:8081", false), Some(true));
        assert_eq!(p.alive_count(), 0);
    }

    #[test]
    fn test_set_status_accepts_any_spelling() {
        let p = pool(&["http://localhost"]);
        assert!(matches!(
            p.add_target("http://LOCALHOST:80/"),
            Err(PoolError::DuplicateTarget(_))
        ));

        assert_eq!(p.set_status("http://localhost", false), Some(true));
        assert_eq!(p.alive_count(), 0);

        assert_eq!(p.set_status("http://LOCALHOST:80/", true), Some(false));
        assert_eq!(p.alive_count(), 1);

        assert_eq!(p.set_status("not a url", false), None);
        assert_eq!(p.alive_count(), 1);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let p = pool(&["http://127.0.0.1:8081"]);
        let snap = p.snapshot();
        let _guard = p.select_least_conn().unwrap().acquire();
        p.set_status("http://127.0.0.1:8081", false);

        assert_eq!(
            snap,
            vec![TargetSnapshot {
                url: "http://127.0.0.1:8081".into(),
                alive: true,
                current_connections: 0,
            }]
        );
        assert_eq!(p.snapshot()[0].current_connections, 1);
    }

    #[test]
    fn test_empty_pool_selects_nothing() {
        let p = TargetPool::new();
        assert!(p.is_empty());
        assert!(p.select_round_robin().is_none());
        assert!(p.select_least_conn().is_none());
    }

    #[test]
    fn test_all_dead_selects_nothing() {
        let p = pool(&["http://127.0.0.1:8081", "http://127.0.0.1:8082"]);
        for t in p.targets() {
            p.set_status(t.key(), false);
        }
        assert!(p.select_round_robin().is_none());
        assert!(p.select_least_conn().is_none());
    }
}
