//! Pool mutation protocol.
//!
//! # Responsibilities
//! - Add/remove targets and persist the resulting list
//! - Roll the pool back when persistence fails
//! - Report pool status
//!
//! # Design Decisions
//! - Admin mutations are serialized by an admin-only async mutex; the pool
//!   lock is never held across disk I/O
//! - What gets written is the pool's own URL list right after the mutation

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::{ConfigStore, PersistenceError};
use crate::load_balancer::{PoolError, Target, TargetPool, TargetSnapshot};

/// Error type for admin operations.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("failed to persist configuration: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Status report served on `GET /status`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PoolStatus {
    pub total_backends: usize,
    pub active_backends: usize,
    pub backends: Vec<TargetSnapshot>,
}

/// Entry point for every runtime change to the pool.
pub struct PoolAdmin {
    pool: Arc<TargetPool>,
    store: ConfigStore,
    mutations: Mutex<()>,
}

impl PoolAdmin {
    pub fn new(pool: Arc<TargetPool>, store: ConfigStore) -> Self {
        Self {
            pool,
            store,
            mutations: Mutex::new(()),
        }
    }

    pub fn pool(&self) -> &Arc<TargetPool> {
        &self.pool
    }

    pub fn status(&self) -> PoolStatus {
        let backends = self.pool.snapshot();
        PoolStatus {
            total_backends: backends.len(),
            active_backends: backends.iter().filter(|b| b.alive).count(),
            backends,
        }
    }

    /// Add a target and persist. The target stays dead until probed.
    pub async fn add_target(&self, url: &str) -> Result<Arc<Target>, AdminError> {
        let _serial = self.mutations.lock().await;

        let target = self.pool.add_target(url)?;
        if let Err(e) = self.store.persist(self.pool.urls()).await {
            tracing::error!(target_url = %url, error = %e, "Persist failed, rolling back add");
            if let Err(rollback) = self.pool.remove_target(target.url()) {
                tracing::error!(target_url = %url, error = %rollback, "Rollback of add failed");
            }
            return Err(e.into());
        }

        Ok(target)
    }

    /// Remove a target and persist. In-flight requests on it run to completion.
    pub async fn remove_target(&self, url: &str) -> Result<Arc<Target>, AdminError> {
        let _serial = self.mutations.lock().await;

        let removed = self.pool.remove_target(url)?;
        let target = removed.target.clone();
        if let Err(e) = self.store.persist(self.pool.urls()).await {
            tracing::error!(target_url = %url, error = %e, "Persist failed, rolling back remove");
            if let Err(rollback) = self.pool.restore(removed) {
                tracing::error!(target_url = %url, error = %rollback, "Rollback of remove failed");
            }
            return Err(e.into());
        }

        Ok(target)
    }
}
