//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → pool.rs (read-lock the target sequence)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through alive targets)
//!         - least_conn.rs (pick alive target with fewest in-flight requests)
//!     → target.rs (acquire connection guard)
//!     → Return target or None (service unavailable)
//! ```
//!
//! # Design Decisions
//! - Algorithms never mutate the target sequence, only their own cursor
//! - Dead targets are excluded from selection
//! - Liveness and connection counts are per-target atomics

pub mod least_conn;
pub mod pool;
pub mod round_robin;
pub mod target;

use std::sync::Arc;

pub use pool::{PoolError, RemovedTarget, TargetPool, TargetSnapshot};
pub use target::{ConnectionGuard, Target};

/// Selection algorithm applied over a slice of targets.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick the next alive target, or `None` when no target is alive.
    fn next_target(&self, targets: &[Arc<Target>]) -> Option<Arc<Target>>;
}

/// Algorithms the pool knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    RoundRobin,
    LeastConn,
}
